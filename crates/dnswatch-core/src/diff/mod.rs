//! Line-oriented diff
//!
//! A self-contained line diff: both texts are split into line tokens, a
//! minimal edit script is computed over the tokens (Myers' O(ND) algorithm
//! in its linear-space divide-and-conquer form), and the script is then
//! cleaned up so that nearly identical regions come out as a few coherent
//! hunks instead of many fragmented ones.
//!
//! ```text
//! tokenize ──► strip common prefix/suffix ──► bisect ──► merge ──► semantic
//! ```
//!
//! Nothing here knows about DNS tables; the change detector builds on it.

/// Kind of a hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Lines present in both texts
    Equal,
    /// Lines only present in the new text
    Insert,
    /// Lines only present in the old text
    Delete,
}

/// A maximal run of lines sharing one [`Operation`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk<'a> {
    /// What happened to the lines
    pub op: Operation,
    /// Line tokens, each keeping its trailing newline
    pub lines: Vec<&'a str>,
}

impl<'a> Hunk<'a> {
    /// Create a hunk
    pub fn new(op: Operation, lines: Vec<&'a str>) -> Self {
        Self { op, lines }
    }

    /// Literal text of the hunk
    pub fn text(&self) -> String {
        self.lines.concat()
    }

    /// Number of newline-terminated lines in the hunk
    pub fn newline_count(&self) -> usize {
        self.lines.iter().filter(|line| line.ends_with('\n')).count()
    }
}

/// Split text into line tokens
///
/// Every token keeps its trailing `\n`; a final line without one is a token
/// of its own. The empty string has no tokens.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Diff two texts line by line
///
/// Returns the cleaned hunk sequence. Concatenating the `Equal` and `Delete`
/// hunks reproduces `old`; concatenating the `Equal` and `Insert` hunks
/// reproduces `new`.
pub fn diff_lines<'a>(old: &'a str, new: &'a str) -> Vec<Hunk<'a>> {
    let a = tokenize(old);
    let b = tokenize(new);

    let mut hunks = diff_tokens(&a, &b);
    cleanup_merge(&mut hunks);
    cleanup_semantic(&mut hunks);
    coalesce(&mut hunks);
    hunks
}

fn diff_tokens<'a>(a: &[&'a str], b: &[&'a str]) -> Vec<Hunk<'a>> {
    if a == b {
        if a.is_empty() {
            return Vec::new();
        }
        return vec![Hunk::new(Operation::Equal, a.to_vec())];
    }

    let prefix = common_prefix(a, b);
    let suffix = common_suffix(&a[prefix..], &b[prefix..]);

    let mut hunks = Vec::new();
    if prefix > 0 {
        hunks.push(Hunk::new(Operation::Equal, a[..prefix].to_vec()));
    }

    hunks.extend(edit_script(
        &a[prefix..a.len() - suffix],
        &b[prefix..b.len() - suffix],
    ));

    if suffix > 0 {
        hunks.push(Hunk::new(Operation::Equal, a[a.len() - suffix..].to_vec()));
    }

    hunks
}

fn edit_script<'a>(a: &[&'a str], b: &[&'a str]) -> Vec<Hunk<'a>> {
    if a.is_empty() && b.is_empty() {
        return Vec::new();
    }
    if a.is_empty() {
        return vec![Hunk::new(Operation::Insert, b.to_vec())];
    }
    if b.is_empty() {
        return vec![Hunk::new(Operation::Delete, a.to_vec())];
    }

    bisect(a, b)
}

/// Find the middle snake of the shortest edit script and diff both halves
/// around it (Myers' linear-space refinement).
///
/// Only one forward and one reverse furthest-reaching vector are kept, so
/// memory stays linear in the number of lines however many of them differ.
fn bisect<'a>(a: &[&'a str], b: &[&'a str]) -> Vec<Hunk<'a>> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max_d = (n + m + 1) / 2;
    let v_offset = max_d;
    let v_length = 2 * max_d + 2;
    let mut v1 = vec![-1isize; v_length as usize];
    let mut v2 = vec![-1isize; v_length as usize];
    v1[(v_offset + 1) as usize] = 0;
    v2[(v_offset + 1) as usize] = 0;

    let delta = n - m;
    // With an odd delta the forward path meets the reverse one, otherwise
    // the reverse path meets the forward one.
    let front = delta % 2 != 0;

    // Diagonals that ran off the edit graph are skipped from then on.
    let mut k1_start = 0;
    let mut k1_end = 0;
    let mut k2_start = 0;
    let mut k2_end = 0;

    for d in 0..max_d {
        let mut k1 = -d + k1_start;
        while k1 <= d - k1_end {
            let k1_offset = (v_offset + k1) as usize;
            let mut x1 = if k1 == -d || (k1 != d && v1[k1_offset - 1] < v1[k1_offset + 1]) {
                v1[k1_offset + 1]
            } else {
                v1[k1_offset - 1] + 1
            };
            let mut y1 = x1 - k1;
            while x1 < n && y1 < m && a[x1 as usize] == b[y1 as usize] {
                x1 += 1;
                y1 += 1;
            }
            v1[k1_offset] = x1;

            if x1 > n {
                k1_end += 2;
            } else if y1 > m {
                k1_start += 2;
            } else if front {
                let k2_offset = v_offset + delta - k1;
                if (0..v_length).contains(&k2_offset) && v2[k2_offset as usize] != -1 {
                    let x2 = n - v2[k2_offset as usize];
                    if x1 >= x2 {
                        return split(a, b, x1 as usize, y1 as usize);
                    }
                }
            }
            k1 += 2;
        }

        let mut k2 = -d + k2_start;
        while k2 <= d - k2_end {
            let k2_offset = (v_offset + k2) as usize;
            let mut x2 = if k2 == -d || (k2 != d && v2[k2_offset - 1] < v2[k2_offset + 1]) {
                v2[k2_offset + 1]
            } else {
                v2[k2_offset - 1] + 1
            };
            let mut y2 = x2 - k2;
            while x2 < n && y2 < m && a[(n - x2 - 1) as usize] == b[(m - y2 - 1) as usize] {
                x2 += 1;
                y2 += 1;
            }
            v2[k2_offset] = x2;

            if x2 > n {
                k2_end += 2;
            } else if y2 > m {
                k2_start += 2;
            } else if !front {
                let k1_offset = v_offset + delta - k2;
                if (0..v_length).contains(&k1_offset) && v1[k1_offset as usize] != -1 {
                    let x1 = v1[k1_offset as usize];
                    let y1 = v_offset + x1 - k1_offset;
                    if x1 >= n - x2 {
                        return split(a, b, x1 as usize, y1 as usize);
                    }
                }
            }
            k2 += 2;
        }
    }

    // No shared line at all.
    vec![
        Hunk::new(Operation::Delete, a.to_vec()),
        Hunk::new(Operation::Insert, b.to_vec()),
    ]
}

fn split<'a>(a: &[&'a str], b: &[&'a str], x: usize, y: usize) -> Vec<Hunk<'a>> {
    let mut hunks = diff_tokens(&a[..x], &b[..y]);
    hunks.extend(diff_tokens(&a[x..], &b[y..]));
    hunks
}

fn common_prefix(a: &[&str], b: &[&str]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[&str], b: &[&str]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Length of the longest suffix of `a` that is also a prefix of `b`
fn common_overlap(a: &[&str], b: &[&str]) -> usize {
    let longest = a.len().min(b.len());
    (1..=longest)
        .rev()
        .find(|&len| a[a.len() - len..] == b[..len])
        .unwrap_or(0)
}

/// Merge adjacent edits, move deletions ahead of insertions inside a change
/// run, factor shared lines out of replaced regions and slide single edits
/// across identical neighbouring equalities.
fn cleanup_merge<'a>(hunks: &mut Vec<Hunk<'a>>) {
    // Sentinel so the last change run is flushed.
    hunks.push(Hunk::new(Operation::Equal, Vec::new()));

    let mut pointer = 0;
    let mut count_delete = 0;
    let mut count_insert = 0;
    let mut text_delete: Vec<&'a str> = Vec::new();
    let mut text_insert: Vec<&'a str> = Vec::new();

    while pointer < hunks.len() {
        match hunks[pointer].op {
            Operation::Insert => {
                count_insert += 1;
                text_insert.extend_from_slice(&hunks[pointer].lines);
                pointer += 1;
            }
            Operation::Delete => {
                count_delete += 1;
                text_delete.extend_from_slice(&hunks[pointer].lines);
                pointer += 1;
            }
            Operation::Equal => {
                if count_delete + count_insert > 1 {
                    if count_delete != 0 && count_insert != 0 {
                        let prefix = common_prefix(&text_insert, &text_delete);
                        if prefix != 0 {
                            let start = pointer - count_delete - count_insert;
                            if start > 0 && hunks[start - 1].op == Operation::Equal {
                                hunks[start - 1]
                                    .lines
                                    .extend_from_slice(&text_insert[..prefix]);
                            } else {
                                hunks.insert(
                                    0,
                                    Hunk::new(Operation::Equal, text_insert[..prefix].to_vec()),
                                );
                                pointer += 1;
                            }
                            text_insert.drain(..prefix);
                            text_delete.drain(..prefix);
                        }

                        let suffix = common_suffix(&text_insert, &text_delete);
                        if suffix != 0 {
                            let mut lines = text_insert.split_off(text_insert.len() - suffix);
                            text_delete.truncate(text_delete.len() - suffix);
                            lines.append(&mut hunks[pointer].lines);
                            hunks[pointer].lines = lines;
                        }
                    }

                    let start = pointer - count_delete - count_insert;
                    hunks.drain(start..pointer);
                    pointer = start;
                    if !text_delete.is_empty() {
                        let lines = std::mem::take(&mut text_delete);
                        hunks.insert(pointer, Hunk::new(Operation::Delete, lines));
                        pointer += 1;
                    }
                    if !text_insert.is_empty() {
                        let lines = std::mem::take(&mut text_insert);
                        hunks.insert(pointer, Hunk::new(Operation::Insert, lines));
                        pointer += 1;
                    }
                    pointer += 1;
                } else if pointer != 0 && hunks[pointer - 1].op == Operation::Equal {
                    let mut lines = std::mem::take(&mut hunks[pointer].lines);
                    hunks[pointer - 1].lines.append(&mut lines);
                    hunks.remove(pointer);
                } else {
                    pointer += 1;
                }

                count_delete = 0;
                count_insert = 0;
                text_delete.clear();
                text_insert.clear();
            }
        }
    }

    if hunks.last().is_some_and(|hunk| hunk.lines.is_empty()) {
        hunks.pop();
    }

    // Second pass: a single edit surrounded by equalities that can slide
    // over one of them is shifted so the two equalities merge.
    // A<ins>BA</ins>C -> <ins>AB</ins>AC, A<ins>CB</ins>C -> AC<ins>BC</ins>
    let mut changes = false;
    let mut pointer = 1;
    while pointer + 1 < hunks.len() {
        if hunks[pointer - 1].op == Operation::Equal && hunks[pointer + 1].op == Operation::Equal
        {
            let prev = hunks[pointer - 1].lines.clone();
            let next = hunks[pointer + 1].lines.clone();

            if !prev.is_empty() && hunks[pointer].lines.ends_with(&prev) {
                let keep = hunks[pointer].lines.len() - prev.len();
                let mut shifted = prev.clone();
                shifted.extend_from_slice(&hunks[pointer].lines[..keep]);
                hunks[pointer].lines = shifted;

                let mut following = prev;
                following.extend(next);
                hunks[pointer + 1].lines = following;

                hunks.remove(pointer - 1);
                changes = true;
            } else if !next.is_empty() && hunks[pointer].lines.starts_with(&next) {
                hunks[pointer - 1].lines.extend_from_slice(&next);

                let mut shifted = hunks[pointer].lines[next.len()..].to_vec();
                shifted.extend(next);
                hunks[pointer].lines = shifted;

                hunks.remove(pointer + 1);
                changes = true;
            }
        }
        pointer += 1;
    }

    if changes {
        cleanup_merge(hunks);
    }
}

/// Dissolve equalities that are no longer than the edits on both sides of
/// them, then split overlapping delete/insert pairs around their shared
/// lines.
fn cleanup_semantic<'a>(hunks: &mut Vec<Hunk<'a>>) {
    let mut changes = false;
    let mut equalities: Vec<usize> = Vec::new();
    let mut last_equality: Option<Vec<&'a str>> = None;
    let mut pointer = 0;

    // Edit sizes before and after the most recent equality.
    let mut inserted_before = 0;
    let mut deleted_before = 0;
    let mut inserted_after = 0;
    let mut deleted_after = 0;

    while pointer < hunks.len() {
        if hunks[pointer].op == Operation::Equal {
            equalities.push(pointer);
            inserted_before = inserted_after;
            deleted_before = deleted_after;
            inserted_after = 0;
            deleted_after = 0;
            last_equality = Some(hunks[pointer].lines.clone());
            pointer += 1;
            continue;
        }

        if hunks[pointer].op == Operation::Insert {
            inserted_after += hunks[pointer].lines.len();
        } else {
            deleted_after += hunks[pointer].lines.len();
        }

        let dissolve = last_equality.as_ref().is_some_and(|equality| {
            !equality.is_empty()
                && equality.len() <= inserted_before.max(deleted_before)
                && equality.len() <= inserted_after.max(deleted_after)
        });

        if !dissolve {
            pointer += 1;
            continue;
        }

        if let (Some(index), Some(lines)) = (equalities.pop(), last_equality.take()) {
            hunks.insert(index, Hunk::new(Operation::Delete, lines));
            hunks[index + 1].op = Operation::Insert;
        }
        // The previous equality needs to be re-evaluated too.
        equalities.pop();
        pointer = equalities.last().map_or(0, |&index| index + 1);

        inserted_before = 0;
        deleted_before = 0;
        inserted_after = 0;
        deleted_after = 0;
        changes = true;
    }

    if changes {
        cleanup_merge(hunks);
    }

    let mut pointer = 1;
    while pointer < hunks.len() {
        if hunks[pointer - 1].op == Operation::Delete && hunks[pointer].op == Operation::Insert {
            let deletion = hunks[pointer - 1].lines.clone();
            let insertion = hunks[pointer].lines.clone();
            let forward = common_overlap(&deletion, &insertion);
            let backward = common_overlap(&insertion, &deletion);

            if forward >= backward {
                if forward * 2 >= deletion.len() || forward * 2 >= insertion.len() {
                    hunks.insert(
                        pointer,
                        Hunk::new(Operation::Equal, insertion[..forward].to_vec()),
                    );
                    hunks[pointer - 1].lines = deletion[..deletion.len() - forward].to_vec();
                    hunks[pointer + 1].lines = insertion[forward..].to_vec();
                    pointer += 1;
                }
            } else if backward * 2 >= deletion.len() || backward * 2 >= insertion.len() {
                hunks.insert(
                    pointer,
                    Hunk::new(Operation::Equal, deletion[..backward].to_vec()),
                );
                hunks[pointer - 1] = Hunk::new(
                    Operation::Insert,
                    insertion[..insertion.len() - backward].to_vec(),
                );
                hunks[pointer + 1] = Hunk::new(Operation::Delete, deletion[backward..].to_vec());
                pointer += 1;
            }
            pointer += 1;
        }
        pointer += 1;
    }
}

/// Drop empty hunks and merge neighbours of the same kind
fn coalesce(hunks: &mut Vec<Hunk<'_>>) {
    let mut merged: Vec<Hunk<'_>> = Vec::with_capacity(hunks.len());
    for mut hunk in hunks.drain(..) {
        if hunk.lines.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.op == hunk.op => last.lines.append(&mut hunk.lines),
            _ => merged.push(hunk),
        }
    }
    *hunks = merged;
}
