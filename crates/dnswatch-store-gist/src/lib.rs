// # GitHub Gist Snapshot Store
//
// This crate provides a `SnapshotStore` backed by one file of a GitHub gist.
//
// ## Behavior
//
// - `read()`: GET the gist, return the content of the configured file
//   (default `DNS`) and the gist's `html_url`
// - `write()`: PATCH the gist with the new content of that file
// - A gist without the file reads as an empty snapshot
// - A truncated file (over ~1 MB) is read in full from its `raw_url`
// - One HTTP request per call, no retry (owned by `SyncEngine`)
// - Optional HTTP proxy, applied to this client only
//
// ## Security Requirements
//
// - The token NEVER appears in logs or `Debug` output
//
// ## API Reference
//
// - Get a gist: GET `/gists/:gist_id`
// - Update a gist: PATCH `/gists/:gist_id` with `{"files": {name: {"content": ...}}}`

use async_trait::async_trait;
use dnswatch_core::config::StoreConfig;
use dnswatch_core::traits::{SnapshotStore, SnapshotStoreFactory, StoredSnapshot};
use dnswatch_core::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// GitHub API base URL
const GITHUB_API_BASE: &str = "https://api.github.com";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("dnswatch/", env!("CARGO_PKG_VERSION"));

const STORE_NAME: &str = "gist";

#[derive(Debug, Deserialize)]
struct GistResponse {
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    files: HashMap<String, Option<GistFile>>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
    /// Set when `content` holds only the head of a large file
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    raw_url: Option<String>,
}

/// The configured file as listed in a gist response
#[derive(Debug, PartialEq, Eq)]
enum FileContent {
    /// Full text inline in the response
    Inline(String),
    /// Only a prefix is inline; the full text lives at the raw URL
    Truncated { raw_url: Option<String> },
}

impl GistResponse {
    /// Split the response into the file content and the gist's `html_url`
    fn into_file(mut self, file_name: &str) -> (FileContent, Option<String>) {
        let content = match self.files.remove(file_name).flatten() {
            Some(file) if file.truncated => FileContent::Truncated {
                raw_url: file.raw_url,
            },
            Some(file) => FileContent::Inline(file.content.unwrap_or_default()),
            None => {
                tracing::debug!("Gist has no file {}, reading as empty snapshot", file_name);
                FileContent::Inline(String::new())
            }
        };

        (content, self.html_url)
    }
}

/// Snapshot store backed by one file of a GitHub gist
///
/// # Security
///
/// The Debug implementation does NOT expose the token.
pub struct GistSnapshotStore {
    /// GitHub token with gist scope
    /// ⚠️ NEVER log this value
    token: String,

    /// Gist identifier
    gist_id: String,

    /// File inside the gist holding the table
    file_name: String,

    /// API base URL, without trailing slash
    api_base: String,

    /// Proxy URL, kept for Debug output only
    proxy_url: Option<String>,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the token
impl std::fmt::Debug for GistSnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GistSnapshotStore")
            .field("token", &"<REDACTED>")
            .field("gist_id", &self.gist_id)
            .field("file_name", &self.file_name)
            .field("api_base", &self.api_base)
            .field("proxy_url", &self.proxy_url)
            .finish()
    }
}

impl GistSnapshotStore {
    /// Create a new gist store
    ///
    /// # Parameters
    ///
    /// - `token`: GitHub token with gist scope
    /// - `gist_id`: Gist identifier
    /// - `file_name`: File inside the gist holding the table
    /// - `proxy_url`: Optional proxy for GitHub requests
    pub fn new(
        token: impl Into<String>,
        gist_id: impl Into<String>,
        file_name: impl Into<String>,
        proxy_url: Option<String>,
    ) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::config("GitHub token cannot be empty"));
        }

        let mut builder = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(USER_AGENT);

        builder = match &proxy_url {
            Some(url) => {
                let proxy = reqwest::Proxy::all(url.as_str())
                    .map_err(|e| Error::config(format!("Invalid proxy URL {}: {}", url, e)))?;
                tracing::debug!("GitHub requests go through proxy {}", url);
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        let client = builder
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            token,
            gist_id: gist_id.into(),
            file_name: file_name.into(),
            api_base: GITHUB_API_BASE.to_string(),
            proxy_url,
            client,
        })
    }

    /// Override the API base URL (GitHub Enterprise, tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn gist_url(&self) -> String {
        format!("{}/gists/{}", self.api_base, self.gist_id)
    }

    /// Map a non-success HTTP status to a store error
    async fn status_error(&self, action: &str, response: reqwest::Response) -> Error {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        let message = match status.as_u16() {
            401 | 403 => format!(
                "Authentication failed: invalid token or missing gist scope. Status: {}",
                status
            ),
            404 => format!("Gist not found: {}", self.gist_id),
            429 => format!("Rate limit exceeded. Status: {}", status),
            500..=599 => format!("GitHub server error (transient): {} - {}", status, error_text),
            _ => format!("{} failed: {} - {}", action, status, error_text),
        };

        Error::store(STORE_NAME, message)
    }

    /// Fetch the full text of a truncated file
    async fn read_raw(&self, raw_url: Option<String>) -> Result<String> {
        let raw_url = raw_url.ok_or_else(|| {
            Error::store(
                STORE_NAME,
                format!("Gist file {} is truncated and has no raw_url", self.file_name),
            )
        })?;

        tracing::debug!("Gist file {} is truncated, fetching {}", self.file_name, raw_url);

        let response = self
            .client
            .get(&raw_url)
            .send()
            .await
            .map_err(|e| Error::store(STORE_NAME, format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(self.status_error("Raw gist read", response).await);
        }

        response
            .text()
            .await
            .map_err(|e| Error::store(STORE_NAME, format!("Failed to read raw gist file: {}", e)))
    }

    async fn parse_gist(&self, response: reqwest::Response) -> Result<GistResponse> {
        response
            .json()
            .await
            .map_err(|e| Error::store(STORE_NAME, format!("Failed to parse gist response: {}", e)))
    }
}

#[async_trait]
impl SnapshotStore for GistSnapshotStore {
    async fn read(&self) -> Result<StoredSnapshot> {
        let response = self
            .client
            .get(self.gist_url())
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| Error::store(STORE_NAME, format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(self.status_error("Gist read", response).await);
        }

        let (content, location) = self.parse_gist(response).await?.into_file(&self.file_name);
        let text = match content {
            FileContent::Inline(text) => text,
            FileContent::Truncated { raw_url } => self.read_raw(raw_url).await?,
        };

        let snapshot = StoredSnapshot::new(text, location);
        tracing::debug!(
            "Fetched snapshot from gist ({})",
            snapshot.location.as_deref().unwrap_or("no url")
        );
        Ok(snapshot)
    }

    async fn write(&self, text: &str) -> Result<Option<String>> {
        let payload = serde_json::json!({
            "files": {
                self.file_name.as_str(): { "content": text }
            }
        });

        let response = self
            .client
            .patch(self.gist_url())
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::store(STORE_NAME, format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(self.status_error("Gist update", response).await);
        }

        let gist = self.parse_gist(response).await?;
        tracing::info!(
            "Table updated ({})",
            gist.html_url.as_deref().unwrap_or(&self.gist_id)
        );
        Ok(gist.html_url)
    }

    fn store_name(&self) -> &'static str {
        STORE_NAME
    }
}

/// Factory for creating gist stores
pub struct GistStoreFactory;

#[async_trait]
impl SnapshotStoreFactory for GistStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn SnapshotStore>> {
        match config {
            StoreConfig::Gist {
                token,
                gist_id,
                file_name,
                proxy_url,
            } => {
                if gist_id.is_empty() {
                    return Err(Error::config("Gist id is required"));
                }

                Ok(Box::new(GistSnapshotStore::new(
                    token.clone(),
                    gist_id.clone(),
                    file_name.clone(),
                    proxy_url.clone(),
                )?))
            }
            _ => Err(Error::config("Invalid config for gist store")),
        }
    }
}

/// Register the gist store with a registry
///
/// # Example
///
/// ```rust
/// use dnswatch_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// dnswatch_store_gist::register(&registry);
/// assert!(registry.has_store("gist"));
/// ```
pub fn register(registry: &dnswatch_core::ProviderRegistry) {
    registry.register_store(STORE_NAME, Box::new(GistStoreFactory));
}
