// # dnswatch
//
// Thin command-line shell over `dnswatch-core`. It is responsible for:
// 1. Reading configuration from environment variables and flags
// 2. Initializing logging and the runtime
// 3. Registering the provider and store implementations
// 4. Running one sync cycle and reporting it on stdout
//
// ## Configuration
//
// ### Provider
// - `DNSWATCH_PROVIDER_TYPE`: Provider type (default: dnspod)
// - `DNSWATCH_DNSPOD_LOGIN_TOKEN`: DNSPod API token, `ID,Token`
// - `DNSWATCH_DNSPOD_API_BASE`: Override of the DNSPod API URL (optional)
//
// ### Snapshot Store
// - `DNSWATCH_STORE_TYPE`: Store type (gist, file, memory; default: gist)
// - `DNSWATCH_GITHUB_TOKEN`: GitHub token with gist scope (for gist)
// - `DNSWATCH_GIST_ID`: Gist holding the table (for gist)
// - `DNSWATCH_GIST_FILE`: File inside the gist (default: DNS)
// - `DNSWATCH_PROXY_URL`: Proxy for GitHub requests only (optional)
// - `DNSWATCH_STORE_PATH`: Snapshot document path (for file)
//
// ### Sync
// - `DNSWATCH_MAX_ATTEMPTS`: Fetch-and-compare attempts (default: 2)
// - `DNSWATCH_RETRY_DELAY_SECS`: Delay between attempts (default: 5)
// - `DNSWATCH_STORE_MAX_ATTEMPTS`: Attempts per store read/write (default: 2)
// - `DNSWATCH_CONFIRM_POLICY`: last_attempt or consecutive_match
// - `DNSWATCH_MAX_CONCURRENT_DOMAINS`: Bound on parallel domain fetches
// - `DNSWATCH_LOG_LEVEL`: Log level when not verbose (default: warn)
//
// ## Exit Codes
//
// - 0: no changes
// - 1: changes found (and recorded unless `--dry-run`)
// - 2: runtime error
// - 3: configuration error or invalid flags
//
// ## Example
//
// ```bash
// export DNSWATCH_DNSPOD_LOGIN_TOKEN=12345,0123456789abcdef
// export DNSWATCH_GITHUB_TOKEN=ghp_xxx
// export DNSWATCH_GIST_ID=0123456789abcdef0123
//
// dnswatch --verbose
// ```

use anyhow::{Context, Result, bail};
use clap::arg;
use dnswatch_core::{
    ConfirmPolicy, Error as CoreError, ProviderConfig, ProviderRegistry, StoreConfig, SyncConfig,
    SyncEngine, SyncOutcome, WatchConfig,
};
use std::env;
use std::ffi::OsString;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for the possible outcomes of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchExitCode {
    /// The stored table matches the provider
    NoChanges = 0,
    /// Changes were found and reported
    Changed = 1,
    /// Runtime error (provider, store, unstable snapshot)
    RuntimeError = 2,
    /// Configuration error or startup failure
    ConfigError = 3,
}

impl From<WatchExitCode> for ExitCode {
    fn from(code: WatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Command-line flags
#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    verbose: bool,
    dry_run: bool,
}

impl Flags {
    fn command() -> clap::Command {
        clap::Command::new("dnswatch")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Report and record changes to a DNS-hosting account's record table")
            .arg(arg!(-v --verbose "Show more output"))
            .arg(arg!(--"dry-run" "Report changes without updating the stored table"))
    }

    /// Parse flags without letting clap exit the process
    fn from_args<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;

        Ok(Self {
            verbose: matches.get_flag("verbose"),
            dry_run: matches.get_flag("dry-run"),
        })
    }
}

/// Exit code for a flag parsing failure; `None` for `--help` and `--version`
fn usage_exit_code(err: &clap::Error) -> Option<WatchExitCode> {
    err.use_stderr().then_some(WatchExitCode::ConfigError)
}

/// Application configuration
struct Config {
    provider_type: String,
    dnspod_login_token: Option<String>,
    dnspod_api_base: Option<String>,
    store_type: String,
    github_token: Option<String>,
    gist_id: Option<String>,
    gist_file: Option<String>,
    proxy_url: Option<String>,
    store_path: Option<String>,
    max_attempts: Option<usize>,
    retry_delay_secs: Option<u64>,
    store_max_attempts: Option<usize>,
    confirm_policy: Option<ConfirmPolicy>,
    max_concurrent_domains: Option<usize>,
    log_level: String,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "<REDACTED>");
        f.debug_struct("Config")
            .field("provider_type", &self.provider_type)
            .field("dnspod_login_token", &redacted(&self.dnspod_login_token))
            .field("dnspod_api_base", &self.dnspod_api_base)
            .field("store_type", &self.store_type)
            .field("github_token", &redacted(&self.github_token))
            .field("gist_id", &self.gist_id)
            .field("gist_file", &self.gist_file)
            .field("proxy_url", &self.proxy_url)
            .field("store_path", &self.store_path)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("store_max_attempts", &self.store_max_attempts)
            .field("confirm_policy", &self.confirm_policy)
            .field("max_concurrent_domains", &self.max_concurrent_domains)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            provider_type: get("DNSWATCH_PROVIDER_TYPE").unwrap_or_else(|| "dnspod".to_string()),
            dnspod_login_token: get("DNSWATCH_DNSPOD_LOGIN_TOKEN"),
            dnspod_api_base: get("DNSWATCH_DNSPOD_API_BASE"),
            store_type: get("DNSWATCH_STORE_TYPE").unwrap_or_else(|| "gist".to_string()),
            github_token: get("DNSWATCH_GITHUB_TOKEN"),
            gist_id: get("DNSWATCH_GIST_ID"),
            gist_file: get("DNSWATCH_GIST_FILE"),
            proxy_url: get("DNSWATCH_PROXY_URL"),
            store_path: get("DNSWATCH_STORE_PATH"),
            max_attempts: parse_var("DNSWATCH_MAX_ATTEMPTS", get("DNSWATCH_MAX_ATTEMPTS"))?,
            retry_delay_secs: parse_var(
                "DNSWATCH_RETRY_DELAY_SECS",
                get("DNSWATCH_RETRY_DELAY_SECS"),
            )?,
            store_max_attempts: parse_var(
                "DNSWATCH_STORE_MAX_ATTEMPTS",
                get("DNSWATCH_STORE_MAX_ATTEMPTS"),
            )?,
            confirm_policy: match get("DNSWATCH_CONFIRM_POLICY").as_deref() {
                None => None,
                Some("last_attempt") => Some(ConfirmPolicy::LastAttempt),
                Some("consecutive_match") => Some(ConfirmPolicy::ConsecutiveMatch),
                Some(other) => bail!(
                    "DNSWATCH_CONFIRM_POLICY '{}' is not valid. \
                    Valid policies: last_attempt, consecutive_match",
                    other
                ),
            },
            max_concurrent_domains: parse_var(
                "DNSWATCH_MAX_CONCURRENT_DOMAINS",
                get("DNSWATCH_MAX_CONCURRENT_DOMAINS"),
            )?,
            log_level: get("DNSWATCH_LOG_LEVEL").unwrap_or_else(|| "warn".to_string()),
        })
    }

    /// Log level for a run; `--verbose` always means debug
    fn log_level(&self, verbose: bool) -> Result<Level> {
        if verbose {
            return Ok(Level::DEBUG);
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => bail!(
                "DNSWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Build and validate the library configuration
    fn into_watch_config(self, flags: Flags) -> Result<WatchConfig> {
        let provider = match self.provider_type.as_str() {
            "dnspod" => ProviderConfig::Dnspod {
                login_token: self.dnspod_login_token.context(
                    "DNSWATCH_DNSPOD_LOGIN_TOKEN is required. \
                    Set it via: export DNSWATCH_DNSPOD_LOGIN_TOKEN=ID,Token",
                )?,
                api_base: self.dnspod_api_base,
            },
            other => bail!(
                "DNSWATCH_PROVIDER_TYPE '{}' is not supported. Supported providers: dnspod",
                other
            ),
        };

        let store = match self.store_type.as_str() {
            "gist" => StoreConfig::Gist {
                token: self.github_token.context(
                    "DNSWATCH_GITHUB_TOKEN is required when DNSWATCH_STORE_TYPE=gist",
                )?,
                gist_id: self
                    .gist_id
                    .context("DNSWATCH_GIST_ID is required when DNSWATCH_STORE_TYPE=gist")?,
                file_name: self.gist_file.unwrap_or_else(|| "DNS".to_string()),
                proxy_url: self.proxy_url,
            },
            "file" => StoreConfig::File {
                path: self
                    .store_path
                    .context("DNSWATCH_STORE_PATH is required when DNSWATCH_STORE_TYPE=file")?,
            },
            "memory" => StoreConfig::Memory,
            other => bail!(
                "DNSWATCH_STORE_TYPE '{}' is not supported. \
                Supported types: gist, file, memory",
                other
            ),
        };

        let defaults = SyncConfig::default();
        let sync = SyncConfig {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            retry_delay_secs: self.retry_delay_secs.unwrap_or(defaults.retry_delay_secs),
            store_max_attempts: self.store_max_attempts.unwrap_or(defaults.store_max_attempts),
            confirm_policy: self.confirm_policy.unwrap_or(defaults.confirm_policy),
            max_concurrent_domains: self.max_concurrent_domains,
            dry_run: flags.dry_run,
            ..defaults
        };

        let config = WatchConfig {
            provider,
            store,
            sync,
        };
        config.validate()?;

        Ok(config)
    }
}

/// Parse an optional numeric variable, rejecting garbage instead of
/// silently falling back to a default
fn parse_var<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} must be a number. Got '{}': {}", name, raw, e))
        })
        .transpose()
}

fn main() -> ExitCode {
    let flags = match Flags::from_args(env::args_os()) {
        Ok(flags) => flags,
        Err(e) => {
            let _ = e.print();
            return usage_exit_code(&e).map_or(ExitCode::SUCCESS, Into::into);
        }
    };

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return WatchExitCode::ConfigError.into();
        }
    };

    let log_level = match config.log_level(flags.verbose) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return WatchExitCode::ConfigError.into();
        }
    };

    // Initialize tracing; stdout is reserved for the change report
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WatchExitCode::ConfigError.into();
    }

    debug!("Configuration loaded: {:?}", config);

    let watch_config = match config.into_watch_config(flags) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration validation error: {}", e);
            return WatchExitCode::ConfigError.into();
        }
    };

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WatchExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run(watch_config).await {
            Ok(outcome) => report(&outcome, flags.verbose),
            Err(e @ CoreError::Config(_)) => {
                error!("{}", e);
                WatchExitCode::ConfigError
            }
            Err(e) => {
                error!("{}", e);
                WatchExitCode::RuntimeError
            }
        }
    });

    code.into()
}

/// Build the collaborators and run one sync cycle
async fn run(config: WatchConfig) -> dnswatch_core::Result<SyncOutcome> {
    let registry = ProviderRegistry::with_builtin_stores();

    #[cfg(feature = "dnspod")]
    dnswatch_provider_dnspod::register(&registry);

    #[cfg(feature = "gist")]
    dnswatch_store_gist::register(&registry);

    let provider = registry.create_provider(&config.provider)?;
    let store = registry.create_store(&config.store).await?;

    info!(
        "Comparing {} records against {} store",
        provider.provider_name(),
        store.store_name()
    );

    let (engine, mut events) = SyncEngine::new(Arc::from(provider), store, config.sync)?;

    let watcher = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("{:?}", event);
        }
    });

    let outcome = engine.run_once().await;

    // Closing the channel ends the watcher
    drop(engine);
    let _ = watcher.await;

    outcome
}

/// Print the outcome on stdout and pick the exit code
fn report(outcome: &SyncOutcome, verbose: bool) -> WatchExitCode {
    match outcome {
        SyncOutcome::NoChanges { .. } => {
            debug!("Found no changes to the DNS table");
            WatchExitCode::NoChanges
        }
        SyncOutcome::Changed {
            report,
            location,
            persisted,
            ..
        } => {
            println!("{}", report.summary());

            if !persisted {
                info!("Dry run, stored table left unchanged");
            }

            if !verbose && let Some(location) = location {
                println!();
                println!("For more info, visit {}", location);
            }

            WatchExitCode::Changed
        }
    }
}
