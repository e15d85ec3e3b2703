// # DNSPod Domain Provider
//
// This crate provides a DNSPod implementation of `DomainProvider` for
// dnswatch.
//
// ## Scope
//
// - One HTTP request per trait call
// - No retry, no caching (retry policy is owned by `SyncEngine`)
// - HTTP timeout configured (30 seconds)
// - Only the response fields the table needs are modelled
//
// ## Security Requirements
//
// - The login token NEVER appears in logs or `Debug` output
// - The provider fails fast if the token is empty
//
// ## API Reference
//
// Both endpoints take an urlencoded form and answer with JSON:
//
// - List domains: POST `/Domain.List` (`login_token`, `format=json`)
// - List records: POST `/Record.List` (`login_token`, `format=json`, `domain_id`)
//
// Every response carries `status.code`; `"1"` is success, anything else is
// a failure described by `status.message`.

use async_trait::async_trait;
use dnswatch_core::config::ProviderConfig;
use dnswatch_core::traits::{Domain, DomainId, DomainProvider, DomainProviderFactory, Record};
use dnswatch_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// DNSPod API base URL
const DNSPOD_API_BASE: &str = "https://dnsapi.cn";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER_NAME: &str = "dnspod";

/// Application status carried by every response
#[derive(Debug, Deserialize)]
struct ApiStatus {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct DomainListResponse {
    status: ApiStatus,
    #[serde(default)]
    domains: Vec<ApiDomain>,
}

#[derive(Debug, Deserialize)]
struct ApiDomain {
    id: DomainId,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RecordListResponse {
    status: ApiStatus,
    #[serde(default)]
    records: Vec<ApiRecord>,
}

#[derive(Debug, Deserialize)]
struct ApiRecord {
    #[serde(default)]
    enabled: String,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    value: String,
    #[serde(default)]
    ttl: String,
    #[serde(default)]
    updated_on: String,
}

impl ApiRecord {
    fn into_record(self, domain: &str) -> Record {
        Record {
            domain: domain.to_string(),
            enabled: self.enabled,
            record_type: self.record_type,
            name: self.name,
            value: self.value,
            ttl: self.ttl,
            updated_at: self.updated_on,
        }
    }
}

/// Any response that carries an application status
trait StatusResponse {
    fn status(&self) -> &ApiStatus;
}

impl StatusResponse for DomainListResponse {
    fn status(&self) -> &ApiStatus {
        &self.status
    }
}

impl StatusResponse for RecordListResponse {
    fn status(&self) -> &ApiStatus {
        &self.status
    }
}

/// Parse a response body and reject non-success statuses
fn parse_response<T>(action: &str, body: &str) -> Result<T>
where
    T: DeserializeOwned + StatusResponse,
{
    let response: T = serde_json::from_str(body).map_err(|e| {
        Error::provider(
            PROVIDER_NAME,
            format!("Failed to parse {} response: {}", action, e),
        )
    })?;

    let status = response.status();
    if status.code != "1" {
        return Err(Error::provider(
            PROVIDER_NAME,
            format!("{} failed ({}): {}", action, status.code, status.message),
        ));
    }

    Ok(response)
}

/// DNSPod domain provider
///
/// Stateless and single-shot. All coordination (retries, scheduling) is
/// owned by `SyncEngine`.
///
/// # Security
///
/// The Debug implementation does NOT expose the login token.
pub struct DnspodProvider {
    /// Token in `ID,Token` form
    /// ⚠️ NEVER log this value
    login_token: String,

    /// API base URL, without trailing slash
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the login token
impl std::fmt::Debug for DnspodProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnspodProvider")
            .field("login_token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl DnspodProvider {
    /// Create a new DNSPod provider
    ///
    /// # Parameters
    ///
    /// - `login_token`: API token in `ID,Token` form
    /// - `api_base`: Optional override of `https://dnsapi.cn`
    pub fn new(login_token: impl Into<String>, api_base: Option<String>) -> Result<Self> {
        let login_token = login_token.into();
        if login_token.is_empty() {
            return Err(Error::config("DNSPod login token cannot be empty"));
        }

        // Proxies are only ever configured for the snapshot store
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        let api_base = api_base
            .unwrap_or_else(|| DNSPOD_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            login_token,
            api_base,
            client,
        })
    }

    /// POST one API action and return the raw body
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /Record.List
    /// Content-Type: application/x-www-form-urlencoded
    ///
    /// login_token=<token>&format=json&domain_id=42
    /// ```
    async fn call(&self, action: &str, extra: &[(&str, String)]) -> Result<String> {
        let url = format!("{}/{}", self.api_base, action);

        let mut form: Vec<(&str, String)> = vec![
            ("login_token", self.login_token.clone()),
            ("format", "json".to_string()),
        ];
        form.extend(extra.iter().cloned());

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return match status.as_u16() {
                401 | 403 => Err(Error::provider(
                    PROVIDER_NAME,
                    format!("Authentication failed. Status: {}", status),
                )),
                429 => Err(Error::provider(
                    PROVIDER_NAME,
                    format!("Rate limit exceeded. Status: {}", status),
                )),
                500..=599 => Err(Error::provider(
                    PROVIDER_NAME,
                    format!("DNSPod server error (transient): {} - {}", status, error_text),
                )),
                _ => Err(Error::provider(
                    PROVIDER_NAME,
                    format!("{} failed: {} - {}", action, status, error_text),
                )),
            };
        }

        response
            .text()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("Failed to read response: {}", e)))
    }
}

#[async_trait]
impl DomainProvider for DnspodProvider {
    async fn list_domains(&self) -> Result<Vec<Domain>> {
        let body = self.call("Domain.List", &[]).await?;
        let response: DomainListResponse = parse_response("Domain.List", &body)?;

        tracing::debug!("DNSPod listed {} domains", response.domains.len());
        Ok(response
            .domains
            .into_iter()
            .map(|d| Domain::new(d.id, d.name))
            .collect())
    }

    async fn list_records(&self, domain: &Domain) -> Result<Vec<Record>> {
        let body = self
            .call("Record.List", &[("domain_id", domain.id.to_string())])
            .await?;
        let response: RecordListResponse = parse_response("Record.List", &body)?;

        Ok(response
            .records
            .into_iter()
            .map(|r| r.into_record(&domain.name))
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating DNSPod providers
pub struct DnspodFactory;

impl DomainProviderFactory for DnspodFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DomainProvider>> {
        match config {
            ProviderConfig::Dnspod {
                login_token,
                api_base,
            } => {
                if login_token.is_empty() {
                    return Err(Error::config("DNSPod login token is required"));
                }

                Ok(Box::new(DnspodProvider::new(
                    login_token.clone(),
                    api_base.clone(),
                )?))
            }
            _ => Err(Error::config("Invalid config for DNSPod provider")),
        }
    }
}

/// Register the DNSPod provider with a registry
///
/// # Example
///
/// ```rust
/// use dnswatch_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// dnswatch_provider_dnspod::register(&registry);
/// assert!(registry.has_provider("dnspod"));
/// ```
pub fn register(registry: &dnswatch_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(DnspodFactory));
}
