use std::fmt;
use std::time::Duration;

use table_mirror::{CollectionName, Record, RemoteSource, SourceError};
use tracing::debug;

use crate::error_body::PostgrestError;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for a Supabase project's REST API.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub url: String,
    /// Service-role (or anon) key, sent as both `apikey` and bearer token.
    pub service_key: String,
    pub timeout: Duration,
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("service_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Reads whole tables through PostgREST (`/rest/v1/<table>?select=*`).
pub struct SupabaseSource {
    config: SupabaseConfig,
    base: reqwest::Url,
    client: reqwest::Client,
}

impl SupabaseSource {
    pub fn new(config: SupabaseConfig) -> Result<Self, SourceError> {
        let base = reqwest::Url::parse(&config.url)
            .map_err(|e| SourceError::Other(format!("invalid remote URL {:?}: {e}", config.url)))?;
        if base.cannot_be_a_base() {
            return Err(SourceError::Other(format!(
                "invalid remote URL {:?}: not a base URL",
                config.url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent("table-mirror")
            .build()
            .map_err(|e| SourceError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            base,
            client,
        })
    }

    /// The collection name is one percent-encoded path segment.
    fn table_url(&self, collection: &CollectionName) -> reqwest::Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["rest", "v1", collection.as_str()]);
        }
        url.set_query(Some("select=*"));
        url
    }

    fn build_request(&self, url: reqwest::Url) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("apikey", &self.config.service_key)
            .header("Authorization", format!("Bearer {}", self.config.service_key))
            .header("Accept", "application/json")
    }
}

fn transport_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout(err.to_string())
    } else {
        SourceError::Network(err.to_string())
    }
}

#[async_trait::async_trait]
impl RemoteSource for SupabaseSource {
    fn label(&self) -> &str {
        &self.config.url
    }

    async fn fetch(&self, collection: &CollectionName) -> Result<Vec<Record>, SourceError> {
        let url = self.table_url(collection);

        let response = self
            .build_request(url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();

        if status.as_u16() == 404 {
            return Err(SourceError::NotFound(collection.clone()));
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".into());
            return Err(SourceError::Http {
                status: status.as_u16(),
                body: PostgrestError::describe(&body),
            });
        }

        let bytes = response.bytes().await.map_err(transport_error)?;

        let records: Vec<Record> = serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::Parse(format!("{collection}: {e}")))?;

        debug!(collection = %collection, records = records.len(), "table_fetched");
        Ok(records)
    }
}
