//! Share metadata lookup: the fast, authoritative path.
//!
//! The identifier is embedded as a share token (`s!<id>`) in a request to the
//! public shares endpoint. One attempt only; any failure hands control back
//! to the orchestrator.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::http::{ClientPurpose, HttpSettings, build_http_client};

use super::{ResolveError, ResolveStrategy, ResolutionSource, ResolvedFile, ShareTarget};

const DEFAULT_API_BASE_URL: &str = "https://api.onedrive.com";
/// Name used when the metadata response carries none.
pub const METADATA_PLACEHOLDER_NAME: &str = "unknown_file";

#[derive(Debug, Deserialize)]
struct DriveItem {
    name: Option<String>,
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    download_url: Option<String>,
    size: Option<u64>,
}

/// Resolves an identifier through the shares metadata endpoint.
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    client: Client,
    api_base_url: String,
}

impl MetadataResolver {
    /// Creates a resolver against the public OneDrive API.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Setup`] when the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, ResolveError> {
        Self::with_base_url(settings, DEFAULT_API_BASE_URL)
    }

    /// Creates a resolver against a custom API base URL (for tests).
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Setup`] when the HTTP client cannot be built.
    pub fn with_base_url(
        settings: &HttpSettings,
        api_base_url: impl Into<String>,
    ) -> Result<Self, ResolveError> {
        let client = build_http_client(settings, ClientPurpose::Resolution)
            .map_err(|e| ResolveError::setup(e.to_string()))?;
        Ok(Self {
            client,
            api_base_url: api_base_url.into(),
        })
    }

    /// Returns the metadata endpoint URL for an identifier.
    #[must_use]
    pub fn endpoint_for(&self, identifier: &str) -> String {
        format!(
            "{}/v1.0/shares/s!{identifier}/root",
            self.api_base_url.trim_end_matches('/')
        )
    }

    /// Looks up `identifier` and returns the file it points to.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Transport`] on request failure or non-200
    /// status and [`ResolveError::Extraction`] when the body lacks a download URL.
    #[instrument(skip(self), fields(identifier = %identifier))]
    pub async fn lookup(&self, identifier: &str) -> Result<ResolvedFile, ResolveError> {
        let endpoint = self.endpoint_for(identifier);
        let response = self
            .client
            .get(&endpoint)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ResolveError::from_reqwest(&endpoint, &e))?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(ResolveError::http_status(&endpoint, status.as_u16()));
        }

        let item: DriveItem = response.json().await.map_err(|e| {
            ResolveError::extraction(&endpoint, "share metadata", format!("invalid JSON: {e}"))
        })?;
        debug!(has_download_url = item.download_url.is_some(), "metadata received");

        let Some(download_url) = item.download_url.filter(|url| !url.is_empty()) else {
            return Err(ResolveError::extraction(
                &endpoint,
                "download URL",
                "metadata response has no @microsoft.graph.downloadUrl",
            ));
        };

        Ok(ResolvedFile {
            name: item
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| METADATA_PLACEHOLDER_NAME.to_string()),
            download_url,
            size_bytes: item.size.unwrap_or(0),
            source: ResolutionSource::Metadata {
                identifier: identifier.to_string(),
            },
        })
    }
}

#[async_trait]
impl ResolveStrategy for MetadataResolver {
    fn name(&self) -> &str {
        "metadata"
    }

    async fn resolve(&self, target: &ShareTarget) -> Result<ResolvedFile, ResolveError> {
        let Some(identifier) = &target.identifier else {
            return Err(ResolveError::extraction(
                &target.original_url,
                "identifier",
                "no identifier rule matched",
            ));
        };
        self.lookup(&identifier.value).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_embeds_share_token() {
        let resolver =
            MetadataResolver::with_base_url(&HttpSettings::default(), "https://api.example/")
                .unwrap();
        assert_eq!(
            resolver.endpoint_for("ABC123"),
            "https://api.example/v1.0/shares/s!ABC123/root"
        );
    }

    #[test]
    fn test_default_base_url() {
        let resolver = MetadataResolver::new(&HttpSettings::default()).unwrap();
        assert!(
            resolver
                .endpoint_for("X")
                .starts_with("https://api.onedrive.com/v1.0/shares/s!X")
        );
    }

    #[test]
    fn test_drive_item_deserializes_graph_field() {
        let item: DriveItem = serde_json::from_value(serde_json::json!({
            "name": "Report.pdf",
            "size": 42,
            "@microsoft.graph.downloadUrl": "https://dl.example/f"
        }))
        .unwrap();
        assert_eq!(item.name.as_deref(), Some("Report.pdf"));
        assert_eq!(item.size, Some(42));
        assert_eq!(item.download_url.as_deref(), Some("https://dl.example/f"));
    }
}
