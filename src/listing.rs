//! Client for the storage listing/signing endpoint.

use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::{CatalogNode, RawFolder, build_tree};
use crate::config::SourcesConfig;
use crate::error::{Error, Result};

/// Produces the folder tree, with pre-signed file URLs, under a prefix.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Lists everything below `prefix`.
    async fn list(&self, prefix: &str) -> Result<CatalogNode>;
}

/// [`ListingSource`] over HTTP: `GET {url}?prefix={prefix}`.
#[derive(Debug, Clone)]
pub struct HttpListing {
    client: reqwest::Client,
    url: String,
}

impl HttpListing {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ListingSource for HttpListing {
    async fn list(&self, prefix: &str) -> Result<CatalogNode> {
        log::debug!("Fetching listing from {} (prefix {prefix:?})", self.url);
        let response = self
            .client
            .get(&self.url)
            .query(&[("prefix", prefix)])
            .send()
            .await
            .map_err(|e| Error::Listing(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Listing(format!(
                "{} returned HTTP {}",
                self.url,
                status.as_u16()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Listing(e.to_string()))?;
        let raw: RawFolder =
            serde_json::from_slice(&body).map_err(|e| Error::Listing(format!("bad listing: {e}")))?;
        let root = build_tree(raw);
        log::info!("Listing has {} file(s) below {prefix:?}", root.file_count());
        Ok(root)
    }
}

/// The configured listing endpoint, if any.
#[must_use]
pub fn source_from_config(sources: &SourcesConfig) -> Option<Arc<dyn ListingSource>> {
    sources
        .listing_url
        .as_ref()
        .map(|url| Arc::new(HttpListing::new(url.clone())) as Arc<dyn ListingSource>)
}
