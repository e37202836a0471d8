//! Storage product catalog sources.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::{
    api::client,
    core::catalog::{Catalog, CatalogDocument},
    prelude::*,
};

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Fetch and validate the catalog.
    async fn fetch(&self) -> Result<Catalog>;
}

/// Validate the document and reject it when nothing usable is left.
fn validate(document: CatalogDocument) -> Result<Catalog> {
    let catalog = Catalog::from(document);
    ensure!(!catalog.is_empty(), "the catalog contains no valid battery models");
    Ok(catalog)
}

/// Catalog served over HTTP as JSON.
pub struct HttpCatalog {
    client: Client,
    url: Url,
}

impl HttpCatalog {
    pub fn try_new(url: Url) -> Result<Self> {
        Ok(Self { client: client::try_new()?, url })
    }
}

#[async_trait]
impl CatalogProvider for HttpCatalog {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn fetch(&self) -> Result<Catalog> {
        info!("fetching…");
        let document = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .context("failed to call")?
            .error_for_status()
            .context("request failed")?
            .json::<CatalogDocument>()
            .await
            .context("failed to deserialize the catalog")?;
        info!(n_rows = document.batteries.len(), "fetched");
        validate(document)
    }
}

/// Catalog stored in a local JSON or TOML file.
pub struct FileCatalog(PathBuf);

impl FileCatalog {
    pub const fn new(path: PathBuf) -> Self {
        Self(path)
    }

    fn is_toml(&self) -> bool {
        self.0.extension().is_some_and(|extension| extension.eq_ignore_ascii_case("toml"))
    }
}

#[async_trait]
impl CatalogProvider for FileCatalog {
    #[instrument(skip_all, fields(path = %self.0.display()))]
    async fn fetch(&self) -> Result<Catalog> {
        let contents = tokio::fs::read_to_string(&self.0)
            .await
            .with_context(|| format!("failed to read `{}`", self.0.display()))?;
        let document: CatalogDocument = if self.is_toml() {
            toml::from_str(&contents).context("failed to parse the TOML catalog")?
        } else {
            serde_json::from_str(&contents).context("failed to parse the JSON catalog")?
        };
        debug!(n_rows = document.batteries.len(), "read");
        validate(document)
    }
}

/// Catalog shipped with the binary.
pub struct BundledCatalog;

const BUNDLED_DOCUMENT: &str = include_str!("catalog/bundled.json");

#[async_trait]
impl CatalogProvider for BundledCatalog {
    async fn fetch(&self) -> Result<Catalog> {
        let document = serde_json::from_str(BUNDLED_DOCUMENT)
            .context("failed to parse the bundled catalog")?;
        validate(document)
    }
}

/// Try the primary source first, and the secondary one if the primary fails.
pub struct FallbackCatalog {
    primary: Box<dyn CatalogProvider>,
    secondary: Box<dyn CatalogProvider>,
}

impl FallbackCatalog {
    pub fn new(primary: Box<dyn CatalogProvider>, secondary: Box<dyn CatalogProvider>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl CatalogProvider for FallbackCatalog {
    async fn fetch(&self) -> Result<Catalog> {
        match self.primary.fetch().await {
            Ok(catalog) => Ok(catalog),
            Err(error) => {
                warn!("primary catalog unavailable, falling back: {error:#}");
                self.secondary.fetch().await.context("the fallback catalog is unavailable too")
            }
        }
    }
}
