use std::path::PathBuf;

use clap::Parser;
use reqwest::Url;

use crate::{
    api::catalog::{BundledCatalog, CatalogProvider, FallbackCatalog, FileCatalog, HttpCatalog},
    prelude::*,
};

#[derive(Parser)]
pub struct CatalogArgs {
    /// JSON catalog endpoint, tried first.
    #[clap(long = "catalog-url", env = "CATALOG_URL")]
    pub url: Option<Url>,

    /// Local JSON or TOML catalog, tried after the endpoint.
    ///
    /// The bundled catalog is the last resort.
    #[clap(long = "catalog-file", env = "CATALOG_FILE")]
    pub file: Option<PathBuf>,
}

impl CatalogArgs {
    pub fn provider(&self) -> Result<Box<dyn CatalogProvider>> {
        let mut provider: Box<dyn CatalogProvider> = Box::new(BundledCatalog);
        if let Some(path) = &self.file {
            let primary = Box::new(FileCatalog::new(path.clone()));
            provider = Box::new(FallbackCatalog::new(primary, provider));
        }
        if let Some(url) = &self.url {
            let primary = Box::new(HttpCatalog::try_new(url.clone())?);
            provider = Box::new(FallbackCatalog::new(primary, provider));
        }
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bundled_by_default() -> Result {
        let args = CatalogArgs { url: None, file: None };
        assert!(!args.provider()?.fetch().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_falls_back() -> Result {
        let args =
            CatalogArgs { url: None, file: Some(PathBuf::from("/nonexistent/catalog.toml")) };
        assert!(!args.provider()?.fetch().await?.is_empty());
        Ok(())
    }
}
