//! Remote asset server client
//!
//! Blocking HTTP client for a genoreg asset server. The server exposes the
//! genome and asset listings plus tar archives of built asset bundles:
//!
//! - `GET /v1/genomes` - available genome names
//! - `GET /v1/assets/{genome}` - asset names for a genome
//! - `GET /v1/asset/{genome}/{asset}/archive?tag={tag}` - gzipped tarball

use crate::error::{GenoregError, Result};
use serde::{Deserialize, Serialize};

/// Default asset server queried by `pull` and `avail`.
pub const DEFAULT_SERVER: &str = "http://refgenomes.databio.org";

/// Remote asset server contract.
pub trait AssetServer {
    /// Genome names the server can serve.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success response.
    fn list_available_genomes(&self) -> Result<Vec<String>>;

    /// Asset names available for one genome.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success response.
    fn list_assets_by_genome(&self, genome: &str) -> Result<Vec<String>>;

    /// Download the gzipped tar archive for a tagged asset.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success response.
    fn download_asset(&self, genome: &str, asset: &str, tag: &str) -> Result<Vec<u8>>;
}

/// Genome listing response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomesResponse {
    /// Available genome names.
    pub genomes: Vec<String>,
}

/// Asset listing response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsResponse {
    /// Genome the listing is for.
    pub genome: String,
    /// Available asset names.
    pub assets: Vec<String>,
}

/// HTTP implementation of [`AssetServer`].
#[derive(Debug)]
pub struct HttpAssetServer {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpAssetServer {
    /// Create a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("genoreg/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { base_url, client })
    }

    /// The configured server URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(GenoregError::Remote(format!(
                "HTTP {} for {url}",
                response.status()
            )));
        }
        Ok(response.bytes()?.to_vec())
    }
}

impl AssetServer for HttpAssetServer {
    fn list_available_genomes(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1/genomes", self.base_url);
        let body = self.get_bytes(&url)?;
        let parsed: GenomesResponse = serde_json::from_slice(&body)?;
        Ok(parsed.genomes)
    }

    fn list_assets_by_genome(&self, genome: &str) -> Result<Vec<String>> {
        let url = format!("{}/v1/assets/{genome}", self.base_url);
        let body = self.get_bytes(&url)?;
        let parsed: AssetsResponse = serde_json::from_slice(&body)?;
        Ok(parsed.assets)
    }

    fn download_asset(&self, genome: &str, asset: &str, tag: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/v1/asset/{genome}/{asset}/archive?tag={tag}",
            self.base_url
        );
        self.get_bytes(&url)
    }
}
