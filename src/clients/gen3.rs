//! Gen3 data commons: index service release version.

use serde::{Deserialize, Serialize};

use super::{ApiError, RestClient};

/// Body of `GET /index/_version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexVersion {
    pub version: String,
    #[serde(default)]
    pub commit: Option<String>,
}

pub struct Gen3Client {
    rest: RestClient,
}

impl Gen3Client {
    /// The version endpoint is public, so no token provider is attached.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            rest: RestClient::new(base_url, None)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.rest.base_url()
    }

    pub async fn index_version(&self) -> Result<IndexVersion, ApiError> {
        self.rest.get_json("/index/_version").await
    }
}
