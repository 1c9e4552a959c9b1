use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::validation::split_ppa;

/// Launchpad REST API root.
pub const DEFAULT_LAUNCHPAD_API_URL: &str = "https://api.launchpad.net/devel";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves a PPA slug (`owner/name`) to the ID of the key that signs it.
#[async_trait]
pub trait PpaKeyLookup: Send + Sync {
    async fn ppa_key_id(&self, ppa: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ArchiveEntry {
    signing_key_fingerprint: Option<String>,
}

/// [`PpaKeyLookup`] that queries the Launchpad archive API.
#[derive(Debug, Clone)]
pub struct LaunchpadPpaLookup {
    api_url: String,
    client: reqwest::Client,
}

impl LaunchpadPpaLookup {
    pub fn new(api_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .user_agent(concat!("apt-keyring/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config {
                detail: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn archive_url(&self, owner: &str, name: &str) -> String {
        format!("{}/~{owner}/+archive/ubuntu/{name}", self.api_url)
    }
}

#[async_trait]
impl PpaKeyLookup for LaunchpadPpaLookup {
    async fn ppa_key_id(&self, ppa: &str) -> Result<String> {
        let (owner, name) = split_ppa(ppa)?;
        let url = self.archive_url(owner, name);
        let lookup_failed = |reason: String| Error::PpaLookup {
            ppa: ppa.to_string(),
            reason,
        };

        debug!(%url, "querying Launchpad for PPA signing key");

        let entry: ArchiveEntry = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| lookup_failed(e.to_string()))?
            .json()
            .await
            .map_err(|e| lookup_failed(format!("unexpected response: {e}")))?;

        match entry.signing_key_fingerprint {
            Some(fpr) if !fpr.is_empty() => Ok(fpr),
            _ => Err(lookup_failed("archive has no signing key".to_string())),
        }
    }
}
