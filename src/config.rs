use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::paths::DEFAULT_KEYRINGS_DIR;
use crate::ppa::DEFAULT_LAUNCHPAD_API_URL;
use crate::validation::validate_key_server;

/// Keyserver used when a repository does not name one.
pub const DEFAULT_KEY_SERVER: &str = "keyserver.ubuntu.com";

/// Settings for [`AptKeyManager`](crate::AptKeyManager).
///
/// Only `key-assets-dir` has no default.
///
/// ```toml
/// key-assets-dir = "/snap/craft/current/keys"
/// keyrings-dir = "/etc/apt/keyrings"
/// default-key-server = "keyserver.ubuntu.com"
/// timeout-secs = 120
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct KeyManagerConfig {
    /// Directory holding bundled `<SHORT_ID>.asc` key assets.
    pub key_assets_dir: PathBuf,
    /// Directory the `craft-<SHORT_ID>.gpg` keyrings are written to.
    #[serde(default = "default_keyrings_dir")]
    pub keyrings_dir: PathBuf,
    #[serde(default = "default_key_server")]
    pub default_key_server: String,
    #[serde(default = "default_gpg_program")]
    pub gpg_program: PathBuf,
    #[serde(default = "default_launchpad_api_url")]
    pub launchpad_api_url: String,
    /// Upper bound for each gpg invocation. Unset means wait indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_keyrings_dir() -> PathBuf {
    PathBuf::from(DEFAULT_KEYRINGS_DIR)
}

fn default_key_server() -> String {
    DEFAULT_KEY_SERVER.to_string()
}

fn default_gpg_program() -> PathBuf {
    PathBuf::from("gpg")
}

fn default_launchpad_api_url() -> String {
    DEFAULT_LAUNCHPAD_API_URL.to_string()
}

impl KeyManagerConfig {
    /// Configuration with defaults for everything except the assets directory.
    pub fn new(key_assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            key_assets_dir: key_assets_dir.into(),
            keyrings_dir: default_keyrings_dir(),
            default_key_server: default_key_server(),
            gpg_program: default_gpg_program(),
            launchpad_api_url: default_launchpad_api_url(),
            timeout_secs: None,
        }
    }

    #[must_use]
    pub fn with_keyrings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.keyrings_dir = dir.into();
        self
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config {
            detail: format!("failed to parse configuration: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::filesystem(path, e))?;
        Self::from_toml_str(&content)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> Result<()> {
        validate_key_server(&self.default_key_server)?;
        if self.timeout_secs == Some(0) {
            return Err(Error::Config {
                detail: "timeout-secs must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
