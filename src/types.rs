use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

/// An APT package repository whose signing key must be trusted.
///
/// Deserializes from the project-file shape: either a `ppa` entry or an
/// entry carrying `key-id` and an optional `key-server`. Fields unrelated
/// to key resolution (`url`, `suites`, `components`, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum PackageRepository {
    /// A Launchpad PPA, e.g. `deadsnakes/ppa`. The key ID is looked up remotely.
    Ppa { ppa: String },
    /// A repository with an explicit signing key.
    #[serde(rename_all = "kebab-case")]
    Apt {
        key_id: String,
        #[serde(default)]
        key_server: Option<String>,
    },
}

impl PackageRepository {
    pub fn ppa(ppa: impl Into<String>) -> Self {
        Self::Ppa { ppa: ppa.into() }
    }

    pub fn apt(key_id: impl Into<String>, key_server: Option<&str>) -> Self {
        Self::Apt {
            key_id: key_id.into(),
            key_server: key_server.map(str::to_string),
        }
    }
}

/// Where a failed key installation was attempted from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeySource {
    /// Key material imported directly, read from `path` when it came from a bundled asset.
    Asset { path: Option<PathBuf>, key: String },
    /// Key fetched by ID from a keyserver.
    Keyserver { key_id: String, key_server: String },
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asset {
                path: Some(path), ..
            } => write!(f, "key asset {}", path.display()),
            Self::Asset { path: None, .. } => f.write_str("provided key material"),
            Self::Keyserver { key_id, key_server } => {
                write!(f, "key server {key_server} (key ID {key_id})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_ppa_repository() {
        let repo: PackageRepository =
            serde_json::from_str(r#"{"type": "apt", "ppa": "deadsnakes/ppa"}"#).unwrap();
        assert_eq!(repo, PackageRepository::ppa("deadsnakes/ppa"));
    }

    #[test]
    fn test_deserialize_apt_repository_ignores_other_fields() {
        let repo: PackageRepository = serde_json::from_str(
            r#"{
                "type": "apt",
                "url": "https://repo.example.com/ubuntu",
                "suites": ["jammy"],
                "components": ["main"],
                "key-id": "0123456789ABCDEF0123456789ABCDEF01234567",
                "key-server": "keys.example.com"
            }"#,
        )
        .unwrap();
        assert_eq!(
            repo,
            PackageRepository::apt(
                "0123456789ABCDEF0123456789ABCDEF01234567",
                Some("keys.example.com")
            )
        );
    }

    #[test]
    fn test_deserialize_apt_repository_without_key_server() {
        let repo: PackageRepository =
            serde_json::from_str(r#"{"key-id": "0123456789ABCDEF"}"#).unwrap();
        assert_eq!(repo, PackageRepository::apt("0123456789ABCDEF", None));
    }

    #[test]
    fn test_deserialize_without_key_fails() {
        let result = serde_json::from_str::<PackageRepository>(r#"{"url": "http://x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_key_source_display() {
        let asset = KeySource::Asset {
            path: Some(PathBuf::from("/assets/89ABCDEF.asc")),
            key: "KEY".to_string(),
        };
        assert_eq!(asset.to_string(), "key asset /assets/89ABCDEF.asc");

        let server = KeySource::Keyserver {
            key_id: "89ABCDEF".to_string(),
            key_server: "keyserver.ubuntu.com".to_string(),
        };
        assert_eq!(
            server.to_string(),
            "key server keyserver.ubuntu.com (key ID 89ABCDEF)"
        );
    }
}
