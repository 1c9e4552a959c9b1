//! Install the signing keys APT package repositories need.
//!
//! Given a repository declaration, this crate makes sure the key that signs
//! its packages is present in a per-key keyring under `/etc/apt/keyrings`.
//! Missing keys are installed from bundled key assets when available, and
//! fetched from a keyserver otherwise. All keyring work is delegated to
//! `gpg`.
//!
//! # Example
//!
//! ```no_run
//! use apt_keyring::{AptKeyManager, KeyManagerConfig, PackageRepository};
//!
//! #[tokio::main]
//! async fn main() -> apt_keyring::Result<()> {
//!     let config = KeyManagerConfig::new("/usr/share/apt-keyring/keys");
//!     let manager = AptKeyManager::new(&config)?;
//!
//!     let repos = [
//!         PackageRepository::ppa("deadsnakes/ppa"),
//!         PackageRepository::apt("9FD3B784BC1C6FC31A8A0A1C1655A0AB68576280", None),
//!     ];
//!     for repo in &repos {
//!         if manager.install_package_repository_key(repo).await? {
//!             println!("installed key for {repo:?}");
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Requirements
//!
//! - `gpg` available on `PATH` (or configured via `gpg-program`)
//! - Write access to the keyrings directory for installs
//! - Network access for keyserver fetches and PPA lookups

mod config;
mod error;
mod gpg;
mod manager;
mod parse;
mod paths;
mod ppa;
mod types;
mod validation;

pub use config::{DEFAULT_KEY_SERVER, KeyManagerConfig};
pub use error::{Error, Result};
pub use gpg::{Gpg, KEY_NOT_FOUND_EXIT_CODE, KeyTool, ToolOutput};
pub use manager::AptKeyManager;
pub use parse::parse_fingerprints;
pub use paths::{DEFAULT_KEYRINGS_DIR, key_asset_name, keyring_file, short_key_id};
pub use ppa::{DEFAULT_LAUNCHPAD_API_URL, LaunchpadPpaLookup, PpaKeyLookup};
pub use types::{KeySource, PackageRepository};
