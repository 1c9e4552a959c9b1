//! Example: make sure the signing key for a repository is installed
//!
//! Run with: cargo run --example install_repo_key -- <assets-dir | config.toml> <key-id | ppa:owner/name> [key-server]
//!
//! Set `RUST_LOG=apt_keyring=debug` to see the gpg command lines.

use std::path::Path;

use apt_keyring::{AptKeyManager, KeyManagerConfig, PackageRepository};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> apt_keyring::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(assets_dir), Some(target)) = (args.next(), args.next()) else {
        eprintln!("usage: install_repo_key <assets-dir | config.toml> <key-id | ppa:owner/name> [key-server]");
        std::process::exit(2);
    };
    let key_server = args.next();

    let repo = match target.strip_prefix("ppa:") {
        Some(ppa) => PackageRepository::ppa(ppa),
        None => PackageRepository::apt(target, key_server.as_deref()),
    };

    let config = if assets_dir.ends_with(".toml") {
        KeyManagerConfig::load(Path::new(&assets_dir))?
    } else {
        KeyManagerConfig::new(assets_dir)
    };
    let manager = AptKeyManager::new(&config)?;

    if manager.install_package_repository_key(&repo).await? {
        println!("installed signing key; refresh package lists");
    } else {
        println!("signing key already installed");
    }

    Ok(())
}
