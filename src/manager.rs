use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::config::KeyManagerConfig;
use crate::error::{Error, Result};
use crate::gpg::{Gpg, KEY_NOT_FOUND_EXIT_CODE, KeyTool, ToolOutput};
use crate::parse::parse_fingerprints;
use crate::paths::{key_asset_name, keyring_file};
use crate::ppa::{LaunchpadPpaLookup, PpaKeyLookup};
use crate::types::{KeySource, PackageRepository};
use crate::validation::{validate_key_server, validate_keyid};

const KEYRING_MODE: u32 = 0o644;
const PRIVATE_DIR_MODE: u32 = 0o700;

/// Installs the signing keys APT package repositories need.
///
/// Each key lives in its own `craft-<SHORT_ID>.gpg` keyring under the
/// configured keyrings directory. A missing key is installed from a bundled
/// `<SHORT_ID>.asc` asset when one exists, and fetched from a keyserver
/// otherwise.
///
/// # Concurrency
///
/// No lock is taken on the keyrings directory. Independent processes may
/// install the same key at the same time; the presence check is the only
/// guard, so the worst outcome of that race is a redundant import into a
/// file gpg itself keeps consistent.
///
/// # Example
///
/// ```no_run
/// use apt_keyring::{AptKeyManager, KeyManagerConfig, PackageRepository};
///
/// # async fn example() -> apt_keyring::Result<()> {
/// let config = KeyManagerConfig::new("/usr/share/apt-keyring/keys");
/// let manager = AptKeyManager::new(&config)?;
///
/// let repo = PackageRepository::apt("0123456789ABCDEF", None);
/// if manager.install_package_repository_key(&repo).await? {
///     println!("key installed, refresh package lists");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AptKeyManager {
    keyrings_dir: PathBuf,
    key_assets_dir: PathBuf,
    default_key_server: String,
    tool: Arc<dyn KeyTool>,
    ppa_lookup: Arc<dyn PpaKeyLookup>,
}

impl AptKeyManager {
    /// Creates a manager backed by the system `gpg` and the Launchpad API.
    pub fn new(config: &KeyManagerConfig) -> Result<Self> {
        let gpg = Gpg::with_program(&config.gpg_program).timeout(config.timeout());
        let launchpad = LaunchpadPpaLookup::new(&config.launchpad_api_url)?;
        Ok(Self::with_collaborators(config, gpg, launchpad))
    }

    /// Creates a manager with caller-supplied keyring tool and PPA lookup.
    pub fn with_collaborators(
        config: &KeyManagerConfig,
        tool: impl KeyTool + 'static,
        ppa_lookup: impl PpaKeyLookup + 'static,
    ) -> Self {
        Self {
            keyrings_dir: config.keyrings_dir.clone(),
            key_assets_dir: config.key_assets_dir.clone(),
            default_key_server: config.default_key_server.clone(),
            tool: Arc::new(tool),
            ppa_lookup: Arc::new(ppa_lookup),
        }
    }

    /// Path of the keyring file that holds `key_id`.
    pub fn keyring_file(&self, key_id: &str) -> PathBuf {
        keyring_file(key_id, Some(self.keyrings_dir.as_path()))
    }

    /// Finds the bundled key asset for `key_id`.
    ///
    /// Assets are named after the last 8 characters of the key ID,
    /// upper-cased, with an `.asc` extension.
    pub async fn find_asset_with_key_id(&self, key_id: &str) -> Option<PathBuf> {
        let key_path = self.key_assets_dir.join(key_asset_name(key_id));
        is_file(&key_path).await.then_some(key_path)
    }

    /// Lists the primary key fingerprints contained in `key`.
    ///
    /// The material is imported into a scratch keyring inside a private
    /// temporary directory, which is removed before returning.
    pub async fn get_key_fingerprints(&self, key: &str) -> Result<Vec<String>> {
        let scratch = private_temp_dir().await?;
        let homedir = Some(scratch.path());
        let keyring = scratch.path().join("scratch.gpg");

        let import = self.tool.import_key(&keyring, key.as_bytes(), homedir).await?;
        check_success(&import)?;

        let listing = self.tool.list_keys(&keyring, homedir).await?;
        check_success(&listing)?;

        Ok(parse_fingerprints(&listing.output))
    }

    /// Checks whether `key_id` is present in its keyring.
    ///
    /// A missing keyring file is reported as absent without running gpg,
    /// since listing against it would create an empty keyring. Exit codes
    /// other than success and "not found" are logged and also reported as
    /// absent, so that installation is still attempted.
    pub async fn is_key_installed(&self, key_id: &str) -> Result<bool> {
        let key_id = validate_keyid(key_id)?;
        let keyring = self.keyring_file(key_id);

        if !is_file(&keyring).await {
            debug!(keyring = %keyring.display(), "keyring file not found");
            return Ok(false);
        }

        let output = self.tool.list_key(&keyring, key_id).await?;
        match output.code {
            Some(0) => Ok(true),
            Some(KEY_NOT_FOUND_EXIT_CODE) => Ok(false),
            _ => {
                warn!(
                    key_id,
                    status = output.status(),
                    output = %output.output,
                    "unexpected gpg failure while checking for key"
                );
                Ok(false)
            }
        }
    }

    /// Imports `key` into the keyring for `key_id`.
    pub async fn install_key(&self, key: &str, key_id: &str) -> Result<()> {
        self.import_into_keyring(key, key_id, None).await
    }

    async fn import_into_keyring(
        &self,
        key: &str,
        key_id: &str,
        asset: Option<&Path>,
    ) -> Result<()> {
        let key_id = validate_keyid(key_id)?;
        let keyring = self.keyring_file(key_id);

        let output = timed_out_as_failure(
            self.tool.import_key(&keyring, key.as_bytes(), None).await,
        )?;
        if !output.success() {
            return Err(Error::KeyInstall {
                origin: KeySource::Asset {
                    path: asset.map(Path::to_path_buf),
                    key: key.to_string(),
                },
                output: output.output,
            });
        }

        set_keyring_mode(&keyring).await?;

        debug!(key_id, keyring = %keyring.display(), "installed apt repository key:\n{key}");
        Ok(())
    }

    /// Fetches `key_id` from `key_server` into its keyring.
    ///
    /// gpg runs with a private temporary home directory, removed afterwards
    /// whether or not the fetch succeeded.
    pub async fn install_key_from_keyserver(&self, key_id: &str, key_server: &str) -> Result<()> {
        let key_id = validate_keyid(key_id)?;
        let key_server = validate_key_server(key_server)?;
        let keyring = self.keyring_file(key_id);

        let homedir = private_temp_dir().await?;
        let output = timed_out_as_failure(
            self.tool
                .receive_key(homedir.path(), &keyring, key_server, key_id)
                .await,
        )?;
        drop(homedir);

        if !output.success() {
            return Err(Error::KeyInstall {
                origin: KeySource::Keyserver {
                    key_id: key_id.to_string(),
                    key_server: key_server.to_string(),
                },
                output: output.output,
            });
        }

        set_keyring_mode(&keyring).await?;

        debug!(key_id, key_server, keyring = %keyring.display(), "installed key from keyserver");
        Ok(())
    }

    /// Ensures the signing key for `package_repo` is installed.
    ///
    /// Returns `true` if a key was installed and `false` if it was already
    /// present. A bundled asset is always preferred over a keyserver; when
    /// the repository names no keyserver the configured default is used.
    pub async fn install_package_repository_key(
        &self,
        package_repo: &PackageRepository,
    ) -> Result<bool> {
        let (key_id, key_server) = match package_repo {
            PackageRepository::Ppa { ppa } => (self.ppa_lookup.ppa_key_id(ppa).await?, None),
            PackageRepository::Apt { key_id, key_server } => {
                (key_id.clone(), key_server.as_deref())
            }
        };

        if self.is_key_installed(&key_id).await? {
            debug!(key_id = %key_id, "key already installed");
            return Ok(false);
        }

        debug!(key_id = %key_id, "key not found; adding");

        match self.find_asset_with_key_id(&key_id).await {
            Some(asset) => {
                let key = tokio::fs::read_to_string(&asset)
                    .await
                    .map_err(|e| Error::filesystem(&asset, e))?;
                self.import_into_keyring(&key, &key_id, Some(asset.as_path())).await?;
            }
            None => {
                let key_server = key_server.unwrap_or(&self.default_key_server);
                self.install_key_from_keyserver(&key_id, key_server).await?;
            }
        }

        Ok(true)
    }
}

/// Turns a timed-out install into a failed run so it is attributed like any other failure.
fn timed_out_as_failure(result: Result<ToolOutput>) -> Result<ToolOutput> {
    match result {
        Err(Error::Timeout(limit)) => Ok(ToolOutput {
            code: None,
            output: format!("gpg timed out after {limit:?}"),
        }),
        other => other,
    }
}

fn check_success(output: &ToolOutput) -> Result<()> {
    if output.success() {
        Ok(())
    } else {
        Err(Error::Gpg {
            status: output.status(),
            output: output.output.clone(),
        })
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

/// APT drops privileges before reading keyrings, so they must be world-readable.
async fn set_keyring_mode(keyring: &Path) -> Result<()> {
    tokio::fs::set_permissions(keyring, Permissions::from_mode(KEYRING_MODE))
        .await
        .map_err(|e| Error::filesystem(keyring, e))
}

/// gpg refuses home directories other users can read.
///
/// Creating the directory is a single blocking `mkdir`; removal happens in
/// `TempDir`'s drop.
async fn private_temp_dir() -> Result<TempDir> {
    let dir = tempfile::Builder::new()
        .prefix("apt-keyring-")
        .tempdir()
        .map_err(|e| Error::filesystem(std::env::temp_dir(), e))?;
    tokio::fs::set_permissions(dir.path(), Permissions::from_mode(PRIVATE_DIR_MODE))
        .await
        .map_err(|e| Error::filesystem(dir.path(), e))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    /// Records the paths gpg was pointed at and answers with fixed exit codes.
    #[derive(Default)]
    struct ScriptedTool {
        list_key_code: i32,
        import_code: i32,
        listing: String,
        seen: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedTool {
        fn seen(&self) -> Vec<PathBuf> {
            self.seen.lock().unwrap().clone()
        }
    }

    fn reply(code: i32, output: &str) -> Result<ToolOutput> {
        Ok(ToolOutput {
            code: Some(code),
            output: output.to_string(),
        })
    }

    #[async_trait]
    impl KeyTool for Arc<ScriptedTool> {
        async fn list_key(&self, keyring: &Path, _key_id: &str) -> Result<ToolOutput> {
            self.seen.lock().unwrap().push(keyring.to_path_buf());
            reply(self.list_key_code, "gpg: error reading key: No public key")
        }

        async fn list_keys(&self, keyring: &Path, homedir: Option<&Path>) -> Result<ToolOutput> {
            assert!(homedir.is_some_and(Path::exists));
            self.seen.lock().unwrap().push(keyring.to_path_buf());
            reply(0, &self.listing)
        }

        async fn import_key(
            &self,
            keyring: &Path,
            _key: &[u8],
            _homedir: Option<&Path>,
        ) -> Result<ToolOutput> {
            self.seen.lock().unwrap().push(keyring.to_path_buf());
            std::fs::write(keyring, b"keyring").unwrap();
            reply(self.import_code, "gpg: no valid OpenPGP data found.")
        }

        async fn receive_key(
            &self,
            _homedir: &Path,
            _keyring: &Path,
            _key_server: &str,
            _key_id: &str,
        ) -> Result<ToolOutput> {
            panic!("keyserver must not be contacted");
        }
    }

    struct NoPpa;

    #[async_trait]
    impl PpaKeyLookup for NoPpa {
        async fn ppa_key_id(&self, ppa: &str) -> Result<String> {
            panic!("unexpected PPA lookup for {ppa}");
        }
    }

    fn manager(keyrings: &Path, tool: &Arc<ScriptedTool>) -> AptKeyManager {
        let config = KeyManagerConfig::new(keyrings.join("assets")).with_keyrings_dir(keyrings);
        AptKeyManager::with_collaborators(&config, Arc::clone(tool), NoPpa)
    }

    #[tokio::test]
    async fn test_is_key_installed_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("craft-89ABCDEF.gpg"), b"ring").unwrap();

        for (code, expected) in [(0, true), (2, false), (1, false)] {
            let tool = Arc::new(ScriptedTool {
                list_key_code: code,
                ..Default::default()
            });
            let installed = manager(dir.path(), &tool)
                .is_key_installed("0123456789ABCDEF")
                .await
                .unwrap();
            assert_eq!(installed, expected, "exit code {code}");
            assert_eq!(tool.seen(), vec![dir.path().join("craft-89ABCDEF.gpg")]);
        }
    }

    #[tokio::test]
    async fn test_is_key_installed_rejects_invalid_key_id() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Arc::new(ScriptedTool::default());
        let result = manager(dir.path(), &tool).is_key_installed("--list").await;
        assert!(matches!(result, Err(Error::InvalidKeyId { .. })));
    }

    #[tokio::test]
    async fn test_install_key_failure_carries_output_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Arc::new(ScriptedTool {
            import_code: 2,
            ..Default::default()
        });
        let err = manager(dir.path(), &tool)
            .install_key("not a key", "DEADBEEF")
            .await
            .unwrap_err();

        match err {
            Error::KeyInstall {
                origin: KeySource::Asset { path: None, key },
                output,
            } => {
                assert_eq!(key, "not a key");
                assert!(output.contains("no valid OpenPGP data"));
            }
            other => panic!("expected KeyInstall error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_key_fingerprints_removes_scratch_keyring() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Arc::new(ScriptedTool {
            listing: "pub:-:4096:1:AAAA:1:::-:::scSC:\n\
                      fpr:::::::::1111111111111111111111111111AAAAAAAAAAAAAAAA:\n"
                .to_string(),
            ..Default::default()
        });

        let fingerprints = manager(dir.path(), &tool)
            .get_key_fingerprints("-----BEGIN PGP PUBLIC KEY BLOCK-----")
            .await
            .unwrap();

        assert_eq!(
            fingerprints,
            vec!["1111111111111111111111111111AAAAAAAAAAAAAAAA".to_string()]
        );
        let seen = tool.seen();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|p| !p.exists()));
        assert!(!seen[0].parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_get_key_fingerprints_import_failure_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Arc::new(ScriptedTool {
            import_code: 2,
            ..Default::default()
        });

        let result = manager(dir.path(), &tool).get_key_fingerprints("garbage").await;

        assert!(matches!(result, Err(Error::Gpg { status: 2, .. })));
        let seen = tool.seen();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_private_temp_dir_mode() {
        let dir = private_temp_dir().await.unwrap();
        let mode = std::fs::metadata(dir.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
