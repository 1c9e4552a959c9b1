use std::path::{Path, PathBuf};

/// Directory APT reads repository keyrings from.
pub const DEFAULT_KEYRINGS_DIR: &str = "/etc/apt/keyrings";

/// Returns the short identifier for a key ID: its last 8 characters, upper-cased.
///
/// Identifiers shorter than 8 characters are used whole.
pub fn short_key_id(key_id: &str) -> String {
    let start = key_id
        .char_indices()
        .rev()
        .nth(7)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    key_id[start..].to_uppercase()
}

/// Resolves the keyring file that holds `key_id` under `keyrings_dir`.
///
/// When no directory is given, [`DEFAULT_KEYRINGS_DIR`] is used.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use apt_keyring::keyring_file;
///
/// let path = keyring_file("ABCD1234EF567890", Some(Path::new("/tmp/keyrings")));
/// assert_eq!(path, Path::new("/tmp/keyrings/craft-EF567890.gpg"));
/// ```
pub fn keyring_file(key_id: &str, keyrings_dir: Option<&Path>) -> PathBuf {
    let dir = keyrings_dir.unwrap_or_else(|| Path::new(DEFAULT_KEYRINGS_DIR));
    dir.join(format!("craft-{}.gpg", short_key_id(key_id)))
}

/// File name of the bundled key asset for `key_id`.
pub fn key_asset_name(key_id: &str) -> String {
    format!("{}.asc", short_key_id(key_id))
}

/// Keyring specifier telling gpg the file is in the binary OpenPGP format APT expects.
pub(crate) fn gnupg_ring(keyring_file: &Path) -> String {
    format!("gnupg-ring:{}", keyring_file.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_key_id_takes_last_eight() {
        assert_eq!(short_key_id("ABCD1234EF567890"), "EF567890");
        assert_eq!(short_key_id("0123456789abcdef"), "89ABCDEF");
    }

    #[test]
    fn test_short_key_id_short_input_used_whole() {
        assert_eq!(short_key_id("abc"), "ABC");
        assert_eq!(short_key_id("deadbeef"), "DEADBEEF");
    }

    #[test]
    fn test_keyring_file_default_dir() {
        assert_eq!(
            keyring_file("ABCD1234EF567890", None),
            PathBuf::from("/etc/apt/keyrings/craft-EF567890.gpg")
        );
    }

    #[test]
    fn test_keyring_file_depends_only_on_short_id() {
        let dir = Path::new("/keys");
        assert_eq!(
            keyring_file("1111111189abcdef", Some(dir)),
            keyring_file("0123456789ABCDEF", Some(dir))
        );
    }

    #[test]
    fn test_key_asset_name() {
        assert_eq!(key_asset_name("0123456789ABCDEF"), "89ABCDEF.asc");
    }

    #[test]
    fn test_gnupg_ring_specifier() {
        assert_eq!(
            gnupg_ring(Path::new("/etc/apt/keyrings/craft-EF567890.gpg")),
            "gnupg-ring:/etc/apt/keyrings/craft-EF567890.gpg"
        );
    }
}
