use crate::error::{Error, Result};

/// Validates a key ID before passing it to a subprocess.
///
/// Key IDs are treated as opaque tokens, but they must be non-empty and
/// consist only of ASCII letters and digits, so that a value such as
/// `--import` is never mistaken for a gpg option.
pub fn validate_keyid(keyid: &str) -> Result<&str> {
    if keyid.is_empty() {
        return Err(Error::InvalidKeyId {
            keyid: keyid.to_string(),
            reason: "key ID cannot be empty".to_string(),
        });
    }

    if !keyid.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidKeyId {
            keyid: keyid.to_string(),
            reason: "key ID must contain only ASCII letters and digits".to_string(),
        });
    }

    Ok(keyid)
}

/// Validates a keyserver before passing it to a subprocess.
///
/// Accepted formats:
/// - bare hostname (`keyserver.ubuntu.com`)
/// - URL with scheme and optional port (`hkps://keys.openpgp.org:443`)
pub fn validate_key_server(server: &str) -> Result<&str> {
    if server.is_empty() {
        return Err(Error::InvalidKeyServer {
            server: server.to_string(),
            reason: "key server cannot be empty".to_string(),
        });
    }

    if server.starts_with('-') {
        return Err(Error::InvalidKeyServer {
            server: server.to_string(),
            reason: "key server cannot start with '-'".to_string(),
        });
    }

    if !server
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '/' | '_'))
    {
        return Err(Error::InvalidKeyServer {
            server: server.to_string(),
            reason: "key server must be a hostname or URL".to_string(),
        });
    }

    Ok(server)
}

/// Splits a PPA slug of the form `owner/name` into its parts.
pub fn split_ppa(ppa: &str) -> Result<(&str, &str)> {
    let invalid = |reason: &str| Error::InvalidPpa {
        ppa: ppa.to_string(),
        reason: reason.to_string(),
    };

    let (owner, name) = ppa
        .split_once('/')
        .ok_or_else(|| invalid("expected the form <owner>/<name>"))?;

    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return Err(invalid("expected the form <owner>/<name>"));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '+' | '_');
    if !owner.chars().all(allowed) || !name.chars().all(allowed) {
        return Err(invalid(
            "PPA owner and name may contain only letters, digits, '-', '.', '+' or '_'",
        ));
    }

    Ok((owner, name))
}
