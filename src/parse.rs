use tracing::debug;

/// Extracts primary key fingerprints from `gpg --list-keys --with-colons` output.
///
/// Only the first `fpr` record following each `pub` record is taken, so
/// subkey fingerprints are not reported. Duplicates are dropped while
/// preserving first-seen order.
pub fn parse_fingerprints(output: &str) -> Vec<String> {
    let mut fingerprints: Vec<String> = Vec::new();
    let mut awaiting_primary_fpr = false;

    for line in output.lines() {
        let fields: Vec<&str> = line.split(':').collect();

        match fields[0] {
            "pub" => awaiting_primary_fpr = true,
            "fpr" if awaiting_primary_fpr => {
                awaiting_primary_fpr = false;
                match fields.get(9) {
                    Some(fpr) if !fpr.is_empty() => {
                        if !fingerprints.iter().any(|known| known == fpr) {
                            fingerprints.push((*fpr).to_string());
                        }
                    }
                    _ => debug!("skipping fpr record without fingerprint field"),
                }
            }
            "sub" | "ssb" | "sec" | "uid" | "uat" | "rev" | "tru" | "fpr" | "grp" => {}
            "" => {}
            other => debug!(record_type = other, "skipping unknown GPG record type"),
        }
    }

    fingerprints
}
