//! Hashing utilities for checksums and package identifiers.

use sha2::{Digest, Sha256};

/// Length of a package id in hex characters.
pub const PACKAGE_ID_LEN: usize = 40;

/// Hex SHA-256 of a byte slice, as listed in `conandata.yml`.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compare a computed checksum against an expected one, ignoring case.
pub fn checksum_matches(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}

/// Incremental hasher over labelled text components.
///
/// Package ids are built from the canonical rendering of a binary info view,
/// so the input order is significant and callers feed sorted data.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    /// Create a new fingerprint builder.
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component to the fingerprint.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0");
        self
    }

    /// Add multiple strings to the fingerprint.
    pub fn update_strs<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for s in items {
            self.update_str(s);
        }
        self
    }

    /// Finalize and return the fingerprint as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    /// Finalize and return a package id sized digest.
    pub fn finish_package_id(self) -> String {
        self.finish()[..PACKAGE_ID_LEN].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_bytes() {
        assert_eq!(
            sha256_bytes(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_checksum_matches_ignores_case() {
        assert!(checksum_matches("ABCDEF", "abcdef"));
        assert!(!checksum_matches("abcdef", "abcdee"));
    }

    #[test]
    fn test_package_id_length() {
        let mut fp = Fingerprint::new();
        fp.update_str("[settings]");
        assert_eq!(fp.finish_package_id().len(), PACKAGE_ID_LEN);
    }

    #[test]
    fn test_fingerprint_order_matters() {
        let a = {
            let mut fp = Fingerprint::new();
            fp.update_strs(["os=Linux", "arch=x86_64"]);
            fp.finish()
        };
        let b = {
            let mut fp = Fingerprint::new();
            fp.update_strs(["arch=x86_64", "os=Linux"]);
            fp.finish()
        };
        assert_ne!(a, b);
    }
}
