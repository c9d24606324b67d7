//! SHASIGN computation for outbound ePDQ requests.
//!
//! The gateway rejects any payload whose signature does not match its own
//! recomputation, so the canonicalization here has to be reproduced
//! bit-for-bit: keys sorted in plain byte order, each pair rendered as
//! `KEY=VALUE<passphrase>` and concatenated with no delimiter, then hashed
//! and upper-cased.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Field name the gateway expects the signature under. Always excluded from
/// the canonicalization input.
pub const SIGNATURE_FIELD: &str = "SHASIGN";

/// Compute the upper-case hex SHASIGN over the given field map.
///
/// Empty values are skipped (the gateway omits empty parameters from its own
/// reference computation), as is the signature field itself.
pub fn sha_sign(fields: &BTreeMap<String, String>, passphrase: &str) -> String {
    let mut input = String::new();
    for (key, value) in fields {
        if key == SIGNATURE_FIELD || value.is_empty() {
            continue;
        }
        input.push_str(key);
        input.push('=');
        input.push_str(value);
        input.push_str(passphrase);
    }
    hex::encode(Sha256::digest(input.as_bytes())).to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn reference_digest(input: &str) -> String {
        hex::encode(Sha256::digest(input.as_bytes())).to_uppercase()
    }

    #[test]
    fn matches_reference_canonicalization() {
        let fields = fields(&[
            ("ORDERID", "b"),
            ("ALIAS", "a"),
            ("ALIASOPERATION", "BYPSP"),
        ]);
        // Sorted bytewise: ALIAS < ALIASOPERATION < ORDERID.
        let expected = reference_digest("ALIAS=adummyALIASOPERATION=BYPSPdummyORDERID=bdummy");
        assert_eq!(sha_sign(&fields, "dummy"), expected);
    }

    #[test]
    fn output_is_uppercase_hex() {
        let signature = sha_sign(&fields(&[("A", "1")]), "p");
        assert_eq!(signature.len(), 64);
        assert!(signature
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn signature_field_is_excluded_from_input() {
        let without = fields(&[("ALIAS", "a"), ("ORDERID", "b")]);
        let mut with = without.clone();
        with.insert(SIGNATURE_FIELD.to_string(), "STALE".to_string());
        assert_eq!(sha_sign(&with, "dummy"), sha_sign(&without, "dummy"));
    }

    #[test]
    fn empty_values_are_excluded_from_input() {
        let without = fields(&[("ALIAS", "a")]);
        let mut with = without.clone();
        with.insert("NCERROR".to_string(), String::new());
        assert_eq!(sha_sign(&with, "dummy"), sha_sign(&without, "dummy"));
    }

    #[test]
    fn ordering_is_bytewise_not_locale_aware() {
        // "Z" (0x5a) sorts before "a" (0x61) in byte order.
        let fields = fields(&[("a", "2"), ("Z", "1")]);
        let expected = reference_digest("Z=1passa=2pass");
        assert_eq!(sha_sign(&fields, "pass"), expected);
    }

    #[test]
    fn passphrase_changes_signature() {
        let fields = fields(&[("ALIAS", "a")]);
        assert_ne!(sha_sign(&fields, "one"), sha_sign(&fields, "two"));
    }
}
