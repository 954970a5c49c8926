//! Canonical strings and digests for gateway hashes
//!
//! Every bank signs a canonical string built from an ordered list of field
//! values with the store key appended as the last field, digests it and
//! base64 encodes the result. Banks differ in how the list is joined and in
//! the digest; a [`HashRecipe`] names both.
//!
//! The store key is part of the hashed message rather than an HMAC key.
//! The bank computes the same construction on its side, so it has to stay
//! byte-for-byte as it is.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::Sha1;
use sha2::{Digest, Sha512};

/// How field values are joined into the canonical string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Canonicalization {
    /// Values concatenated with no separator; positions are fixed by the protocol
    Concatenated,
    /// Values escaped and joined with `|`
    PipeEscaped,
}

impl Canonicalization {
    /// Build the canonical string; missing fields must be passed as ""
    pub fn canonicalize<'a, I>(self, values: I, store_key: &str) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        match self {
            Canonicalization::Concatenated => {
                let mut canonical: String = values.into_iter().collect();
                canonical.push_str(store_key);
                canonical
            }
            Canonicalization::PipeEscaped => {
                let mut parts: Vec<String> = values.into_iter().map(escape_pipe_value).collect();
                parts.push(escape_pipe_value(store_key));
                parts.join("|")
            }
        }
    }
}

/// Escape `\` and `|` so a value cannot shift the field boundaries
pub fn escape_pipe_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('|', "\\|")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha512,
}

impl HashAlgorithm {
    /// Base64 digest of the UTF-8 bytes of `message`
    pub fn digest_base64(self, message: &str) -> String {
        match self {
            HashAlgorithm::Sha1 => STANDARD.encode(Sha1::digest(message.as_bytes())),
            HashAlgorithm::Sha512 => STANDARD.encode(Sha512::digest(message.as_bytes())),
        }
    }
}

/// A bank's signing recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashRecipe {
    pub canonicalization: Canonicalization,
    pub algorithm: HashAlgorithm,
}

impl HashRecipe {
    /// Classic NestPay: concatenated fields, SHA-1
    pub const NESTPAY: HashRecipe = HashRecipe {
        canonicalization: Canonicalization::Concatenated,
        algorithm: HashAlgorithm::Sha1,
    };

    /// NestPay hash version 3: escaped pipe-joined fields, SHA-512
    pub const NESTPAY_VER3: HashRecipe = HashRecipe {
        canonicalization: Canonicalization::PipeEscaped,
        algorithm: HashAlgorithm::Sha512,
    };

    pub fn sign<'a, I>(&self, values: I, store_key: &str) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let canonical = self.canonicalization.canonicalize(values, store_key);
        self.algorithm.digest_base64(&canonical)
    }

    /// Recompute the hash and compare it with the one the bank supplied
    pub fn verify<'a, I>(&self, values: I, store_key: &str, provided: Option<&str>) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(provided) = provided else {
            return false;
        };
        signatures_match(&self.sign(values, store_key), provided)
    }
}

/// Exact, case-sensitive comparison that does not stop at the first difference
pub fn signatures_match(expected: &str, provided: &str) -> bool {
    if expected.len() != provided.len() {
        return false;
    }

    expected
        .as_bytes()
        .iter()
        .zip(provided.as_bytes().iter())
        .fold(0, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concatenated_keeps_empty_slots() {
        let canonical =
            Canonicalization::Concatenated.canonicalize(["a", "", "c"], "KEY");
        assert_eq!(canonical, "acKEY");
    }

    #[test]
    fn test_pipe_escaped_escapes_separators_and_backslashes() {
        let canonical =
            Canonicalization::PipeEscaped.canonicalize(["a|b", "c\\d", ""], "k|y");
        assert_eq!(canonical, "a\\|b|c\\\\d||k\\|y");
    }

    #[test]
    fn test_sha1_digest_known_vector() {
        assert_eq!(
            HashAlgorithm::Sha1.digest_base64("abc"),
            "qZk+NkcGgWq6PiVxeFDCbJzQ2J0="
        );
    }

    #[test]
    fn test_sha512_digest_length() {
        // 64 bytes encode to 88 base64 characters
        assert_eq!(HashAlgorithm::Sha512.digest_base64("abc").len(), 88);
    }

    #[test]
    fn test_verify_accepts_own_signature_only() {
        let recipe = HashRecipe::NESTPAY;
        let hash = recipe.sign(["700655000200", "ORD1"], "TRPS0200");

        assert!(recipe.verify(["700655000200", "ORD1"], "TRPS0200", Some(&hash)));
        assert!(!recipe.verify(["700655000200", "ORD2"], "TRPS0200", Some(&hash)));
        assert!(!recipe.verify(["700655000200", "ORD1"], "OTHER", Some(&hash)));
        assert!(!recipe.verify(["700655000200", "ORD1"], "TRPS0200", None));
    }

    #[test]
    fn test_signatures_match_is_case_sensitive() {
        assert!(signatures_match("AbC=", "AbC="));
        assert!(!signatures_match("AbC=", "abc="));
        assert!(!signatures_match("AbC=", "AbC"));
    }
}
