//! PKCE verifier and S256 challenge derivation.
//!
//! The verifier is 32 bytes from the OS CSPRNG encoded as unpadded base64url
//! (43 characters). The challenge is `BASE64URL(SHA256(verifier))`.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Random bytes drawn for every verifier.
pub const VERIFIER_BYTES: usize = 32;

/// Supported challenge methods. `plain` is deliberately absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeMethod {
    #[default]
    #[serde(rename = "S256")]
    S256,
}

impl ChallengeMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S256 => "S256",
        }
    }

    /// Parse the wire value, `None` for anything unsupported.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "S256" => Some(Self::S256),
            _ => None,
        }
    }
}

impl fmt::Display for ChallengeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verifier/challenge pair for one flow attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct PkceMaterial {
    verifier: String,
    challenge: String,
    method: ChallengeMethod,
}

impl PkceMaterial {
    /// Fresh material; call once per attempt and never reuse it.
    #[must_use]
    pub fn generate() -> Self {
        let verifier = generate_verifier();
        let challenge = derive_challenge(&verifier);

        Self {
            verifier,
            challenge,
            method: ChallengeMethod::S256,
        }
    }

    #[must_use]
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    #[must_use]
    pub const fn method(&self) -> ChallengeMethod {
        self.method
    }

    /// Consume the material, keeping only the verifier for the token exchange.
    #[must_use]
    pub fn into_verifier(self) -> String {
        self.verifier
    }
}

impl fmt::Debug for PkceMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkceMaterial")
            .field("verifier", &"[redacted]")
            .field("challenge", &self.challenge)
            .field("method", &self.method)
            .finish()
    }
}

/// Draw a new code verifier.
///
/// # Panics
///
/// Panics if the operating system random source fails; there is no way to
/// continue a PKCE flow without it.
#[must_use]
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; VERIFIER_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

/// Derive the S256 challenge for a verifier.
#[must_use]
pub fn derive_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    Base64UrlUnpadded::encode_string(&digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_url_safe(value: &str) -> bool {
        value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn verifier_is_url_safe_and_long_enough() {
        let verifier = generate_verifier();
        assert_eq!(verifier.len(), 43);
        assert!(is_url_safe(&verifier), "not url-safe: {verifier}");
    }

    #[test]
    fn verifiers_do_not_repeat() {
        assert_ne!(generate_verifier(), generate_verifier());
    }

    #[test]
    fn challenge_matches_rfc7636_vector() {
        assert_eq!(
            derive_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn challenge_is_deterministic() {
        let verifier = generate_verifier();
        assert_eq!(derive_challenge(&verifier), derive_challenge(&verifier));
        assert_eq!(
            derive_challenge("hello"),
            "LPJNul-wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ"
        );
    }

    #[test]
    fn generated_material_is_consistent() {
        let material = PkceMaterial::generate();
        assert_eq!(material.method(), ChallengeMethod::S256);
        assert_eq!(material.challenge(), derive_challenge(material.verifier()));
        assert!(is_url_safe(material.challenge()));
    }

    #[test]
    fn debug_redacts_verifier() {
        let material = PkceMaterial::generate();
        let debug = format!("{material:?}");
        assert!(!debug.contains(material.verifier()));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn method_parse_rejects_plain() {
        assert_eq!(ChallengeMethod::parse("S256"), Some(ChallengeMethod::S256));
        assert_eq!(ChallengeMethod::parse("plain"), None);
        assert_eq!(ChallengeMethod::parse("s256"), None);
    }
}
