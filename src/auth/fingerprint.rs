//! Stable, non-reversible fingerprints for API keys.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::SecretValue};

/// Base64 (no padding) SHA-256 digest of an API key.
///
/// Used wherever a key must be identified (cache keys, logs) without keeping the key itself.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyFingerprint(String);
impl KeyFingerprint {
	/// Computes the fingerprint of the provided secret.
	pub fn of(secret: &SecretValue) -> Self {
		let mut hasher = Sha256::new();

		hasher.update(secret.expose().as_bytes());

		Self(STANDARD_NO_PAD.encode(hasher.finalize()))
	}

	/// Returns the encoded digest.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Debug for KeyFingerprint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "KeyFingerprint({})", self.0)
	}
}
impl Display for KeyFingerprint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
