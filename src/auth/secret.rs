//! Secret wrapper that redacts credential material.

// self
use crate::_prelude::*;

/// Redacted secret wrapper keeping API keys and tokens out of logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretValue(String);
impl SecretValue {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` if the wrapped value is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl AsRef<str> for SecretValue {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl From<String> for SecretValue {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl From<&str> for SecretValue {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}
impl Debug for SecretValue {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SecretValue").field(&"<redacted>").finish()
	}
}
impl Display for SecretValue {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = SecretValue::new("super-secret");

		assert_eq!(format!("{secret:?}"), "SecretValue(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(secret.expose(), "super-secret");
	}

	#[test]
	fn serializes_transparently() {
		let secret = SecretValue::new("abc");
		let payload =
			serde_json::to_string(&secret).expect("SecretValue should serialize to JSON.");

		assert_eq!(payload, "\"abc\"");
	}
}
