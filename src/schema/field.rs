//! Field specifications and value-shape constraints.

// self
use crate::{_prelude::*, auth::FieldName, schema::SchemaError};

/// Semantic role of a field; a credential type holds at most one field per role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
	/// Long-lived API key that can be exchanged for session tokens.
	ApiKey,
	/// Bearer or session token.
	Token,
	/// Account or user name.
	Username,
	/// Password or passphrase.
	Password,
	/// Service host or endpoint.
	Endpoint,
	/// Region, zone, or other deployment locator.
	Region,
}
impl FieldRole {
	/// Returns a stable label suitable for messages and logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			FieldRole::ApiKey => "api_key",
			FieldRole::Token => "token",
			FieldRole::Username => "username",
			FieldRole::Password => "password",
			FieldRole::Endpoint => "endpoint",
			FieldRole::Region => "region",
		}
	}
}
impl Display for FieldRole {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Character classes a field value may draw from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Charset {
	/// ASCII `A-Z`.
	pub uppercase: bool,
	/// ASCII `a-z`.
	pub lowercase: bool,
	/// ASCII `0-9`.
	pub digits: bool,
	/// ASCII punctuation.
	pub symbols: bool,
	/// Additional characters allowed outside the classes above.
	pub specific: Vec<char>,
}
impl Charset {
	/// Upper-case letters, lower-case letters, and digits.
	pub fn alphanumeric() -> Self {
		Self { uppercase: true, lowercase: true, digits: true, ..Self::default() }
	}

	/// Adds characters allowed in addition to the enabled classes.
	pub fn with_specific(mut self, chars: impl IntoIterator<Item = char>) -> Self {
		self.specific.extend(chars);

		self
	}

	/// Returns `true` when no class and no specific character is allowed.
	pub fn is_unrestricted(&self) -> bool {
		!self.uppercase && !self.lowercase && !self.digits && !self.symbols && self.specific.is_empty()
	}

	/// Returns `true` if `ch` is allowed.
	pub fn allows(&self, ch: char) -> bool {
		(self.uppercase && ch.is_ascii_uppercase())
			|| (self.lowercase && ch.is_ascii_lowercase())
			|| (self.digits && ch.is_ascii_digit())
			|| (self.symbols && ch.is_ascii_punctuation())
			|| self.specific.contains(&ch)
	}
}

/// Shape constraints for a field value.
///
/// An unrestricted [`Charset`] places no constraint on characters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueComposition {
	/// Exact character count, when fixed.
	pub length: Option<usize>,
	/// Required prefix, when the service brands its keys.
	pub prefix: Option<String>,
	/// Allowed characters.
	pub charset: Charset,
}
impl ValueComposition {
	/// Creates a composition with a fixed length and charset.
	pub fn fixed(length: usize, charset: Charset) -> Self {
		Self { length: Some(length), prefix: None, charset }
	}

	/// Sets the required prefix.
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = Some(prefix.into());

		self
	}

	/// Replaces the allowed characters.
	pub fn with_charset(mut self, charset: Charset) -> Self {
		self.charset = charset;

		self
	}

	/// Checks `value` for the provided field against the composition.
	pub fn check(&self, field: &FieldName, value: &str) -> Result<(), SchemaError> {
		if let Some(expected) = self.length {
			let actual = value.chars().count();

			if actual != expected {
				return Err(SchemaError::InvalidLength {
					field: field.to_string(),
					expected,
					actual,
				});
			}
		}

		let body = match self.prefix.as_deref() {
			Some(prefix) => value.strip_prefix(prefix).ok_or_else(|| SchemaError::MissingPrefix {
				field: field.to_string(),
				prefix: prefix.to_owned(),
			})?,
			None => value,
		};

		if self.charset.is_unrestricted() {
			return Ok(());
		}
		if let Some(position) = body.chars().position(|ch| !self.charset.allows(ch)) {
			let offset = self.prefix.as_deref().map(|p| p.chars().count()).unwrap_or(0);

			return Err(SchemaError::InvalidCharacter {
				field: field.to_string(),
				position: offset + position,
			});
		}

		Ok(())
	}
}

/// Static description of a single credential field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
	/// Field name, unique within a credential type.
	pub name: FieldName,
	/// Semantic role, if any.
	pub role: Option<FieldRole>,
	/// Whether the value must be treated as a secret.
	pub secret: bool,
	/// Whether the field may be omitted.
	pub optional: bool,
	/// Value-shape constraint.
	pub composition: Option<ValueComposition>,
}
impl FieldSpec {
	/// Creates a required, non-secret field with no role or composition.
	pub fn new(name: FieldName) -> Self {
		Self { name, role: None, secret: false, optional: false, composition: None }
	}

	/// Marks the field as secret.
	pub fn secret(mut self) -> Self {
		self.secret = true;

		self
	}

	/// Marks the field as optional.
	pub fn optional(mut self) -> Self {
		self.optional = true;

		self
	}

	/// Assigns a semantic role.
	pub fn role(mut self, role: FieldRole) -> Self {
		self.role = Some(role);

		self
	}

	/// Attaches a value-shape constraint.
	pub fn composition(mut self, composition: ValueComposition) -> Self {
		self.composition = Some(composition);

		self
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn field() -> FieldName {
		FieldName::new("api_key").expect("Field fixture should be valid.")
	}

	#[test]
	fn composition_checks_length_and_charset() {
		let composition = ValueComposition::fixed(4, Charset::alphanumeric());

		composition.check(&field(), "aZ09").expect("Alphanumeric value should pass.");

		let err = composition.check(&field(), "aZ0").expect_err("Short value must fail.");

		assert!(matches!(err, SchemaError::InvalidLength { expected: 4, actual: 3, .. }));

		let err = composition.check(&field(), "aZ-9").expect_err("Symbols must be rejected.");

		assert!(matches!(err, SchemaError::InvalidCharacter { position: 2, .. }));
	}

	#[test]
	fn composition_checks_prefix() {
		let composition = ValueComposition::default()
			.with_prefix("sk-")
			.with_charset(Charset::alphanumeric());

		composition.check(&field(), "sk-abc123").expect("Prefixed value should pass.");

		let err = composition.check(&field(), "pk-abc123").expect_err("Wrong prefix must fail.");

		assert!(matches!(err, SchemaError::MissingPrefix { .. }));

		let err = composition.check(&field(), "sk-ab_c").expect_err("Underscore must fail.");

		assert!(matches!(err, SchemaError::InvalidCharacter { position: 5, .. }));
	}

	#[test]
	fn unrestricted_charset_accepts_anything() {
		let composition = ValueComposition::default();

		composition.check(&field(), "any thing/goes").expect("Unrestricted charset should pass.");
	}

	#[test]
	fn specific_characters_extend_classes() {
		let charset = Charset { digits: true, ..Charset::default() }.with_specific(['-']);

		assert!(charset.allows('-'));
		assert!(charset.allows('7'));
		assert!(!charset.allows('a'));
	}
}
