//! Strongly typed identifiers for credential schemas, fields, and environment variables.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

// Shared checks applied to each identifier kind.
#[derive(Clone, Copy, Debug)]
struct Rules {
	kind: &'static str,
	max_len: usize,
	// Names exported into a process environment cannot start with a digit.
	env_name: bool,
}
impl Rules {
	const fn plain(kind: &'static str) -> Self {
		Self { kind, max_len: IDENTIFIER_MAX_LEN, env_name: false }
	}

	const fn env(kind: &'static str) -> Self {
		Self { kind, max_len: IDENTIFIER_MAX_LEN, env_name: true }
	}

	fn check(self, view: &str) -> Result<(), IdentifierError> {
		let kind = self.kind;

		if view.is_empty() {
			return Err(IdentifierError::Empty { kind });
		}
		if view.chars().any(char::is_whitespace) {
			return Err(IdentifierError::ContainsWhitespace { kind });
		}
		if view.contains(['=', '\0']) {
			return Err(IdentifierError::ReservedCharacter { kind });
		}
		if self.env_name && view.starts_with(|c: char| c.is_ascii_digit()) {
			return Err(IdentifierError::LeadingDigit { kind });
		}
		if view.len() > self.max_len {
			return Err(IdentifierError::TooLong { kind, max: self.max_len });
		}

		Ok(())
	}
}

macro_rules! identifier {
	($(#[$meta:meta])* $name:ident => $rules:expr) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			const RULES: Rules = $rules;

			/// Validates `value` and wraps it.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				Self::RULES.check(view)?;

				Ok(Self(view.to_owned()))
			}

			/// Returns the identifier as a string slice.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				self.as_str()
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				self.as_str()
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				self.as_str()
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::RULES.check(&value)?;

				Ok(Self(value))
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.debug_tuple(stringify!($name)).field(&self.0).finish()
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (credential, field, env var).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (credential, field, env var).
		kind: &'static str,
	},
	/// The identifier contains `=` or a NUL byte, which no environment can represent.
	#[error("{kind} identifier contains a reserved character.")]
	ReservedCharacter {
		/// Kind of identifier (credential, field, env var).
		kind: &'static str,
	},
	/// Environment variable names cannot start with a digit.
	#[error("{kind} identifier starts with a digit.")]
	LeadingDigit {
		/// Kind of identifier (credential, field, env var).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (credential, field, env var).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

identifier! {
	/// Name of a credential type (e.g., `api_key`).
	CredentialName => Rules::plain("Credential")
}
identifier! {
	/// Name of a field within a credential type.
	FieldName => Rules::plain("Field")
}
identifier! {
	/// Case-sensitive environment variable name.
	EnvVarName => Rules::env("EnvVar")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_validate() {
		assert!(FieldName::new(" api_key").is_err(), "Leading whitespace must be rejected.");
		assert!(FieldName::new("api_key ").is_err(), "Trailing whitespace must be rejected.");

		let field = FieldName::new("api_key").expect("Field fixture should be considered valid.");

		assert_eq!(field.as_ref(), "api_key");
		assert!(CredentialName::new("").is_err());
		assert!(EnvVarName::new("IBMCLOUD_API_KEY=x").is_err());
	}

	#[test]
	fn env_var_names_are_case_sensitive() {
		let upper = EnvVarName::new("SERVICE_HOME").expect("Upper-case name should be valid.");
		let lower = EnvVarName::new("service_home").expect("Lower-case name should be valid.");

		assert_ne!(upper, lower);
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let field: FieldName =
			serde_json::from_str("\"APIKey\"").expect("Field should deserialize successfully.");

		assert_eq!(field.as_ref(), "APIKey");
		assert!(serde_json::from_str::<FieldName>("\"with space\"").is_err());
	}

	#[test]
	fn length_limits() {
		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		FieldName::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(FieldName::new(&too_long).is_err());
	}

	#[test]
	fn env_var_names_reject_leading_digits() {
		assert_eq!(
			EnvVarName::new("1PASSWORD_TOKEN"),
			Err(IdentifierError::LeadingDigit { kind: "EnvVar" }),
		);
		assert!(EnvVarName::new("_1PASSWORD").is_ok());
		assert!(FieldName::new("1st_key").is_ok(), "Field names may start with a digit.");
		assert!(serde_json::from_str::<EnvVarName>("\"9LIVES\"").is_err());
	}

	#[test]
	fn debug_output_names_the_type() {
		let name = EnvVarName::new("SERVICE_HOME").expect("Env var fixture should be valid.");

		assert_eq!(format!("{name:?}"), "EnvVarName(\"SERVICE_HOME\")");
		assert_eq!(name.as_str(), "SERVICE_HOME");
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: BTreeMap<FieldName, u8> = BTreeMap::from_iter([(
			FieldName::new("api_key").expect("Field used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("api_key"), Some(&7));
	}
}
