//! Short-lived session tokens obtained from a token exchange, plus their builder.

// self
use crate::{_prelude::*, auth::SecretValue};

/// Current lifecycle status for a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is not yet valid because the issued-at instant is in the future.
	Pending,
	/// Token is currently valid.
	Active,
	/// Token exceeded its expiry instant.
	Expired,
}

/// Errors produced by [`TokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenBuilderError {
	/// Issued when no (or an empty) access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no (or an empty) refresh token value was provided.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Access/refresh token pair with its validity window.
///
/// Lives only as long as the provisioning invocation that requested it unless a
/// [`CachePolicy`](crate::exchange::CachePolicy) explicitly keeps it.
#[derive(Clone, Serialize, Deserialize)]
pub struct Token {
	/// Access token secret; callers must avoid logging it.
	pub access_token: SecretValue,
	/// Refresh token secret.
	pub refresh_token: SecretValue,
	/// Issued-at instant recorded when the response arrived.
	pub issued_at: OffsetDateTime,
	/// Expiry instant reported by the auth endpoint.
	pub expires_at: OffsetDateTime,
}
impl Token {
	/// Returns a builder for constructing tokens.
	pub fn builder() -> TokenBuilder {
		TokenBuilder::default()
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if instant < self.issued_at {
			return TokenStatus::Pending;
		}
		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}

		TokenStatus::Active
	}

	/// Convenience helper that checks the status using the current UTC instant.
	pub fn status(&self) -> TokenStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Returns `true` if the token expires within `window` of `instant`.
	pub fn expires_within(&self, window: Duration, instant: OffsetDateTime) -> bool {
		self.is_expired_at(instant) || self.expires_at - instant <= window
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`Token`].
#[derive(Clone, Debug, Default)]
pub struct TokenBuilder {
	access_token: Option<SecretValue>,
	refresh_token: Option<SecretValue>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenBuilder {
	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(SecretValue::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(SecretValue::new(token));

		self
	}

	/// Consumes the builder and produces a [`Token`].
	pub fn build(self) -> Result<Token, TokenBuilderError> {
		let access_token = self
			.access_token
			.filter(|value| !value.is_empty())
			.ok_or(TokenBuilderError::MissingAccessToken)?;
		let refresh_token = self
			.refresh_token
			.filter(|value| !value.is_empty())
			.ok_or(TokenBuilderError::MissingRefreshToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(TokenBuilderError::MissingExpiry),
		};

		Ok(Token { access_token, refresh_token, issued_at, expires_at })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn status_transitions_cover_all_states() {
		let token = Token::builder()
			.access_token("access")
			.refresh_token("refresh")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_at(macros::datetime!(2025-01-01 01:00 UTC))
			.build()
			.expect("Token builder should succeed for status transitions.");

		assert_eq!(token.status_at(macros::datetime!(2024-12-31 23:59 UTC)), TokenStatus::Pending);
		assert_eq!(token.status_at(macros::datetime!(2025-01-01 00:30 UTC)), TokenStatus::Active);
		assert_eq!(token.status_at(macros::datetime!(2025-01-01 01:00 UTC)), TokenStatus::Expired);
	}

	#[test]
	fn builder_handles_relative_expiry() {
		let token = Token::builder()
			.access_token("secret")
			.refresh_token("refresh")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::minutes(30))
			.build()
			.expect("Token builder should support relative expiry calculations.");

		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 00:30 UTC));
		assert!(token.expires_within(
			Duration::minutes(5),
			macros::datetime!(2025-01-01 00:26 UTC)
		));
		assert!(!token.expires_within(
			Duration::minutes(5),
			macros::datetime!(2025-01-01 00:10 UTC)
		));
	}

	#[test]
	fn builder_rejects_missing_parts() {
		let missing_refresh = Token::builder()
			.access_token("access")
			.refresh_token("")
			.expires_in(Duration::hours(1))
			.build()
			.expect_err("Empty refresh tokens must be rejected.");

		assert_eq!(missing_refresh, TokenBuilderError::MissingRefreshToken);

		let missing_expiry = Token::builder()
			.access_token("access")
			.refresh_token("refresh")
			.build()
			.expect_err("Tokens without expiry must be rejected.");

		assert_eq!(missing_expiry, TokenBuilderError::MissingExpiry);
	}

	#[test]
	fn debug_redacts_secrets() {
		let token = Token::builder()
			.access_token("access-secret")
			.refresh_token("refresh-secret")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token builder should succeed.");
		let rendered = format!("{token:?}");

		assert!(!rendered.contains("access-secret"));
		assert!(!rendered.contains("refresh-secret"));
	}
}
