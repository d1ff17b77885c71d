//! Token exchange: converting a long-lived API key into a short-lived token pair.
//!
//! [`TokenExchange`] is the seam provisioners call through; it performs exactly one
//! request per invocation and never retries. Failures are split so callers can decide:
//! transport problems are retryable ([`Error::is_retryable`]), a rejected key is an
//! [`AuthError`], and anything the broker cannot parse is a [`ProtocolError`].
//! [`CachePolicy`] optionally wraps an exchange with a token cache.

pub mod cache;
#[cfg(feature = "reqwest")] pub mod client;

pub use cache::*;
#[cfg(feature = "reqwest")] pub use client::*;

// self
use crate::{
	_prelude::*,
	auth::{SecretValue, Token},
	error::{AuthError, ConfigError, ProtocolError, TransportError},
	http::ResponseMetadata,
};

/// Boxed future returned by [`TokenExchange::exchange`].
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<Token>> + 'a + Send>>;

/// Converts an API key into a [`Token`] against an auth endpoint.
pub trait TokenExchange
where
	Self: Debug + Send + Sync,
{
	/// Performs one exchange request.
	fn exchange<'a>(&'a self, api_key: &'a SecretValue, endpoint: &'a AuthEndpoint)
	-> ExchangeFuture<'a>;
}

/// HTTPS URL of a token exchange service.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AuthEndpoint(Url);
impl AuthEndpoint {
	/// Wraps a URL, rejecting anything but HTTPS.
	pub fn new(url: Url) -> Result<Self, ConfigError> {
		if url.scheme() != "https" {
			return Err(ConfigError::InsecureEndpoint { url: url.to_string() });
		}

		Ok(Self(url))
	}

	/// Parses and validates an endpoint string.
	pub fn parse(raw: &str) -> Result<Self, ConfigError> {
		Self::new(Url::parse(raw)?)
	}

	/// Returns the underlying URL.
	pub fn url(&self) -> &Url {
		&self.0
	}

	/// Returns the endpoint as a string slice.
	pub fn as_str(&self) -> &str {
		self.0.as_str()
	}
}
impl AsRef<Url> for AuthEndpoint {
	fn as_ref(&self) -> &Url {
		&self.0
	}
}
impl Debug for AuthEndpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AuthEndpoint").field(&self.0.as_str()).finish()
	}
}
impl Display for AuthEndpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.0.as_str())
	}
}
impl FromStr for AuthEndpoint {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

#[derive(Deserialize)]
struct TokenResponse {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expiration: Option<i64>,
	#[serde(default)]
	expires_in: Option<i64>,
}

#[derive(Default, Deserialize)]
struct ErrorBody {
	#[serde(default, rename = "errorCode")]
	error_code: Option<String>,
	#[serde(default, rename = "errorMessage")]
	error_message: Option<String>,
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}

/// Condensed view of an auth endpoint error body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ErrorSummary {
	pub(crate) code: Option<String>,
	pub(crate) message: Option<String>,
	pub(crate) preview: Option<String>,
}
impl ErrorSummary {
	const BODY_PREVIEW_LIMIT: usize = 256;

	pub(crate) fn from_body(body: &[u8]) -> Self {
		match serde_json::from_slice::<ErrorBody>(body) {
			Ok(parsed) => Self {
				code: parsed.error_code.or(parsed.error),
				message: parsed.error_message.or(parsed.error_description),
				preview: None,
			},
			Err(_) => {
				let text = String::from_utf8_lossy(body);
				let text = text.trim();

				Self {
					code: None,
					message: None,
					preview: (!text.is_empty()).then(|| truncate_preview(text)),
				}
			},
		}
	}

	fn is_transient(&self) -> bool {
		[self.code.as_deref(), self.message.as_deref(), self.preview.as_deref()]
			.into_iter()
			.flatten()
			.map(str::to_ascii_lowercase)
			.any(|text| text.contains("temporarily_unavailable") || text.contains("server_error"))
	}

	fn describe(&self, status: u16) -> String {
		match (&self.code, &self.message, &self.preview) {
			(Some(code), Some(message), _) => format!("{code}: {message}"),
			(None, Some(message), _) => message.clone(),
			(Some(code), None, _) => code.clone(),
			(None, None, Some(preview)) => preview.clone(),
			(None, None, None) => format!("HTTP {status}"),
		}
	}
}

fn truncate_preview(body: &str) -> String {
	if body.chars().count() <= ErrorSummary::BODY_PREVIEW_LIMIT {
		return body.to_owned();
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= ErrorSummary::BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}
		buf.push(ch);
	}

	buf
}

/// Maps a non-2xx response onto the broker taxonomy.
pub(crate) fn classify_failure(meta: &ResponseMetadata, body: &[u8]) -> Error {
	let summary = ErrorSummary::from_body(body);
	let message = summary.describe(meta.status);
	let upstream = |message| TransportError::Upstream {
		message,
		status: meta.status,
		retry_after: meta.retry_after,
	};

	match meta.status {
		400 | 401 | 403 if summary.is_transient() => upstream(message).into(),
		400 | 401 | 403 =>
			AuthError { status: Some(meta.status), error_code: summary.code, reason: message }.into(),
		429 | 500..=599 => upstream(message).into(),
		status => ProtocolError::UnexpectedStatus { status, message }.into(),
	}
}

/// Parses a 2xx token response body observed at `now`.
pub(crate) fn parse_token_response(
	meta: &ResponseMetadata,
	body: &[u8],
	now: OffsetDateTime,
) -> Result<Token> {
	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let parsed: TokenResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| ProtocolError::ResponseParse { source, status: Some(meta.status) })?;
	let builder = Token::builder()
		.access_token(parsed.access_token)
		.refresh_token(parsed.refresh_token.unwrap_or_default())
		.issued_at(now);
	let builder = match (parsed.expiration, parsed.expires_in) {
		(Some(expiration), _) => {
			let expires_at = OffsetDateTime::from_unix_timestamp(expiration)
				.map_err(|_| ProtocolError::ExpiryOutOfRange)?;

			if expires_at <= now {
				return Err(ProtocolError::NonPositiveExpiry.into());
			}

			builder.expires_at(expires_at)
		},
		(None, Some(secs)) if secs <= 0 => return Err(ProtocolError::NonPositiveExpiry.into()),
		(None, Some(secs)) => {
			let expires_at = now
				.checked_add(Duration::seconds(secs))
				.ok_or(ProtocolError::ExpiryOutOfRange)?;

			builder.expires_at(expires_at)
		},
		(None, None) => return Err(ProtocolError::MissingExpiry.into()),
	};

	let token = builder.build().map_err(ProtocolError::from)?;

	Ok(token)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn meta(status: u16) -> ResponseMetadata {
		ResponseMetadata { status, retry_after: None }
	}

	#[test]
	fn endpoints_must_use_https() {
		let err = AuthEndpoint::parse("http://iam.example.com/identity/token")
			.expect_err("Plain HTTP endpoints must be rejected.");

		assert!(matches!(err, ConfigError::InsecureEndpoint { .. }));
		assert!(matches!(AuthEndpoint::parse("not a url"), Err(ConfigError::InvalidEndpoint(_))));

		let endpoint = AuthEndpoint::parse("https://iam.example.com/identity/token")
			.expect("HTTPS endpoint should parse.");

		assert_eq!(endpoint.as_str(), "https://iam.example.com/identity/token");
	}

	#[test]
	fn token_response_accepts_absolute_and_relative_expiry() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let absolute = parse_token_response(
			&meta(200),
			br#"{"access_token":"a","refresh_token":"r","expiration":1735693200}"#,
			now,
		)
		.expect("Absolute expiry should parse.");

		assert_eq!(absolute.expires_at, macros::datetime!(2025-01-01 01:00 UTC));

		let relative = parse_token_response(
			&meta(200),
			br#"{"access_token":"a","refresh_token":"r","expires_in":600}"#,
			now,
		)
		.expect("Relative expiry should parse.");

		assert_eq!(relative.expires_at, macros::datetime!(2025-01-01 00:10 UTC));
		assert_eq!(relative.issued_at, now);
	}

	#[test]
	fn token_response_shape_errors_are_protocol_errors() {
		let now = OffsetDateTime::now_utc();
		let cases: [(&[u8], fn(&Error) -> bool); 5] = [
			(br#"{"access_token":"a","expires_in":600}"#, |e| {
				matches!(e, Error::Protocol(ProtocolError::TokenBuild(_)))
			}),
			(br#"{"access_token":"a","refresh_token":"r"}"#, |e| {
				matches!(e, Error::Protocol(ProtocolError::MissingExpiry))
			}),
			(br#"{"access_token":"a","refresh_token":"r","expires_in":0}"#, |e| {
				matches!(e, Error::Protocol(ProtocolError::NonPositiveExpiry))
			}),
			(br#"{"access_token":"a","refresh_token":"r","expiration":1}"#, |e| {
				matches!(e, Error::Protocol(ProtocolError::NonPositiveExpiry))
			}),
			(br#"{"access_token":7}"#, |e| {
				matches!(e, Error::Protocol(ProtocolError::ResponseParse { .. }))
			}),
		];

		for (body, check) in cases {
			let err = parse_token_response(&meta(200), body, now)
				.expect_err("Malformed token responses must fail.");

			assert!(check(&err), "Unexpected error: {err:?}.");
			assert!(!err.is_retryable());
		}
	}

	#[test]
	fn parse_errors_report_the_json_path() {
		let err = parse_token_response(&meta(200), br#"{"access_token":7}"#, OffsetDateTime::now_utc())
			.expect_err("Wrong types must fail.");
		match &err {
			Error::Protocol(ProtocolError::ResponseParse { source, status }) => {
				assert_eq!(source.path().to_string(), "access_token");
				assert_eq!(*status, Some(200));
			},
			other => panic!("Expected a parse error, got {other:?}."),
		}
	}

	#[test]
	fn failures_are_classified_by_status_and_body() {
		let expired = classify_failure(
			&meta(400),
			br#"{"errorCode":"BXNIM0415E","errorMessage":"Provided API key could not be found."}"#,
		);

		match expired {
			Error::Auth(err) => {
				assert_eq!(err.error_code.as_deref(), Some("BXNIM0415E"));
				assert_eq!(err.reason, "BXNIM0415E: Provided API key could not be found.");
			},
			other => panic!("Expected an auth error, got {other:?}."),
		}

		let throttled = classify_failure(
			&ResponseMetadata { status: 429, retry_after: Some(Duration::seconds(3)) },
			b"slow down",
		);

		assert!(matches!(
			throttled,
			Error::Transport(TransportError::Upstream { status: 429, retry_after: Some(_), .. })
		));

		let transient = classify_failure(&meta(400), br#"{"error":"temporarily_unavailable"}"#);

		assert!(transient.is_retryable());

		let odd = classify_failure(&meta(302), b"");

		assert!(matches!(odd, Error::Protocol(ProtocolError::UnexpectedStatus { status: 302, .. })));
	}

	#[test]
	fn body_previews_are_bounded() {
		let body = "x".repeat(1024);
		let summary = ErrorSummary::from_body(body.as_bytes());
		let preview = summary.preview.expect("Plain-text bodies should produce a preview.");

		assert_eq!(preview.chars().count(), ErrorSummary::BODY_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
	}
}
