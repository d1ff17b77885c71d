//! Transport primitives for token exchanges.
//!
//! [`ReqwestHttpClient`] centralizes the reqwest configuration shared by exchanges and
//! [`ResponseMetadata`] carries the status and retry hint used when classifying failures.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Metadata captured from the most recent auth endpoint response.
///
/// Additional metadata fields may be added in future releases, so downstream code
/// should construct values using field names instead of struct update syntax.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the auth endpoint.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}
impl ResponseMetadata {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Auth endpoints must answer token requests directly, so the default client never
/// follows redirects. Configure any custom [`ReqwestClient`] passed to
/// [`with_client`](Self::with_client) the same way.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

	/// Builds a client with redirects disabled and a 30 second request timeout.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.timeout(Self::DEFAULT_TIMEOUT)
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Debug for ReqwestHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ReqwestHttpClient").finish()
	}
}

#[cfg(feature = "reqwest")]
impl ResponseMetadata {
	pub(crate) fn from_response(response: &reqwest::Response) -> Self {
		Self { status: response.status().as_u16(), retry_after: parse_retry_after(response.headers()) }
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	#[test]
	fn retry_after_accepts_seconds_and_dates() {
		let mut headers = HeaderMap::new();

		assert_eq!(parse_retry_after(&headers), None);

		headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(7)));

		headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));

		assert_eq!(parse_retry_after(&headers), None);

		headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));

		assert_eq!(parse_retry_after(&headers), None);
	}

	#[test]
	fn success_range_is_2xx() {
		let ok = ResponseMetadata { status: 204, retry_after: None };
		let moved = ResponseMetadata { status: 302, retry_after: None };

		assert!(ok.is_success());
		assert!(!moved.is_success());
	}
}
