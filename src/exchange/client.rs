//! Reqwest-backed [`TokenExchange`] speaking the API-key grant.

// crates.io
use reqwest::header::{ACCEPT, HeaderValue};
// self
use crate::{
	_prelude::*,
	auth::{SecretValue, Token},
	error::{ConfigError, TransportError},
	exchange::{self, AuthEndpoint, ExchangeFuture, TokenExchange},
	http::{ReqwestHttpClient, ResponseMetadata},
};

/// Grant type sent when none is configured.
pub const DEFAULT_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Exchanges API keys by posting a form to the auth endpoint.
///
/// Each call issues exactly one `POST` with `grant_type` and `apikey` fields and
/// classifies the response; retries are left to the caller.
#[derive(Clone, Debug)]
pub struct ReqwestTokenExchange {
	http_client: ReqwestHttpClient,
	grant_type: String,
}
impl ReqwestTokenExchange {
	/// Builds an exchange over a fresh [`ReqwestHttpClient`].
	pub fn new() -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(ReqwestHttpClient::new()?))
	}

	/// Builds an exchange over a caller-supplied client.
	pub fn with_http_client(http_client: ReqwestHttpClient) -> Self {
		Self { http_client, grant_type: DEFAULT_GRANT_TYPE.into() }
	}

	/// Overrides the `grant_type` form value.
	pub fn with_grant_type(mut self, grant_type: impl Into<String>) -> Self {
		self.grant_type = grant_type.into();

		self
	}

	/// Configured `grant_type` form value.
	pub fn grant_type(&self) -> &str {
		&self.grant_type
	}

	async fn exchange_once(&self, api_key: &SecretValue, endpoint: &AuthEndpoint) -> Result<Token> {
		let form = [("grant_type", self.grant_type.as_str()), ("apikey", api_key.expose())];
		let response = self
			.http_client
			.post(endpoint.url().clone())
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.form(&form)
			.send()
			.await
			.map_err(TransportError::from)?;
		let meta = ResponseMetadata::from_response(&response);
		let body = response.bytes().await.map_err(TransportError::from)?;

		if !meta.is_success() {
			return Err(exchange::classify_failure(&meta, &body));
		}

		exchange::parse_token_response(&meta, &body, OffsetDateTime::now_utc())
	}
}
impl TokenExchange for ReqwestTokenExchange {
	fn exchange<'a>(
		&'a self,
		api_key: &'a SecretValue,
		endpoint: &'a AuthEndpoint,
	) -> ExchangeFuture<'a> {
		Box::pin(self.exchange_once(api_key, endpoint))
	}
}
