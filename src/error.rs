//! Broker-level error types shared across exchanges, provisioners, and schemas.
//!
//! Discovery failures are not represented here: they are accumulated on an
//! [`ImportAttempt`](crate::import::ImportAttempt) as
//! [`DiscoveryError`](crate::discovery::DiscoveryError) values and never abort a pass.

// std
use std::io;
// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced by exchanges and provisioners.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The auth endpoint rejected the API key.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Transport failure (DNS, TCP, TLS, upstream outage); the caller may retry.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The auth endpoint answered with a shape the broker does not understand.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// Ephemeral artifact could not be written or removed.
	#[error(transparent)]
	Artifact(#[from] ArtifactError),
	/// Source configuration could not be read while rendering an artifact.
	#[error(transparent)]
	Source(#[from] SourceError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Credential schema violation.
	#[error(transparent)]
	Schema(#[from] crate::schema::SchemaError),
	/// The scoped client command could not be supervised.
	#[error(transparent)]
	Process(#[from] ProcessError),

	/// The caller cancelled the provisioning invocation.
	#[error("Provisioning was cancelled.")]
	Cancelled,
	/// The provisioning deadline elapsed before the artifact was materialized.
	#[error("Provisioning deadline exceeded.")]
	DeadlineExceeded,
}
impl Error {
	/// Returns `true` when retrying the same request may succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Transport(_))
	}

	/// Stable label naming the provisioning stage this error belongs to.
	pub const fn stage(&self) -> &'static str {
		match self {
			Self::Source(_) => "fetching",
			Self::Auth(_) | Self::Transport(_) | Self::Protocol(_) => "exchanging",
			Self::Artifact(_) => "materializing",
			Self::Config(_) | Self::Schema(_) => "configuration",
			Self::Process(_) => "running",
			Self::Cancelled | Self::DeadlineExceeded => "interrupted",
		}
	}
}

/// API key rejected by the auth endpoint (invalid, expired, or disabled).
///
/// Never retried internally.
#[derive(Debug, ThisError)]
#[error("Auth endpoint rejected the API key: {reason}.")]
pub struct AuthError {
	/// HTTP status code, when available.
	pub status: Option<u16>,
	/// Provider error code (e.g., `BXNIM0415E`), when supplied.
	pub error_code: Option<String>,
	/// Provider- or broker-supplied reason string.
	pub reason: String,
}

/// Transport-level failures (network, IO, upstream unavailability).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the auth endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the auth endpoint.")]
	Io(#[from] io::Error),
	/// Request timed out before a response arrived.
	#[error("Request timed out while calling the auth endpoint.")]
	Timeout,
	/// Auth endpoint is temporarily unavailable (throttled or 5xx).
	#[error("Auth endpoint is temporarily unavailable: {message}.")]
	Upstream {
		/// Summary of the upstream response.
		message: String,
		/// HTTP status code.
		status: u16,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

/// Malformed or unexpected auth endpoint responses.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// Auth endpoint responded with JSON that does not match the token shape.
	#[error("Auth endpoint returned a malformed token response.")]
	ResponseParse {
		/// Structured parsing failure, including the offending JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Auth endpoint answered with a status the broker cannot classify.
	#[error("Auth endpoint returned unexpected status {status}: {message}.")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
		/// Summary of the response body.
		message: String,
	},
	/// Token response omitted both `expiration` and `expires_in`.
	#[error("Token response is missing an expiry.")]
	MissingExpiry,
	/// Token response carried an expiry outside the supported range.
	#[error("Token response expiry exceeds the supported range.")]
	ExpiryOutOfRange,
	/// Token response carried an expiry that is not in the future.
	#[error("Token response expiry must be in the future.")]
	NonPositiveExpiry,
	/// Token builder validation failed.
	#[error("Unable to build token from response.")]
	TokenBuild(#[from] crate::auth::TokenBuilderError),
}

/// Filesystem failures while materializing or releasing an artifact.
#[derive(Debug, ThisError)]
pub enum ArtifactError {
	/// Artifact content could not be serialized.
	#[error("Artifact content could not be serialized.")]
	Serialize(#[from] serde_json::Error),
	/// Artifact could not be written.
	#[error("Failed to write artifact {}.", path.display())]
	Write {
		/// Target path.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: io::Error,
	},
	/// Artifact could not be removed.
	#[error("Failed to remove artifact {}.", path.display())]
	Remove {
		/// Target path.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: io::Error,
	},
}

/// Failures reading the source configuration an artifact is derived from.
#[derive(Debug, ThisError)]
pub enum SourceError {
	/// Source file could not be read.
	#[error("Failed to read source config {}.", path.display())]
	Read {
		/// Source path.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: io::Error,
	},
	/// Source file is not valid JSON.
	#[error("Source config {} is malformed.", path.display())]
	Parse {
		/// Source path.
		path: PathBuf,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Source file is valid JSON but not an object.
	#[error("Source config {} must be a JSON object.", path.display())]
	NotAnObject {
		/// Source path.
		path: PathBuf,
	},
}

/// Failures while running a client command inside a provisioning scope.
#[derive(Debug, ThisError)]
pub enum ProcessError {
	/// The command could not be started.
	#[error("Failed to spawn `{program}`.")]
	Spawn {
		/// Program name.
		program: String,
		/// Underlying IO failure.
		#[source]
		source: io::Error,
	},
	/// Waiting for the command failed.
	#[error("Failed to wait for the client command.")]
	Wait(#[source] io::Error),
	/// The command could not be terminated after an interrupt.
	#[error("Failed to terminate the client command.")]
	Kill(#[source] io::Error),
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Auth endpoint URL could not be parsed.
	#[error("Auth endpoint URL is invalid.")]
	InvalidEndpoint(#[from] url::ParseError),
	/// Auth endpoint must use HTTPS.
	#[error("The auth endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// A path starting with `~` was used but no home directory is known.
	#[error("Home directory is unavailable; cannot expand {path}.")]
	HomeUnavailable {
		/// Path that required expansion.
		path: String,
	},
	/// The provisioner needs a field that was not selected.
	#[error("Selected credential is missing the `{field}` field.")]
	MissingField {
		/// Field name.
		field: String,
	},
	/// An identifier (credential, field, or env var name) failed validation.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
	/// The provisioner needs a token exchange client but none was configured.
	#[error("Provisioner requires a token exchange client.")]
	MissingExchange,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn only_transport_errors_are_retryable() {
		let transport: Error =
			TransportError::Upstream { message: "busy".into(), status: 503, retry_after: None }
				.into();
		let auth: Error =
			AuthError { status: Some(400), error_code: None, reason: "expired".into() }.into();
		let protocol: Error = ProtocolError::MissingExpiry.into();

		assert!(transport.is_retryable());
		assert!(!auth.is_retryable());
		assert!(!protocol.is_retryable());
		assert!(!Error::Cancelled.is_retryable());
	}

	#[test]
	fn stages_name_the_failing_step() {
		let source: Error =
			SourceError::NotAnObject { path: PathBuf::from("/tmp/config.json") }.into();
		let artifact: Error = ArtifactError::Write {
			path: PathBuf::from("/tmp/config.json"),
			source: io::Error::other("disk full"),
		}
		.into();

		assert_eq!(source.stage(), "fetching");
		assert_eq!(artifact.stage(), "materializing");
		assert_eq!(Error::DeadlineExceeded.stage(), "interrupted");
	}

	#[test]
	fn auth_error_message_includes_reason() {
		let err: Error =
			AuthError { status: Some(400), error_code: None, reason: "key expired".into() }.into();

		assert_eq!(err.to_string(), "Auth endpoint rejected the API key: key expired.");
	}
}
