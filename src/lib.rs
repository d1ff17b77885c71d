//! Discover local API keys through failure-tolerant strategy chains, exchange them for
//! short-lived tokens, and provision them to client processes as scoped, self-cleaning
//! artifacts.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod discovery;
pub mod error;
pub mod exchange;
pub mod fs;
pub mod http;
pub mod import;
pub mod obs;
pub mod presets;
pub mod provision;
pub mod schema;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{FieldName, SecretValue},
		exchange::{AuthEndpoint, ReqwestTokenExchange},
		fs::MemoryFilesystem,
		http::ReqwestHttpClient,
		provision::SelectedFields,
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`ReqwestTokenExchange`] backed by the insecure test client.
	pub fn build_reqwest_test_exchange() -> ReqwestTokenExchange {
		ReqwestTokenExchange::with_http_client(test_reqwest_http_client())
	}

	/// Rewrites an `httpmock` URL onto the HTTPS listener sharing the same port.
	pub fn https_url(raw: &str) -> Url {
		let secured = raw.replacen("http://", "https://", 1);

		Url::parse(&secured).expect("Mock server URL should parse successfully.")
	}

	/// Builds an [`AuthEndpoint`] for a path on the `httpmock` HTTPS listener.
	pub fn https_endpoint(server_url: &str) -> AuthEndpoint {
		AuthEndpoint::new(https_url(server_url)).expect("Mock endpoint should use HTTPS.")
	}

	/// Builds an in-memory filesystem rooted at `/home/tester`.
	pub fn test_filesystem() -> Arc<MemoryFilesystem> {
		Arc::new(MemoryFilesystem::with_home("/home/tester"))
	}

	/// Selected fields holding a single API key.
	pub fn api_key_fields(value: &str) -> SelectedFields {
		let field = FieldName::new("api_key").expect("Field fixture should be valid.");

		SelectedFields::from_iter([(field, SecretValue::new(value))])
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		path::{Path, PathBuf},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
