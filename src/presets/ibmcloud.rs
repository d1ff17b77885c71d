//! IBM Cloud API keys.
//!
//! Keys are discovered from `IBMCLOUD_API_KEY` or the CLI's `~/.bluemix/config.json`.
//! The default provisioner writes a copy of the CLI config carrying a freshly exchanged
//! IAM token (and no API key) to `~/.op/plugins/ibmcloud/config.json`, pointing
//! `IBMCLOUD_HOME` at its directory. Without a CLI config the copy holds only the tokens.

// std
use std::io::ErrorKind;
// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{CredentialName, EnvVarName, FieldName},
	discovery::{EnvPairStrategy, FileStrategy},
	error::{ArtifactError, ConfigError, SourceError},
	exchange::AuthEndpoint,
	fs,
	import::StrategyChain,
	provision::{
		ArtifactContent, EnvVarProvisioner, EphemeralFileProvisioner, ProvisionContext,
		ProvisionFuture, ProvisionState,
	},
	schema::{self, Charset, CredentialType, FieldRole, FieldSpec, ValueComposition},
};

/// Field holding the API key.
pub const API_KEY_FIELD: &str = "api_key";
/// Environment variable the CLI reads the API key from.
pub const API_KEY_ENV: &str = "IBMCLOUD_API_KEY";
/// Environment variable the CLI resolves its config directory from.
pub const HOME_ENV: &str = "IBMCLOUD_HOME";
/// CLI config file discovered on the local machine.
pub const CLI_CONFIG_PATH: &str = "~/.bluemix/config.json";
/// Key holding the API key inside the CLI config.
pub const CLI_CONFIG_API_KEY: &str = "APIKey";
/// Where the provisioned config is written.
pub const ARTIFACT_PATH: &str = "~/.op/plugins/ibmcloud/config.json";
/// IAM token endpoint.
pub const IAM_TOKEN_ENDPOINT: &str = "https://iam.cloud.ibm.com/identity/token";
/// Length of an IBM Cloud API key.
pub const API_KEY_LENGTH: usize = 44;

const DOCS_URL: &str = "https://cloud.ibm.com/docs/account?topic=account-userapikey";
const MANAGEMENT_URL: &str = "https://cloud.ibm.com/iam/apikeys";

/// Builds the IBM Cloud API key credential type.
pub fn api_key() -> Result<CredentialType> {
	let field = FieldName::new(API_KEY_FIELD).map_err(ConfigError::from)?;
	let provisioner = config_file_provisioner(AuthEndpoint::parse(IAM_TOKEN_ENDPOINT)?)?;
	let credential = CredentialType::builder(
		CredentialName::new("api_key").map_err(ConfigError::from)?,
	)
	.docs_url(schema::parse_https_url("docs", DOCS_URL)?)
	.management_url(schema::parse_https_url("management", MANAGEMENT_URL)?)
	.field(
		FieldSpec::new(field)
			.role(FieldRole::ApiKey)
			.secret()
			.composition(ValueComposition::fixed(API_KEY_LENGTH, Charset::alphanumeric())),
	)
	.default_provisioner(Arc::new(provisioner))
	.importer(importer()?)
	.build()?;

	Ok(credential)
}

/// Tries `IBMCLOUD_API_KEY` first, then the CLI config file.
pub fn importer() -> Result<StrategyChain, ConfigError> {
	let field = FieldName::new(API_KEY_FIELD)?;

	Ok(StrategyChain::default()
		.then(EnvPairStrategy::new([(EnvVarName::new(API_KEY_ENV)?, field.clone())]))
		.then(FileStrategy::json_fields(CLI_CONFIG_PATH, [(CLI_CONFIG_API_KEY, field)])))
}

/// Writes the CLI config with an IAM token exchanged at `endpoint`.
pub fn config_file_provisioner(
	endpoint: AuthEndpoint,
) -> Result<EphemeralFileProvisioner, ConfigError> {
	let content = CliConfigContent {
		source: CLI_CONFIG_PATH.into(),
		endpoint,
		api_key_field: FieldName::new(API_KEY_FIELD)?,
	};

	Ok(EphemeralFileProvisioner::at_fixed_path(ARTIFACT_PATH, content)
		.with_dir_env(EnvVarName::new(HOME_ENV)?))
}

/// Exports the API key as `IBMCLOUD_API_KEY` without touching the filesystem.
pub fn env_var_provisioner() -> Result<EnvVarProvisioner, ConfigError> {
	Ok(EnvVarProvisioner::new([(EnvVarName::new(API_KEY_ENV)?, FieldName::new(API_KEY_FIELD)?)]))
}

/// Renders the CLI config with session tokens in place of the API key.
#[derive(Clone, Debug)]
pub struct CliConfigContent {
	/// Source config path (`~` expands).
	pub source: String,
	/// Endpoint the API key is exchanged at.
	pub endpoint: AuthEndpoint,
	/// Field holding the API key.
	pub api_key_field: FieldName,
}
impl CliConfigContent {
	// A missing CLI config starts from an empty document, so keys discovered only through
	// `IBMCLOUD_API_KEY` still provision.
	fn read_source(&self, ctx: &ProvisionContext) -> Result<Map<String, Value>> {
		let path = fs::expand_home(ctx.fs().as_ref(), &self.source)?;
		let bytes = match ctx.fs().read(&path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
			Err(source) => return Err(SourceError::Read { path, source }.into()),
		};
		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
		let document: Value = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| SourceError::Parse { path: path.clone(), source })?;

		match document {
			Value::Object(map) => Ok(map),
			_ => Err(SourceError::NotAnObject { path }.into()),
		}
	}

	async fn render_config(&self, ctx: &ProvisionContext) -> Result<Vec<u8>> {
		let mut config = self.read_source(ctx)?;
		let api_key = ctx.fields().require(&self.api_key_field)?;
		let exchange = ctx.exchange()?;

		ctx.enter(ProvisionState::Exchanging);

		let token = exchange.exchange(api_key, &self.endpoint).await?;

		config.remove(CLI_CONFIG_API_KEY);
		config.insert(
			"IAMToken".into(),
			Value::String(format!("Bearer {}", token.access_token.expose())),
		);
		config.insert("IAMRefreshToken".into(), Value::String(token.refresh_token.expose().into()));

		let rendered = serde_json::to_vec_pretty(&Value::Object(config)).map_err(ArtifactError::from)?;

		Ok(rendered)
	}
}
impl ArtifactContent for CliConfigContent {
	fn render<'a>(&'a self, ctx: &'a ProvisionContext) -> ProvisionFuture<'a, Vec<u8>> {
		Box::pin(self.render_config(ctx))
	}
}
