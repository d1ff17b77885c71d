//! Ephemeral-file provisioner.
//!
//! The file exists only between a successful [`Provisioner::provision`] and the release of
//! the returned artifact. Content comes from an [`ArtifactContent`] renderer, which may read
//! source configuration and call the token exchange; rendering runs under the context's
//! cancellation token and deadline so an interrupted invocation never writes anything.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::{EnvVarName, SecretValue},
	error::{ArtifactError, ConfigError},
	fs::{self, Filesystem},
	provision::{
		self, ProvisionContext, ProvisionFuture, ProvisionState, ProvisionedArtifact, Provisioner,
	},
};

/// Renders the bytes of an ephemeral file.
pub trait ArtifactContent
where
	Self: Debug + Send + Sync,
{
	/// Produces the file content for one invocation.
	fn render<'a>(&'a self, ctx: &'a ProvisionContext) -> ProvisionFuture<'a, Vec<u8>>;
}

/// Fixed bytes, written as-is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticContent(pub Vec<u8>);
impl ArtifactContent for StaticContent {
	fn render<'a>(&'a self, _ctx: &'a ProvisionContext) -> ProvisionFuture<'a, Vec<u8>> {
		Box::pin(async move { Ok(self.0.clone()) })
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Location {
	Fixed(String),
	RandomIn(String),
}

/// Writes rendered content to a file that is removed when the scope ends.
#[derive(Clone, Debug)]
pub struct EphemeralFileProvisioner {
	location: Location,
	content: Arc<dyn ArtifactContent>,
	path_env: Option<EnvVarName>,
	dir_env: Option<EnvVarName>,
}
impl EphemeralFileProvisioner {
	const RANDOM_NAME_LEN: usize = 16;

	/// Writes to `path`; a leading `~` expands to the home directory at provisioning time.
	pub fn at_fixed_path(path: impl Into<String>, content: impl 'static + ArtifactContent) -> Self {
		Self {
			location: Location::Fixed(path.into()),
			content: Arc::new(content),
			path_env: None,
			dir_env: None,
		}
	}

	/// Writes to a randomly named file inside `dir` (`~` expands as for fixed paths).
	pub fn in_directory(dir: impl Into<String>, content: impl 'static + ArtifactContent) -> Self {
		Self {
			location: Location::RandomIn(dir.into()),
			content: Arc::new(content),
			path_env: None,
			dir_env: None,
		}
	}

	/// Exports the file path to the client process as `name`.
	pub fn with_path_env(mut self, name: EnvVarName) -> Self {
		self.path_env = Some(name);

		self
	}

	/// Exports the file's parent directory to the client process as `name`.
	pub fn with_dir_env(mut self, name: EnvVarName) -> Self {
		self.dir_env = Some(name);

		self
	}

	/// Resolves the target path for one invocation.
	pub fn resolve_path(&self, fs: &dyn Filesystem) -> Result<PathBuf, ConfigError> {
		match &self.location {
			Location::Fixed(path) => fs::expand_home(fs, path),
			Location::RandomIn(dir) => {
				let name: String = rand::rng()
					.sample_iter(&Alphanumeric)
					.take(Self::RANDOM_NAME_LEN)
					.map(char::from)
					.collect();

				Ok(fs::expand_home(fs, dir)?.join(name))
			},
		}
	}

	async fn materialize(&self, ctx: &ProvisionContext) -> Result<ProvisionedArtifact> {
		ctx.enter(ProvisionState::Fetching);
		ctx.check_interrupted()?;

		let path = self.resolve_path(ctx.fs().as_ref())?;
		let bytes = ctx.guard(self.content.render(ctx)).await?;

		ctx.check_interrupted()?;

		// A failed write leaves `path` untouched, so there is nothing to clean up.
		ctx.fs()
			.write(&path, &bytes)
			.map_err(|source| ArtifactError::Write { path: path.clone(), source })?;

		let mut artifact =
			ProvisionedArtifact::new(self.name(), ctx.fs().clone()).with_file(path.clone());

		if let Some(name) = &self.path_env {
			artifact = artifact.with_env(name.clone(), path_value(&path));
		}
		if let Some(name) = &self.dir_env
			&& let Some(dir) = path.parent()
		{
			artifact = artifact.with_env(name.clone(), path_value(dir));
		}
		if let Err(e) = ctx.check_interrupted() {
			artifact.release()?;

			return Err(e);
		}

		ctx.enter(ProvisionState::Materialized);

		Ok(artifact)
	}
}
impl Provisioner for EphemeralFileProvisioner {
	fn name(&self) -> &str {
		"ephemeral_file"
	}

	fn provision<'a>(&'a self, ctx: &'a ProvisionContext) -> ProvisionFuture<'a, ProvisionedArtifact> {
		Box::pin(provision::observe(self.name(), ctx, self.materialize(ctx)))
	}
}

fn path_value(path: &Path) -> SecretValue {
	SecretValue::new(path.to_string_lossy())
}
