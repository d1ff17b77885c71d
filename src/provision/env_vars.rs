//! Environment-variable provisioner.

// self
use crate::{
	_prelude::*,
	auth::{EnvVarName, FieldName},
	provision::{self, ProvisionContext, ProvisionFuture, ProvisionState, ProvisionedArtifact, Provisioner},
};

/// Exports selected fields as environment variables of the client process.
///
/// Nothing touches the filesystem; releasing the artifact only forgets the variables.
#[derive(Clone, Debug)]
pub struct EnvVarProvisioner {
	mapping: Vec<(EnvVarName, FieldName)>,
}
impl EnvVarProvisioner {
	/// Creates a provisioner exporting `field` as `var` for every pair, in order.
	pub fn new<I>(mapping: I) -> Self
	where
		I: IntoIterator<Item = (EnvVarName, FieldName)>,
	{
		Self { mapping: mapping.into_iter().collect() }
	}

	/// Variable to field mapping.
	pub fn mapping(&self) -> &[(EnvVarName, FieldName)] {
		&self.mapping
	}

	async fn materialize(&self, ctx: &ProvisionContext) -> Result<ProvisionedArtifact> {
		ctx.enter(ProvisionState::Fetching);
		ctx.check_interrupted()?;

		let mut artifact = ProvisionedArtifact::new(self.name(), ctx.fs().clone());

		for (var, field) in &self.mapping {
			let value = ctx.fields().require(field)?;

			artifact = artifact.with_env(var.clone(), value.clone());
		}

		ctx.enter(ProvisionState::Materialized);

		Ok(artifact)
	}
}
impl Provisioner for EnvVarProvisioner {
	fn name(&self) -> &str {
		"env_vars"
	}

	fn provision<'a>(&'a self, ctx: &'a ProvisionContext) -> ProvisionFuture<'a, ProvisionedArtifact> {
		Box::pin(provision::observe(self.name(), ctx, self.materialize(ctx)))
	}
}
