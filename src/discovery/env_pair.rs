//! Strategy reading a fixed set of environment variables.

// self
use crate::{
	_prelude::*,
	auth::{EnvVarName, FieldName, SecretValue},
	discovery::{Candidate, CandidateSource, DiscoveryEnv, DiscoveryOutcome, DiscoveryStrategy},
};

/// Proposes a candidate when every mapped variable is set to a non-empty value.
///
/// Missing or empty variables mean "no candidate", never an error.
#[derive(Clone, Debug)]
pub struct EnvPairStrategy {
	mapping: Vec<(EnvVarName, FieldName)>,
}
impl EnvPairStrategy {
	/// Creates a strategy from `variable -> field` pairs, preserving their order.
	pub fn new<I>(mapping: I) -> Self
	where
		I: IntoIterator<Item = (EnvVarName, FieldName)>,
	{
		Self { mapping: mapping.into_iter().collect() }
	}

	/// The `variable -> field` pairs in declaration order.
	pub fn mapping(&self) -> &[(EnvVarName, FieldName)] {
		&self.mapping
	}
}
impl DiscoveryStrategy for EnvPairStrategy {
	fn name(&self) -> &str {
		"env_pair"
	}

	fn discover(&self, env: &DiscoveryEnv) -> DiscoveryOutcome {
		if self.mapping.is_empty() {
			return DiscoveryOutcome::not_found();
		}

		let mut fields = Vec::with_capacity(self.mapping.len());

		for (variable, field) in &self.mapping {
			match env.var(variable).filter(|value| !value.is_empty()) {
				Some(value) => fields.push((field.clone(), SecretValue::new(value))),
				None => return DiscoveryOutcome::not_found(),
			}
		}

		let names = self.mapping.iter().map(|(variable, _)| variable.clone()).collect();

		DiscoveryOutcome::found(Candidate::new(CandidateSource::Env(names), fields))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::fs::MemoryFilesystem;

	fn strategy() -> EnvPairStrategy {
		EnvPairStrategy::new([
			(
				EnvVarName::new("SERVICE_ACCESS_KEY").expect("Env var fixture should be valid."),
				FieldName::new("access_key").expect("Field fixture should be valid."),
			),
			(
				EnvVarName::new("SERVICE_SECRET_KEY").expect("Env var fixture should be valid."),
				FieldName::new("secret_key").expect("Field fixture should be valid."),
			),
		])
	}

	fn env() -> DiscoveryEnv {
		DiscoveryEnv::new(Arc::new(MemoryFilesystem::default()))
	}

	#[test]
	fn complete_pair_yields_candidate() {
		let outcome = strategy().discover(
			&env().with_var("SERVICE_ACCESS_KEY", "AKIA").with_var("SERVICE_SECRET_KEY", "shh"),
		);
		let candidate = outcome.candidate.expect("Complete pair should yield a candidate.");

		assert!(outcome.error.is_none());
		assert_eq!(candidate.get("access_key").map(SecretValue::expose), Some("AKIA"));
		assert_eq!(candidate.get("secret_key").map(SecretValue::expose), Some("shh"));
		assert_eq!(candidate.source.to_string(), "env:SERVICE_ACCESS_KEY,SERVICE_SECRET_KEY");
	}

	#[test]
	fn partial_or_empty_pair_is_not_an_error() {
		let partial = strategy().discover(&env().with_var("SERVICE_ACCESS_KEY", "AKIA"));

		assert!(partial.candidate.is_none());
		assert!(partial.error.is_none());

		let empty = strategy().discover(
			&env().with_var("SERVICE_ACCESS_KEY", "AKIA").with_var("SERVICE_SECRET_KEY", ""),
		);

		assert!(empty.candidate.is_none());
		assert!(empty.error.is_none());
	}

	#[test]
	fn names_match_exactly() {
		let outcome = strategy().discover(
			&env().with_var("service_access_key", "AKIA").with_var("service_secret_key", "shh"),
		);

		assert!(outcome.candidate.is_none());
	}
}
