//! Discovery strategies: single methods of locating candidate credential values.
//!
//! Every strategy implements [`DiscoveryStrategy::discover`] against a [`DiscoveryEnv`]
//! snapshot and reports a [`DiscoveryOutcome`]: an optional [`Candidate`] and an optional
//! [`DiscoveryError`]. Absence is never an error. `env_pair` reads fixed environment
//! variables; `file` parses a config file at a fixed path.

pub mod env_pair;
pub mod file;

pub use env_pair::*;
pub use file::*;

// std
use std::{env, io};
// self
use crate::{
	_prelude::*,
	auth::{EnvVarName, FieldName, SecretValue},
	error::ConfigError,
	fs::{Filesystem, OsFilesystem},
};

/// Point-in-time view of the process environment plus filesystem access.
///
/// Strategies only ever read from this snapshot, which keeps a chain run deterministic
/// for a given environment and filesystem state.
#[derive(Clone)]
pub struct DiscoveryEnv {
	vars: BTreeMap<String, String>,
	fs: Arc<dyn Filesystem>,
}
impl DiscoveryEnv {
	/// Creates an empty environment on top of the provided filesystem.
	pub fn new(fs: Arc<dyn Filesystem>) -> Self {
		Self { vars: BTreeMap::new(), fs }
	}

	/// Snapshots the current process environment over the real filesystem.
	///
	/// Variables whose name or value is not valid Unicode are skipped.
	pub fn from_process() -> Self {
		let vars = env::vars_os()
			.filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
			.collect();

		Self { vars, fs: Arc::new(OsFilesystem::default()) }
	}

	/// Adds or replaces a variable.
	pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.vars.insert(name.into(), value.into());

		self
	}

	/// Looks up a variable by exact, case-sensitive name.
	pub fn var(&self, name: &str) -> Option<&str> {
		self.vars.get(name).map(String::as_str)
	}

	/// Filesystem strategies read through.
	pub fn fs(&self) -> &dyn Filesystem {
		self.fs.as_ref()
	}
}
impl Debug for DiscoveryEnv {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DiscoveryEnv")
			.field("vars", &self.vars.keys().collect::<Vec<_>>())
			.field("fs", &self.fs)
			.finish()
	}
}

/// Where a candidate came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CandidateSource {
	/// Values read from these environment variables.
	Env(Vec<EnvVarName>),
	/// Values parsed from this file.
	File(PathBuf),
}
impl Display for CandidateSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Env(names) => {
				f.write_str("env:")?;

				for (idx, name) in names.iter().enumerate() {
					if idx > 0 {
						f.write_str(",")?;
					}

					f.write_str(name)?;
				}

				Ok(())
			},
			Self::File(path) => write!(f, "file:{}", path.display()),
		}
	}
}

/// Field values proposed by exactly one strategy invocation.
///
/// Candidates live only for the duration of a discovery pass and are never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
	/// Origin of the values.
	pub source: CandidateSource,
	/// Discovered values keyed by field name.
	pub fields: BTreeMap<FieldName, SecretValue>,
}
impl Candidate {
	/// Creates a candidate from the provided source and values.
	pub fn new<I>(source: CandidateSource, fields: I) -> Self
	where
		I: IntoIterator<Item = (FieldName, SecretValue)>,
	{
		Self { source, fields: fields.into_iter().collect() }
	}

	/// Returns the value discovered for `field`.
	pub fn get(&self, field: &str) -> Option<&SecretValue> {
		self.fields.get(field)
	}

	/// Returns `true` if any proposed value is empty.
	pub fn has_empty_value(&self) -> bool {
		self.fields.values().any(SecretValue::is_empty)
	}
}

/// Non-fatal failure recorded while discovering candidates.
#[derive(Debug, ThisError)]
pub enum DiscoveryError {
	/// The source exists but cannot be parsed.
	#[error("Source {} is malformed.", path.display())]
	MalformedSource {
		/// Source path.
		path: PathBuf,
		/// Structured parsing failure, including the offending JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The source exists but cannot be read.
	#[error("Source {} could not be read.", path.display())]
	Unreadable {
		/// Source path.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: io::Error,
	},
	/// The strategy path could not be resolved.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Result of one strategy invocation.
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
	/// Candidate proposed by the strategy, if any.
	pub candidate: Option<Candidate>,
	/// Error recorded by the strategy, if any.
	pub error: Option<DiscoveryError>,
}
impl DiscoveryOutcome {
	/// Nothing found, nothing wrong.
	pub fn not_found() -> Self {
		Self::default()
	}

	/// A single candidate.
	pub fn found(candidate: Candidate) -> Self {
		Self { candidate: Some(candidate), error: None }
	}

	/// A single error.
	pub fn failed(error: impl Into<DiscoveryError>) -> Self {
		Self { candidate: None, error: Some(error.into()) }
	}
}

/// A single method of locating candidate credential values.
pub trait DiscoveryStrategy
where
	Self: Debug + Send + Sync,
{
	/// Stable label used in logs.
	fn name(&self) -> &str;

	/// Looks for a candidate in `env`.
	fn discover(&self, env: &DiscoveryEnv) -> DiscoveryOutcome;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::fs::MemoryFilesystem;

	#[test]
	fn env_snapshot_is_case_sensitive() {
		let env = DiscoveryEnv::new(Arc::new(MemoryFilesystem::default()))
			.with_var("SERVICE_HOME", "/tmp/x");

		assert_eq!(env.var("SERVICE_HOME"), Some("/tmp/x"));
		assert_eq!(env.var("service_home"), None);
	}

	#[test]
	fn candidate_flags_empty_values() {
		let field = FieldName::new("api_key").expect("Field fixture should be valid.");
		let filled = Candidate::new(
			CandidateSource::File(PathBuf::from("/tmp/config.json")),
			[(field.clone(), SecretValue::new("X"))],
		);
		let empty = Candidate::new(
			CandidateSource::File(PathBuf::from("/tmp/config.json")),
			[(field, SecretValue::new(""))],
		);

		assert!(!filled.has_empty_value());
		assert!(empty.has_empty_value());
		assert_eq!(filled.get("api_key").map(SecretValue::expose), Some("X"));
	}

	#[test]
	fn sources_render_for_logs() {
		let source = CandidateSource::Env(vec![
			EnvVarName::new("A").expect("Env var fixture should be valid."),
			EnvVarName::new("B").expect("Env var fixture should be valid."),
		]);

		assert_eq!(source.to_string(), "env:A,B");
	}
}
