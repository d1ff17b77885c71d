//! Strategy parsing a config file at a fixed path.

// std
use std::io::ErrorKind;
// crates.io
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{FieldName, SecretValue},
	discovery::{
		Candidate, CandidateSource, DiscoveryEnv, DiscoveryError, DiscoveryOutcome,
		DiscoveryStrategy,
	},
	fs,
};

/// Parsed field values, or `None` when the file holds nothing usable.
pub type ParsedFields = Option<BTreeMap<FieldName, SecretValue>>;

type ParseFn = dyn Fn(&FileContents) -> Result<ParsedFields, DiscoveryError> + Send + Sync;

/// Raw bytes of a discovered file plus its resolved path.
#[derive(Clone)]
pub struct FileContents {
	path: PathBuf,
	bytes: Vec<u8>,
}
impl FileContents {
	/// Resolved path the bytes were read from.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Raw file bytes.
	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	/// Deserializes the file as JSON, reporting the failing JSON path on error.
	pub fn to_json<T>(&self) -> Result<T, DiscoveryError>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.bytes);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| DiscoveryError::MalformedSource { path: self.path.clone(), source })
	}
}
impl Debug for FileContents {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FileContents")
			.field("path", &self.path)
			.field("len", &self.bytes.len())
			.finish()
	}
}

/// Reads one file (with `~` expansion) and hands it to a parser.
///
/// A missing file yields no candidate. Unreadable or malformed files record an error and
/// no candidate. Candidates with any empty value are dropped.
#[derive(Clone)]
pub struct FileStrategy {
	path: String,
	parse: Arc<ParseFn>,
}
impl FileStrategy {
	/// Creates a strategy with a custom parser.
	pub fn new<F>(path: impl Into<String>, parse: F) -> Self
	where
		F: 'static + Fn(&FileContents) -> Result<ParsedFields, DiscoveryError> + Send + Sync,
	{
		Self { path: path.into(), parse: Arc::new(parse) }
	}

	/// Creates a strategy for a JSON object whose `key`s map onto fields.
	///
	/// Unknown keys are ignored; a missing or `null` key counts as an empty value, which
	/// suppresses the candidate. Mapped keys holding anything other than a string make the
	/// file malformed.
	pub fn json_fields<I, K>(path: impl Into<String>, mapping: I) -> Self
	where
		I: IntoIterator<Item = (K, FieldName)>,
		K: Into<String>,
	{
		let mapping: Vec<(String, FieldName)> =
			mapping.into_iter().map(|(key, field)| (key.into(), field)).collect();

		Self::new(path, move |contents| {
			let mut document: Map<String, Value> = contents.to_json()?;
			let picked: Map<String, Value> = mapping
				.iter()
				.filter_map(|(key, _)| document.remove_entry(key))
				.collect();
			let values: BTreeMap<String, Option<String>> =
				serde_path_to_error::deserialize(Value::Object(picked)).map_err(|source| {
					DiscoveryError::MalformedSource { path: contents.path.clone(), source }
				})?;
			let fields = mapping
				.iter()
				.map(|(key, field)| {
					let value = values.get(key).cloned().flatten().unwrap_or_default();

					(field.clone(), SecretValue::new(value))
				})
				.collect();

			Ok(Some(fields))
		})
	}

	/// Unexpanded path as configured.
	pub fn path(&self) -> &str {
		&self.path
	}
}
impl Debug for FileStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FileStrategy").field("path", &self.path).finish()
	}
}
impl DiscoveryStrategy for FileStrategy {
	fn name(&self) -> &str {
		"file"
	}

	fn discover(&self, env: &DiscoveryEnv) -> DiscoveryOutcome {
		let path = match fs::expand_home(env.fs(), &self.path) {
			Ok(path) => path,
			Err(e) => return DiscoveryOutcome::failed(e),
		};
		let bytes = match env.fs().read(&path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return DiscoveryOutcome::not_found(),
			Err(source) =>
				return DiscoveryOutcome::failed(DiscoveryError::Unreadable { path, source }),
		};
		let contents = FileContents { path, bytes };

		match (self.parse)(&contents) {
			Ok(Some(fields)) => {
				let candidate = Candidate::new(CandidateSource::File(contents.path), fields);

				if candidate.fields.is_empty() || candidate.has_empty_value() {
					DiscoveryOutcome::not_found()
				} else {
					DiscoveryOutcome::found(candidate)
				}
			},
			Ok(None) => DiscoveryOutcome::not_found(),
			Err(e) => DiscoveryOutcome::failed(e),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::fs::MemoryFilesystem;

	const CONFIG: &str = "/home/tester/.service/config.json";

	fn strategy() -> FileStrategy {
		FileStrategy::json_fields(
			"~/.service/config.json",
			[("APIKey", FieldName::new("api_key").expect("Field fixture should be valid."))],
		)
	}

	fn env_with(contents: Option<&str>) -> DiscoveryEnv {
		let fs = MemoryFilesystem::with_home("/home/tester");

		if let Some(contents) = contents {
			fs.insert(CONFIG, contents);
		}

		DiscoveryEnv::new(Arc::new(fs))
	}

	#[test]
	fn missing_file_is_not_an_error() {
		let outcome = strategy().discover(&env_with(None));

		assert!(outcome.candidate.is_none());
		assert!(outcome.error.is_none());
	}

	#[test]
	fn empty_key_yields_no_candidate() {
		let outcome = strategy().discover(&env_with(Some(r#"{"APIKey": ""}"#)));

		assert!(outcome.candidate.is_none());
		assert!(outcome.error.is_none());

		let absent = strategy().discover(&env_with(Some(r#"{"Region": "us-south"}"#)));

		assert!(absent.candidate.is_none());
		assert!(absent.error.is_none());
	}

	#[test]
	fn present_key_yields_candidate() {
		let outcome =
			strategy().discover(&env_with(Some(r#"{"APIKey": "X", "Region": "us-south"}"#)));
		let candidate = outcome.candidate.expect("Filled key should yield a candidate.");

		assert!(outcome.error.is_none());
		assert_eq!(candidate.fields.len(), 1);
		assert_eq!(candidate.get("api_key").map(SecretValue::expose), Some("X"));
		assert_eq!(candidate.source, CandidateSource::File(PathBuf::from(CONFIG)));
	}

	#[test]
	fn malformed_file_records_error() {
		let outcome = strategy().discover(&env_with(Some("{not json")));

		assert!(outcome.candidate.is_none());
		assert!(matches!(outcome.error, Some(DiscoveryError::MalformedSource { .. })));
	}

	#[test]
	fn wrong_value_type_reports_json_path() {
		let outcome = strategy().discover(&env_with(Some(r#"{"APIKey": 42}"#)));

		match outcome.error {
			Some(DiscoveryError::MalformedSource { source, .. }) =>
				assert_eq!(source.path().to_string(), "APIKey"),
			other => panic!("Unexpected outcome: {other:?}."),
		}
	}

	#[test]
	fn unreadable_file_records_error() {
		let env = env_with(Some(r#"{"APIKey": "X"}"#));
		let fs = MemoryFilesystem::with_home("/home/tester");

		fs.insert(CONFIG, r#"{"APIKey": "X"}"#);
		fs.deny_reads(true);

		let denied = DiscoveryEnv::new(Arc::new(fs));

		assert!(strategy().discover(&env).candidate.is_some());
		assert!(matches!(
			strategy().discover(&denied).error,
			Some(DiscoveryError::Unreadable { .. })
		));
	}

	#[test]
	fn custom_parsers_cannot_propose_empty_values() {
		let strategy = FileStrategy::new("~/.service/config.json", |_| {
			let field = FieldName::new("api_key").expect("Field fixture should be valid.");

			Ok(Some(BTreeMap::from_iter([(field, SecretValue::new(""))])))
		});
		let outcome = strategy.discover(&env_with(Some("ignored")));

		assert!(outcome.candidate.is_none());
		assert!(outcome.error.is_none());
	}
}
