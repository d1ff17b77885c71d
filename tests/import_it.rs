// std
use std::{path::PathBuf, sync::Arc};
// self
use credential_broker::{
	auth::{EnvVarName, FieldName, SecretValue},
	discovery::{CandidateSource, DiscoveryEnv, DiscoveryError, EnvPairStrategy, FileStrategy},
	fs::MemoryFilesystem,
	import::StrategyChain,
	presets::ibmcloud,
};

const CONFIG: &str = "/home/tester/.service/config.json";

fn field() -> FieldName {
	FieldName::new("api_key").expect("Field fixture should be valid.")
}

fn filesystem() -> Arc<MemoryFilesystem> {
	Arc::new(MemoryFilesystem::with_home("/home/tester"))
}

fn chain() -> StrategyChain {
	StrategyChain::default()
		.then(EnvPairStrategy::new([(
			EnvVarName::new("SERVICE_API_KEY").expect("Env var fixture should be valid."),
			field(),
		)]))
		.then(FileStrategy::json_fields("~/.service/config.json", [("APIKey", field())]))
}

#[test]
fn unrelated_env_and_absent_config_yield_nothing() {
	let env = DiscoveryEnv::new(filesystem()).with_var("SERVICE_HOME", "/tmp/x");
	let attempt = chain().run(&env);

	assert!(attempt.candidates.is_empty());
	assert!(attempt.errors.is_empty());
}

#[test]
fn config_with_a_valid_key_yields_one_candidate() {
	let key = "0123456789abcdefghijABCDEFGHIJklmnopqrstUVWX";
	let fs = filesystem();

	fs.insert(CONFIG, format!(r#"{{"APIKey":"{key}","Other":1}}"#));

	let attempt = chain().run(&DiscoveryEnv::new(fs));

	assert_eq!(attempt.candidates.len(), 1);
	assert!(attempt.errors.is_empty());

	let candidate = &attempt.candidates[0];

	assert_eq!(candidate.source, CandidateSource::File(PathBuf::from(CONFIG)));
	assert_eq!(candidate.get("api_key").map(SecretValue::expose), Some(key));
	assert_eq!(key.len(), 44);
}

#[test]
fn empty_keys_are_not_candidates() {
	let fs = filesystem();

	fs.insert(CONFIG, r#"{"APIKey":""}"#);

	let attempt = chain().run(&DiscoveryEnv::new(fs).with_var("SERVICE_API_KEY", ""));

	assert!(attempt.is_empty());
}

#[test]
fn malformed_config_does_not_hide_env_candidates() {
	let fs = filesystem();

	fs.insert(CONFIG, "{ not json");

	let env = DiscoveryEnv::new(fs).with_var("SERVICE_API_KEY", "from-env");
	let attempt = chain().run(&env);

	assert_eq!(attempt.candidates.len(), 1);
	assert_eq!(attempt.candidates[0].get("api_key").map(SecretValue::expose), Some("from-env"));
	assert_eq!(attempt.errors.len(), 1);
	assert!(matches!(attempt.errors[0], DiscoveryError::MalformedSource { .. }));
}

#[test]
fn concurrent_runs_match_sequential_runs() {
	let fs = filesystem();

	fs.insert(CONFIG, r#"{"APIKey":"from-file"}"#);

	let env = DiscoveryEnv::new(fs).with_var("SERVICE_API_KEY", "from-env");
	let sequential = chain().run(&env);
	let concurrent = chain().run_concurrent(&env);

	assert_eq!(sequential.candidates, concurrent.candidates);
	assert_eq!(sequential.errors.len(), concurrent.errors.len());
}

#[test]
fn preset_ignores_the_home_variable() {
	let credential = ibmcloud::api_key().expect("Preset should build.");
	let env = DiscoveryEnv::new(filesystem()).with_var(ibmcloud::HOME_ENV, "/tmp/x");
	let attempt = credential.importer().run(&env);

	assert!(attempt.is_empty());
}
