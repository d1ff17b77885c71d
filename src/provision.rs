//! Provisioners: materialize a selected credential for exactly one client invocation.
//!
//! A [`Provisioner`] turns the [`SelectedFields`] in a [`ProvisionContext`] into a
//! [`ProvisionedArtifact`]: environment variables for the client process and, for file
//! based provisioners, an ephemeral file on disk. Artifacts clean up after themselves on
//! [`ProvisionedArtifact::release`] and on drop, and every error path removes whatever
//! was already created before returning.
//!
//! # State machine
//!
//! ```text
//! Idle → Fetching → Exchanging → Materialized → Released
//!           │            │
//!           └────────────┴──→ Failed
//! ```
//!
//! Provisioners that never contact an auth endpoint go straight from `Fetching` to
//! `Materialized`.

pub mod env_vars;
pub mod exec;
pub mod file;

pub use env_vars::*;
pub use exec::*;
pub use file::*;

// std
use std::{future, process::Command as StdCommand};
// crates.io
use tokio::{process::Command, time::Instant};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{EnvVarName, FieldName, SecretValue},
	discovery::Candidate,
	error::{ArtifactError, ConfigError},
	exchange::TokenExchange,
	fs::{self, Filesystem, OsFilesystem},
	obs::{self, ProvisionOutcome, ProvisionSpan},
};

/// Boxed future returned by provisioners and artifact content renderers.
pub type ProvisionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Materializes credential material for one client invocation.
pub trait Provisioner
where
	Self: Debug + Send + Sync,
{
	/// Stable label used in logs and metrics.
	fn name(&self) -> &str;

	/// Produces an artifact from the selected fields in `ctx`.
	fn provision<'a>(&'a self, ctx: &'a ProvisionContext) -> ProvisionFuture<'a, ProvisionedArtifact>;
}

/// Lifecycle of one provisioning invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisionState {
	/// Nothing has happened yet.
	Idle,
	/// Reading the selected fields and any source configuration.
	Fetching,
	/// Calling the auth endpoint.
	Exchanging,
	/// The artifact exists.
	Materialized,
	/// The artifact has been removed.
	Released,
	/// The invocation failed before materializing anything.
	Failed {
		/// State the failure was observed in.
		during: FailedStage,
	},
}
impl ProvisionState {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Fetching => "fetching",
			Self::Exchanging => "exchanging",
			Self::Materialized => "materialized",
			Self::Released => "released",
			Self::Failed { .. } => "failed",
		}
	}

	/// Returns `true` when moving from `self` to `next` is a legal transition.
	pub fn can_transition_to(self, next: Self) -> bool {
		matches!(
			(self, next),
			(Self::Idle, Self::Fetching)
				| (Self::Fetching, Self::Exchanging | Self::Materialized)
				| (Self::Exchanging, Self::Materialized)
				| (Self::Materialized, Self::Released)
				| (Self::Fetching, Self::Failed { during: FailedStage::Fetching })
				| (Self::Exchanging, Self::Failed { during: FailedStage::Exchanging })
		)
	}
}
impl Display for ProvisionState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// States a provisioning invocation can fail in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailedStage {
	/// Failure while reading fields or source configuration.
	Fetching,
	/// Failure while calling the auth endpoint or writing its result.
	Exchanging,
}

/// Field values picked by the user for one provisioning invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectedFields(BTreeMap<FieldName, SecretValue>);
impl SelectedFields {
	/// Wraps already collected values.
	pub fn new(fields: BTreeMap<FieldName, SecretValue>) -> Self {
		Self(fields)
	}

	/// Returns the value for `field`.
	pub fn get(&self, field: &str) -> Option<&SecretValue> {
		self.0.get(field)
	}

	/// Returns the non-empty value for `field` or a [`ConfigError::MissingField`].
	pub fn require(&self, field: &str) -> Result<&SecretValue, ConfigError> {
		self.get(field)
			.filter(|value| !value.is_empty())
			.ok_or_else(|| ConfigError::MissingField { field: field.into() })
	}

	/// Iterates over the values in field-name order.
	pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &SecretValue)> {
		self.0.iter()
	}

	/// Number of selected fields.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when nothing was selected.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Borrows the underlying map.
	pub fn as_map(&self) -> &BTreeMap<FieldName, SecretValue> {
		&self.0
	}
}
impl FromIterator<(FieldName, SecretValue)> for SelectedFields {
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (FieldName, SecretValue)>,
	{
		Self(iter.into_iter().collect())
	}
}
impl From<Candidate> for SelectedFields {
	fn from(candidate: Candidate) -> Self {
		Self(candidate.fields)
	}
}

/// Inputs and lifecycle tracking for one provisioning invocation.
///
/// Contexts are never shared between invocations; the only state they hold besides the
/// inputs is the [`ProvisionState`] of the invocation they belong to.
pub struct ProvisionContext {
	fields: SelectedFields,
	fs: Arc<dyn Filesystem>,
	exchange: Option<Arc<dyn TokenExchange>>,
	cancellation: CancellationToken,
	deadline: Option<Instant>,
	ctrl_c: bool,
	state: Mutex<ProvisionState>,
}
impl ProvisionContext {
	/// Creates a context over the real filesystem with no exchange, deadline, or cancellation.
	pub fn new(fields: SelectedFields) -> Self {
		Self {
			fields,
			fs: Arc::new(OsFilesystem::default()),
			exchange: None,
			cancellation: CancellationToken::new(),
			deadline: None,
			ctrl_c: false,
			state: Mutex::new(ProvisionState::Idle),
		}
	}

	/// Replaces the filesystem used for source reads and artifact writes.
	pub fn with_fs(mut self, fs: Arc<dyn Filesystem>) -> Self {
		self.fs = fs;

		self
	}

	/// Sets the token exchange used by provisioners that need a session token.
	///
	/// Wrap the exchange with [`CachePolicy::wrap`](crate::exchange::CachePolicy::wrap) to
	/// opt into token caching.
	pub fn with_exchange(mut self, exchange: Arc<dyn TokenExchange>) -> Self {
		self.exchange = Some(exchange);

		self
	}

	/// Ties the invocation to a caller-owned cancellation token.
	pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
		self.cancellation = cancellation;

		self
	}

	/// Sets an absolute deadline for materializing the artifact.
	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(deadline);

		self
	}

	/// Sets a deadline relative to now.
	pub fn with_timeout(self, timeout: std::time::Duration) -> Self {
		self.with_deadline(Instant::now() + timeout)
	}

	/// Lets [`run_scoped`] treat Ctrl-C as a cancellation of the client command.
	///
	/// Listening for Ctrl-C installs a process-wide SIGINT handler that stays in place for
	/// the rest of the process, replacing the default terminate-on-interrupt behavior.
	/// Only enable it in binaries that own signal handling.
	pub fn with_ctrl_c(mut self, enabled: bool) -> Self {
		self.ctrl_c = enabled;

		self
	}

	/// Selected field values.
	pub fn fields(&self) -> &SelectedFields {
		&self.fields
	}

	/// Filesystem used for source reads and artifact writes.
	pub fn fs(&self) -> &Arc<dyn Filesystem> {
		&self.fs
	}

	/// Configured token exchange, or [`ConfigError::MissingExchange`].
	pub fn exchange(&self) -> Result<&Arc<dyn TokenExchange>, ConfigError> {
		self.exchange.as_ref().ok_or(ConfigError::MissingExchange)
	}

	/// Cancellation token observed by the invocation.
	pub fn cancellation(&self) -> &CancellationToken {
		&self.cancellation
	}

	/// Deadline observed by the invocation, if any.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Whether [`run_scoped`] listens for Ctrl-C.
	pub fn handles_ctrl_c(&self) -> bool {
		self.ctrl_c
	}

	/// Current lifecycle state.
	pub fn state(&self) -> ProvisionState {
		*self.state.lock()
	}

	/// Moves to `next` if the transition is legal; returns whether it happened.
	pub fn enter(&self, next: ProvisionState) -> bool {
		let mut state = self.state.lock();

		if !state.can_transition_to(next) {
			return false;
		}

		obs::trace_transition(state.as_str(), next.as_str());

		*state = next;

		true
	}

	/// Marks the invocation as failed in its current stage.
	pub fn fail(&self) {
		let during = match self.state() {
			ProvisionState::Fetching => FailedStage::Fetching,
			ProvisionState::Exchanging => FailedStage::Exchanging,
			_ => return,
		};

		self.enter(ProvisionState::Failed { during });
	}

	/// Returns [`Error::Cancelled`] or [`Error::DeadlineExceeded`] if either already happened.
	pub fn check_interrupted(&self) -> Result<()> {
		if self.cancellation.is_cancelled() {
			return Err(Error::Cancelled);
		}
		if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
			return Err(Error::DeadlineExceeded);
		}

		Ok(())
	}

	/// Runs `fut` until it finishes, the invocation is cancelled, or the deadline passes.
	///
	/// Cancellation wins over the deadline, which wins over a simultaneously ready result.
	pub async fn guard<F, T>(&self, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		let deadline = async {
			match self.deadline {
				Some(deadline) => tokio::time::sleep_until(deadline).await,
				None => future::pending().await,
			}
		};

		tokio::select! {
			biased;

			_ = self.cancellation.cancelled() => Err(Error::Cancelled),
			_ = deadline => Err(Error::DeadlineExceeded),
			result = fut => result,
		}
	}
}
impl Debug for ProvisionContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProvisionContext")
			.field("fields", &self.fields)
			.field("fs", &self.fs)
			.field("exchange", &self.exchange)
			.field("cancelled", &self.cancellation.is_cancelled())
			.field("deadline", &self.deadline)
			.field("ctrl_c", &self.ctrl_c)
			.field("state", &self.state())
			.finish()
	}
}

/// Credential material handed to exactly one client invocation.
///
/// Dropping the artifact releases it; call [`release`](Self::release) to observe
/// removal failures.
pub struct ProvisionedArtifact {
	provisioner: String,
	env: BTreeMap<EnvVarName, SecretValue>,
	files: Vec<PathBuf>,
	fs: Arc<dyn Filesystem>,
	released: bool,
}
impl ProvisionedArtifact {
	/// Creates an empty artifact whose files live on `fs`.
	pub fn new(provisioner: impl Into<String>, fs: Arc<dyn Filesystem>) -> Self {
		Self {
			provisioner: provisioner.into(),
			env: BTreeMap::new(),
			files: Vec::new(),
			fs,
			released: false,
		}
	}

	/// Adds an environment variable for the client process.
	pub fn with_env(mut self, name: EnvVarName, value: SecretValue) -> Self {
		self.env.insert(name, value);

		self
	}

	/// Tracks a file to remove on release.
	pub fn with_file(mut self, path: PathBuf) -> Self {
		self.files.push(path);

		self
	}

	/// Name of the provisioner that produced the artifact.
	pub fn provisioner(&self) -> &str {
		&self.provisioner
	}

	/// Environment variables applied to the client process.
	pub fn env(&self) -> &BTreeMap<EnvVarName, SecretValue> {
		&self.env
	}

	/// Files still owned by the artifact.
	pub fn files(&self) -> &[PathBuf] {
		&self.files
	}

	/// [`ProvisionState::Materialized`] until released, then [`ProvisionState::Released`].
	pub fn state(&self) -> ProvisionState {
		if self.released { ProvisionState::Released } else { ProvisionState::Materialized }
	}

	/// Exports the environment variables to a tokio command.
	pub fn apply(&self, command: &mut Command) {
		command.envs(self.env.iter().map(|(name, value)| (name.as_ref(), value.expose())));
	}

	/// Exports the environment variables to a standard library command.
	pub fn apply_std(&self, command: &mut StdCommand) {
		command.envs(self.env.iter().map(|(name, value)| (name.as_ref(), value.expose())));
	}

	/// Removes every file and forgets the environment variables.
	///
	/// Missing files count as removed and repeated calls are no-ops. When a removal fails
	/// the file stays tracked so a later call can retry.
	pub fn release(&mut self) -> Result<(), ArtifactError> {
		if self.released {
			return Ok(());
		}

		let mut first_error = None;

		self.files.retain(|path| match fs::remove_if_exists(self.fs.as_ref(), path) {
			Ok(_) => false,
			Err(source) => {
				first_error.get_or_insert(ArtifactError::Remove { path: path.clone(), source });

				true
			},
		});

		if let Some(e) = first_error {
			return Err(e);
		}

		self.env.clear();
		self.released = true;

		Ok(())
	}
}
impl Debug for ProvisionedArtifact {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProvisionedArtifact")
			.field("provisioner", &self.provisioner)
			.field("env", &self.env.keys().collect::<Vec<_>>())
			.field("files", &self.files)
			.field("state", &self.state())
			.finish()
	}
}
impl Drop for ProvisionedArtifact {
	fn drop(&mut self) {
		if let Err(ArtifactError::Remove { path, source }) = self.release() {
			obs::trace_release_failure(&path, &source);
		}
	}
}

/// Wraps a provisioner body with span instrumentation, outcome metrics, and failure tracking.
pub(crate) async fn observe<F>(
	provisioner: &str,
	ctx: &ProvisionContext,
	body: F,
) -> Result<ProvisionedArtifact>
where
	F: Future<Output = Result<ProvisionedArtifact>>,
{
	let span = ProvisionSpan::new(provisioner, "provision");

	obs::record_provision_outcome(provisioner, ProvisionOutcome::Attempt);

	let result = span.instrument(body).await;

	match &result {
		Ok(_) => obs::record_provision_outcome(provisioner, ProvisionOutcome::Success),
		Err(_) => {
			ctx.fail();
			obs::record_provision_outcome(provisioner, ProvisionOutcome::Failure);
		},
	}

	result
}
