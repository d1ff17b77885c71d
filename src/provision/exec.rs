//! Scoped command runner: provision, run one client command, tear down.

// std
use std::{future, process::ExitStatus};
// crates.io
use tokio::{process::Command, signal};
// self
use crate::{
	_prelude::*,
	error::ProcessError,
	provision::{ProvisionContext, ProvisionedArtifact, Provisioner},
};

enum Exit {
	Exited(std::io::Result<ExitStatus>),
	Interrupted,
}

/// Provisions an artifact, runs `command` with it, and releases the artifact afterwards.
///
/// The child is killed when the context's cancellation token fires or, if
/// [`ProvisionContext::with_ctrl_c`] enabled it, when the process receives Ctrl-C; both
/// surface as [`Error::Cancelled`]. Ctrl-C handling is off by default because the handler
/// replaces the process-wide SIGINT behavior once installed. The artifact is released on
/// every path, including spawn failures. A release failure is reported only when the
/// command itself succeeded.
pub async fn run_scoped(
	provisioner: &dyn Provisioner,
	ctx: &ProvisionContext,
	mut command: Command,
) -> Result<ExitStatus> {
	let mut artifact = provisioner.provision(ctx).await?;
	let outcome = supervise(&artifact, ctx, &mut command).await;
	let released = artifact.release();
	let status = outcome?;

	released?;

	Ok(status)
}

async fn supervise(
	artifact: &ProvisionedArtifact,
	ctx: &ProvisionContext,
	command: &mut Command,
) -> Result<ExitStatus> {
	artifact.apply(command);
	command.kill_on_drop(true);

	let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
		program: command.as_std().get_program().to_string_lossy().into_owned(),
		source,
	})?;
	let interrupt = async {
		if ctx.handles_ctrl_c() { ctrl_c().await } else { future::pending().await }
	};
	let exit = tokio::select! {
		status = child.wait() => Exit::Exited(status),
		_ = ctx.cancellation().cancelled() => Exit::Interrupted,
		_ = interrupt => Exit::Interrupted,
	};

	match exit {
		Exit::Exited(status) => status.map_err(|e| ProcessError::Wait(e).into()),
		Exit::Interrupted => {
			child.kill().await.map_err(ProcessError::Kill)?;

			Err(Error::Cancelled)
		},
	}
}

// Never resolves when the signal handler cannot be installed.
async fn ctrl_c() {
	if signal::ctrl_c().await.is_err() {
		future::pending::<()>().await;
	}
}

#[cfg(all(test, unix))]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{EnvVarName, FieldName, SecretValue},
		fs::MemoryFilesystem,
		provision::{EnvVarProvisioner, EphemeralFileProvisioner, SelectedFields, StaticContent},
	};

	fn ctx(fs: &Arc<MemoryFilesystem>) -> ProvisionContext {
		let fields = SelectedFields::from_iter([(
			FieldName::new("api_key").expect("Field fixture should be valid."),
			SecretValue::new("secret"),
		)]);

		ProvisionContext::new(fields).with_fs(fs.clone())
	}

	fn shell(script: &str) -> Command {
		let mut command = Command::new("sh");

		command.arg("-c").arg(script);

		command
	}

	#[tokio::test]
	async fn child_sees_the_artifact_environment() {
		let fs = Arc::new(MemoryFilesystem::default());
		let provisioner = EnvVarProvisioner::new([(
			EnvVarName::new("SERVICE_API_KEY").expect("Env var fixture should be valid."),
			FieldName::new("api_key").expect("Field fixture should be valid."),
		)]);
		let status = run_scoped(&provisioner, &ctx(&fs), shell(r#"test "$SERVICE_API_KEY" = secret"#))
			.await
			.expect("Command should run.");

		assert!(status.success());

		let status = run_scoped(&provisioner, &ctx(&fs), shell("exit 3"))
			.await
			.expect("Command should run.");

		assert_eq!(status.code(), Some(3));
	}

	#[tokio::test]
	async fn ctrl_c_handling_is_opt_in() {
		let fs = Arc::new(MemoryFilesystem::default());
		let provisioner = EnvVarProvisioner::new(Vec::<(EnvVarName, FieldName)>::new());

		assert!(!ctx(&fs).handles_ctrl_c());

		let ctx = ctx(&fs).with_ctrl_c(true);

		assert!(ctx.handles_ctrl_c());

		let status =
			run_scoped(&provisioner, &ctx, shell("exit 0")).await.expect("Command should run.");

		assert!(status.success());
	}

	#[tokio::test]
	async fn files_are_removed_after_exit() {
		let fs = Arc::new(MemoryFilesystem::with_home("/home/tester"));
		let provisioner =
			EphemeralFileProvisioner::at_fixed_path("~/config.json", StaticContent(b"{}".to_vec()));

		run_scoped(&provisioner, &ctx(&fs), shell("true")).await.expect("Command should run.");

		assert!(fs.paths().is_empty());
	}

	#[tokio::test]
	async fn cancellation_kills_the_child_and_releases() {
		let fs = Arc::new(MemoryFilesystem::with_home("/home/tester"));
		let provisioner =
			EphemeralFileProvisioner::at_fixed_path("~/config.json", StaticContent(b"{}".to_vec()));
		let ctx = ctx(&fs);
		let cancellation = ctx.cancellation().clone();

		tokio::spawn(async move {
			tokio::time::sleep(std::time::Duration::from_millis(100)).await;
			cancellation.cancel();
		});

		let err = run_scoped(&provisioner, &ctx, shell("sleep 30"))
			.await
			.expect_err("Cancelled commands must fail.");

		assert!(matches!(err, Error::Cancelled));
		assert!(fs.paths().is_empty());
	}

	#[tokio::test]
	async fn spawn_failures_still_release() {
		let fs = Arc::new(MemoryFilesystem::with_home("/home/tester"));
		let provisioner =
			EphemeralFileProvisioner::at_fixed_path("~/config.json", StaticContent(b"{}".to_vec()));
		let err = run_scoped(&provisioner, &ctx(&fs), Command::new("/nonexistent/client-binary"))
			.await
			.expect_err("Missing binaries must fail.");

		assert!(matches!(err, Error::Process(ProcessError::Spawn { .. })));
		assert!(fs.paths().is_empty());
	}
}
