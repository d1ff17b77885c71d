//! Optional observability helpers for discovery and provisioning.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `credential_broker.provision` with the
//!   `provisioner` and `stage` fields, plus debug events for strategy outcomes and
//!   provisioning state transitions.
//! - Enable `metrics` to increment `credential_broker_provision_total` (labeled by
//!   `provisioner` + `outcome`) and `credential_broker_discovery_total` (labeled by
//!   `strategy` + `result`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each provisioning invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProvisionOutcome {
	/// Entry to a provisioner.
	Attempt,
	/// Artifact materialized.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl ProvisionOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ProvisionOutcome::Attempt => "attempt",
			ProvisionOutcome::Success => "success",
			ProvisionOutcome::Failure => "failure",
		}
	}
}
impl Display for ProvisionOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Result labels recorded for each strategy invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiscoveryResult {
	/// The strategy proposed a candidate.
	Found,
	/// The strategy found nothing.
	NotFound,
	/// The strategy recorded an error.
	Failed,
}
impl DiscoveryResult {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			DiscoveryResult::Found => "found",
			DiscoveryResult::NotFound => "not_found",
			DiscoveryResult::Failed => "failed",
		}
	}
}
impl Display for DiscoveryResult {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
