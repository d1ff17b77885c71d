// self
use crate::obs::{DiscoveryResult, ProvisionOutcome};

/// Records a provisioning outcome via the global metrics recorder (when enabled).
pub fn record_provision_outcome(provisioner: &str, outcome: ProvisionOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"credential_broker_provision_total",
			"provisioner" => provisioner.to_owned(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (provisioner, outcome);
	}
}

/// Records one strategy invocation (metrics counter plus a debug event when enabled).
pub fn record_discovery(strategy: &str, result: DiscoveryResult) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(strategy, result = result.as_str(), "credential_broker.discovery");
	}

	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"credential_broker_discovery_total",
			"strategy" => strategy.to_owned(),
			"result" => result.as_str()
		)
		.increment(1);
	}

	#[cfg(not(any(feature = "tracing", feature = "metrics")))]
	{
		let _ = (strategy, result);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_features() {
		record_provision_outcome("env_vars", ProvisionOutcome::Failure);
		record_discovery("file", DiscoveryResult::NotFound);
	}
}
