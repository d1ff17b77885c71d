// self
use crate::_prelude::*;

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedProvision<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedProvision<F> = F;

/// A span builder used by provisioners.
#[derive(Clone, Debug)]
pub struct ProvisionSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl ProvisionSpan {
	/// Creates a new span tagged with the provisioner name + stage.
	pub fn new(provisioner: &str, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("credential_broker.provision", provisioner, stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (provisioner, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedProvision<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event for a provisioning state transition (when enabled).
pub fn trace_transition(from: &'static str, to: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(from, to, "credential_broker.transition");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (from, to);
	}
}

/// Emits a warning when an artifact could not be removed during teardown (when enabled).
pub fn trace_release_failure(path: &Path, error: &dyn StdError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(path = %path.display(), error = %error, "credential_broker.release_failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (path, error);
	}
}

/// Emits a warning when a token cache operation fails and is bypassed (when enabled).
pub fn trace_cache_failure(operation: &'static str, error: &dyn StdError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(operation, error = %error, "credential_broker.cache_bypassed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (operation, error);
	}
}
