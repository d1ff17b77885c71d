//! Strategy chain (importer): ordered, failure-tolerant discovery.
//!
//! [`StrategyChain::run`] invokes every strategy exactly once, in list order, and appends
//! each candidate and each error to one [`ImportAttempt`]. Nothing is deduplicated or
//! ranked; picking among candidates is the caller's decision.
//! [`StrategyChain::run_concurrent`] evaluates the strategies on scoped threads and
//! reassembles the results in list order, so callers observe the same lists either way.

// std
use std::thread;
// self
use crate::{
	_prelude::*,
	discovery::{Candidate, DiscoveryEnv, DiscoveryError, DiscoveryOutcome, DiscoveryStrategy},
	obs::{self, DiscoveryResult},
};

/// Candidates and errors accumulated across one chain run.
#[derive(Debug, Default)]
pub struct ImportAttempt {
	/// Candidates in strategy order.
	pub candidates: Vec<Candidate>,
	/// Errors in strategy order.
	pub errors: Vec<DiscoveryError>,
}
impl ImportAttempt {
	/// Appends a candidate.
	pub fn add_candidate(&mut self, candidate: Candidate) {
		self.candidates.push(candidate);
	}

	/// Appends an error.
	pub fn add_error(&mut self, error: DiscoveryError) {
		self.errors.push(error);
	}

	/// Folds one strategy outcome into the attempt.
	pub fn absorb(&mut self, outcome: DiscoveryOutcome) {
		if let Some(candidate) = outcome.candidate {
			self.add_candidate(candidate);
		}
		if let Some(error) = outcome.error {
			self.add_error(error);
		}
	}

	/// Returns `true` when no strategy found anything and none failed.
	pub fn is_empty(&self) -> bool {
		self.candidates.is_empty() && self.errors.is_empty()
	}
}

/// Ordered list of strategies run against the same [`ImportAttempt`].
#[derive(Clone, Default)]
pub struct StrategyChain {
	strategies: Vec<Arc<dyn DiscoveryStrategy>>,
}
impl StrategyChain {
	/// Creates a chain that tries every strategy in order.
	pub fn try_all<I>(strategies: I) -> Self
	where
		I: IntoIterator<Item = Arc<dyn DiscoveryStrategy>>,
	{
		Self { strategies: strategies.into_iter().collect() }
	}

	/// Appends a strategy to the end of the chain.
	pub fn then(mut self, strategy: impl 'static + DiscoveryStrategy) -> Self {
		self.strategies.push(Arc::new(strategy));

		self
	}

	/// Number of strategies in the chain.
	pub fn len(&self) -> usize {
		self.strategies.len()
	}

	/// Returns `true` if the chain has no strategies.
	pub fn is_empty(&self) -> bool {
		self.strategies.is_empty()
	}

	/// Runs every strategy once, in order, and collects the results.
	pub fn run(&self, env: &DiscoveryEnv) -> ImportAttempt {
		let mut attempt = ImportAttempt::default();

		for strategy in &self.strategies {
			attempt.absorb(evaluate(strategy.as_ref(), env));
		}

		attempt
	}

	/// Same contract as [`run`](Self::run), evaluating strategies in parallel.
	pub fn run_concurrent(&self, env: &DiscoveryEnv) -> ImportAttempt {
		let outcomes: Vec<DiscoveryOutcome> = thread::scope(|scope| {
			let handles: Vec<_> = self
				.strategies
				.iter()
				.map(|strategy| scope.spawn(move || evaluate(strategy.as_ref(), env)))
				.collect();

			handles
				.into_iter()
				.map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
				.collect()
		});
		let mut attempt = ImportAttempt::default();

		for outcome in outcomes {
			attempt.absorb(outcome);
		}

		attempt
	}
}
impl Debug for StrategyChain {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_list().entries(self.strategies.iter()).finish()
	}
}

fn evaluate(strategy: &dyn DiscoveryStrategy, env: &DiscoveryEnv) -> DiscoveryOutcome {
	let outcome = strategy.discover(env);
	let result = match (&outcome.candidate, &outcome.error) {
		(_, Some(_)) => DiscoveryResult::Failed,
		(Some(_), None) => DiscoveryResult::Found,
		(None, None) => DiscoveryResult::NotFound,
	};

	obs::record_discovery(strategy.name(), result);

	outcome
}
