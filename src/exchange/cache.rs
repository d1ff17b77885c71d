//! Opt-in token caching for exchanges.
//!
//! Nothing is cached unless a caller selects [`CachePolicy::Enabled`]. Entries are keyed
//! by endpoint plus [`KeyFingerprint`], so the raw API key never becomes a map key, and a
//! per-key fill guard makes concurrent callers share one exchange instead of stampeding
//! the auth endpoint. Cache backend failures are logged and bypassed; they never fail an
//! exchange.

// self
use crate::{
	_prelude::*,
	auth::{KeyFingerprint, SecretValue, Token},
	exchange::{AuthEndpoint, ExchangeFuture, TokenExchange},
	obs,
};

/// Boxed future returned by [`TokenCache`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Error type produced by [`TokenCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheError {
	/// Backend-level failure for the cache engine.
	#[error("Cache backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Identifies one cached token.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
	/// Endpoint the token was issued by.
	pub endpoint: AuthEndpoint,
	/// Fingerprint of the API key the token was exchanged for.
	pub fingerprint: KeyFingerprint,
}
impl CacheKey {
	/// Builds a key for the provided API key and endpoint.
	pub fn new(api_key: &SecretValue, endpoint: &AuthEndpoint) -> Self {
		Self { endpoint: endpoint.clone(), fingerprint: KeyFingerprint::of(api_key) }
	}
}

/// Storage contract for cached tokens.
///
/// Implementations backing onto disk are expected to encrypt entries at rest.
pub trait TokenCache
where
	Self: Debug + Send + Sync,
{
	/// Returns the token stored under `key`, if any.
	fn fetch<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<Token>>;

	/// Stores or replaces the token under `key`.
	fn save<'a>(&'a self, key: &'a CacheKey, token: Token) -> CacheFuture<'a, ()>;

	/// Removes and returns the token stored under `key`.
	fn evict<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<Token>>;
}

type CacheMap = Arc<RwLock<HashMap<CacheKey, Token>>>;

/// Thread-safe in-process [`TokenCache`].
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenCache(CacheMap);
impl MemoryTokenCache {
	/// Number of cached tokens.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl TokenCache for MemoryTokenCache {
	fn fetch<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<Token>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn save<'a>(&'a self, key: &'a CacheKey, token: Token) -> CacheFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.clone(), token);

			Ok(())
		})
	}

	fn evict<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<Token>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(key)) })
	}
}

/// Whether exchanged tokens may outlive the invocation that requested them.
#[derive(Clone, Debug, Default)]
pub enum CachePolicy {
	/// Every provisioning invocation performs its own exchange.
	#[default]
	Disabled,
	/// Tokens are reused until their remaining lifetime drops to `preemptive_window`.
	Enabled {
		/// Backing store.
		cache: Arc<dyn TokenCache>,
		/// Tokens expiring within this window are exchanged again.
		preemptive_window: Duration,
	},
}
impl CachePolicy {
	/// Window used by [`in_memory`](Self::in_memory).
	pub const DEFAULT_PREEMPTIVE_WINDOW: Duration = Duration::seconds(60);

	/// Enables caching in a fresh [`MemoryTokenCache`].
	pub fn in_memory() -> Self {
		Self::Enabled {
			cache: Arc::new(MemoryTokenCache::default()),
			preemptive_window: Self::DEFAULT_PREEMPTIVE_WINDOW,
		}
	}

	/// Returns `true` for [`CachePolicy::Enabled`].
	pub fn is_enabled(&self) -> bool {
		matches!(self, Self::Enabled { .. })
	}

	/// Applies the policy to an exchange.
	pub fn wrap(self, exchange: Arc<dyn TokenExchange>) -> Arc<dyn TokenExchange> {
		match self {
			Self::Disabled => exchange,
			Self::Enabled { cache, preemptive_window } =>
				Arc::new(CachingExchange::new(exchange, cache, preemptive_window)),
		}
	}
}

/// [`TokenExchange`] decorator that consults a [`TokenCache`] first.
#[derive(Debug)]
pub struct CachingExchange {
	inner: Arc<dyn TokenExchange>,
	cache: Arc<dyn TokenCache>,
	preemptive_window: Duration,
	fill_guards: Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
}
impl CachingExchange {
	/// Wraps `inner`; negative windows are clamped to zero.
	pub fn new(
		inner: Arc<dyn TokenExchange>,
		cache: Arc<dyn TokenCache>,
		preemptive_window: Duration,
	) -> Self {
		let preemptive_window =
			if preemptive_window.is_negative() { Duration::ZERO } else { preemptive_window };

		Self { inner, cache, preemptive_window, fill_guards: Default::default() }
	}

	fn fill_slot(&self, key: &CacheKey) -> FillSlot<'_> {
		let mut guards = self.fill_guards.lock();
		let guard = guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone();

		FillSlot { owner: self, key: key.clone(), guard }
	}

	async fn exchange_cached(&self, api_key: &SecretValue, endpoint: &AuthEndpoint) -> Result<Token> {
		let key = CacheKey::new(api_key, endpoint);
		// Declared before the lock guard so the lock is released before the slot prunes itself.
		let slot = self.fill_slot(&key);
		let _singleflight = slot.guard.lock().await;
		let now = OffsetDateTime::now_utc();

		match self.cache.fetch(&key).await {
			Ok(Some(token)) if !token.expires_within(self.preemptive_window, now) =>
				return Ok(token),
			Ok(_) => {},
			Err(e) => obs::trace_cache_failure("fetch", &e),
		}

		let token = self.inner.exchange(api_key, endpoint).await?;

		if let Err(e) = self.cache.save(&key, token.clone()).await {
			obs::trace_cache_failure("save", &e);
		}

		Ok(token)
	}
}
impl TokenExchange for CachingExchange {
	fn exchange<'a>(
		&'a self,
		api_key: &'a SecretValue,
		endpoint: &'a AuthEndpoint,
	) -> ExchangeFuture<'a> {
		Box::pin(self.exchange_cached(api_key, endpoint))
	}
}

// A caller's claim on a per-key fill lock. The map entry is dropped with the last claim.
struct FillSlot<'a> {
	owner: &'a CachingExchange,
	key: CacheKey,
	guard: Arc<AsyncMutex<()>>,
}
impl Drop for FillSlot<'_> {
	fn drop(&mut self) {
		let mut guards = self.owner.fill_guards.lock();

		// Claims are only cloned under the map lock, so two references mean the map and us.
		if guards.get(&self.key).is_some_and(|g| Arc::ptr_eq(g, &self.guard))
			&& Arc::strong_count(&self.guard) == 2
		{
			guards.remove(&self.key);
		}
	}
}
