//! `ContainerRegistry` creates data containers for loading policies.
//!
//! Each [`LoadingPolicy`] maps to a provider that constructs a container. [`ContainerRegistry::new`]
//! registers the built-in containers; [`ContainerRegistry::new_empty`] together with
//! [`ContainerRegistry::register`] builds custom sets. Asking for a policy without a provider never
//! fails: a [`MemoryContainer`] is used instead, with a warning.
//!
//! # Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use tilestore_container::*;
//! use tilestore_core::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = Arc::new(TileCache::new(CacheConfig::new(1 << 16, None)));
//!     let registry = ContainerRegistry::new_empty(cache);
//!
//!     // no provider for `lazy`, so the registry falls back to memory
//!     let reader = Arc::new(MemoryGridReader::new("demo", 2, 2, 1, Blob::from(vec![1, 2, 3, 4]))?);
//!     let container = registry.with_loading_policy(reader, LoadingPolicy::Lazy).await?;
//!     assert_eq!(container.policy(), LoadingPolicy::Memory);
//!     assert_eq!(registry.fallbacks(), 1);
//!     Ok(())
//! }
//! ```

use crate::{CachedContainer, DataContainer, GridReader, LazyContainer, MemoryContainer, TileCache};
use anyhow::Result;
use std::{
	collections::HashMap,
	fmt,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};
use tilestore_core::LoadingPolicy;
use tilestore_derive::context;

/// Constructs an unbound container. Receives the shared tile cache.
type Provider = Box<dyn Fn(Arc<TileCache>) -> Box<dyn DataContainer> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct ContainerRegistry {
	providers: HashMap<LoadingPolicy, Arc<Provider>>,
	cache: Arc<TileCache>,
	fallbacks: Arc<AtomicU64>,
}

impl ContainerRegistry {
	/// Creates a registry with providers for `memory`, `lazy` and `cached`.
	pub fn new(cache: Arc<TileCache>) -> ContainerRegistry {
		let mut registry = ContainerRegistry::new_empty(cache);
		registry.register(LoadingPolicy::Memory, |_| Box::new(MemoryContainer::new()));
		registry.register(LoadingPolicy::Lazy, |_| Box::new(LazyContainer::new()));
		registry.register(LoadingPolicy::Cached, |cache| Box::new(CachedContainer::new(cache)));
		registry
	}

	/// Creates a registry without any providers.
	pub fn new_empty(cache: Arc<TileCache>) -> ContainerRegistry {
		ContainerRegistry {
			providers: HashMap::new(),
			cache,
			fallbacks: Arc::new(AtomicU64::new(0)),
		}
	}

	/// Registers `provider` for `policy`, replacing an earlier one.
	///
	/// Aliases are resolved, so registering for [`LoadingPolicy::None`] registers for `Memory`.
	pub fn register<F>(&mut self, policy: LoadingPolicy, provider: F)
	where
		F: Fn(Arc<TileCache>) -> Box<dyn DataContainer> + Send + Sync + 'static,
	{
		let policy = policy.resolved();
		if self.providers.insert(policy, Arc::new(Box::new(provider))).is_some() {
			log::debug!("replaced container provider for '{policy}'");
		}
	}

	/// Creates an unbound container for `policy`.
	pub fn create(&self, policy: LoadingPolicy) -> Box<dyn DataContainer> {
		let resolved = policy.resolved();
		if let Some(provider) = self.providers.get(&resolved) {
			return provider(Arc::clone(&self.cache));
		}
		self.fallbacks.fetch_add(1, Ordering::Relaxed);
		log::warn!("no container provider for loading policy '{policy}', falling back to 'memory'");
		match self.providers.get(&LoadingPolicy::Memory) {
			Some(provider) => provider(Arc::clone(&self.cache)),
			None => Box::new(MemoryContainer::new()),
		}
	}

	/// Creates a container for `policy` and binds it to `reader`.
	#[context("creating '{}' container for '{}'", policy, reader.name())]
	pub async fn with_loading_policy(
		&self,
		reader: Arc<dyn GridReader>,
		policy: LoadingPolicy,
	) -> Result<Box<dyn DataContainer>> {
		let container = self.create(policy);
		container.bind(Arc::clone(&reader)).await?;
		Ok(container)
	}

	/// Number of requests that had to fall back to the memory container.
	pub fn fallbacks(&self) -> u64 {
		self.fallbacks.load(Ordering::Relaxed)
	}

	/// Policies with a registered provider, sorted by name.
	pub fn policies(&self) -> Vec<LoadingPolicy> {
		let mut policies: Vec<LoadingPolicy> = self.providers.keys().copied().collect();
		policies.sort_by_key(LoadingPolicy::as_str);
		policies
	}

	pub fn cache(&self) -> &Arc<TileCache> {
		&self.cache
	}
}

impl fmt::Debug for ContainerRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ContainerRegistry")
			.field("policies", &self.policies())
			.field("fallbacks", &self.fallbacks())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::CountingReader;
	use pretty_assertions::assert_eq;
	use rstest::rstest;
	use tilestore_core::CacheConfig;

	fn registry() -> ContainerRegistry {
		ContainerRegistry::new(Arc::new(TileCache::new(CacheConfig::new(1 << 16, None))))
	}

	#[rstest]
	#[case(LoadingPolicy::None, LoadingPolicy::Memory, 1)]
	#[case(LoadingPolicy::Memory, LoadingPolicy::Memory, 1)]
	#[case(LoadingPolicy::Lazy, LoadingPolicy::Lazy, 0)]
	#[case(LoadingPolicy::Cached, LoadingPolicy::Cached, 0)]
	#[tokio::test]
	async fn built_in_policies(
		#[case] requested: LoadingPolicy,
		#[case] expected: LoadingPolicy,
		#[case] reads_at_bind: u64,
	) -> Result<()> {
		let registry = registry();
		let reader = CountingReader::new(4, 8).arc();
		let container = registry.with_loading_policy(reader.clone(), requested).await?;

		assert_eq!(container.policy(), expected);
		assert!(container.identifier().is_some());
		assert_eq!(reader.reads(), reads_at_bind);

		assert_eq!(container.get_data().await?.as_slice(), &[8u8; 16]);
		assert_eq!(container.get_data().await?.as_slice(), &[8u8; 16]);
		assert_eq!(reader.reads(), 1);
		assert_eq!(registry.fallbacks(), 0);
		Ok(())
	}

	#[tokio::test]
	async fn cached_containers_use_the_registry_cache() -> Result<()> {
		let registry = registry();
		let container = registry
			.with_loading_policy(CountingReader::new(4, 0).arc(), LoadingPolicy::Cached)
			.await?;
		container.get_read_only_data().await?;
		assert_eq!(registry.cache().occupied_bytes(), 16);
		assert_eq!(container.occupied_bytes(), 16);
		Ok(())
	}

	#[tokio::test]
	async fn missing_provider_falls_back_to_memory() -> Result<()> {
		let mut registry = ContainerRegistry::new_empty(registry().cache().clone());
		registry.register(LoadingPolicy::Cached, |cache| Box::new(CachedContainer::new(cache)));
		assert_eq!(registry.policies(), vec![LoadingPolicy::Cached]);

		let reader = CountingReader::new(2, 0).arc();
		let container = registry.with_loading_policy(reader.clone(), LoadingPolicy::Lazy).await?;
		assert_eq!(container.policy(), LoadingPolicy::Memory);
		assert_eq!(reader.reads(), 1);
		assert_eq!(registry.fallbacks(), 1);

		registry.create(LoadingPolicy::None);
		assert_eq!(registry.fallbacks(), 2);
		registry.create(LoadingPolicy::Cached);
		assert_eq!(registry.fallbacks(), 2);
		Ok(())
	}

	#[test]
	fn register_replaces_and_resolves_aliases() {
		let mut registry = registry();
		assert_eq!(
			registry.policies(),
			vec![LoadingPolicy::Cached, LoadingPolicy::Lazy, LoadingPolicy::Memory]
		);

		registry.register(LoadingPolicy::None, |_| Box::new(LazyContainer::new()));
		assert_eq!(registry.policies().len(), 3);
		assert_eq!(registry.create(LoadingPolicy::Memory).policy(), LoadingPolicy::Lazy);
	}

	#[tokio::test]
	async fn failing_bind_names_policy_and_reader() {
		let reader = CountingReader::new(2, 0).arc();
		reader.set_failing(true);
		let result = registry().with_loading_policy(reader, LoadingPolicy::Memory).await;
		let err = result.unwrap_err();
		assert_eq!(
			err.chain().next().map(ToString::to_string),
			Some(String::from("creating 'memory' container for 'counting'"))
		);
	}
}
