//! Product store that wraps the remote client with caching and optimistic
//! mutations.

use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheEntry, CacheEvent, CacheResult, QueryKey, ResourceCache, Subscription};
use crate::config::Config;
use crate::mutation::MutationOrchestrator;
use crate::remote::{ClientError, ClientResult, Deleted, HttpResourceClient, RemoteResource, RetryPolicy};

use super::keys::ProductQueryKey;
use super::types::{CreateProduct, Product, UpdateProduct};
use super::validation::{validate_name, ValidationError};

/// Failure of a product mutation requested through the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
  /// Rejected locally, nothing was sent
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Client(#[from] ClientError),
}

/// Products API with transparent caching.
///
/// List and search reads go through the cache and the retry policy.
/// Mutations are validated, then applied optimistically to the full list.
pub struct ProductStore<C = HttpResourceClient<Product>> {
  client: Arc<C>,
  mutations: MutationOrchestrator<Product, C>,
  retry: RetryPolicy,
}

impl ProductStore<HttpResourceClient<Product>> {
  /// Create a store talking to the configured API.
  pub fn from_config(config: &Config) -> ClientResult<Self> {
    let client = HttpResourceClient::new(&config.api.base_url, config.api.timeout())?;
    let cache = ResourceCache::new()
      .with_stale_time(config.cache.stale_time())
      .with_prefix_stale_time(ProductQueryKey::search_prefix(), config.cache.search_stale_time());
    Ok(Self::new(cache, client, config.retry))
  }
}

impl<C: RemoteResource<Product>> ProductStore<C> {
  pub fn new(cache: ResourceCache<Product>, client: C, retry: RetryPolicy) -> Self {
    let client = Arc::new(client);
    Self {
      mutations: MutationOrchestrator::new(cache, Arc::clone(&client)),
      client,
      retry,
    }
  }

  pub fn cache(&self) -> &ResourceCache<Product> {
    self.mutations.cache()
  }

  /// Read the list for `key`, keeping the cache metadata.
  pub async fn fetch(&self, key: &ProductQueryKey) -> ClientResult<CacheResult<Vec<Product>>> {
    debug!(query = %key.description(), "fetching products");
    self
      .cache()
      .fetch(&key.cache_key(), || {
        let client = Arc::clone(&self.client);
        let retry = self.retry;
        let term = key.term().map(String::from);
        async move {
          retry
            .run("list products", || client.list(term.as_deref()))
            .await
        }
      })
      .await
  }

  /// All products.
  pub async fn list(&self) -> ClientResult<Vec<Product>> {
    Ok(self.fetch(&ProductQueryKey::List).await?.data)
  }

  /// Products whose name contains `term`. A blank term lists everything.
  pub async fn search(&self, term: &str) -> ClientResult<Vec<Product>> {
    Ok(self.fetch(&ProductQueryKey::search(term)).await?.data)
  }

  /// Force a refetch of `key`, bypassing freshness.
  pub async fn refresh(&self, key: &ProductQueryKey) -> ClientResult<Vec<Product>> {
    self.cache().invalidate(&key.cache_key());
    Ok(self.fetch(key).await?.data)
  }

  /// Get a single product (not cached).
  pub async fn get(&self, id: &str) -> ClientResult<Product> {
    self.client.get(id).await
  }

  pub async fn create(&self, name: &str) -> Result<Product, ProductError> {
    let name = validate_name(name)?;
    let key = ProductQueryKey::List.cache_key();
    Ok(self.mutations.create(&key, CreateProduct::new(name)).await?)
  }

  pub async fn rename(&self, id: &str, name: &str) -> Result<Product, ProductError> {
    let name = validate_name(name)?;
    let key = ProductQueryKey::List.cache_key();
    Ok(self.mutations.update(&key, UpdateProduct::new(id, name)).await?)
  }

  pub async fn delete(&self, id: &str) -> Result<Deleted, ProductError> {
    let key = ProductQueryKey::List.cache_key();
    Ok(self.mutations.delete(&key, id).await?)
  }

  /// Current cache entry for `key`, without fetching.
  pub fn entry(&self, key: &ProductQueryKey) -> Option<CacheEntry<Product>> {
    self.cache().get(&key.cache_key())
  }

  pub fn subscribe<F>(&self, key: &ProductQueryKey, listener: F) -> Subscription
  where
    F: Fn(&CacheEvent) + Send + Sync + 'static,
  {
    self.cache().subscribe(&key.cache_key(), listener)
  }
}

impl<C> Clone for ProductStore<C> {
  fn clone(&self) -> Self {
    Self {
      client: Arc::clone(&self.client),
      mutations: self.mutations.clone(),
      retry: self.retry,
    }
  }
}
