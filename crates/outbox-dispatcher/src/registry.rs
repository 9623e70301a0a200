//! Named lookup of dispatchers.
//!
//! Requests can be routed by URL: `relay+https://host/path` goes to the
//! dispatcher registered as `relay`, which delivers to `https://host/path`.

use crate::{Dispatcher, HttpMethod, OutboxError, OutboxResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

/// Registry of running dispatchers keyed by name.
#[derive(Default)]
pub struct DispatcherRegistry {
    dispatchers: RwLock<HashMap<String, Arc<Dispatcher>>>,
}

impl DispatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dispatcher under its own name.
    pub async fn register(&self, dispatcher: Arc<Dispatcher>) -> OutboxResult<()> {
        let name = dispatcher.name().to_string();
        let mut dispatchers = self.dispatchers.write().await;
        if dispatchers.contains_key(&name) {
            return Err(OutboxError::DuplicateName(name));
        }
        dispatchers.insert(name.clone(), dispatcher);

        info!(dispatcher = %name, "Registered dispatcher");
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<Arc<Dispatcher>> {
        self.dispatchers.read().await.get(name).cloned()
    }

    /// Unregister a dispatcher. It keeps running until shut down.
    pub async fn remove(&self, name: &str) -> Option<Arc<Dispatcher>> {
        let removed = self.dispatchers.write().await.remove(name);
        if removed.is_some() {
            info!(dispatcher = %name, "Removed dispatcher");
        }
        removed
    }

    /// Registered names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.dispatchers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn count(&self) -> usize {
        self.dispatchers.read().await.len()
    }

    /// Resolve `name+scheme://rest` to the dispatcher named `name` and the
    /// target URL `scheme://rest`.
    pub async fn route(&self, url: &str) -> OutboxResult<(Arc<Dispatcher>, Url)> {
        let (name, target) =
            split_routed(url).ok_or_else(|| OutboxError::UnknownDispatcher(url.to_string()))?;

        let dispatcher = self
            .get(name)
            .await
            .ok_or_else(|| OutboxError::UnknownDispatcher(name.to_string()))?;
        let target = Url::parse(target)?;

        Ok((dispatcher, target))
    }

    /// Route `url` and enqueue the request on the matching dispatcher.
    pub async fn enqueue_routed(
        &self,
        url: &str,
        method: HttpMethod,
        payload: &str,
    ) -> OutboxResult<i64> {
        let (dispatcher, target) = self.route(url).await?;
        dispatcher.enqueue(target.as_str(), method, payload).await
    }

    /// Shut down and unregister every dispatcher.
    pub async fn shutdown_all(&self) {
        let dispatchers: Vec<_> = self.dispatchers.write().await.drain().collect();

        for (name, dispatcher) in dispatchers {
            if let Err(e) = dispatcher.shutdown().await {
                warn!(dispatcher = %name, error = %e, "Error stopping dispatcher");
            }
        }
    }
}

/// Split `name+scheme://rest` into `("name", "scheme://rest")`.
fn split_routed(url: &str) -> Option<(&str, &str)> {
    let (scheme, _) = url.split_once("://")?;
    let (name, _) = scheme.split_once('+')?;
    if name.is_empty() || name.len() + 1 == scheme.len() {
        return None;
    }
    Some((name, &url[name.len() + 1..]))
}
