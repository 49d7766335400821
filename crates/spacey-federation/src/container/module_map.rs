// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module map with single-flight loading
//!
//! Every logical key owns a slot that moves through
//! `Unrequested -> Pending -> Resolved | Failed`. The pending state stores the
//! in-flight future itself, so concurrent `get` calls for the same key attach
//! to one load instead of starting another.

use crate::container::namespace::{ModuleAccessor, ModuleNamespace};
use crate::error::{FederationError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Deferred loader producing a module namespace
pub type ModuleLoader = Arc<dyn Fn() -> BoxFuture<'static, Result<ModuleNamespace>> + Send + Sync>;

type PendingLoad = Shared<BoxFuture<'static, Result<ModuleAccessor>>>;

/// Observable state of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// Never requested
    Unrequested,
    /// Load in flight
    Pending,
    /// Loaded successfully
    Resolved,
    /// Load failed; the failure is replayed to later callers
    Failed,
}

enum SlotState {
    Unrequested,
    Pending(PendingLoad),
    Resolved(ModuleAccessor),
    Failed(FederationError),
}

struct ModuleSlot {
    key: String,
    loader: ModuleLoader,
    state: Mutex<SlotState>,
    loads: AtomicUsize,
}

impl ModuleSlot {
    fn new(key: String, loader: ModuleLoader) -> Self {
        Self {
            key,
            loader,
            state: Mutex::new(SlotState::Unrequested),
            loads: AtomicUsize::new(0),
        }
    }

    async fn resolve(&self) -> Result<ModuleAccessor> {
        let pending = {
            let mut state = self.state.lock();
            match &*state {
                SlotState::Resolved(accessor) => return Ok(accessor.clone()),
                SlotState::Failed(err) => return Err(err.clone()),
                SlotState::Pending(pending) => {
                    debug!("Joining in-flight load of {}", self.key);
                    pending.clone()
                }
                SlotState::Unrequested => {
                    debug!("Loading remote module {}", self.key);
                    self.loads.fetch_add(1, Ordering::SeqCst);
                    let load = (self.loader)();
                    let pending = async move { load.await.map(ModuleAccessor::from_namespace) }
                        .boxed()
                        .shared();
                    *state = SlotState::Pending(pending.clone());
                    pending
                }
            }
        };

        let result = pending.await;

        let mut state = self.state.lock();
        if matches!(*state, SlotState::Pending(_)) {
            *state = match &result {
                Ok(accessor) => SlotState::Resolved(accessor.clone()),
                Err(err) => SlotState::Failed(err.clone()),
            };
        }
        result
    }

    fn status(&self) -> SlotStatus {
        match &*self.state.lock() {
            SlotState::Unrequested => SlotStatus::Unrequested,
            SlotState::Pending(_) => SlotStatus::Pending,
            SlotState::Resolved(_) => SlotStatus::Resolved,
            SlotState::Failed(_) => SlotStatus::Failed,
        }
    }
}

/// Mapping from logical key to a memoized deferred loader
#[derive(Default)]
pub struct ModuleMap {
    slots: HashMap<String, Arc<ModuleSlot>>,
    order: Vec<String>,
}

impl ModuleMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from `(key, loader)` pairs.
    ///
    /// A key that appears twice is rejected.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, ModuleLoader)>,
    {
        let mut map = Self::new();
        for (key, loader) in entries {
            if map.slots.contains_key(&key) {
                return Err(FederationError::DuplicateExpose(key));
            }
            map.order.push(key.clone());
            map.slots
                .insert(key.clone(), Arc::new(ModuleSlot::new(key, loader)));
        }
        Ok(map)
    }

    /// Resolve a logical key, loading the module at most once
    pub async fn get(&self, key: &str) -> Result<ModuleAccessor> {
        let slot = self
            .slots
            .get(key)
            .cloned()
            .ok_or_else(|| FederationError::module_not_found(key))?;
        slot.resolve().await
    }

    /// Whether a key is exposed
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Exposed keys in declaration order
    pub fn keys(&self) -> &[String] {
        &self.order
    }

    /// Number of exposed keys
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing is exposed
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// State of a key's slot
    pub fn status(&self, key: &str) -> Option<SlotStatus> {
        self.slots.get(key).map(|slot| slot.status())
    }

    /// How many times the loader behind a key has run
    pub fn load_count(&self, key: &str) -> usize {
        self.slots
            .get(key)
            .map(|slot| slot.loads.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

/// Wrap an async closure as a [`ModuleLoader`]
pub fn module_loader<F, Fut>(f: F) -> ModuleLoader
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<ModuleNamespace>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn slow_button(counter: Arc<AtomicUsize>) -> ModuleLoader {
        module_loader(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(ModuleNamespace::new().with_export("default", "Button"))
            }
        })
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_load() {
        let counter = Arc::new(AtomicUsize::new(0));
        let map = ModuleMap::from_entries([(
            "./Button".to_string(),
            slow_button(Arc::clone(&counter)),
        )])
        .unwrap();

        let (a, b) = tokio::join!(map.get("./Button"), map.get("./Button"));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(map.load_count("./Button"), 1);
        assert!(a.same_module(&b));
        assert_eq!(a.call(), json!("Button"));
    }

    #[tokio::test]
    async fn test_resolved_value_is_memoized() {
        let counter = Arc::new(AtomicUsize::new(0));
        let map = ModuleMap::from_entries([(
            "./Button".to_string(),
            slow_button(Arc::clone(&counter)),
        )])
        .unwrap();

        assert_eq!(map.status("./Button"), Some(SlotStatus::Unrequested));
        map.get("./Button").await.unwrap();
        map.get("./Button").await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(map.status("./Button"), Some(SlotStatus::Resolved));
    }

    #[tokio::test]
    async fn test_unknown_key_is_rejected() {
        let map = ModuleMap::new();
        let err = map.get("./Nope").await.unwrap_err();
        assert!(matches!(err, FederationError::ModuleNotFound { ref key } if key == "./Nope"));
    }

    #[tokio::test]
    async fn test_failure_is_memoized() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let map = ModuleMap::from_entries([(
            "./Broken".to_string(),
            module_loader(move || {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err(FederationError::evaluate("/src/Broken.js", "unexpected token"))
                }
            }),
        )])
        .unwrap();

        assert!(map.get("./Broken").await.is_err());
        assert!(map.get("./Broken").await.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(map.status("./Broken"), Some(SlotStatus::Failed));
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let counter = Arc::new(AtomicUsize::new(0));
        let result = ModuleMap::from_entries([
            ("./A".to_string(), slow_button(Arc::clone(&counter))),
            ("./A".to_string(), slow_button(Arc::clone(&counter))),
        ]);
        assert!(matches!(result, Err(FederationError::DuplicateExpose(key)) if key == "./A"));
    }
}
