// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Remote container
//!
//! The native counterpart of a generated remote entry: a [`ModuleMap`] of
//! exposed modules plus a handle on the share-scope registry, reachable
//! through the two entry points a host uses, `init` and `get`.

mod module_map;
mod namespace;

pub use module_map::{ModuleLoader, ModuleMap, SlotStatus, module_loader};
pub use namespace::{AccessorShape, DEFAULT_EXPORT_ALIASES, ModuleAccessor, ModuleNamespace};

use crate::error::{FederationError, LoadAttempt, Result};
use crate::expose::ExposedModule;
use crate::share_scope::{ShareScopeRegistry, ShareScopeSnapshot};
use crate::transport::FallbackLoader;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// A remote's exposed modules together with the share scope it joins
pub struct RemoteContainer {
    modules: ModuleMap,
    registry: Arc<ShareScopeRegistry>,
}

impl RemoteContainer {
    /// Create a container from a prepared module map
    pub fn new(modules: ModuleMap, registry: Arc<ShareScopeRegistry>) -> Self {
        Self { modules, registry }
    }

    /// Merge a host's shared dependencies into the share scope
    #[instrument(skip(self, share_scope))]
    pub fn init(&self, share_scope: &ShareScopeSnapshot) {
        let written = self.registry.merge(share_scope);
        info!("Merged {} shared package versions", written);
    }

    /// Resolve an exposed module to its accessor
    pub async fn get(&self, key: &str) -> Result<ModuleAccessor> {
        self.modules.get(key).await
    }

    /// Exposed keys in declaration order
    pub fn keys(&self) -> &[String] {
        self.modules.keys()
    }

    /// The module map
    pub fn modules(&self) -> &ModuleMap {
        &self.modules
    }

    /// The share-scope registry this container merges into
    pub fn registry(&self) -> &Arc<ShareScopeRegistry> {
        &self.registry
    }
}

/// Loader for an exposed module through the transport fallback chain.
///
/// With a `timeout`, a load that has not settled in time fails like any other
/// transport failure.
pub fn exposed_loader(
    module: &ExposedModule,
    loader: Arc<FallbackLoader>,
    timeout: Option<Duration>,
) -> ModuleLoader {
    let key = module.key.clone();
    let served_url = module.served_url.clone();
    let fs_url = module.fs_url.clone();

    module_loader(move || {
        let key = key.clone();
        let served_url = served_url.clone();
        let fs_url = fs_url.clone();
        let loader = Arc::clone(&loader);
        async move {
            let load = loader.load_module(&served_url, &fs_url);
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, load).await.unwrap_or_else(|_| {
                    Err(FederationError::ModuleLoad {
                        key: key.clone(),
                        attempts: vec![LoadAttempt {
                            transport: "timeout".to_string(),
                            locator: served_url.clone(),
                            reason: format!("no result after {}ms", limit.as_millis()),
                        }],
                    })
                }),
                None => load.await,
            };
            result.map_err(|err| err.for_module(&key))
        }
    })
}

/// Loader that always fails with `err`
pub fn failed_loader(err: FederationError) -> ModuleLoader {
    module_loader(move || {
        let err = err.clone();
        async move { Err(err) }
    })
}
