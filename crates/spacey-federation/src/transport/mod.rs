// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module transports and the fallback loader
//!
//! A remote module can be reached two ways: through the URL the dev server
//! serves it under, or through its path on disk. [`FallbackLoader`] keeps an
//! ordered list of [`ModuleTransport`] strategies and tries them in turn until
//! one of them yields a module.

mod evaluate;
mod fs;
mod http;

pub use evaluate::{ModuleEvaluator, StaticExportEvaluator};
pub use fs::{FS_PREFIX, FsTransport};
pub use http::HttpTransport;

use crate::container::ModuleNamespace;
use crate::error::{FederationError, LoadAttempt, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Raw module text fetched by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    /// Locator the text was fetched from
    pub locator: String,
    /// Module text
    pub code: String,
    /// Content type reported by the transport, if any
    pub content_type: Option<String>,
}

impl ModuleSource {
    /// Create a module source
    pub fn new(locator: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            code: code.into(),
            content_type: None,
        }
    }
}

/// A way of fetching module text
#[async_trait]
pub trait ModuleTransport: Send + Sync {
    /// Short transport name used in logs and errors
    fn name(&self) -> &str;

    /// Fetch the text behind a locator
    async fn fetch(&self, locator: &str) -> Result<ModuleSource>;
}

/// Loads modules through an ordered list of transports
pub struct FallbackLoader {
    strategies: Vec<Arc<dyn ModuleTransport>>,
    evaluator: Arc<dyn ModuleEvaluator>,
}

impl FallbackLoader {
    /// Create a loader from transports in the order they should be tried
    pub fn new(
        strategies: Vec<Arc<dyn ModuleTransport>>,
        evaluator: Arc<dyn ModuleEvaluator>,
    ) -> Self {
        Self {
            strategies,
            evaluator,
        }
    }

    /// Served URL first (resolved against `origin`), filesystem second
    pub fn dev(origin: Url, request_timeout: Duration) -> Result<Self> {
        let served: Arc<dyn ModuleTransport> =
            Arc::new(HttpTransport::new(Some(origin), request_timeout)?);
        let disk: Arc<dyn ModuleTransport> = Arc::new(FsTransport::new());
        Ok(Self::new(
            vec![served, disk],
            Arc::new(StaticExportEvaluator::new()),
        ))
    }

    /// Names of the configured transports, in order
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Load a module from its primary locator, falling back to the secondary.
    ///
    /// The primary failure is not inspected; any error moves on to the next
    /// transport.
    pub async fn load_module(&self, primary: &str, secondary: &str) -> Result<ModuleNamespace> {
        self.load_first(&[primary, secondary]).await
    }

    /// Try `locators[i]` with the `i`-th transport until one succeeds.
    ///
    /// Locators beyond the number of transports are ignored.
    #[instrument(skip(self))]
    pub async fn load_first(&self, locators: &[&str]) -> Result<ModuleNamespace> {
        let mut attempts = Vec::new();

        for (transport, locator) in self.strategies.iter().zip(locators) {
            match self.attempt(transport.as_ref(), locator).await {
                Ok(namespace) => return Ok(namespace),
                Err(err) => {
                    debug!(
                        "{} transport failed for {}: {}, trying next",
                        transport.name(),
                        locator,
                        err
                    );
                    attempts.push(LoadAttempt {
                        transport: transport.name().to_string(),
                        locator: locator.to_string(),
                        reason: failure_reason(err),
                    });
                }
            }
        }

        Err(FederationError::ModuleLoad {
            key: locators.first().map(|l| l.to_string()).unwrap_or_default(),
            attempts,
        })
    }

    async fn attempt(
        &self,
        transport: &dyn ModuleTransport,
        locator: &str,
    ) -> Result<ModuleNamespace> {
        let source = transport.fetch(locator).await?;
        self.evaluator.evaluate(&source)
    }
}

fn failure_reason(err: FederationError) -> String {
    match err {
        FederationError::Transport { reason, .. } => reason,
        other => other.to_string(),
    }
}
