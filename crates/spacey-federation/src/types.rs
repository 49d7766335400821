// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Type declarations of consumed remotes
//!
//! Each remote publishes `@types/index.d.ts` next to its remote entry. The
//! file is fetched into `src/@types/remotes/<name>/index.d.ts` and kept only
//! when it looks like a declaration bundle. A remote whose download fails is
//! logged and skipped; the others are still processed.

use crate::error::{FederationError, Result};
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Marker every declaration bundle starts with
pub const TYPES_MARKER: &[u8] = b"/// <reference ";

/// Directory under the project root that receives remote types
pub const TYPES_DIR: &str = "src/@types/remotes";

const TEMP_FILE: &str = "index.d.ts.temp";
const TYPES_FILE: &str = "index.d.ts";
const CONCURRENCY: usize = 4;

/// What happened to one remote's types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypesOutcome {
    /// Saved at the given path
    Saved(PathBuf),
    /// Downloaded but not a declaration bundle, discarded
    NotTypes,
}

/// Result of downloading the types of several remotes
#[derive(Debug, Default)]
pub struct TypeDownloadReport {
    /// Remotes whose types were saved
    pub saved: Vec<String>,
    /// Remotes that answered with something other than declarations
    pub discarded: Vec<String>,
    /// Remotes whose download failed
    pub failed: Vec<FederationError>,
}

/// Downloads remote type declarations
pub struct TypeDownloader {
    client: Client,
    dest_root: PathBuf,
}

impl TypeDownloader {
    /// Create a downloader writing below `root/src/@types/remotes`
    pub fn new(root: &Path, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("spacey-federation/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FederationError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            dest_root: root.join(TYPES_DIR),
        })
    }

    /// `http://host/assets/remoteEntry.js` -> `http://host/assets/@types/index.d.ts`
    pub fn types_url(entry_url: &str) -> String {
        match entry_url.rfind('/') {
            Some(idx) if idx + 1 < entry_url.len() => {
                format!("{}/@types/index.d.ts", &entry_url[..idx])
            }
            _ => entry_url.to_string(),
        }
    }

    /// Download the types of every remote, isolating failures per remote
    pub async fn download_all(&self, remotes: &IndexMap<String, String>) -> TypeDownloadReport {
        let pending: Vec<(String, String)> = remotes
            .iter()
            .map(|(name, entry_url)| (name.clone(), entry_url.clone()))
            .collect();
        let outcomes: Vec<(String, Result<TypesOutcome>)> = stream::iter(pending)
            .map(|(name, entry_url)| async move {
                let outcome = self.download(&name, &entry_url).await;
                (name, outcome)
            })
            .buffered(CONCURRENCY)
            .collect()
            .await;

        let mut report = TypeDownloadReport::default();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(TypesOutcome::Saved(_)) => report.saved.push(name),
                Ok(TypesOutcome::NotTypes) => report.discarded.push(name),
                Err(err) => {
                    error!("{}", err);
                    report.failed.push(err);
                }
            }
        }

        info!(
            "Remote types: {} saved, {} discarded, {} failed",
            report.saved.len(),
            report.discarded.len(),
            report.failed.len()
        );
        report
    }

    /// Download the types of one remote
    #[instrument(skip(self))]
    pub async fn download(&self, name: &str, entry_url: &str) -> Result<TypesOutcome> {
        let url = Self::types_url(entry_url);
        let fail = |reason: String| FederationError::TypeDownload {
            remote: name.to_string(),
            url: url.clone(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status().as_u16())));
        }
        let data = response.bytes().await.map_err(|e| fail(e.to_string()))?;

        let dir = self.dest_root.join(name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| fail(e.to_string()))?;
        let temp = dir.join(TEMP_FILE);
        tokio::fs::write(&temp, &data)
            .await
            .map_err(|e| fail(e.to_string()))?;

        if data.starts_with(TYPES_MARKER) {
            let target = dir.join(TYPES_FILE);
            tokio::fs::rename(&temp, &target)
                .await
                .map_err(|e| fail(e.to_string()))?;
            info!("Saved types of {} to {}", name, target.display());
            Ok(TypesOutcome::Saved(target))
        } else {
            warn!("{} did not return a declaration bundle, discarding", url);
            tokio::fs::remove_file(&temp)
                .await
                .map_err(|e| fail(e.to_string()))?;
            Ok(TypesOutcome::NotTypes)
        }
    }
}
