// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Filesystem transport

use crate::error::{FederationError, Result};
use crate::transport::{ModuleSource, ModuleTransport};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Marker separating the dev-server base from an absolute file path
pub const FS_PREFIX: &str = "@fs/";

/// Reads modules from disk.
///
/// Accepts plain paths as well as `<base>@fs/<path>` locators, in which case
/// everything after the marker is the file path.
#[derive(Debug, Clone, Default)]
pub struct FsTransport;

impl FsTransport {
    /// Create a filesystem transport
    pub fn new() -> Self {
        Self
    }

    /// Map a locator to the file it names
    pub fn path_for(locator: &str) -> PathBuf {
        let locator = locator.split('?').next().unwrap_or(locator);
        match locator.find(FS_PREFIX) {
            Some(idx) => {
                let rest = &locator[idx + FS_PREFIX.len()..];
                let path = PathBuf::from(rest);
                if path.is_absolute() {
                    path
                } else {
                    Path::new("/").join(rest.trim_start_matches('/'))
                }
            }
            None => PathBuf::from(locator),
        }
    }
}

#[async_trait]
impl ModuleTransport for FsTransport {
    fn name(&self) -> &str {
        "fs"
    }

    async fn fetch(&self, locator: &str) -> Result<ModuleSource> {
        let path = Self::path_for(locator);
        debug!("Reading module from {}", path.display());

        let code = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| FederationError::transport("fs", locator, e))?;

        Ok(ModuleSource::new(locator, code))
    }
}
