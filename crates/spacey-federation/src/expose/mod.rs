// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Remote entry generation
//!
//! Turns the exposed-module declarations of a remote into the self-contained
//! `remoteEntry.js` script hosts load. Each declaration is resolved through
//! the [`BuildContext`] the build tool provides, registered as a watched file
//! and emitted as a lazy module-map entry that imports the served URL first
//! and the `@fs` path second.
//!
//! A script in which every expose resolved is generated at most once per
//! generator; call [`RemoteEntryGenerator::invalidate`] to force
//! regeneration. A script with unresolved exposes is rebuilt on the next
//! request so files created later are picked up.

mod context;
mod template;

pub use context::{BuildContext, DEFAULT_EXTENSIONS, FsBuildContext, ResolvedModule};

use crate::container::{ModuleMap, RemoteContainer, exposed_loader, failed_loader};
use crate::error::{FederationError, Result};
use crate::share_scope::ShareScopeRegistry;
use crate::transport::{FS_PREFIX, FallbackLoader};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

/// One `exposes` entry: logical key and the specifier it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposeDeclaration {
    /// Logical key hosts request, e.g. `./Button`
    pub key: String,
    /// Import specifier, e.g. `./src/Button.jsx`
    pub import: String,
}

impl ExposeDeclaration {
    /// Create a declaration
    pub fn new(key: impl Into<String>, import: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            import: import.into(),
        }
    }
}

/// An exposed module resolved to its loadable locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedModule {
    /// Logical key
    pub key: String,
    /// Resolved file on disk
    pub source_path: PathBuf,
    /// Canonical filename of the resolved file
    pub filename: String,
    /// URL the dev server serves the module under
    pub served_url: String,
    /// `<base>@fs/<path>` form of the module location
    pub fs_url: String,
}

#[derive(Clone)]
struct GeneratedEntry {
    script: Arc<str>,
    modules: Vec<ExposedModule>,
    unresolved: Vec<(String, FederationError)>,
}

/// Generates and caches a remote's entry script
pub struct RemoteEntryGenerator {
    name: Option<String>,
    filename: String,
    base: String,
    exposes: Vec<ExposeDeclaration>,
    context: RwLock<Option<Arc<dyn BuildContext>>>,
    cache: Mutex<Option<GeneratedEntry>>,
}

impl RemoteEntryGenerator {
    /// Create a generator.
    ///
    /// `filename` names the script (used in diagnostics), `base` is the dev
    /// server base path. A key declared twice is rejected.
    pub fn new(
        filename: impl Into<String>,
        base: impl Into<String>,
        exposes: Vec<ExposeDeclaration>,
    ) -> Result<Self> {
        for (i, decl) in exposes.iter().enumerate() {
            if exposes[..i].iter().any(|earlier| earlier.key == decl.key) {
                return Err(FederationError::DuplicateExpose(decl.key.clone()));
            }
        }

        Ok(Self {
            name: None,
            filename: filename.into(),
            base: normalize_base(&base.into()),
            exposes,
            context: RwLock::new(None),
            cache: Mutex::new(None),
        })
    }

    /// Install the build context. Until this is called every request for the
    /// script fails with [`FederationError::SetupOrder`].
    pub fn build_start(&self, context: Arc<dyn BuildContext>) {
        *self.context.write() = Some(context);
    }

    /// Whether [`build_start`](Self::build_start) has run
    pub fn is_ready(&self) -> bool {
        self.context.read().is_some()
    }

    /// Declarations in the order they were given
    pub fn exposes(&self) -> &[ExposeDeclaration] {
        &self.exposes
    }

    /// Normalized base path (always ends with `/`)
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Script filename
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Name the remote under, written as a comment at the top of the script
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = (!name.trim().is_empty()).then_some(name);
        self
    }

    /// Remote name, if one was given
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The remote entry script, generated on first call and cached once every
    /// expose resolved
    pub async fn remote_entry(&self) -> Result<Arc<str>> {
        Ok(self.generated().await?.script)
    }

    /// Like [`remote_entry`](Self::remote_entry) but logs failures and
    /// yields an empty script instead
    pub async fn remote_entry_or_empty(&self) -> Arc<str> {
        match self.remote_entry().await {
            Ok(script) => script,
            Err(err) => {
                error!("{}", err);
                Arc::from("")
            }
        }
    }

    /// Exposed modules resolved by the last generation
    pub async fn exposed_modules(&self) -> Result<Vec<ExposedModule>> {
        Ok(self.generated().await?.modules)
    }

    /// Drop the cached script so the next request regenerates it
    pub async fn invalidate(&self) {
        if self.cache.lock().await.take().is_some() {
            info!("Invalidated cached {}", self.filename);
        }
    }

    /// Build a native container for the exposed modules. Keys whose
    /// specifier failed to resolve stay registered and fail on `get`.
    pub async fn container(
        &self,
        loader: Arc<FallbackLoader>,
        registry: Arc<ShareScopeRegistry>,
        timeout: Option<Duration>,
    ) -> Result<RemoteContainer> {
        let entry = self.generated().await?;

        let entries = self.exposes.iter().filter_map(|decl| {
            if let Some(module) = entry.modules.iter().find(|m| m.key == decl.key) {
                return Some((
                    decl.key.clone(),
                    exposed_loader(module, Arc::clone(&loader), timeout),
                ));
            }
            entry
                .unresolved
                .iter()
                .find(|(key, _)| *key == decl.key)
                .map(|(key, err)| (key.clone(), failed_loader(err.clone())))
        });

        Ok(RemoteContainer::new(ModuleMap::from_entries(entries)?, registry))
    }

    /// Write the script to `<out_dir>/<assets_dir>/<filename>`
    pub async fn emit(&self, out_dir: &Path, assets_dir: &str) -> Result<PathBuf> {
        let script = self.remote_entry().await?;
        let dir = out_dir.join(assets_dir.trim_matches('/'));
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(&self.filename);
        tokio::fs::write(&path, script.as_bytes()).await?;
        info!("Wrote {}", path.display());
        Ok(path)
    }

    async fn generated(&self) -> Result<GeneratedEntry> {
        let context = self
            .context
            .read()
            .clone()
            .ok_or_else(|| FederationError::SetupOrder(self.filename.clone()))?;

        let mut cache = self.cache.lock().await;
        if let Some(entry) = cache.as_ref() {
            return Ok(entry.clone());
        }

        let entry = self.generate(context.as_ref()).await;
        if entry.unresolved.is_empty() {
            *cache = Some(entry.clone());
        } else {
            debug!(
                "{} has {} unresolved exposes, not caching",
                self.filename,
                entry.unresolved.len()
            );
        }
        Ok(entry)
    }

    #[instrument(skip(self, context), fields(filename = %self.filename))]
    async fn generate(&self, context: &dyn BuildContext) -> GeneratedEntry {
        let mut modules = Vec::with_capacity(self.exposes.len());
        let mut unresolved = Vec::new();

        for decl in &self.exposes {
            match context.resolve(&decl.import).await {
                Ok(resolved) => {
                    context.add_watch_file(&resolved.id);
                    let filename = resolved.filename();
                    let module = ExposedModule {
                        key: decl.key.clone(),
                        served_url: served_url(&decl.import, &filename),
                        fs_url: fs_url(&self.base, &resolved.normalized_id()),
                        source_path: resolved.id,
                        filename,
                    };
                    debug!("Exposing {} as {}", module.key, module.served_url);
                    modules.push(module);
                }
                Err(err) => {
                    error!("Cannot expose {}: {}", decl.key, err);
                    unresolved.push((decl.key.clone(), err));
                }
            }
        }

        let failures: Vec<(String, String)> = unresolved
            .iter()
            .map(|(key, err)| (key.clone(), err.to_string()))
            .collect();
        let mut script = template::render(&modules, &failures);
        if let Some(name) = &self.name {
            let name = name.replace(['\r', '\n'], " ");
            script.insert_str(0, &format!("// remote: {name}\n"));
        }
        let script: Arc<str> = Arc::from(script);
        info!("Generated {} with {} exposed modules", self.filename, modules.len());

        GeneratedEntry {
            script,
            modules,
            unresolved,
        }
    }
}

/// Served URL of an exposed module: the specifier's directory joined with the
/// resolved filename, so names with several dots or no extension still match
/// the file on disk.
pub fn served_url(import: &str, filename: &str) -> String {
    let import = import.replace('\\', "/");
    let mut segments: Vec<&str> = import
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    segments.pop();
    segments.push(filename);
    format!("/{}", segments.join("/"))
}

/// `<base>@fs/<absolute path>`
pub fn fs_url(base: &str, absolute_path: &str) -> String {
    format!(
        "{}{}{}",
        normalize_base(base),
        FS_PREFIX,
        absolute_path.trim_start_matches('/')
    )
}

fn normalize_base(base: &str) -> String {
    let trimmed = base.trim();
    if trimmed.is_empty() {
        return "/".to_string();
    }
    let mut base = trimmed.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_served_url() {
        assert_eq!(served_url("./src/Button", "Button.jsx"), "/src/Button.jsx");
        assert_eq!(served_url("./src/Button.jsx", "Button.jsx"), "/src/Button.jsx");
        assert_eq!(served_url("./Button", "Button.vue"), "/Button.vue");
        assert_eq!(served_url(".\\src\\theme.dark", "theme.dark.ts"), "/src/theme.dark.ts");
    }

    #[test]
    fn test_fs_url() {
        assert_eq!(fs_url("/", "/app/src/Button.jsx"), "/@fs/app/src/Button.jsx");
        assert_eq!(fs_url("/remote", "/app/src/Button.jsx"), "/remote/@fs/app/src/Button.jsx");
        assert_eq!(fs_url("", "C:/app/Button.jsx"), "/@fs/C:/app/Button.jsx");
    }

    #[test]
    fn test_duplicate_keys_are_rejected() {
        let result = RemoteEntryGenerator::new(
            "remoteEntry.js",
            "/",
            vec![
                ExposeDeclaration::new("./Button", "./src/Button.jsx"),
                ExposeDeclaration::new("./Button", "./src/OtherButton.jsx"),
            ],
        );
        assert!(matches!(result, Err(FederationError::DuplicateExpose(key)) if key == "./Button"));
    }

    #[tokio::test]
    async fn test_request_before_build_start() {
        let generator = RemoteEntryGenerator::new(
            "remoteEntry.js",
            "/",
            vec![ExposeDeclaration::new("./Button", "./src/Button.jsx")],
        )
        .unwrap();

        assert!(!generator.is_ready());
        assert!(matches!(
            generator.remote_entry().await,
            Err(FederationError::SetupOrder(_))
        ));
        assert_eq!(&*generator.remote_entry_or_empty().await, "");
    }
}
