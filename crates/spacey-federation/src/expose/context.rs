// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Build context: specifier resolution and watched files

use crate::error::{FederationError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions probed when a specifier has none
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".js", ".jsx", ".ts", ".tsx", ".mjs", ".vue", ".svelte", ".json",
];

/// A specifier resolved to a concrete file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    /// Absolute path of the file
    pub id: PathBuf,
}

impl ResolvedModule {
    /// Last path component, e.g. `Button.jsx`
    pub fn filename(&self) -> String {
        self.id
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The path with forward slashes
    pub fn normalized_id(&self) -> String {
        self.id.to_string_lossy().replace('\\', "/")
    }
}

/// What the build tool offers the generator once its build phase started
#[async_trait]
pub trait BuildContext: Send + Sync {
    /// Resolve an import specifier to a file
    async fn resolve(&self, specifier: &str) -> Result<ResolvedModule>;

    /// Ask the build tool to watch a file for changes
    fn add_watch_file(&self, path: &Path);
}

/// Resolves specifiers on disk relative to a project root
pub struct FsBuildContext {
    root: PathBuf,
    extensions: Vec<String>,
    watched: Mutex<Vec<PathBuf>>,
}

impl FsBuildContext {
    /// Create a context rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self {
            root,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            watched: Mutex::new(Vec::new()),
        }
    }

    /// Project root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files registered through [`BuildContext::add_watch_file`]
    pub fn watched_files(&self) -> Vec<PathBuf> {
        self.watched.lock().clone()
    }

    fn resolve_path(&self, specifier: &str) -> Option<PathBuf> {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            return self.resolve_file(&self.root.join(specifier));
        }
        let path = Path::new(specifier);
        if path.is_absolute() {
            if let Some(found) = self.resolve_file(path) {
                return Some(found);
            }
        }
        // "/src/x" is root-relative in a dev server
        if let Some(stripped) = specifier.strip_prefix('/') {
            return self.resolve_file(&self.root.join(stripped));
        }
        self.resolve_node_modules(specifier)
    }

    fn resolve_file(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(canonical(path));
        }

        for ext in &self.extensions {
            let mut filename = path.file_name()?.to_string_lossy().into_owned();
            filename.push_str(ext);
            let candidate = path.with_file_name(filename);
            if candidate.is_file() {
                return Some(canonical(&candidate));
            }
        }

        if path.is_dir() {
            return self.resolve_directory(path);
        }

        None
    }

    fn resolve_directory(&self, dir: &Path) -> Option<PathBuf> {
        let manifest = dir.join("package.json");
        if let Some(entry) = std::fs::read_to_string(&manifest)
            .ok()
            .and_then(|content| serde_json::from_str::<PackageJson>(&content).ok())
            .and_then(|pkg| pkg.module.or(pkg.main))
        {
            let main = dir.join(entry);
            if main.is_file() {
                return Some(canonical(&main));
            }
            for ext in &self.extensions {
                let with_ext = main.with_extension(ext.trim_start_matches('.'));
                if with_ext.is_file() {
                    return Some(canonical(&with_ext));
                }
            }
        }

        self.extensions
            .iter()
            .map(|ext| dir.join(format!("index{ext}")))
            .find(|index| index.is_file())
            .map(|index| canonical(&index))
    }

    fn resolve_node_modules(&self, specifier: &str) -> Option<PathBuf> {
        let (package, subpath) = parse_package_specifier(specifier);

        let mut current = Some(self.root.as_path());
        while let Some(dir) = current {
            let package_dir = dir.join("node_modules").join(package);
            if package_dir.exists() {
                return match subpath {
                    Some(sub) => self.resolve_file(&package_dir.join(sub)),
                    None => self.resolve_directory(&package_dir),
                };
            }
            current = dir.parent();
        }

        None
    }
}

#[async_trait]
impl BuildContext for FsBuildContext {
    async fn resolve(&self, specifier: &str) -> Result<ResolvedModule> {
        let id = self.resolve_path(specifier).ok_or_else(|| {
            FederationError::resolve(
                specifier,
                format!("no such file under {}", self.root.display()),
            )
        })?;
        debug!("Resolved {} to {}", specifier, id.display());
        Ok(ResolvedModule { id })
    }

    fn add_watch_file(&self, path: &Path) {
        let mut watched = self.watched.lock();
        if !watched.iter().any(|p| p == path) {
            watched.push(path.to_path_buf());
        }
    }
}

/// Split a bare specifier into package name and optional subpath
fn parse_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    let name_end = if specifier.starts_with('@') {
        specifier
            .find('/')
            .and_then(|scope_end| {
                specifier[scope_end + 1..]
                    .find('/')
                    .map(|pos| scope_end + 1 + pos)
            })
    } else {
        specifier.find('/')
    };

    match name_end {
        Some(end) => (&specifier[..end], Some(&specifier[end + 1..])),
        None => (specifier, None),
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Minimal package.json structure for resolution
#[derive(Debug, Deserialize)]
struct PackageJson {
    module: Option<String>,
    main: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/components")).unwrap();
        fs::write(dir.path().join("src/Button.jsx"), "export default function Button() {}").unwrap();
        fs::write(dir.path().join("src/components/index.ts"), "export const x = 1;").unwrap();
        fs::write(dir.path().join("src/theme.dark.css.js"), "export default 'dark';").unwrap();
        dir
    }

    #[test]
    fn test_parse_package_specifier() {
        assert_eq!(parse_package_specifier("lodash"), ("lodash", None));
        assert_eq!(parse_package_specifier("lodash/get"), ("lodash", Some("get")));
        assert_eq!(parse_package_specifier("@types/node"), ("@types/node", None));
        assert_eq!(
            parse_package_specifier("@babel/core/lib/index"),
            ("@babel/core", Some("lib/index"))
        );
    }

    #[tokio::test]
    async fn test_resolve_probes_extensions() {
        let dir = project();
        let ctx = FsBuildContext::new(dir.path());

        let resolved = ctx.resolve("./src/Button").await.unwrap();
        assert_eq!(resolved.filename(), "Button.jsx");
        assert!(resolved.id.is_absolute());
    }

    #[tokio::test]
    async fn test_resolve_keeps_multi_dot_names() {
        let dir = project();
        let ctx = FsBuildContext::new(dir.path());

        let resolved = ctx.resolve("./src/theme.dark.css").await.unwrap();
        assert_eq!(resolved.filename(), "theme.dark.css.js");
    }

    #[tokio::test]
    async fn test_resolve_directory_index() {
        let dir = project();
        let ctx = FsBuildContext::new(dir.path());

        let resolved = ctx.resolve("./src/components").await.unwrap();
        assert_eq!(resolved.filename(), "index.ts");
    }

    #[tokio::test]
    async fn test_resolve_node_modules_package() {
        let dir = project();
        let pkg = dir.path().join("node_modules/ui-kit");
        fs::create_dir_all(pkg.join("dist")).unwrap();
        fs::write(pkg.join("package.json"), r#"{"module": "dist/index.mjs"}"#).unwrap();
        fs::write(pkg.join("dist/index.mjs"), "export const a = 1;").unwrap();

        let ctx = FsBuildContext::new(dir.path());
        let resolved = ctx.resolve("ui-kit").await.unwrap();
        assert_eq!(resolved.filename(), "index.mjs");
    }

    #[tokio::test]
    async fn test_unresolvable_specifier() {
        let dir = project();
        let ctx = FsBuildContext::new(dir.path());

        let err = ctx.resolve("./src/Missing").await.unwrap_err();
        assert!(matches!(err, FederationError::Resolve { ref specifier, .. } if specifier == "./src/Missing"));
    }

    #[test]
    fn test_watch_files_are_deduplicated() {
        let ctx = FsBuildContext::new(".");
        ctx.add_watch_file(Path::new("/app/src/Button.jsx"));
        ctx.add_watch_file(Path::new("/app/src/Button.jsx"));
        assert_eq!(ctx.watched_files().len(), 1);
    }
}
