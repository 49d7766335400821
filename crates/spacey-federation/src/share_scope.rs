// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Share-scope registry
//!
//! Process-wide mapping of `scope -> package -> version -> entry` that every
//! remote container merges into when a host calls `init`. The registry is a
//! last-write-wins cache keyed by explicit version strings; choosing among
//! coexisting versions is left to whoever consumes the shared package.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Scope used when an entry does not name one
pub const DEFAULT_SCOPE: &str = "default";

/// Metadata a host supplies for one version of a shared package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedMeta {
    /// Share scope, `"default"` when absent or empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Everything else (`singleton`, `requiredVersion`, ...)
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl SharedMeta {
    /// Metadata in the default scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata in a named scope
    pub fn in_scope(scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            metadata: Map::new(),
        }
    }

    /// Add a metadata field
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The effective scope name
    pub fn scope_name(&self) -> &str {
        match self.scope.as_deref() {
            Some(scope) if !scope.is_empty() => scope,
            _ => DEFAULT_SCOPE,
        }
    }
}

/// What a host passes to `init`: package name -> version key -> metadata.
///
/// Insertion order matters, only the first version key of each package is
/// merged per call.
pub type ShareScopeSnapshot = IndexMap<String, IndexMap<String, SharedMeta>>;

/// A registered version of a shared package
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareScopeEntry {
    /// Package name
    pub package_name: String,
    /// Version key
    pub version: String,
    /// Scope the entry lives in
    pub scope: String,
    /// Arbitrary metadata supplied by the host
    pub metadata: Map<String, Value>,
}

impl ShareScopeEntry {
    /// Whether only one instance of the package should be loaded
    pub fn singleton(&self) -> bool {
        self.metadata
            .get("singleton")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The version range the host asked for, if any
    pub fn required_version(&self) -> Option<&str> {
        self.metadata.get("requiredVersion").and_then(Value::as_str)
    }
}

/// `scope -> package -> version -> entry`
pub type ScopeTree = BTreeMap<String, BTreeMap<String, BTreeMap<String, ShareScopeEntry>>>;

/// Registry of shared dependency versions
#[derive(Debug, Default)]
pub struct ShareScopeRegistry {
    scopes: RwLock<ScopeTree>,
}

impl ShareScopeRegistry {
    /// Create an empty, explicitly owned registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created empty on first use
    pub fn global() -> Arc<ShareScopeRegistry> {
        static GLOBAL: OnceLock<Arc<ShareScopeRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ShareScopeRegistry::new())))
    }

    /// Merge a host snapshot into the registry.
    ///
    /// For every package the first version key is written to
    /// `registry[scope][package][version]`, replacing any entry already
    /// stored under that exact key. Returns the number of entries written.
    pub fn merge(&self, incoming: &ShareScopeSnapshot) -> usize {
        let mut scopes = self.scopes.write();
        let mut written = 0;

        for (package, versions) in incoming {
            let Some((version, meta)) = versions.first() else {
                debug!("Shared package {} has no versions, skipping", package);
                continue;
            };

            let scope = meta.scope_name().to_string();
            let entry = ShareScopeEntry {
                package_name: package.clone(),
                version: version.clone(),
                scope: scope.clone(),
                metadata: meta.metadata.clone(),
            };

            debug!("Registering {}@{} in scope {}", package, version, scope);
            scopes
                .entry(scope)
                .or_default()
                .entry(package.clone())
                .or_default()
                .insert(version.clone(), entry);
            written += 1;
        }

        written
    }

    /// Look up one registered version
    pub fn get(&self, scope: &str, package: &str, version: &str) -> Option<ShareScopeEntry> {
        self.scopes
            .read()
            .get(scope)
            .and_then(|packages| packages.get(package))
            .and_then(|versions| versions.get(version))
            .cloned()
    }

    /// All registered versions of a package in a scope
    pub fn versions(&self, scope: &str, package: &str) -> Vec<String> {
        self.scopes
            .read()
            .get(scope)
            .and_then(|packages| packages.get(package))
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of all scopes created so far
    pub fn scopes(&self) -> Vec<String> {
        self.scopes.read().keys().cloned().collect()
    }

    /// Copy of the whole registry
    pub fn snapshot(&self) -> ScopeTree {
        self.scopes.read().clone()
    }

    /// Total number of registered versions across all scopes
    pub fn len(&self) -> usize {
        self.scopes
            .read()
            .values()
            .flat_map(|packages| packages.values())
            .map(|versions| versions.len())
            .sum()
    }

    /// Whether nothing has been registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build a snapshot holding a single version of a single package
pub fn snapshot_of(package: &str, version: &str, meta: SharedMeta) -> ShareScopeSnapshot {
    let mut versions = IndexMap::new();
    versions.insert(version.to_string(), meta);
    let mut snapshot = IndexMap::new();
    snapshot.insert(package.to_string(), versions);
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_defaults_scope() {
        let registry = ShareScopeRegistry::new();
        registry.merge(&snapshot_of("react", "18.2.0", SharedMeta::new()));

        let entry = registry.get("default", "react", "18.2.0").unwrap();
        assert_eq!(entry.scope, "default");
        assert_eq!(entry.package_name, "react");
        assert_eq!(registry.scopes(), vec!["default".to_string()]);
    }

    #[test]
    fn test_empty_scope_is_default() {
        let registry = ShareScopeRegistry::new();
        registry.merge(&snapshot_of("vue", "3.4.0", SharedMeta::in_scope("")));
        assert!(registry.get("default", "vue", "3.4.0").is_some());
    }

    #[test]
    fn test_named_scope_created_lazily() {
        let registry = ShareScopeRegistry::new();
        registry.merge(&snapshot_of("react", "18.2.0", SharedMeta::in_scope("legacy")));

        assert!(registry.get("default", "react", "18.2.0").is_none());
        assert!(registry.get("legacy", "react", "18.2.0").is_some());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let registry = ShareScopeRegistry::new();
        let snapshot = snapshot_of("react", "18.2.0", SharedMeta::new().with("singleton", true));

        registry.merge(&snapshot);
        let once = registry.snapshot();
        registry.merge(&snapshot);

        assert_eq!(registry.snapshot(), once);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_versions_coexist_and_overwrite_in_place() {
        let registry = ShareScopeRegistry::new();
        registry.merge(&snapshot_of("a", "1.0.0", SharedMeta::new().with("from", "first")));
        registry.merge(&snapshot_of("a", "2.0.0", SharedMeta::new()));

        assert_eq!(registry.versions("default", "a"), vec!["1.0.0", "2.0.0"]);

        registry.merge(&snapshot_of("a", "1.0.0", SharedMeta::new().with("from", "third")));
        let v1 = registry.get("default", "a", "1.0.0").unwrap();
        assert_eq!(v1.metadata.get("from"), Some(&Value::from("third")));
        assert!(registry.get("default", "a", "2.0.0").is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_only_first_version_key_is_merged() {
        let registry = ShareScopeRegistry::new();
        let mut versions = IndexMap::new();
        versions.insert("2.0.0".to_string(), SharedMeta::new());
        versions.insert("1.0.0".to_string(), SharedMeta::new());
        let mut snapshot = ShareScopeSnapshot::new();
        snapshot.insert("lodash".to_string(), versions);

        assert_eq!(registry.merge(&snapshot), 1);
        assert_eq!(registry.versions("default", "lodash"), vec!["2.0.0"]);
    }

    #[test]
    fn test_package_without_versions_is_skipped() {
        let registry = ShareScopeRegistry::new();
        let mut snapshot = ShareScopeSnapshot::new();
        snapshot.insert("empty".to_string(), IndexMap::new());

        assert_eq!(registry.merge(&snapshot), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_deserializes_from_host_json() {
        let json = r#"{"react": {"18.2.0": {"scope": "default", "singleton": true, "requiredVersion": "^18.0.0"}}}"#;
        let snapshot: ShareScopeSnapshot = serde_json::from_str(json).unwrap();

        let registry = ShareScopeRegistry::new();
        registry.merge(&snapshot);

        let entry = registry.get("default", "react", "18.2.0").unwrap();
        assert!(entry.singleton());
        assert_eq!(entry.required_version(), Some("^18.0.0"));
        assert!(!entry.metadata.contains_key("scope"));
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(
            &ShareScopeRegistry::global(),
            &ShareScopeRegistry::global()
        ));
    }
}
