// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module namespace objects and the accessor handed back by `get`

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Export names that bundlers use to wrap a single default export.
///
/// A namespace whose exports are all drawn from this set is unwrapped to its
/// `default` export by [`ModuleAccessor::from_namespace`].
pub const DEFAULT_EXPORT_ALIASES: [&str; 4] = ["Module", "__esModule", "default", "_export_sfc"];

/// The exports of a loaded module, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleNamespace {
    exports: IndexMap<String, Value>,
    /// Re-exports whose names are not known statically (`export * from`)
    star_reexports: bool,
}

impl ModuleNamespace {
    /// Create an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an exported value
    pub fn set_export(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.exports.insert(name.into(), value.into());
    }

    /// Builder-style [`set_export`](Self::set_export)
    pub fn with_export(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_export(name, value);
        self
    }

    /// Get an exported value
    pub fn get_export(&self, name: &str) -> Option<&Value> {
        self.exports.get(name)
    }

    /// Get the default export
    pub fn get_default(&self) -> Option<&Value> {
        self.exports.get("default")
    }

    /// Exported names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }

    /// Number of exports
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    /// Whether the module exports nothing
    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }

    /// Record that the module re-exports another module's names wholesale
    pub fn mark_star_reexport(&mut self) {
        self.star_reexports = true;
    }

    /// Whether the module has re-exports beyond [`names`](Self::names)
    pub fn has_star_reexport(&self) -> bool {
        self.star_reexports
    }

    /// Whether every export name is a bundler alias of a default export.
    ///
    /// False when a wholesale re-export may contribute further names.
    pub fn is_default_only(&self) -> bool {
        !self.star_reexports && self.names().all(|name| DEFAULT_EXPORT_ALIASES.contains(&name))
    }

    /// The namespace as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.exports
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        )
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ModuleNamespace {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            exports: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            star_reexports: false,
        }
    }
}

/// What an accessor hands back when called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorShape {
    /// The module's `default` export
    Default,
    /// The whole namespace object
    Namespace,
}

/// Zero-argument accessor wrapping a resolved module
#[derive(Clone)]
pub struct ModuleAccessor {
    shape: AccessorShape,
    namespace: Arc<ModuleNamespace>,
}

impl ModuleAccessor {
    /// Wrap a namespace, unwrapping default-only modules
    pub fn from_namespace(namespace: ModuleNamespace) -> Self {
        let shape = if namespace.is_default_only() {
            AccessorShape::Default
        } else {
            AccessorShape::Namespace
        };
        Self {
            shape,
            namespace: Arc::new(namespace),
        }
    }

    /// Call the accessor
    pub fn call(&self) -> Value {
        match self.shape {
            AccessorShape::Default => self.namespace.get_default().cloned().unwrap_or(Value::Null),
            AccessorShape::Namespace => self.namespace.to_value(),
        }
    }

    /// Which shape this accessor returns
    pub fn shape(&self) -> AccessorShape {
        self.shape
    }

    /// The underlying namespace
    pub fn namespace(&self) -> &ModuleNamespace {
        &self.namespace
    }

    /// Whether two accessors wrap the same loaded module instance
    pub fn same_module(&self, other: &ModuleAccessor) -> bool {
        Arc::ptr_eq(&self.namespace, &other.namespace)
    }
}

impl fmt::Debug for ModuleAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleAccessor")
            .field("shape", &self.shape)
            .field("exports", &self.namespace.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_and_es_module_unwraps() {
        let ns = ModuleNamespace::new()
            .with_export("default", "Button")
            .with_export("__esModule", true);
        let accessor = ModuleAccessor::from_namespace(ns);

        assert_eq!(accessor.shape(), AccessorShape::Default);
        assert_eq!(accessor.call(), json!("Button"));
    }

    #[test]
    fn test_vue_sfc_shape_unwraps() {
        let ns: ModuleNamespace = [
            ("default", json!({"name": "Card"})),
            ("_export_sfc", json!("sfc")),
            ("Module", json!("Module")),
        ]
        .into_iter()
        .collect();

        assert_eq!(ModuleAccessor::from_namespace(ns).call(), json!({"name": "Card"}));
    }

    #[test]
    fn test_named_export_keeps_namespace() {
        let ns = ModuleNamespace::new()
            .with_export("default", "Button")
            .with_export("foo", 1);
        let accessor = ModuleAccessor::from_namespace(ns);

        assert_eq!(accessor.shape(), AccessorShape::Namespace);
        assert_eq!(accessor.call(), json!({"default": "Button", "foo": 1}));
    }

    #[test]
    fn test_star_reexport_keeps_namespace() {
        let mut ns = ModuleNamespace::new().with_export("default", "Button");
        ns.mark_star_reexport();
        let accessor = ModuleAccessor::from_namespace(ns);

        assert_eq!(accessor.shape(), AccessorShape::Namespace);
        assert!(accessor.namespace().has_star_reexport());
    }

    #[test]
    fn test_empty_namespace_yields_null_default() {
        let accessor = ModuleAccessor::from_namespace(ModuleNamespace::new());
        assert_eq!(accessor.shape(), AccessorShape::Default);
        assert_eq!(accessor.call(), Value::Null);
    }
}
