// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Turning fetched module text into a namespace

use crate::container::ModuleNamespace;
use crate::error::{FederationError, Result};
use crate::transport::ModuleSource;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Produces the namespace of a fetched module
pub trait ModuleEvaluator: Send + Sync {
    /// Evaluate module text
    fn evaluate(&self, source: &ModuleSource) -> Result<ModuleNamespace>;
}

const IDENT: &str = r"[A-Za-z_$][\w$]*";

static EXPORT_DEFAULT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^export\s+default\s+(?:async\s+)?(?:function\b\s*\*?|class\b)\s*({IDENT})?"
    ))
    .expect("valid regex")
});

static EXPORT_DEFAULT_EXPR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^export\s+default\s+(.+)$").expect("valid regex"));

static EXPORT_BINDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^export\s+(?:const|let|var)\s+({IDENT})\s*=\s*(.+)$"))
        .expect("valid regex")
});

static EXPORT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^export\s+(?:async\s+)?(?:function\b\s*\*?|class\b)\s*({IDENT})"
    ))
    .expect("valid regex")
});

static EXPORT_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*export\s*\{([^}]*)\}(?:\s*from\s*['"]([^'"]+)['"])?"#)
        .expect("valid regex")
});

static EXPORT_STAR_AS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?m)^\s*export\s*\*\s*as\s+({IDENT})\s+from\s*['"]([^'"]+)['"]"#
    ))
    .expect("valid regex")
});

static EXPORT_STAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*export\s*\*\s*from\s*['"][^'"]+['"]"#).expect("valid regex")
});

static CJS_ES_MODULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Object\.defineProperty\(\s*(?:module\.)?exports\s*,\s*['"]__esModule['"]"#)
        .expect("valid regex")
});

static CJS_EXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?:module\.)?exports\.({IDENT})\s*=\s*(.+)$")).expect("valid regex")
});

static CJS_MODULE_EXPORTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^module\.exports\s*=\s*(.+)$").expect("valid regex"));

static IDENT_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{IDENT}$")).expect("valid regex"));

/// Reads a module's export shape from its text without executing it.
///
/// ESM `export` forms and the common CommonJS `exports.x = ...` forms are
/// recognised. Exported literals (numbers, strings, JSON objects) keep their
/// value; any other binding is represented by its local name. `.json`
/// modules become a single default export.
#[derive(Debug, Clone, Default)]
pub struct StaticExportEvaluator;

impl StaticExportEvaluator {
    /// Create an evaluator
    pub fn new() -> Self {
        Self
    }

    fn evaluate_json(&self, source: &ModuleSource) -> Result<ModuleNamespace> {
        let value: Value = serde_json::from_str(&source.code)
            .map_err(|e| FederationError::evaluate(&source.locator, e.to_string()))?;
        Ok(ModuleNamespace::new().with_export("default", value))
    }

    fn evaluate_script(&self, code: &str) -> ModuleNamespace {
        let mut namespace = ModuleNamespace::new();

        if CJS_ES_MODULE.is_match(code) {
            namespace.set_export("__esModule", true);
        }

        for line in code.lines().map(str::trim) {
            if let Some(caps) = EXPORT_DEFAULT_DECL.captures(line) {
                let name = caps.get(1).map_or("default", |m| m.as_str());
                namespace.set_export("default", name);
            } else if let Some(caps) = EXPORT_DEFAULT_EXPR.captures(line) {
                namespace.set_export("default", literal_value(&caps[1], "default"));
            } else if let Some(caps) = EXPORT_BINDING.captures(line) {
                namespace.set_export(&caps[1], literal_value(&caps[2], &caps[1]));
            } else if let Some(caps) = EXPORT_DECL.captures(line) {
                namespace.set_export(&caps[1], &caps[1]);
            } else if let Some(caps) = CJS_EXPORT.captures(line) {
                namespace.set_export(&caps[1], literal_value(&caps[2], &caps[1]));
            } else if let Some(caps) = CJS_MODULE_EXPORTS.captures(line) {
                namespace.set_export("default", literal_value(&caps[1], "default"));
            }
        }

        for caps in EXPORT_LIST.captures_iter(code) {
            for spec in caps[1].split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let (local, exported) = match spec.split_once(" as ") {
                    Some((local, exported)) => (local.trim(), exported.trim()),
                    None => (spec, spec),
                };
                namespace.set_export(exported, local);
            }
        }

        for caps in EXPORT_STAR_AS.captures_iter(code) {
            namespace.set_export(&caps[1], &caps[2]);
        }

        if EXPORT_STAR.is_match(code) {
            namespace.mark_star_reexport();
        }

        namespace
    }
}

impl ModuleEvaluator for StaticExportEvaluator {
    fn evaluate(&self, source: &ModuleSource) -> Result<ModuleNamespace> {
        let path = source.locator.split('?').next().unwrap_or(&source.locator);
        if path.ends_with(".json") {
            return self.evaluate_json(source);
        }

        if source.code.trim_start().starts_with('<') {
            return Err(FederationError::evaluate(
                &source.locator,
                "markup is not a JavaScript module",
            ));
        }

        Ok(self.evaluate_script(&source.code))
    }
}

/// Value of an exported expression: the literal when there is one, otherwise
/// the identifier, otherwise `fallback`.
fn literal_value(expr: &str, fallback: &str) -> Value {
    let expr = expr.trim().trim_end_matches(';').trim();

    if let Ok(value) = serde_json::from_str::<Value>(expr) {
        return value;
    }

    if expr.len() >= 2 && expr.starts_with('\'') && expr.ends_with('\'') {
        let inner = &expr[1..expr.len() - 1];
        if !inner.contains('\'') {
            return Value::String(inner.to_string());
        }
    }

    if IDENT_ONLY.is_match(expr) {
        return Value::String(expr.to_string());
    }

    Value::String(fallback.to_string())
}
