// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! JavaScript text of the remote entry

use crate::container::DEFAULT_EXPORT_ALIASES;
use crate::expose::ExposedModule;

const MODULE_MAP_PLACEHOLDER: &str = "/*__MODULE_MAP__*/";
const EXPORT_SET_PLACEHOLDER: &str = "/*__EXPORT_SET__*/";

const REMOTE_ENTRY_TEMPLATE: &str = r#"const exportSet = new Set([/*__EXPORT_SET__*/]);
const __federation_import = async (urlImportPath, fsImportPath) => {
  try {
    return await import(urlImportPath);
  } catch (ex) {
    return await import(fsImportPath);
  }
};
const __federation_wrap = (module) =>
  Object.keys(module).every((item) => exportSet.has(item)) ? () => module.default : () => module;
const moduleMap = {/*__MODULE_MAP__*/
};
const moduleCache = new Map();
export const get = (module) => {
  if (!Object.prototype.hasOwnProperty.call(moduleMap, module)) {
    throw new Error('Can not find remote module ' + module);
  }
  if (!moduleCache.has(module)) {
    moduleCache.set(module, moduleMap[module]());
  }
  return moduleCache.get(module);
};
export const init = (shareScope) => {
  globalThis.__federation_shared__ = globalThis.__federation_shared__ || {};
  Object.entries(shareScope).forEach(([key, value]) => {
    const versionKey = Object.keys(value)[0];
    if (versionKey === undefined) return;
    const versionValue = value[versionKey];
    const scope = versionValue.scope || 'default';
    globalThis.__federation_shared__[scope] = globalThis.__federation_shared__[scope] || {};
    const shared = globalThis.__federation_shared__[scope];
    (shared[key] = shared[key] || {})[versionKey] = versionValue;
  });
};
"#;

/// Quote a string as a JavaScript string literal
pub(crate) fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Render the remote entry for resolved modules and keys whose resolution
/// failed (those reject with the failure when requested).
pub(crate) fn render(modules: &[ExposedModule], unresolved: &[(String, String)]) -> String {
    let mut map = String::new();

    for module in modules {
        map.push_str(&format!(
            "\n  {}: () => __federation_import({}, {}).then(__federation_wrap),",
            js_string(&module.key),
            js_string(&module.served_url),
            js_string(&module.fs_url),
        ));
    }

    for (key, reason) in unresolved {
        map.push_str(&format!(
            "\n  {}: () => Promise.reject(new Error({})),",
            js_string(key),
            js_string(reason),
        ));
    }

    let export_set = DEFAULT_EXPORT_ALIASES
        .iter()
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ");

    REMOTE_ENTRY_TEMPLATE
        .replace(EXPORT_SET_PLACEHOLDER, &export_set)
        .replace(MODULE_MAP_PLACEHOLDER, &map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn button() -> ExposedModule {
        ExposedModule {
            key: "./Button".to_string(),
            source_path: PathBuf::from("/app/src/Button.jsx"),
            filename: "Button.jsx".to_string(),
            served_url: "/src/Button.jsx".to_string(),
            fs_url: "/@fs/app/src/Button.jsx".to_string(),
        }
    }

    #[test]
    fn test_render_module_entry() {
        let script = render(&[button()], &[]);
        assert!(script.contains(
            r#""./Button": () => __federation_import("/src/Button.jsx", "/@fs/app/src/Button.jsx").then(__federation_wrap),"#
        ));
        assert!(script.contains("new Set(['Module', '__esModule', 'default', '_export_sfc'])"));
        assert!(script.contains("export const get ="));
        assert!(script.contains("export const init ="));
        assert!(!script.contains("__MODULE_MAP__"));
    }

    #[test]
    fn test_render_unresolved_entry() {
        let script = render(&[], &[("./Gone".to_string(), "no such file".to_string())]);
        assert!(script.contains(r#""./Gone": () => Promise.reject(new Error("no such file")),"#));
    }

    #[test]
    fn test_keys_are_escaped() {
        assert_eq!(js_string(r#"./it's "quoted""#), r#""./it's \"quoted\"""#);
    }
}
