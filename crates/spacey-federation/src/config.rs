// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Federation configuration
//!
//! Read from `federation.toml`, then overridden by `SPACEY_FED_*` environment
//! variables:
//!
//! ```toml
//! name = "remote_app"
//! filename = "remoteEntry.js"
//!
//! [exposes]
//! "./Button" = "./src/Button.jsx"
//! "./Card" = { import = "./src/Card.vue" }
//!
//! [shared.react]
//! version = "18.2.0"
//! singleton = true
//! ```

use crate::error::{FederationError, Result};
use crate::expose::{ExposeDeclaration, RemoteEntryGenerator};
use crate::share_scope::{ShareScopeSnapshot, SharedMeta};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default configuration file name
pub const CONFIG_FILE: &str = "federation.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "SPACEY_FED_";

/// How an exposed module is declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExposeOptions {
    /// `"./Button" = "./src/Button.jsx"`
    Import(String),
    /// `"./Button" = { import = "./src/Button.jsx" }`
    Detailed {
        /// Import specifier
        import: String,
    },
}

impl ExposeOptions {
    /// The import specifier
    pub fn import(&self) -> &str {
        match self {
            Self::Import(import) | Self::Detailed { import } => import,
        }
    }
}

/// A shared dependency of this remote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedOptions {
    /// Version provided
    pub version: Option<String>,
    /// Share scope, `default` when unset
    pub scope: Option<String>,
    /// Only one instance may be loaded
    pub singleton: bool,
    /// Range the remote accepts
    pub required_version: Option<String>,
}

/// Configuration of a federated remote
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationConfig {
    /// Remote name
    pub name: String,

    /// Remote entry filename
    pub filename: String,

    /// Assets directory the entry is served from
    pub assets_dir: String,

    /// Build output directory
    pub out_dir: PathBuf,

    /// Dev server base path
    pub base: String,

    /// Project root
    pub root: PathBuf,

    /// Dev server host
    pub host: String,

    /// Dev server port
    pub port: u16,

    /// Exposed modules, in declaration order
    pub exposes: IndexMap<String, ExposeOptions>,

    /// Shared dependencies
    pub shared: IndexMap<String, SharedOptions>,

    /// Remotes consumed by this app (name -> remote entry URL)
    pub remotes: IndexMap<String, String>,

    /// Download type declarations of remotes
    pub download_types: bool,

    /// Give up on a module load after this many milliseconds
    pub load_timeout_ms: Option<u64>,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            name: "remote".to_string(),
            filename: "remoteEntry.js".to_string(),
            assets_dir: "assets".to_string(),
            out_dir: PathBuf::from("dist"),
            base: "/".to_string(),
            root: PathBuf::from("."),
            host: "127.0.0.1".to_string(),
            port: 5001,
            exposes: IndexMap::new(),
            shared: IndexMap::new(),
            remotes: IndexMap::new(),
            download_types: false,
            load_timeout_ms: None,
            request_timeout_secs: 60,
        }
    }
}

impl FederationConfig {
    /// Load configuration from `path`, or from `federation.toml` in the
    /// working directory when it exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(FederationError::Config(format!(
                        "{} does not exist",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE))?,
            None => Self::default(),
        };

        config.apply_env(std::env::vars());
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file. A relative `root` is taken relative to the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if config.root.is_relative() {
            if let Some(dir) = path.parent() {
                config.root = dir.join(&config.root);
            }
        }
        Ok(config)
    }

    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `SPACEY_FED_*` variables, e.g. `SPACEY_FED_PORT=5174`
    pub fn apply_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                let config_key = config_key.to_lowercase().replace('_', "-");
                self.set(&config_key, &value);
            }
        }
    }

    /// Set a scalar configuration value by its dashed name
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "name" => self.name = value.to_string(),
            "filename" => self.filename = value.to_string(),
            "assets-dir" => self.assets_dir = value.to_string(),
            "out-dir" => self.out_dir = PathBuf::from(value),
            "base" => self.base = value.to_string(),
            "root" => self.root = PathBuf::from(value),
            "host" => self.host = value.to_string(),
            "port" => {
                if let Ok(port) = value.parse() {
                    self.port = port;
                }
            }
            "download-types" => self.download_types = value == "true",
            "load-timeout-ms" => self.load_timeout_ms = value.parse().ok(),
            "request-timeout-secs" => {
                if let Ok(secs) = value.parse() {
                    self.request_timeout_secs = secs;
                }
            }
            _ => {}
        }
    }

    /// Check values that would otherwise fail late
    pub fn validate(&self) -> Result<()> {
        if self.filename.trim().is_empty() {
            return Err(FederationError::Config("filename must not be empty".into()));
        }
        for (name, shared) in &self.shared {
            if shared.version.as_deref().is_none_or(str::is_empty) {
                return Err(FederationError::Config(format!(
                    "shared package {name} has no version"
                )));
            }
        }
        Ok(())
    }

    /// Exposed modules as ordered declarations
    pub fn expose_declarations(&self) -> Vec<ExposeDeclaration> {
        self.exposes
            .iter()
            .map(|(key, options)| ExposeDeclaration::new(key, options.import()))
            .collect()
    }

    /// Shared dependencies as the snapshot a host passes to `init`
    pub fn share_scope_snapshot(&self) -> Result<ShareScopeSnapshot> {
        let mut snapshot = ShareScopeSnapshot::new();

        for (name, shared) in &self.shared {
            let version = shared.version.clone().ok_or_else(|| {
                FederationError::Config(format!("shared package {name} has no version"))
            })?;

            let mut meta = match &shared.scope {
                Some(scope) => SharedMeta::in_scope(scope),
                None => SharedMeta::new(),
            };
            if shared.singleton {
                meta = meta.with("singleton", true);
            }
            if let Some(range) = &shared.required_version {
                meta = meta.with("requiredVersion", range.as_str());
            }

            snapshot.entry(name.clone()).or_default().insert(version, meta);
        }

        Ok(snapshot)
    }

    /// Path fragment the remote entry is served under
    pub fn remote_entry_path(&self) -> String {
        format!("{}/{}", self.assets_dir.trim_matches('/'), self.filename)
    }

    /// Origin (plus base) of the dev server
    pub fn dev_origin(&self) -> Result<Url> {
        let base = if self.base.ends_with('/') {
            self.base.clone()
        } else {
            format!("{}/", self.base)
        };
        Url::parse(&format!("http://{}:{}{}", self.host, self.port, base))
            .map_err(|e| FederationError::Config(format!("invalid dev server address: {e}")))
    }

    /// Module load timeout, when configured
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }

    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Generator for this remote's entry script
    pub fn generator(&self) -> Result<RemoteEntryGenerator> {
        Ok(
            RemoteEntryGenerator::new(&self.filename, &self.base, self.expose_declarations())?
                .with_name(&self.name),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name = "remote_app"
port = 5174

[exposes]
"./Button" = "./src/Button.jsx"
"./Card" = { import = "./src/Card.vue" }

[shared.react]
version = "18.2.0"
singleton = true
required_version = "^18.0.0"

[shared.legacy-lib]
version = "1.0.0"
scope = "legacy"

[remotes]
host_app = "http://localhost:5000/assets/remoteEntry.js"
"#;

    #[test]
    fn test_parse_sample() {
        let config = FederationConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.name, "remote_app");
        assert_eq!(config.port, 5174);
        assert_eq!(config.filename, "remoteEntry.js");
        assert_eq!(
            config.expose_declarations(),
            vec![
                ExposeDeclaration::new("./Button", "./src/Button.jsx"),
                ExposeDeclaration::new("./Card", "./src/Card.vue"),
            ]
        );
        assert_eq!(config.remote_entry_path(), "assets/remoteEntry.js");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_share_scope_snapshot() {
        let config = FederationConfig::from_toml_str(SAMPLE).unwrap();
        let snapshot = config.share_scope_snapshot().unwrap();

        let react = &snapshot["react"]["18.2.0"];
        assert_eq!(react.scope_name(), "default");
        assert_eq!(react.metadata["singleton"], serde_json::json!(true));
        assert_eq!(react.metadata["requiredVersion"], serde_json::json!("^18.0.0"));
        assert_eq!(snapshot["legacy-lib"]["1.0.0"].scope_name(), "legacy");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = FederationConfig::default();
        config.apply_env(vec![
            ("SPACEY_FED_PORT".to_string(), "6000".to_string()),
            ("SPACEY_FED_ASSETS_DIR".to_string(), "static".to_string()),
            ("SPACEY_FED_LOAD_TIMEOUT_MS".to_string(), "1500".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ]);

        assert_eq!(config.port, 6000);
        assert_eq!(config.remote_entry_path(), "static/remoteEntry.js");
        assert_eq!(config.load_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_shared_without_version_is_invalid() {
        let config = FederationConfig::from_toml_str("[shared.react]\nsingleton = true\n").unwrap();
        assert!(matches!(config.validate(), Err(FederationError::Config(_))));
        assert!(config.share_scope_snapshot().is_err());
    }

    #[test]
    fn test_duplicate_expose_in_toml_is_rejected() {
        let result = FederationConfig::from_toml_str(
            "[exposes]\n\"./A\" = \"./a.js\"\n\"./A\" = \"./b.js\"\n",
        );
        assert!(matches!(result, Err(FederationError::Toml(_))));
    }

    #[test]
    fn test_generator_carries_remote_name() {
        let config = FederationConfig::from_toml_str(SAMPLE).unwrap();
        let generator = config.generator().unwrap();
        assert_eq!(generator.name(), Some("remote_app"));
        assert_eq!(generator.exposes().len(), 2);
    }

    #[test]
    fn test_dev_origin() {
        let mut config = FederationConfig::default();
        config.base = "/remote".to_string();
        assert_eq!(config.dev_origin().unwrap().as_str(), "http://127.0.0.1:5001/remote/");
    }
}
