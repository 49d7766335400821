// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-federation
//!
//! Module federation for the Spacey toolchain: expose modules of one
//! application as a *remote* that separately built *hosts* load at runtime.
//!
//! The crate covers both sides of the contract:
//!
//! - a **share scope** registry hosts and remotes merge shared dependency
//!   versions into (`scope -> package -> version -> entry`)
//! - a **remote container** with `init`/`get`, memoizing each exposed module
//!   behind a single in-flight load
//! - a **remote entry generator** emitting the `remoteEntry.js` script a
//!   bundler serves, cached until invalidated
//! - a **dev server** answering requests for the entry with open CORS
//! - **transports** that fetch a module over HTTP and fall back to the
//!   filesystem (`<base>@fs/<path>`) when the served URL is unavailable
//! - a **type downloader** pulling `@types/index.d.ts` from consumed remotes
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_federation::{FederationConfig, FsBuildContext, DevServer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = FederationConfig::load(None)?;
//!     let generator = Arc::new(config.generator()?);
//!     generator.build_start(Arc::new(FsBuildContext::new(config.root.clone())));
//!
//!     let addr = format!("{}:{}", config.host, config.port).parse()?;
//!     DevServer::bind(addr, generator, config.remote_entry_path())
//!         .await?
//!         .serve()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Consuming exposed modules natively
//!
//! ```rust,ignore
//! let loader = Arc::new(FallbackLoader::dev(config.dev_origin()?, config.request_timeout())?);
//! let container = generator
//!     .container(loader, ShareScopeRegistry::global(), config.load_timeout())
//!     .await?;
//!
//! container.init(&config.share_scope_snapshot()?);
//! let button = container.get("./Button").await?;
//! println!("{}", button.call());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod container;
pub mod error;
pub mod expose;
pub mod server;
pub mod share_scope;
pub mod transport;
pub mod types;

// Re-exports
pub use config::{FederationConfig, CONFIG_FILE, ENV_PREFIX};
pub use container::{AccessorShape, ModuleAccessor, ModuleNamespace, RemoteContainer};
pub use error::{FederationError, LoadAttempt, Result};
pub use expose::{
    BuildContext, ExposeDeclaration, ExposedModule, FsBuildContext, RemoteEntryGenerator,
};
pub use server::DevServer;
pub use share_scope::{
    DEFAULT_SCOPE, ShareScopeEntry, ShareScopeRegistry, ShareScopeSnapshot, SharedMeta,
};
pub use transport::{FallbackLoader, FsTransport, HttpTransport, ModuleSource, ModuleTransport};
pub use types::{TypeDownloadReport, TypeDownloader};

/// Version of the spacey-federation crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
