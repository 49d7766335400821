// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! spacey-fed - dev server and emitter for module federation remotes
//!
//! ## Commands
//!
//! - `serve`: serve `remoteEntry.js` and regenerate it when an exposed file
//!   changes
//! - `emit`: write `remoteEntry.js` below the output directory
//! - `types`: download type declarations of the configured remotes

use anyhow::Context;
use clap::{Parser, Subcommand};
use notify::{RecursiveMode, Watcher};
use owo_colors::OwoColorize;
use spacey_federation::{
    BuildContext, DevServer, FederationConfig, FsBuildContext, RemoteEntryGenerator,
    TypeDownloader, VERSION,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(
    name = "spacey-fed",
    about = "Module federation remotes powered by Spacey",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Configuration file (defaults to ./federation.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the remote entry and watch exposed files
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Write the remote entry to the output directory
    Emit {
        /// Override the configured output directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// Download type declarations of the configured remotes
    Types,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "spacey_federation=debug,spacey_fed=debug"
    } else {
        "spacey_federation=info,spacey_fed=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let result = match FederationConfig::load(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Command::Serve { port } => serve(config, port).await,
            Command::Emit { out_dir } => emit(config, out_dir).await,
            Command::Types => types(config).await,
        },
        Err(err) => Err(err.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}: {:#}", "Error".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

async fn serve(mut config: FederationConfig, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.port = port;
    }

    let context = Arc::new(FsBuildContext::new(config.root.clone()));
    let generator = Arc::new(config.generator()?);
    let build_context: Arc<dyn BuildContext> = context.clone();
    generator.build_start(build_context);

    if config.download_types && !config.remotes.is_empty() {
        let downloader = TypeDownloader::new(&config.root, config.request_timeout())?;
        let remotes = config.remotes.clone();
        tokio::spawn(async move {
            downloader.download_all(&remotes).await;
        });
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid address {}:{}", config.host, config.port))?;
    let server = DevServer::bind(addr, Arc::clone(&generator), config.remote_entry_path())
        .await
        .with_context(|| format!("cannot bind {addr}"))?;

    println!(
        "{} {} serving {} at {}",
        "spacey-fed".bright_cyan().bold(),
        format!("v{VERSION}").dimmed(),
        config.name.bold(),
        format!("http://{}/{}", server.local_addr()?, config.remote_entry_path()).cyan()
    );

    let watch_task = tokio::spawn(watch_exposed(Arc::clone(&generator), context));

    server
        .serve_with_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for ctrl-c: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    watch_task.abort();
    Ok(())
}

/// Regenerate the remote entry whenever a file it exposes changes
async fn watch_exposed(generator: Arc<RemoteEntryGenerator>, context: Arc<FsBuildContext>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() => {
                let _ = tx.send(event.paths);
            }
            Ok(_) => {}
            Err(err) => warn!("Watch error: {}", err),
        }
    }) {
        Ok(watcher) => watcher,
        Err(err) => {
            error!("Cannot watch exposed files: {}", err);
            return;
        }
    };

    let mut watched = HashSet::new();
    loop {
        // Generating registers the exposed files with the context
        generator.remote_entry_or_empty().await;
        for path in context.watched_files() {
            if watched.contains(&path) {
                continue;
            }
            match watcher.watch(&path, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    debug!("Watching {}", path.display());
                    watched.insert(path);
                }
                Err(err) => warn!("Cannot watch {}: {}", path.display(), err),
            }
        }

        let Some(paths) = rx.recv().await else {
            return;
        };
        for path in &paths {
            info!("{} changed", path.display());
        }
        generator.invalidate().await;
    }
}

async fn emit(config: FederationConfig, out_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let generator = config.generator()?;
    generator.build_start(Arc::new(FsBuildContext::new(config.root.clone())));

    let out_dir = out_dir.unwrap_or_else(|| config.root.join(&config.out_dir));
    let path = generator.emit(&out_dir, &config.assets_dir).await?;

    println!(
        "{} {} for {}",
        "Wrote".green().bold(),
        path.display(),
        config.name
    );
    Ok(())
}

async fn types(config: FederationConfig) -> anyhow::Result<()> {
    if config.remotes.is_empty() {
        println!("{}", "No remotes configured".yellow());
        return Ok(());
    }

    let downloader = TypeDownloader::new(&config.root, config.request_timeout())?;
    let report = downloader.download_all(&config.remotes).await;

    for name in &report.saved {
        println!("{} {}", "saved".green(), name);
    }
    for name in &report.discarded {
        println!("{} {} (not a declaration file)", "skipped".yellow(), name);
    }
    for err in &report.failed {
        println!("{} {}", "failed".red(), err);
    }

    if report.saved.is_empty() && !report.failed.is_empty() {
        anyhow::bail!("no remote types could be downloaded");
    }
    Ok(())
}
