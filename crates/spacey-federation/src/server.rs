// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Dev server for the remote entry
//!
//! Any request whose path contains `<assets_dir>/<filename>` receives the
//! generated script as `text/javascript` with an open CORS policy so hosts on
//! other origins can import it.

use crate::error::Result;
use crate::expose::RemoteEntryGenerator;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

struct ServerState {
    generator: Arc<RemoteEntryGenerator>,
    route: String,
}

/// HTTP server exposing a remote entry
pub struct DevServer {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl DevServer {
    /// Bind to `addr`, serving the generator's script under `route`
    /// (`assets/remoteEntry.js`)
    pub async fn bind(
        addr: SocketAddr,
        generator: Arc<RemoteEntryGenerator>,
        route: impl Into<String>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            state: Arc::new(ServerState {
                generator,
                route: route.into(),
            }),
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the process exits
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `shutdown` completes
    pub async fn serve_with_shutdown(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        info!(
            "Serving /{} on http://{}",
            self.state.route,
            self.listener.local_addr()?
        );
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let service = service_fn(move |req| handle(Arc::clone(&state), req));
                        if let Err(err) = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            debug!("Connection from {} ended: {}", peer, err);
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("Dev server shutting down");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle(
    state: Arc<ServerState>,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let matches = {
        let path = req.uri().path();
        debug!("{} {}", req.method(), path);
        path.contains(state.route.as_str())
    };
    drop(req);

    if !matches {
        return Ok(respond(StatusCode::NOT_FOUND, "text/plain", Bytes::from_static(b"Not Found")));
    }

    let script = state.generator.remote_entry_or_empty().await;
    Ok(respond(
        StatusCode::OK,
        "text/javascript",
        Bytes::copy_from_slice(script.as_bytes()),
    ))
}

fn respond(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}
