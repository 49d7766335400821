// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Served-URL transport

use crate::error::{FederationError, Result};
use crate::transport::{ModuleSource, ModuleTransport};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Fetches modules over HTTP, resolving relative locators against an origin
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    origin: Option<Url>,
}

impl HttpTransport {
    /// Create a transport. Without an `origin` only absolute URLs can be fetched.
    pub fn new(origin: Option<Url>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(30)))
            .user_agent(format!("spacey-federation/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FederationError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { client, origin })
    }

    /// The origin relative locators resolve against
    pub fn origin(&self) -> Option<&Url> {
        self.origin.as_ref()
    }

    /// Turn a locator into the URL that will be requested
    pub fn url_for(&self, locator: &str) -> Result<Url> {
        match Url::parse(locator) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let origin = self.origin.as_ref().ok_or_else(|| {
                    FederationError::transport("http", locator, "relative locator and no origin")
                })?;
                origin
                    .join(locator)
                    .map_err(|e| FederationError::transport("http", locator, e))
            }
            Err(e) => Err(FederationError::transport("http", locator, e)),
        }
    }
}

#[async_trait]
impl ModuleTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self))]
    async fn fetch(&self, locator: &str) -> Result<ModuleSource> {
        let url = self.url_for(locator)?;
        debug!("Fetching module from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FederationError::transport("http", locator, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FederationError::transport(
                "http",
                locator,
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let code = response
            .text()
            .await
            .map_err(|e| FederationError::transport("http", locator, e))?;

        Ok(ModuleSource {
            locator: locator.to_string(),
            code,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(origin: Option<&str>) -> HttpTransport {
        HttpTransport::new(
            origin.map(|o| Url::parse(o).unwrap()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_relative_locator_joins_origin() {
        let t = transport(Some("http://localhost:5173/"));
        assert_eq!(
            t.url_for("/src/Button.jsx").unwrap().as_str(),
            "http://localhost:5173/src/Button.jsx"
        );
    }

    #[test]
    fn test_absolute_locator_is_kept() {
        let t = transport(Some("http://localhost:5173/"));
        assert_eq!(
            t.url_for("https://cdn.example.com/a.js").unwrap().as_str(),
            "https://cdn.example.com/a.js"
        );
    }

    #[test]
    fn test_relative_locator_without_origin_fails() {
        let t = transport(None);
        assert!(matches!(
            t.url_for("/src/Button.jsx"),
            Err(FederationError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let t = transport(Some(&format!("http://{addr}/")));
        let err = t.fetch("/src/Button.jsx").await.unwrap_err();
        assert!(matches!(err, FederationError::Transport { ref transport, .. } if transport == "http"));
    }
}
