//! Demo handlers served by the `httpserver` binary.
//!
//! # Data Flow
//! ```text
//! Request target
//!     → /httpbin/<path>  → httpbin.rs (chunked proxy with digest trailers)
//!     → /video           → video.rs (local file)
//!     → anything else    → pages.rs (canned HTML)
//! ```
//!
//! These only consume the engine's handler contract; none of them parse or
//! frame HTTP themselves.

pub mod httpbin;
pub mod pages;
pub mod video;

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::config::DemoConfig;
use crate::http::{ConnectionWriter, Handler, Request, ResponseError};

const HTTPBIN_PREFIX: &str = "/httpbin/";
const VIDEO_TARGET: &str = "/video";

/// Dispatches on the request target to the demo handlers.
#[derive(Debug, Clone)]
pub struct DemoHandler {
    config: Arc<DemoConfig>,
    client: reqwest::Client,
}

impl DemoHandler {
    pub fn new(config: DemoConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Use a preconfigured upstream client for the httpbin proxy.
    pub fn with_client(config: DemoConfig, client: reqwest::Client) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }
}

impl Handler for DemoHandler {
    fn call(&self, writer: ConnectionWriter, request: Request) -> BoxFuture<'static, Result<(), ResponseError>> {
        let target = request.target();

        if let Some(path) = target.strip_prefix(HTTPBIN_PREFIX) {
            let url = format!("{}/{}", self.config.httpbin_url.trim_end_matches('/'), path);
            return Box::pin(httpbin::proxy(self.client.clone(), url, writer));
        }

        if target == VIDEO_TARGET {
            let path = self.config.video_path.clone();
            return Box::pin(video::send(path, writer));
        }

        Box::pin(pages::respond(writer, request))
    }
}
