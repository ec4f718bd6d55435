//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use raw_http::config::DemoConfig;
use raw_http::handlers::DemoHandler;
use raw_http::http::{Handler, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Start a server on an ephemeral loopback port.
pub async fn start_server<H: Handler>(handler: H) -> Server {
    Server::builder()
        .host("127.0.0.1")
        .port(0)
        .initial_buffer_size(8)
        .handler(handler)
        .serve()
        .await
        .unwrap()
}

/// Start a server running the demo handlers.
pub async fn start_demo_server(config: DemoConfig) -> Server {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    start_server(DemoHandler::with_client(config, client)).await
}

/// Send `request` in one write and read until the server closes.
pub async fn send_raw(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    send_in_fragments(addr, request, request.len().max(1), Duration::ZERO).await
}

/// Send `request` in `size`-byte writes, pausing `pause` between them.
pub async fn send_in_fragments(addr: SocketAddr, request: &[u8], size: usize, pause: Duration) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.set_nodelay(true).unwrap();
    for fragment in request.chunks(size) {
        stream.write_all(fragment).await.unwrap();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    let mut response = Vec::new();
    // a reset after a rejected request just means "no response"
    let _ = stream.read_to_end(&mut response).await;
    response
}
