//! End-to-end tests over real TCP connections.

use std::time::Duration;

use raw_http::config::DemoConfig;
use raw_http::handlers::pages::page_for;
use raw_http::http::{default_headers, ConnectionWriter, Request, ResponseError, StatusCode};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

mod common;

async fn echo(mut w: ConnectionWriter, req: Request) -> Result<(), ResponseError> {
    let mut body = format!("{} {}\n", req.method(), req.target()).into_bytes();
    body.extend_from_slice(&req.body);
    w.write_status_line(StatusCode::OK).await?;
    w.write_headers(&default_headers(body.len())).await?;
    w.write_body(&body).await?;
    Ok(())
}

async fn slow(mut w: ConnectionWriter, _req: Request) -> Result<(), ResponseError> {
    tokio::time::sleep(Duration::from_millis(300)).await;
    w.write_status_line(StatusCode::OK).await?;
    w.write_headers(&default_headers(4)).await?;
    w.write_body(b"slow").await?;
    Ok(())
}

fn text(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap()
}

#[tokio::test]
async fn your_problem_is_bad_request() {
    let server = common::start_demo_server(DemoConfig::default()).await;
    let out = text(common::send_raw(server.local_addr(), b"GET /yourproblem HTTP/1.1\r\nHost: x\r\n\r\n").await);

    assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(out.contains("Content-Type: text/html\r\n"));
    assert!(out.contains("Connection: close\r\n"));
    assert!(out.contains("<h1>Bad Request</h1>"));
    server.close();
}

#[tokio::test]
async fn pages_through_real_client() {
    let server = common::start_demo_server(DemoConfig::default()).await;
    let base = format!("http://{}", server.local_addr());
    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    let res = client.get(format!("{base}/myproblem")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    assert!(res.text().await.unwrap().contains("Internal Server Error"));

    let res = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "text/html");
    assert_eq!(res.text().await.unwrap(), page_for("/").1);

    server.close();
}

#[tokio::test]
async fn unsupported_version_gets_no_response() {
    let server = common::start_demo_server(DemoConfig::default()).await;
    let out = common::send_raw(server.local_addr(), b"GET /yourproblem HTTP/1.0\r\nHost: x\r\n\r\n").await;
    assert!(out.is_empty());
    server.close();
}

#[tokio::test]
async fn byte_at_a_time_delivery() {
    let server = common::start_server(echo).await;
    let request = b"POST /submit HTTP/1.1\r\nHost: x\r\nContent-Length: 11\r\n\r\nhello world";

    let whole = common::send_raw(server.local_addr(), request).await;
    let split = common::send_in_fragments(server.local_addr(), request, 1, Duration::from_millis(1)).await;

    assert_eq!(whole, split);
    assert!(text(whole).ends_with("\r\n\r\nPOST /submit\nhello world"));
    server.close();
}

#[tokio::test]
async fn short_body_gets_no_response() {
    let server = common::start_server(echo).await;
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    stream
        .write_all(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nabc")
        .await
        .unwrap();
    stream.shutdown().await.unwrap();

    let mut out = Vec::new();
    let _ = tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut out).await;
    assert!(out.is_empty());
    server.close();
}

#[tokio::test]
async fn httpbin_proxy_streams_chunks_with_trailers() {
    let upstream = common::start_demo_server(DemoConfig::default()).await;
    let server = common::start_demo_server(DemoConfig {
        httpbin_url: format!("http://{}", upstream.local_addr()),
        ..DemoConfig::default()
    })
    .await;

    let out = text(common::send_raw(server.local_addr(), b"GET /httpbin/json HTTP/1.1\r\nHost: x\r\n\r\n").await);

    let page = page_for("/json").1;
    let digest = hex::encode(Sha256::digest(page.as_bytes()));
    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.contains("Transfer-Encoding: chunked\r\n"));
    assert!(out.contains("Trailers: X-Content-SHA256, X-Content-Length\r\n"));
    assert!(out.contains("<h1>Success!</h1>"));
    assert!(out.ends_with(&format!(
        "0\r\nX-Content-Length: {}\r\nX-Content-Sha256: {}\r\n\r\n",
        page.len(),
        digest
    )));

    server.close();
    upstream.close();
}

#[tokio::test]
async fn video_is_served_from_disk() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"not really an mp4").unwrap();

    let server = common::start_demo_server(DemoConfig {
        video_path: file.path().display().to_string(),
        ..DemoConfig::default()
    })
    .await;
    let out = text(common::send_raw(server.local_addr(), b"GET /video HTTP/1.1\r\n\r\n").await);

    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.contains("Content-Type: video/mp4\r\n"));
    assert!(out.contains("Content-Length: 17\r\n"));
    assert!(out.ends_with("\r\n\r\nnot really an mp4"));
    server.close();
}

#[tokio::test]
async fn missing_video_is_not_found() {
    let server = common::start_demo_server(DemoConfig {
        video_path: "/definitely/not/here.mp4".into(),
        ..DemoConfig::default()
    })
    .await;
    let out = text(common::send_raw(server.local_addr(), b"GET /video HTTP/1.1\r\n\r\n").await);
    assert_eq!(out, "HTTP/1.1 404 \r\nConnection: close\r\nContent-Length: 0\r\n\r\n");
    server.close();
}

#[tokio::test]
async fn close_stops_accepting() {
    let server = common::start_server(echo).await;
    let addr = server.local_addr();
    assert!(server.close());

    let mut refused = false;
    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_err() {
            refused = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(refused, "listener still accepting after close");
}

#[tokio::test]
async fn close_leaves_in_flight_connections_alone() {
    let server = common::start_server(slow).await;
    let addr = server.local_addr();

    let in_flight = tokio::spawn(async move { common::send_raw(addr, b"GET / HTTP/1.1\r\n\r\n").await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.active_connections(), 1);

    server.close();
    let out = text(in_flight.await.unwrap());
    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.ends_with("slow"));
}

#[tokio::test]
async fn connections_are_handled_concurrently() {
    let server = common::start_server(slow).await;
    let addr = server.local_addr();

    let started = std::time::Instant::now();
    let requests: Vec<_> = (0..10)
        .map(|_| tokio::spawn(async move { common::send_raw(addr, b"GET / HTTP/1.1\r\n\r\n").await }))
        .collect();
    for request in requests {
        assert!(text(request.await.unwrap()).ends_with("slow"));
    }

    // ten 300ms handlers in well under ten times 300ms
    assert!(started.elapsed() < Duration::from_millis(2000));
    server.close();
}
