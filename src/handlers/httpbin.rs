//! Chunked reverse proxy to httpbin with digest trailers.
//!
//! The upstream body is forwarded chunk by chunk while a SHA-256 digest and
//! the total length are accumulated; both are sent as trailers once the last
//! chunk is out.

use sha2::{Digest, Sha256};
use tokio::io::AsyncWrite;

use crate::http::{default_headers, ConnectionWriter, Headers, ResponseError, ResponseWriter, StatusCode};

pub const TRAILER_SHA256: &str = "X-Content-SHA256";
pub const TRAILER_LENGTH: &str = "X-Content-Length";

/// Running digest and length of a streamed body.
#[derive(Clone, Default)]
pub struct BodyDigest {
    hasher: Sha256,
    length: usize,
}

impl BodyDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.length += chunk.len();
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Trailer block carrying the hex digest and the length.
    pub fn into_trailers(self) -> Result<Headers, ResponseError> {
        let mut trailers = Headers::new();
        trailers.set(TRAILER_SHA256, &hex::encode(self.hasher.finalize()))?;
        trailers.set(TRAILER_LENGTH, &self.length.to_string())?;
        Ok(trailers)
    }
}

/// Headers announcing a chunked JSON body with digest trailers.
pub fn chunked_headers() -> Result<Headers, ResponseError> {
    let mut headers = Headers::new();
    headers.set("Connection", "close")?;
    headers.set("Content-Type", "application/json")?;
    headers.set("Transfer-Encoding", "chunked")?;
    headers.set("Trailers", &format!("{TRAILER_SHA256}, {TRAILER_LENGTH}"))?;
    Ok(headers)
}

pub async fn proxy(client: reqwest::Client, url: String, mut writer: ConnectionWriter) -> Result<(), ResponseError> {
    let mut upstream = match client.get(&url).send().await {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::error!(error = %e, url = %url, "Failed to fetch from httpbin");
            return write_upstream_failure(&mut writer).await;
        }
    };

    writer.write_status_line(StatusCode::OK).await?;
    writer.write_headers(&chunked_headers()?).await?;

    let mut digest = BodyDigest::new();
    loop {
        match upstream.chunk().await {
            Ok(Some(chunk)) => {
                tracing::trace!(bytes = chunk.len(), "Writing chunked body");
                digest.update(&chunk);
                writer.write_chunked_body(&chunk).await?;
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, url = %url, "Failed to read httpbin response");
                break;
            }
        }
    }

    finish_with_trailers(&mut writer, digest).await
}

/// Write the last chunk followed by the digest trailers.
pub async fn finish_with_trailers<W>(writer: &mut ResponseWriter<W>, digest: BodyDigest) -> Result<(), ResponseError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_chunked_body_done().await?;
    writer.write_trailers(&digest.into_trailers()?).await
}

async fn write_upstream_failure(writer: &mut ConnectionWriter) -> Result<(), ResponseError> {
    let body = b"upstream request failed";
    writer.write_status_line(StatusCode::INTERNAL_SERVER_ERROR).await?;
    writer.write_headers(&default_headers(body.len())).await?;
    writer.write_body(body).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_of_known_input() {
        let mut digest = BodyDigest::new();
        digest.update(b"hello ");
        digest.update(b"world");
        assert_eq!(digest.len(), 11);

        let trailers = digest.into_trailers().unwrap();
        assert_eq!(
            trailers.get("x-content-sha256"),
            Some("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
        );
        assert_eq!(trailers.get("x-content-length"), Some("11"));
    }

    #[tokio::test]
    async fn streams_chunks_then_trailers() {
        let mut writer = ResponseWriter::new(Vec::new());
        writer.write_status_line(StatusCode::OK).await.unwrap();
        writer.write_headers(&chunked_headers().unwrap()).await.unwrap();

        let mut digest = BodyDigest::new();
        for chunk in [&b"foo"[..], b"bar"] {
            digest.update(chunk);
            writer.write_chunked_body(chunk).await.unwrap();
        }
        finish_with_trailers(&mut writer, digest).await.unwrap();

        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert!(out.contains("Trailers: X-Content-SHA256, X-Content-Length\r\n"));
        assert!(out.contains("\r\n\r\n3\r\nfoo\r\n3\r\nbar\r\n0\r\nX-Content-Length: 6\r\nX-Content-Sha256: "));
        assert!(out.ends_with("\r\n\r\n"));
    }
}
