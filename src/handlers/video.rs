//! Serves a local video file.

use std::path::Path;

use tokio::io::AsyncWrite;

use crate::http::{Headers, ResponseError, ResponseWriter, StatusCode};

pub async fn send<W>(path: impl AsRef<Path>, mut writer: ResponseWriter<W>) -> Result<(), ResponseError>
where
    W: AsyncWrite + Unpin,
{
    let path = path.as_ref();
    let mut headers = Headers::new();
    headers.set("Connection", "close")?;

    let video = match tokio::fs::read(path).await {
        Ok(video) => video,
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "Failed to open video file");
            headers.set("Content-Length", "0")?;
            writer.write_status_line(StatusCode::NOT_FOUND).await?;
            writer.write_headers(&headers).await?;
            writer.write_body(b"").await?;
            return Ok(());
        }
    };

    headers.set("Content-Type", "video/mp4")?;
    headers.set("Content-Length", &video.len().to_string())?;

    writer.write_status_line(StatusCode::OK).await?;
    writer.write_headers(&headers).await?;
    writer.write_body(&video).await?;
    Ok(())
}
