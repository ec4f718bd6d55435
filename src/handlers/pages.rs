//! Canned HTML pages.

use crate::http::{default_headers, ConnectionWriter, Request, ResponseError, StatusCode};

const BAD_REQUEST_PAGE: &str = r#"<html>
  <head>
    <title>400 Bad Request</title>
  </head>
  <body>
    <h1>Bad Request</h1>
    <p>Your request honestly kinda sucked.</p>
  </body>
</html>
"#;

const INTERNAL_ERROR_PAGE: &str = r#"<html>
  <head>
    <title>500 Internal Server Error</title>
  </head>
  <body>
    <h1>Internal Server Error</h1>
    <p>Okay, you know what? This one is on me.</p>
  </body>
</html>
"#;

const SUCCESS_PAGE: &str = r#"<html>
  <head>
    <title>200 OK</title>
  </head>
  <body>
    <h1>Success!</h1>
    <p>Your request was an absolute banger.</p>
  </body>
</html>
"#;

/// Status and page for a request target.
pub fn page_for(target: &str) -> (StatusCode, &'static str) {
    match target {
        "/yourproblem" => (StatusCode::BAD_REQUEST, BAD_REQUEST_PAGE),
        "/myproblem" => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_PAGE),
        _ => (StatusCode::OK, SUCCESS_PAGE),
    }
}

pub async fn respond(mut writer: ConnectionWriter, request: Request) -> Result<(), ResponseError> {
    let (status, body) = page_for(request.target());

    let mut headers = default_headers(body.len());
    headers.overwrite("Content-Type", "text/html")?;

    writer.write_status_line(status).await?;
    writer.write_headers(&headers).await?;
    writer.write_body(body.as_bytes()).await?;
    Ok(())
}
