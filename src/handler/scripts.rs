//! Script endpoint module
//!
//! `GET|POST /scripts/{osType}`: reads the optional JSON body and hands the
//! request to the script generator on the blocking pool.

use crate::config::AppState;
use crate::http;
use crate::logger;
use crate::script::ScriptError;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;

/// The only content type whose body is decoded as overrides (exact match)
const JSON_CONTENT_TYPE: &[u8] = b"application/json";

/// Serve a rendered script for `os_type`
pub async fn serve_script(
    req: Request<Incoming>,
    os_type: String,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let max_body_size = state.config.http.max_body_size;

    if let Some(resp) = check_body_size(&req, max_body_size) {
        return resp;
    }

    let is_json = req
        .headers()
        .get(CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes() == JSON_CONTENT_TYPE);

    // Bodies of any other content type are never read
    let body = if is_json {
        match read_body(req.into_body(), max_body_size).await {
            Ok(bytes) => Some(bytes),
            Err(resp) => return resp,
        }
    } else {
        None
    };

    let worker_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        worker_state.generator.generate(&os_type, body.as_deref())
    })
    .await;

    match result {
        Ok(Ok(script)) => http::build_script_response(script),
        Ok(Err(err)) => script_error_response(&err),
        Err(join_err) => {
            logger::log_error(&format!("Script generation task failed: {join_err}"));
            http::build_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "500 Internal Server Error",
            )
        }
    }
}

fn script_error_response(err: &ScriptError) -> Response<Full<Bytes>> {
    match err {
        ScriptError::NotFound => {}
        ScriptError::MalformedInput(_) => logger::log_warning(&err.to_string()),
        ScriptError::Parse(_) | ScriptError::Execution(_) => logger::log_error(&err.to_string()),
    }
    http::build_error_response(err.status(), &err.to_string())
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(req: &Request<Incoming>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get(CONTENT_LENGTH)?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_warning(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            _ => None,
        },
    )
}

/// Collect the request body, bounded by `limit` bytes
async fn read_body(body: Incoming, limit: u64) -> Result<Bytes, Response<Full<Bytes>>> {
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_warning(&format!("Request body exceeded {limit} bytes"));
            Err(http::build_413_response())
        }
        Err(err) => {
            logger::log_warning(&format!("Failed to read request body: {err}"));
            Err(http::build_error_response(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
            ))
        }
    }
}
