//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route matching, method checks,
//! and access logging.

use crate::config::{AppState, HealthConfig};
use crate::handler::scripts;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::USER_AGENT;
use hyper::{Method, Request, Response};
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Path prefix of the script endpoint
const SCRIPTS_PREFIX: &str = "/scripts/";

/// Resolved route for a request path
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Health,
    Script { os_type: Cow<'a, str> },
    NotFound,
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let access_log = state.config.logging.access_log;

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = format_version(req.version()).to_string();
    entry.user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let response = dispatch(req, &state).await;
    let response = http::with_server_name(response, &state.config.http.server_name);

    if access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or_default();
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn dispatch(req: Request<Incoming>, state: &Arc<AppState>) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match match_route(&path, &state.config.routes.health) {
        Route::Health => match method {
            Method::GET => http::build_health_response("ok"),
            _ => http::build_405_response("GET"),
        },
        Route::Script { os_type } => match method {
            Method::GET | Method::POST => {
                scripts::serve_script(req, os_type.into_owned(), Arc::clone(state)).await
            }
            _ => {
                logger::log_warning(&format!("Method not allowed: {method} {path}"));
                http::build_405_response(http::SCRIPT_METHODS)
            }
        },
        Route::NotFound => http::build_404_response(),
    }
}

/// Match a request path against the registered routes.
///
/// The OS type segment is percent-decoded; a segment that does not decode to
/// UTF-8 is left for the script handler to reject.
fn match_route<'a>(path: &'a str, health: &HealthConfig) -> Route<'a> {
    if health.enabled && (path == health.liveness_path || path == health.readiness_path) {
        return Route::Health;
    }

    match path.strip_prefix(SCRIPTS_PREFIX) {
        Some(segment) if !segment.is_empty() && !segment.contains('/') => Route::Script {
            os_type: percent_decode_str(segment)
                .decode_utf8()
                .unwrap_or(Cow::Borrowed(segment)),
        },
        _ => Route::NotFound,
    }
}

const fn format_version(version: hyper::Version) -> &'static str {
    match version {
        hyper::Version::HTTP_09 => "0.9",
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        hyper::Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::BodyExt;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::StatusCode;
    use hyper_util::rt::TokioIo;
    use std::fs;
    use std::path::Path;
    use tokio::net::{TcpListener, TcpStream};

    const LINUX_TEMPLATE: &str = "\
#!/usr/bin/env bash
# {{ ProjectName }} generated {{ CreatedAt }}
USER_NAME=\"{{ UserName }}\"
CONTAINER=\"{{ ContainerName }}\"
NETWORK=\"{{ Network }}\"
DNS=\"{{ DNS }}\"
PUID={{ PUID }}
PGID={{ PGID }}
TZ=\"{{ TZ }}\"
PORT={{ Port }}
VOLUME=\"{{ Volume }}\"
HOST_IP=\"{{ HostIP }}\"
";

    fn test_config(dir: &Path) -> Config {
        let mut cfg = Config::load_from(&dir.join("absent").to_string_lossy()).unwrap();
        cfg.templates.dir = dir.to_string_lossy().into_owned();
        cfg.logging.access_log = false;
        cfg
    }

    fn template_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("jelly-bash-linux.sh"), LINUX_TEMPLATE).unwrap();
        fs::write(dir.path().join("jelly-bash-broken.sh"), "{% if %}").unwrap();
        fs::write(dir.path().join("jelly-bash-typo.sh"), "{{ UserNmae }}").unwrap();
        dir
    }

    async fn spawn_server(cfg: Config) -> SocketAddr {
        let state = Arc::new(AppState::new(&cfg));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((stream, peer_addr)) = listener.accept().await {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        handle_request(req, Arc::clone(&state), peer_addr)
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        addr
    }

    async fn send(
        addr: SocketAddr,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        body: &str,
    ) -> (StatusCode, hyper::HeaderMap, String) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .unwrap();
        tokio::spawn(conn);

        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("Host", "localhost");
        if let Some(ct) = content_type {
            builder = builder.header("Content-Type", ct);
        }
        let req = builder.body(Full::new(Bytes::from(body.to_string()))).unwrap();

        let resp = sender.send_request(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_match_route() {
        let health = HealthConfig::default();
        assert_eq!(
            match_route("/scripts/linux", &health),
            Route::Script { os_type: "linux".into() }
        );
        assert_eq!(
            match_route("/scripts/lin%75x", &health),
            Route::Script { os_type: "linux".into() }
        );
        assert_eq!(
            match_route("/scripts/..%2Fsecret", &health),
            Route::Script { os_type: "../secret".into() }
        );
        assert_eq!(match_route("/scripts/", &health), Route::NotFound);
        assert_eq!(match_route("/scripts/a/b", &health), Route::NotFound);
        assert_eq!(match_route("/scripts", &health), Route::NotFound);
        assert_eq!(match_route("/other", &health), Route::NotFound);
        assert_eq!(match_route("/healthz", &health), Route::Health);
        assert_eq!(match_route("/readyz", &health), Route::Health);

        let disabled = HealthConfig {
            enabled: false,
            ..HealthConfig::default()
        };
        assert_eq!(match_route("/healthz", &disabled), Route::NotFound);
    }

    #[tokio::test]
    async fn test_get_linux_defaults() {
        let dir = template_dir();
        let addr = spawn_server(test_config(dir.path())).await;

        let (status, headers, body) = send(addr, Method::GET, "/scripts/linux", None, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["Content-Type"], "text/plain");
        for expected in [
            "# Nexus Creator Vault generated ",
            "USER_NAME=\"Administrator\"",
            "CONTAINER=\"nexus-creator-vault\"",
            "NETWORK=\"Inner-Athena\"",
            "DNS=\"10.20.0.20\"",
            "PUID=1050",
            "PGID=1050",
            "TZ=\"America/Colorado\"",
            "PORT=1050",
            "VOLUME=\"creator-vault000\"",
            "HOST_IP=\"10.20.0.1\"",
        ] {
            assert!(body.contains(expected), "missing {expected:?} in:\n{body}");
        }
        assert!(body.ends_with("HOST_IP=\"10.20.0.1\"\n"));
    }

    #[tokio::test]
    async fn test_percent_encoded_os_type() {
        let dir = template_dir();
        let addr = spawn_server(test_config(dir.path())).await;

        let (status, _, body) = send(addr, Method::GET, "/scripts/lin%75x", None, "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("USER_NAME=\"Administrator\""));

        let (status, _, _) = send(addr, Method::GET, "/scripts/%2e%2e", None, "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_json_overrides() {
        let dir = template_dir();
        let addr = spawn_server(test_config(dir.path())).await;

        let (status, _, body) = send(
            addr,
            Method::POST,
            "/scripts/linux",
            Some("application/json"),
            r#"{"UserName":"Alice","Port":"9000"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("USER_NAME=\"Alice\""));
        assert!(body.contains("PORT=9000"));
        assert!(body.contains("PUID=1050"));
        assert!(body.contains("NETWORK=\"Inner-Athena\""));
    }

    #[tokio::test]
    async fn test_get_with_json_body_is_honored() {
        let dir = template_dir();
        let addr = spawn_server(test_config(dir.path())).await;

        let (status, _, body) = send(
            addr,
            Method::GET,
            "/scripts/linux",
            Some("application/json"),
            r#"{"Volume":"data01"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("VOLUME=\"data01\""));
    }

    #[tokio::test]
    async fn test_other_content_type_ignored() {
        let dir = template_dir();
        let addr = spawn_server(test_config(dir.path())).await;

        for ct in ["text/plain", "application/json; charset=utf-8", "Application/JSON"] {
            let (status, _, body) = send(
                addr,
                Method::POST,
                "/scripts/linux",
                Some(ct),
                r#"{"UserName":"Alice"}"#,
            )
            .await;
            assert_eq!(status, StatusCode::OK, "{ct}");
            assert!(body.contains("USER_NAME=\"Administrator\""), "{ct}");
        }
    }

    #[tokio::test]
    async fn test_invalid_json_uses_defaults() {
        let dir = template_dir();
        let addr = spawn_server(test_config(dir.path())).await;

        let (status, _, body) = send(
            addr,
            Method::POST,
            "/scripts/linux",
            Some("application/json"),
            "{\"UserName\": ",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("USER_NAME=\"Administrator\""));
    }

    #[tokio::test]
    async fn test_invalid_json_strict_mode() {
        let dir = template_dir();
        let mut cfg = test_config(dir.path());
        cfg.scripts.strict_json = true;
        let addr = spawn_server(cfg).await;

        let (status, _, body) = send(
            addr,
            Method::POST,
            "/scripts/linux",
            Some("application/json"),
            "not json",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.starts_with("Malformed JSON body: "));
    }

    #[tokio::test]
    async fn test_missing_template_404() {
        let dir = template_dir();
        let addr = spawn_server(test_config(dir.path())).await;

        for path in ["/scripts/plan9", "/scripts/..%2Fjelly-bash-linux", "/scripts/..", "/nope"] {
            let (status, _, body) = send(addr, Method::GET, path, None, "").await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
            assert!(!body.trim().is_empty(), "{path}");
        }

        let (_, _, body) = send(addr, Method::GET, "/scripts/plan9", None, "").await;
        assert_eq!(body, "Template for OS type not found\n");
    }

    #[tokio::test]
    async fn test_template_failures_500() {
        let dir = template_dir();
        let addr = spawn_server(test_config(dir.path())).await;

        let (status, _, body) = send(addr, Method::GET, "/scripts/broken", None, "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("Error parsing template: "), "{body}");

        let (status, _, body) = send(addr, Method::GET, "/scripts/typo", None, "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("Error executing template: "), "{body}");
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let dir = template_dir();
        let addr = spawn_server(test_config(dir.path())).await;

        for method in [Method::DELETE, Method::PUT, Method::HEAD] {
            let (status, headers, _) = send(addr, method.clone(), "/scripts/linux", None, "").await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method}");
            assert_eq!(headers["Allow"], "GET, POST");
        }
    }

    #[tokio::test]
    async fn test_oversized_body_413() {
        let dir = template_dir();
        let mut cfg = test_config(dir.path());
        cfg.http.max_body_size = 16;
        let addr = spawn_server(cfg).await;

        let (status, _, _) = send(
            addr,
            Method::POST,
            "/scripts/linux",
            Some("application/json"),
            r#"{"UserName":"a much longer value than sixteen bytes"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_health_and_server_header() {
        let dir = template_dir();
        let addr = spawn_server(test_config(dir.path())).await;

        let (status, headers, body) = send(addr, Method::GET, "/healthz", None, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
        assert_eq!(headers["Server"], "jelly-scripts");
    }
}
