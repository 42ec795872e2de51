//! Per-connection service.
//!
//! ## Overview
//!
//! One coroutine per accepted connection drives exactly one request/response
//! cycle: rate-limit gate, TLS read, parse, session validation, authorization
//! gates, dispatch, response write. The stream is dropped at the end of the
//! cycle; there is no keep-alive.
//!
//! Gate failures are answered with a plain-text body and no extra headers.
//! Everything that reaches a handler goes out with the security header set
//! attached by the router or the handler itself.

use std::io::{Read, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use may::net::TcpStream;
use rustls::{ServerConnection, StreamOwned};
use tracing::{debug, error};

use crate::error::ServerError;
use crate::handlers::{AppState, RequestContext};
use crate::http::{parse_request, status_reason, Response};
use crate::router::Router;

/// Hard cap on the bytes read for one request. Reads stop at this size, so an
/// oversized request loses its tail and normally fails at the parse or body
/// decode step.
pub const MAX_REQUEST_BYTES: usize = 16384;

/// Idle socket timeout, applied to the TCP stream before the TLS wrap so a
/// stalled handshake is covered too.
pub const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Path prefixes a POST may hit without a validated session. `/` is exact,
/// everything else is a prefix.
const PUBLIC_PATH_PREFIXES: [&str; 7] = [
    "/dashboard",
    "/auth",
    "/public/",
    "/css/",
    "/js/",
    "/login",
    "/register",
];

/// Everything one connection needs, cloned per accept into its coroutine.
pub struct ConnectionService {
    pub state: Arc<AppState>,
    pub router: Arc<Router>,
    pub tls_config: Arc<rustls::ServerConfig>,
    pub rate_limit: u32,
    pub rate_window: Duration,
}

impl Clone for ConnectionService {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            router: Arc::clone(&self.router),
            tls_config: Arc::clone(&self.tls_config),
            rate_limit: self.rate_limit,
            rate_window: self.rate_window,
        }
    }
}

impl ConnectionService {
    /// Drive one request/response cycle over a fresh TCP connection.
    ///
    /// The rate limiter is consulted before any bytes are read, so a limited
    /// client costs one handshake and a short write, nothing more. An empty
    /// read (client connected and went away) closes silently.
    pub fn handle_connection(&self, stream: TcpStream) {
        let request_id = ulid::Ulid::new();
        let ip = stream
            .peer_addr()
            .map_or_else(|_| "0.0.0.0".to_string(), |addr| addr.ip().to_string());

        // Timeouts go on the TCP stream before the TLS wrap; the handshake
        // itself runs lazily inside the first read/write and is covered.
        stream.set_read_timeout(Some(IO_TIMEOUT)).ok();
        stream.set_write_timeout(Some(IO_TIMEOUT)).ok();

        let conn = match ServerConnection::new(Arc::clone(&self.tls_config)) {
            Ok(conn) => conn,
            Err(e) => {
                error!(request_id = %request_id, ip = %ip, error = %e, "TLS connection setup failed");
                return;
            }
        };
        let mut tls = StreamOwned::new(conn, stream);

        if !self
            .state
            .security
            .rate_limit_check(&ip, "/", self.rate_limit, self.rate_window)
        {
            write_response(&mut tls, &error_response(&ServerError::RateLimited), &ip);
            return;
        }

        let raw = match read_request_bytes(&mut tls) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(request_id = %request_id, ip = %ip, error = %e, "request read failed");
                return;
            }
        };
        if raw.is_empty() {
            return;
        }

        let response = process(&self.state, &self.router, &raw).unwrap_or_else(|err| {
            if err.status() >= 500 {
                error!(request_id = %request_id, ip = %ip, error = %err, "request failed");
            } else {
                debug!(request_id = %request_id, ip = %ip, error = %err, "request rejected");
            }
            error_response(&err)
        });
        debug!(request_id = %request_id, ip = %ip, status = response.status, "request complete");
        write_response(&mut tls, &response, &ip);
    }
}

/// Run the parsed-request pipeline: authentication, the POST and admin
/// gates, then router dispatch.
///
/// A panicking handler is caught here and surfaces as
/// [`ServerError::Internal`], keeping one bad request from tearing down the
/// connection coroutine in an unwinding state.
pub fn process(
    state: &Arc<AppState>,
    router: &Router,
    raw: &[u8],
) -> Result<Response, ServerError> {
    let request = parse_request(raw)?;

    let (user, coherence) = match request.bearer_token() {
        Some(token) => state.security.validate_session(token, None),
        None => (None, 1.0),
    };

    if request.method == http::Method::POST && !is_public_path(&request.path) && user.is_none() {
        return Err(ServerError::Unauthorized);
    }

    if request.path.starts_with("/admin") {
        match (&user, request.bearer_token()) {
            (Some(_), Some(token)) => {
                if !state.security.has_capability(token, "admin") {
                    return Err(ServerError::Forbidden(
                        "admin capability required".to_string(),
                    ));
                }
            }
            _ => return Err(ServerError::Unauthorized),
        }
    }

    let ctx = RequestContext {
        request: &request,
        user,
        coherence,
    };
    match catch_unwind(AssertUnwindSafe(|| router.dispatch(state, &ctx))) {
        Ok(result) => result,
        Err(_) => Err(ServerError::Internal("handler panicked".to_string())),
    }
}

/// Whether a POST to `path` is allowed without a session.
fn is_public_path(path: &str) -> bool {
    path == "/"
        || PUBLIC_PATH_PREFIXES
            .iter()
            .any(|prefix| path.starts_with(prefix))
}

/// Accumulate request bytes until the head is complete and `Content-Length`
/// is satisfied, EOF, or the size cap.
///
/// A request without a `Content-Length` header is considered complete at the
/// end of its head section.
fn read_request_bytes<S: Read>(stream: &mut S) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; MAX_REQUEST_BYTES];
    let mut filled = 0;
    let mut expected: Option<usize> = None;

    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;

        if expected.is_none() {
            if let Some(head_end) = buf[..filled].windows(4).position(|w| w == b"\r\n\r\n") {
                let total = head_end + 4 + content_length(&buf[..head_end]);
                expected = Some(total.min(buf.len()));
            }
        }
        if let Some(total) = expected {
            if filled >= total {
                break;
            }
        }
    }

    buf.truncate(filled);
    Ok(buf)
}

/// `Content-Length` from a raw head section, 0 when absent or unparseable.
fn content_length(head: &[u8]) -> usize {
    let head = String::from_utf8_lossy(head);
    for line in head.split("\r\n").skip(1) {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                return value.trim().parse().unwrap_or(0);
            }
        }
    }
    0
}

/// Map a pipeline error onto the plain-text wire response the client sees.
///
/// Bodies are fixed strings; internal error detail stays in the logs.
pub fn error_response(err: &ServerError) -> Response {
    let status = err.status();
    let body = match err {
        ServerError::RateLimited => "Rate limited",
        _ => status_reason(status),
    };
    Response::text(status, body)
}

fn write_response<S: Read + Write>(
    tls: &mut StreamOwned<ServerConnection, S>,
    response: &Response,
    ip: &str,
) {
    let bytes = response.to_bytes();
    if let Err(e) = tls.write_all(&bytes).and_then(|()| tls.flush()) {
        debug!(ip = %ip, error = %e, "response write failed");
    }
}
