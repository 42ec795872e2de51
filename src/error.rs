//! Request-level error taxonomy.
//!
//! Every failure that surfaces to a client maps onto one of these kinds so the
//! connection loop can emit a single, consistent error response. Transport
//! failures (broken sockets, TLS teardown) stay as `std::io::Error` in the
//! server layer since there is no client left to answer.

/// Failure classes for the request pipeline.
///
/// The variant determines the HTTP status of the response; the payload is a
/// human-readable reason that is safe to show a client. Internal details
/// (paths, stack traces) must not be placed in these messages.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Request line or headers could not be parsed.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Authentication was required and missing or invalid.
    #[error("authentication required")]
    Unauthorized,

    /// The authenticated user lacks a required capability.
    #[error("{0}")]
    Forbidden(String),

    /// No route, template, or file matched the request path.
    #[error("not found: {0}")]
    NotFound(String),

    /// The client exhausted its request budget for the current window.
    #[error("rate limit exceeded")]
    RateLimited,

    /// JSON body could not be serialized.
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected failure while handling the request.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status code this error renders as.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            ServerError::MalformedRequest(_) => 400,
            ServerError::Unauthorized => 401,
            ServerError::Forbidden(_) => 403,
            ServerError::NotFound(_) => 404,
            ServerError::RateLimited => 429,
            ServerError::Json(_) | ServerError::Internal(_) => 500,
        }
    }
}
