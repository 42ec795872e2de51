//! # alice-httpd
//!
//! **alice-httpd** is a coroutine-powered TLS application server for Alice
//! Side Script sites: raw HTTP/1.1 over TLS 1.3, capability-scoped sessions
//! with decaying coherence, a signed audit trail, and a built-in `.ass`
//! template engine.
//!
//! ## Overview
//!
//! The server terminates TLS itself and speaks plain HTTP/1.1 underneath,
//! one request per connection. Every connection runs on a lightweight `may`
//! coroutine; a background coroutine rotates the audit signing key. Sessions
//! are bearer tokens whose trust score ("coherence") decays with each
//! validation and invalidates the session below a threshold, independent of
//! wall-clock expiry.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - **[`http`]** - Raw HTTP/1.1 request parsing and response serialization
//! - **[`security`]** - Rate limiting, sessions with coherence decay, the
//!   signed append-only audit log, and key rotation
//! - **[`router`]** - Exact-match and pattern-prefix route resolution
//! - **[`handlers`]** - Page, API, and auth route handlers
//! - **[`template`]** - The Alice Side Script (`.ass`) template engine
//! - **[`content`]** - Template/static/dynamic content generation behind the
//!   router's fallback
//! - **[`agi`]** - The simulated AGI collaborator facade handlers call into
//! - **[`server`]** - TLS listener, per-connection service, lifecycle
//! - **[`cli`]** - `serve` and `render` commands
//! - **[`runtime_config`]** - Coroutine stack sizing from the environment
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as ConnectionServer<br/>(TLS coroutine)
//!     participant Security as SecurityManager
//!     participant Router as Router
//!     participant Handler as Handler
//!     participant Content as ContentGenerator
//!
//!     Client->>Server: HTTPS request
//!     Server->>Security: rate_limit_check(ip)
//!     alt Window exhausted
//!         Security-->>Client: 429 Rate limited
//!     end
//!     Server->>Server: Read + parse request
//!     alt Malformed
//!         Server-->>Client: 400 Bad Request
//!     end
//!     Server->>Security: validate_session(bearer)
//!     Security->>Security: Decay coherence, check expiry
//!     Server->>Server: POST public-path gate
//!     alt Anonymous POST outside allow-list
//!         Server-->>Client: 401 Unauthorized
//!     end
//!     Server->>Server: /admin capability gate
//!     alt Session lacks "admin"
//!         Server-->>Client: 403 Forbidden
//!     end
//!     Server->>Router: route(method, path)
//!     alt Route matched
//!         Router->>Handler: handler(state, ctx)
//!         Handler->>Content: generate(path) or AGI call
//!     else No route
//!         Router->>Content: generate(path) fallback
//!     end
//!     Content-->>Server: Response + security headers
//!     Server-->>Client: HTTP/1.1 response, connection closed
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use alice_httpd::server::{HttpServer, ServerSettings};
//!
//! let handle = HttpServer::new(ServerSettings::default())
//!     .start()
//!     .expect("server start");
//! handle.join().expect("server run");
//! ```
//!
//! ## Runtime Considerations
//!
//! alice-httpd uses the `may` coroutine runtime, not tokio or async-std.
//! This means:
//!
//! - Connection handling runs in coroutines (lightweight threads)
//! - Stack size is configurable via `ALICE_HTTPD_STACK_SIZE` environment
//!   variable; TLS handshakes need more stack than plain request handling
//! - The runtime is incompatible with tokio-based libraries without bridging
//!
//! ## Security Model
//!
//! - Sessions carry a capability list (`read`, `write`, `chat`, `train`,
//!   `admin`) fixed at login
//! - Coherence starts at 1.0 and drops 0.01 per validation; below 0.8 the
//!   session is revoked and a `coherence_low` audit event is recorded
//! - Every audit event is Ed25519-signed with a host key that a background
//!   task replaces every 600 seconds
//! - A fixed-window rate limiter (default 100 requests / 60s per client IP)
//!   runs before any request byte is read

pub mod agi;
pub mod cli;
pub mod content;
pub mod error;
pub mod handlers;
pub mod http;
pub mod router;
pub mod runtime_config;
pub mod security;
pub mod server;
pub mod template;

pub use error::ServerError;
pub use handlers::AppState;
pub use server::{HttpServer, ServerHandle, ServerSettings};
