//! # Server Module
//!
//! TLS listener, per-connection service, and server lifecycle.
//!
//! ## Overview
//!
//! The server accepts TLS 1.3 connections on a `may` coroutine per
//! connection, drives one request/response cycle each, and shuts down
//! through a shared cancellation flag. TLS material handling (certificate
//! bootstrap, config assembly) lives in [`tls`]; the request pipeline and
//! its authorization gates live in [`service`].

pub mod http_server;
pub mod service;
pub mod tls;

pub use http_server::{HttpServer, ServerHandle, ServerSettings};
pub use service::{ConnectionService, IO_TIMEOUT, MAX_REQUEST_BYTES};
pub use tls::{build_server_config, ensure_server_certificate, init_crypto};
