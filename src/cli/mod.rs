//! # CLI Module
//!
//! Command-line interface for running and inspecting the server.
//!
//! ## Overview
//!
//! The CLI supports:
//! - **Serving** - Run the TLS application server
//! - **Template previews** - Render a `.ass` template offline
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Run the server:
//!
//! ```bash
//! alice-httpd serve --host 0.0.0.0 --port 8443
//! ```
//!
//! Options:
//! - `--host <ADDR>` - Interface to bind (default: `0.0.0.0`)
//! - `--port <PORT>` - Port to bind (default: `8443`)
//! - `--cert <FILE>` / `--key <FILE>` - TLS material; a self-signed pair for
//!   `localhost` is generated when the files are missing
//! - `--scripts-dir <DIR>` - Template directory (default: `ass_scripts`)
//! - `--public-dir <DIR>` - Static file directory (default: `public`)
//! - `--rate-limit <N>` / `--rate-window-secs <SECS>` - Fixed-window rate
//!   limiter parameters (default: 100 per 60s)
//!
//! The server shuts down cleanly on SIGINT or SIGTERM.
//!
//! ### `render`
//!
//! Render a template against the live system context and print it:
//!
//! ```bash
//! alice-httpd render --template ass_scripts/index.ass
//! alice-httpd render --template ass_scripts/userdash.ass --user admin
//! ```
//!
//! Useful while editing templates; the output is exactly what a request for
//! the corresponding page would produce, minus the per-request coherence.
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use alice_httpd::cli::{run_cli, Cli, Commands};
//!
//! run_cli()?;
//! ```

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{run_cli, Cli, Commands};
