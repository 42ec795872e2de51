//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the coroutine runtime.
//!
//! ## Overview
//!
//! The server runs every connection on a `may` coroutine, and coroutine
//! stacks are fixed-size. This module loads the stack size once at startup so
//! deployments can tune it without a rebuild.
//!
//! ## Environment Variables
//!
//! ### `ALICE_HTTPD_STACK_SIZE`
//!
//! Sets the stack size for connection coroutines. Accepts values in:
//! - Decimal: `65536` (64 KB)
//! - Hexadecimal: `0x10000` (64 KB)
//!
//! Default: `0x10000` (64 KB)
//!
//! **Why this matters:**
//! - Each connection coroutine runs a full TLS handshake, request parsing,
//!   and template rendering on its own stack
//! - Too small a stack overflows inside the TLS handshake; too large wastes
//!   memory under high connection counts
//! - Total memory = stack_size × concurrent connections
//!
//! ## Usage
//!
//! ```rust
//! use alice_httpd::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```
//!
//! ## Example Configuration
//!
//! ```bash
//! # Set stack size to 128 KB
//! export ALICE_HTTPD_STACK_SIZE=0x20000
//!
//! # Or in decimal
//! export ALICE_HTTPD_STACK_SIZE=131072
//!
//! # Start the server
//! cargo run
//! ```

use std::env;

const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Runtime configuration loaded from environment variables.
///
/// Load this at startup using [`RuntimeConfig::from_env()`] and apply it with
/// `may::config().set_stack_size(..)` before the first coroutine is spawned.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for connection coroutines in bytes (default: 64 KB / 0x10000)
    pub stack_size: usize,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = match env::var("ALICE_HTTPD_STACK_SIZE") {
            Ok(val) => {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).unwrap_or(DEFAULT_STACK_SIZE)
                } else {
                    val.parse().unwrap_or(DEFAULT_STACK_SIZE)
                }
            }
            Err(_) => DEFAULT_STACK_SIZE,
        };
        RuntimeConfig { stack_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test so the env var is never touched from two threads at once.
    #[test]
    fn test_stack_size_parsing() {
        std::env::remove_var("ALICE_HTTPD_STACK_SIZE");
        assert_eq!(RuntimeConfig::from_env().stack_size, DEFAULT_STACK_SIZE);

        std::env::set_var("ALICE_HTTPD_STACK_SIZE", "0x20000");
        assert_eq!(RuntimeConfig::from_env().stack_size, 0x20000);

        std::env::set_var("ALICE_HTTPD_STACK_SIZE", "131072");
        assert_eq!(RuntimeConfig::from_env().stack_size, 131_072);

        std::env::set_var("ALICE_HTTPD_STACK_SIZE", "not-a-number");
        assert_eq!(RuntimeConfig::from_env().stack_size, DEFAULT_STACK_SIZE);

        std::env::remove_var("ALICE_HTTPD_STACK_SIZE");
    }
}
