//! # Router Module
//!
//! Path matching and route resolution for alice-httpd. Routes map an HTTP
//! method and path to a handler function; anything the table does not claim
//! falls through to the content generator.
//!
//! ## Overview
//!
//! Resolution runs in three stages, in order:
//!
//! 1. **Exact match**: `(method, path)` looked up in a hash table.
//! 2. **Pattern match**: registered paths containing `{` are scanned in
//!    insertion order and match any request path starting with the literal
//!    prefix before the first `{`. First match wins.
//! 3. **Fallback**: the content generator serves static assets, templates,
//!    and dynamic pages for everything else, so unknown paths produce a page
//!    rather than a 404.
//!
//! The fallback applies to every method, which keeps the table small: only
//! paths with handler logic are registered.

mod core;
#[cfg(test)]
mod tests;

pub use core::{app_routes, Route, Router};
