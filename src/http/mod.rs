//! HTTP wire types: request parsing and response serialization.

pub mod request;
pub mod response;

pub use request::{parse_request, parse_query_params, Request};
pub use response::{status_reason, HeaderVec, Response, MAX_INLINE_HEADERS};
