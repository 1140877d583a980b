//! # Server Module
//!
//! Thin hosting layer over `may_minihttp`: parses the raw request (enforcing
//! the body-size limit, parsing bracketed query keys, lowercasing header
//! names), runs the router and dispatcher, and writes exactly one JSON reply
//! per request — or none at all when the invocation was cancelled.

mod http_server;
mod request;
mod response;
mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_cookies, parse_query, parse_request, ParsedRequest};
pub use response::{write_error, write_reply};
pub use service::{CancelRegistry, RestService, ServiceConfig};
