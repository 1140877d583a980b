//! # restmount
//!
//! **restmount** mounts an RPC-style method registry as concrete HTTP
//! endpoints, powered by the `may` coroutine runtime.
//!
//! ## Overview
//!
//! Methods are declared abstractly — grouped into shared classes, each method
//! carrying a name, parameter list, return-value list, and optional HTTP
//! hints — and restmount does the translation: it builds an ordered route
//! table from the metadata, picks the correct method for each incoming
//! request, extracts and coerces arguments from their declared sources,
//! invokes the method uniformly whether it completes immediately or after a
//! long-running cancellable operation, and serializes the result or error
//! back to JSON.
//!
//! ## Architecture
//!
//! - **[`registry`]** - shared classes, methods, argument/return metadata,
//!   and the before/after hook pipeline
//! - **[`router`]** - route table construction, specificity-based ordering,
//!   and regex-based request matching
//! - **[`args`]** - per-source argument extraction and type coercion
//! - **[`dispatcher`]** - per-request state machine with completion handles
//!   and cooperative cancellation
//! - **[`response`]** - result shaping (204 / root body / positional object)
//! - **[`error`]** - the open-map error type and its JSON envelope
//! - **[`server`]** - `may_minihttp` hosting: parsing, body limits, reply
//!   writing, server lifecycle
//!
//! ## Quick Start
//!
//! ```no_run
//! use restmount::registry::{ArgSpec, ArgType, Registry, ReturnSpec, SharedClass, SharedMethod};
//! use restmount::server::{HttpServer, RestService};
//! use std::sync::Arc;
//!
//! let mut registry = Registry::new();
//! registry.define(
//!     SharedClass::new("notes").method(
//!         SharedMethod::new("greet", |ctx, done| {
//!             let who = ctx.args[0].as_str().unwrap_or("world").to_string();
//!             done.succeed(vec![serde_json::json!({ "msg": who })]);
//!         })
//!         .accepts(ArgSpec::new("person", ArgType::String))
//!         .returns(ReturnSpec::root(ArgType::Object)),
//!     ),
//! );
//!
//! let service = RestService::new(Arc::new(registry)).expect("route table");
//! let handle = HttpServer(service).start("0.0.0.0:8080").expect("bind");
//! handle.join().expect("server");
//! ```
//!
//! ## Runtime Considerations
//!
//! restmount uses the `may` coroutine runtime, not tokio or async-std:
//!
//! - Each connection is served by a lightweight coroutine
//! - Stack size is configurable via the `RESTMOUNT_STACK_SIZE` environment
//!   variable (see [`runtime_config`])
//! - Deferred methods clone their completion handle into a coroutine and may
//!   suspend arbitrarily long without blocking other requests
//! - Blocking operations inside methods should use `may`'s facilities

pub mod args;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod registry;
pub mod response;
pub mod router;
pub mod runtime_config;
pub mod server;

pub use dispatcher::{CancelToken, Completion, Dispatcher, InvocationContext, RequestContext};
pub use error::{ErrorKind, RemoteError};
pub use registry::{ArgSource, ArgSpec, ArgType, Registry, ReturnSpec, SharedClass, SharedMethod};
pub use response::Reply;
pub use router::{RouteBuilder, Router};
