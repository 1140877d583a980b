//! # Router Module
//!
//! Builds the route table from registry metadata, imposes the specificity
//! order, and matches incoming requests.
//!
//! Two phases:
//!
//! 1. **Build + sort**: [`RouteBuilder`] turns each class+method pair into
//!    [`Route`] entries (class prefix, constructor prefix for instance
//!    methods, one entry per HTTP hint), and [`sort_routes`] orders them so
//!    literal patterns beat parameter patterns that would otherwise shadow
//!    them (`/findOne` before `/:id` before `/`).
//! 2. **Match**: [`Router`] compiles each `:name` pattern to a regex and
//!    scans the sorted table at request time, extracting path parameters from
//!    the first verb-and-path match.

mod build;
mod core;
mod sort;

pub use build::{BuildError, MethodDescriptor, RestClass, RestCtor, Route, RouteBuilder};
pub use core::{ParamVec, RouteMatch, Router, MAX_INLINE_PARAMS};
pub use sort::{compare_routes, sort_routes};
