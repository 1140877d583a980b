//! # Argument Resolution Module
//!
//! Turns declared parameter specs plus one parsed request into the argument
//! vector a method is invoked with: each spec names a source (path capture,
//! query field, whole body, header, request/context snapshot, or a custom
//! function) and a declared type the raw value is coerced to.
//!
//! The error split matters: a *missing required* argument is the caller's
//! fault and surfaces as a 400 validation error, while a *supplied but
//! incompatible* value means the metadata and the transport disagree and
//! surfaces as a 500 coercion error.

mod coerce;
mod resolve;

pub use resolve::resolve_arguments;
