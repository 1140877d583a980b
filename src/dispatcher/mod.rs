//! # Dispatcher Module
//!
//! Drives one matched request through resolution, hooks, invocation, and
//! reply construction, with cooperative cancellation.
//!
//! The per-request flow is a straight-line state machine
//! ([`Phase`]): resolve arguments, run before hooks, invoke the method
//! through its [`Completion`] handle, run after hooks, shape the reply. A
//! [`CancelToken`] armed for the invoking phase lets the hosting layer abort
//! an in-flight method; a cancelled request produces no reply at all.

mod core;

pub use core::{
    CancelToken, Completion, Dispatcher, InvocationContext, Outcome, Phase, RequestContext,
};
