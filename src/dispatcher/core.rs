//! Per-request dispatch state machine and the completion-handle plumbing.

use crate::args::resolve_arguments;
use crate::error::RemoteError;
use crate::ids::RequestId;
use crate::registry::Registry;
use crate::response::{error_reply, method_reply, Reply};
use crate::router::{MethodDescriptor, ParamVec};
use http::Method;
use may::sync::mpsc;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Dispatch phases, in execution order. `Cancelled` and `Failed` are terminal
/// and reachable from `Invoking` onward; `Failed` is also reached directly
/// from `Resolving` and `BeforeHooks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolving,
    BeforeHooks,
    Invoking,
    AfterHooks,
    Responding,
    Cancelled,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Resolving => "resolving",
            Phase::BeforeHooks => "before_hooks",
            Phase::Invoking => "invoking",
            Phase::AfterHooks => "after_hooks",
            Phase::Responding => "responding",
            Phase::Cancelled => "cancelled",
            Phase::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Read-only view of one HTTP request, as the core sees it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    /// Header names lowercased by the parser.
    pub headers: HashMap<String, String>,
    /// Cookies from the Cookie header.
    pub cookies: HashMap<String, String>,
    /// Query fields, bracketed keys already parsed into nested maps.
    pub query: Map<String, Value>,
    pub path_params: ParamVec,
    pub body: Option<Value>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            path: path.into(),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            query: Map::new(),
            path_params: ParamVec::new(),
            body: None,
        }
    }

    /// Last-write-wins lookup of a path parameter by name.
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// JSON snapshot handed to `req`-sourced arguments.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        json!({
            "method": self.method.as_str(),
            "path": self.path,
            "headers": self.headers,
            "cookies": self.cookies,
            "query": Value::Object(self.query.clone()),
        })
    }
}

/// Ephemeral invocation state: one per request, discarded once the reply is
/// written or the request is aborted.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub request_id: RequestId,
    pub method: Arc<MethodDescriptor>,
    pub request: RequestContext,
    /// Resolved argument vector, in `accepts` declaration order.
    pub args: Vec<Value>,
    /// Produced results; populated before the after-hook pipeline runs.
    pub results: Vec<Value>,
}

impl InvocationContext {
    /// JSON snapshot handed to `context`-sourced arguments.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        json!({
            "method": self.method.full_name,
            "request": self.request.snapshot(),
            "args": self.args,
        })
    }
}

/// Terminal outcome of one invocation, delivered through the completion
/// channel exactly once.
#[derive(Debug)]
pub enum Outcome {
    Settled(Result<Vec<Value>, RemoteError>),
    Cancelled,
}

struct CompletionState {
    done: bool,
    cancelled: bool,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

struct CompletionInner {
    state: Mutex<CompletionState>,
    tx: mpsc::Sender<Outcome>,
}

/// Completion handle passed to every method invocation.
///
/// Both invocation styles resolve through this single abstraction: an
/// immediate method calls [`Completion::succeed`] or [`Completion::fail`]
/// before returning; a deferred method registers [`Completion::on_cancel`],
/// clones the handle into a coroutine, and settles later. The first of
/// {settle, cancel} wins; every later call is a no-op and reports `false`.
#[derive(Clone)]
pub struct Completion {
    inner: Arc<CompletionInner>,
}

impl Completion {
    /// New handle plus the receiver the dispatcher blocks on.
    pub(crate) fn channel() -> (Self, mpsc::Receiver<Outcome>) {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::new(CompletionInner {
            state: Mutex::new(CompletionState {
                done: false,
                cancelled: false,
                on_cancel: None,
            }),
            tx,
        });
        (Self { inner }, rx)
    }

    // Mutations under this lock are plain field stores; a poisoned guard
    // still holds consistent state.
    fn state(&self) -> MutexGuard<'_, CompletionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, outcome: Result<Vec<Value>, RemoteError>) -> bool {
        let mut state = self.state();
        if state.done {
            return false;
        }
        state.done = true;
        // A registered cancel callback never runs after a settle.
        state.on_cancel = None;
        drop(state);
        let _ = self.inner.tx.send(Outcome::Settled(outcome));
        true
    }

    /// Deliver results. Returns `false` when the invocation already settled
    /// or was cancelled; the late call is suppressed.
    pub fn succeed(&self, results: Vec<Value>) -> bool {
        self.settle(Ok(results))
    }

    /// Deliver a failure. Same single-resolution rule as [`Self::succeed`].
    pub fn fail(&self, error: impl Into<RemoteError>) -> bool {
        self.settle(Err(error.into()))
    }

    /// Register the callback to run if the request is aborted mid-invocation.
    /// If cancellation already happened, the callback runs immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state();
        if state.done {
            let run_now = state.cancelled;
            drop(state);
            if run_now {
                callback();
            }
            return;
        }
        state.on_cancel = Some(Box::new(callback));
    }

    pub(crate) fn cancel(&self) -> bool {
        let mut state = self.state();
        if state.done {
            return false;
        }
        state.done = true;
        state.cancelled = true;
        let callback = state.on_cancel.take();
        drop(state);
        if let Some(callback) = callback {
            callback();
        }
        let _ = self.inner.tx.send(Outcome::Cancelled);
        true
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state().done
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Completion")
            .field("done", &state.done)
            .field("cancelled", &state.cancelled)
            .finish()
    }
}

struct TokenInner {
    cancelled: AtomicBool,
    armed: Mutex<Option<Weak<CompletionInner>>>,
}

/// Per-request cancellation token, the hosting layer's handle onto an
/// in-flight invocation.
///
/// Armed when `Invoking` begins and released on completion; whichever of
/// {completion, cancellation} happens first wins and the other path is a
/// no-op. Cancelling before arming cancels the invocation the moment it arms.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                armed: Mutex::new(None),
            }),
        }
    }

    /// Signal client abort. Idempotent; a token cancelled after its
    /// invocation completed has no observable effect.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let armed = self.armed().take();
        if let Some(weak) = armed {
            if let Some(inner) = weak.upgrade() {
                let _ = Completion { inner }.cancel();
            }
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `false` when the token was cancelled before arming; the
    /// completion is cancelled on the spot and the invocation must not run.
    fn arm(&self, completion: &Completion) -> bool {
        let mut armed = self.armed();
        if self.is_cancelled() {
            drop(armed);
            let _ = completion.cancel();
            false
        } else {
            *armed = Some(Arc::downgrade(&completion.inner));
            true
        }
    }

    fn disarm(&self) {
        self.armed().take();
    }

    fn armed(&self) -> MutexGuard<'_, Option<Weak<CompletionInner>>> {
        self.inner
            .armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Drives one request through the state machine:
/// resolve → before hooks → invoke → after hooks → reply.
///
/// Holds only the shared registry; all per-request state lives in the
/// [`InvocationContext`], so concurrent dispatches never contend.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Dispatch one matched request. Returns the reply to write, or `None`
    /// when the invocation was cancelled — a cancelled request gets no
    /// response, its only observable effect being the method's registered
    /// cancel callback.
    ///
    /// Hooks and the method run at most once per call; every failure
    /// short-circuits the remaining phases and is translated exactly once.
    #[must_use]
    pub fn dispatch(
        &self,
        method: Arc<MethodDescriptor>,
        request: RequestContext,
        cancel: &CancelToken,
    ) -> Option<Reply> {
        let request_id = request.request_id;
        let started = Instant::now();
        let mut ctx = InvocationContext {
            request_id,
            method,
            request,
            args: Vec::new(),
            results: Vec::new(),
        };

        debug!(
            request_id = %request_id,
            method = %ctx.method.full_name,
            phase = %Phase::Resolving,
            "Dispatch phase"
        );
        match resolve_arguments(&ctx) {
            Ok(args) => ctx.args = args,
            Err(err) => return Some(self.fail(&ctx, Phase::Resolving, err)),
        }

        debug!(
            request_id = %request_id,
            method = %ctx.method.full_name,
            phase = %Phase::BeforeHooks,
            "Dispatch phase"
        );
        if let Err(err) = self.registry.run_before(&mut ctx) {
            return Some(self.fail(&ctx, Phase::BeforeHooks, err));
        }

        debug!(
            request_id = %request_id,
            method = %ctx.method.full_name,
            phase = %Phase::Invoking,
            "Dispatch phase"
        );
        let (completion, outcomes) = Completion::channel();
        if cancel.arm(&completion) {
            (Arc::clone(&ctx.method.handler))(&ctx, completion);
        }

        // Blocks only this request's coroutine; deferred methods may suspend
        // arbitrarily long before settling.
        let outcome = outcomes.recv().unwrap_or_else(|_| {
            Outcome::Settled(Err(RemoteError::method(
                "method dropped its completion handle without settling",
            )))
        });
        cancel.disarm();

        match outcome {
            Outcome::Cancelled => {
                info!(
                    request_id = %request_id,
                    method = %ctx.method.full_name,
                    phase = %Phase::Cancelled,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "Invocation cancelled; no response will be sent"
                );
                None
            }
            Outcome::Settled(Err(err)) => Some(self.fail(&ctx, Phase::Invoking, err)),
            Outcome::Settled(Ok(results)) => {
                ctx.results = results;
                debug!(
                    request_id = %request_id,
                    method = %ctx.method.full_name,
                    phase = %Phase::AfterHooks,
                    "Dispatch phase"
                );
                if let Err(err) = self.registry.run_after(&mut ctx) {
                    return Some(self.fail(&ctx, Phase::AfterHooks, err));
                }

                let reply = method_reply(&ctx.method, &ctx.results);
                info!(
                    request_id = %request_id,
                    method = %ctx.method.full_name,
                    phase = %Phase::Responding,
                    status = reply.status,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "Dispatch complete"
                );
                Some(reply)
            }
        }
    }

    fn fail(&self, ctx: &InvocationContext, failed_in: Phase, err: RemoteError) -> Reply {
        let reply = error_reply(&err);
        if reply.status >= 500 {
            error!(
                request_id = %ctx.request_id,
                method = %ctx.method.full_name,
                phase = %Phase::Failed,
                failed_in = %failed_in,
                error = %err,
                status = reply.status,
                "Dispatch failed"
            );
        } else {
            warn!(
                request_id = %ctx.request_id,
                method = %ctx.method.full_name,
                phase = %Phase::Failed,
                failed_in = %failed_in,
                error = %err,
                status = reply.status,
                "Dispatch failed"
            );
        }
        reply
    }
}
