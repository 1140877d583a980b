//! # Registry Module
//!
//! The method registry the REST layer reads from: shared classes, their
//! static/instance methods and shared constructors, the argument/return
//! metadata on each method, and the before/after hook pipeline.
//!
//! The core never writes to the registry at dispatch time. Route building
//! consumes it once at startup ([`crate::router::RouteBuilder`]); the
//! dispatcher calls back into [`Registry::run_before`] / [`Registry::run_after`]
//! and invokes method handlers through their completion handle.
//!
//! ## Declaring a class
//!
//! ```rust,ignore
//! use restmount::registry::{ArgSpec, ArgType, Registry, ReturnSpec, SharedClass, SharedMethod};
//!
//! let mut registry = Registry::new();
//! registry.define(
//!     SharedClass::new("notes")
//!         .method(
//!             SharedMethod::new("findOne", |ctx, done| {
//!                 done.succeed(vec![serde_json::json!({ "id": 1 })]);
//!             })
//!             .returns(ReturnSpec::root(ArgType::Object)),
//!         ),
//! );
//! ```

mod types;

pub use types::{ArgSource, ArgSpec, ArgType, CustomSourceFn, ReturnSpec, RouteDef, Verb};

use crate::dispatcher::{Completion, InvocationContext};
use crate::error::RemoteError;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Method handler. Receives the resolved invocation context and a completion
/// handle; must eventually settle the handle exactly once (immediately or
/// deferred), or register a cancellation callback and settle later.
pub type MethodFn = Arc<dyn Fn(&InvocationContext, Completion) + Send + Sync>;

/// Before/after hook. Runs synchronously; a returned error fails the request.
pub type Hook = Arc<dyn Fn(&mut InvocationContext) -> Result<(), RemoteError> + Send + Sync>;

/// A remotable method declared on a shared class.
#[derive(Clone)]
pub struct SharedMethod {
    pub name: String,
    /// Instance methods are mounted under the class's constructor route.
    pub is_static: bool,
    /// HTTP hints; empty means the defaults (`all /<name>`).
    pub http: Vec<RouteDef>,
    pub accepts: Vec<ArgSpec>,
    pub returns: Vec<ReturnSpec>,
    pub description: Option<String>,
    pub handler: MethodFn,
}

impl SharedMethod {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&InvocationContext, Completion) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            is_static: true,
            http: Vec::new(),
            accepts: Vec::new(),
            returns: Vec::new(),
            description: None,
            handler: Arc::new(handler),
        }
    }

    /// Mark as an instance method; its routes gain the ctor prefix.
    #[must_use]
    pub fn instance(mut self) -> Self {
        self.is_static = false;
        self
    }

    /// Add an HTTP hint. A method with several hints yields several routes.
    #[must_use]
    pub fn http(mut self, route: RouteDef) -> Self {
        self.http.push(route);
        self
    }

    #[must_use]
    pub fn accepts(mut self, spec: ArgSpec) -> Self {
        self.accepts.push(spec);
        self
    }

    #[must_use]
    pub fn returns(mut self, spec: ReturnSpec) -> Self {
        self.returns.push(spec);
        self
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl fmt::Debug for SharedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMethod")
            .field("name", &self.name)
            .field("is_static", &self.is_static)
            .field("http", &self.http)
            .field("accepts", &self.accepts)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// A class of remotable methods sharing one path prefix.
#[derive(Debug, Clone)]
pub struct SharedClass {
    pub name: String,
    /// Class-level HTTP hints; empty means the default `/<name>` prefix.
    pub http: Vec<RouteDef>,
    /// Shared constructor. Its routes prefix every instance method and are
    /// dispatchable themselves. `None` defaults to `all /:id` when the class
    /// declares instance methods.
    pub ctor: Option<SharedMethod>,
    pub methods: Vec<SharedMethod>,
}

impl SharedClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            http: Vec::new(),
            ctor: None,
            methods: Vec::new(),
        }
    }

    #[must_use]
    pub fn http(mut self, route: RouteDef) -> Self {
        self.http.push(route);
        self
    }

    #[must_use]
    pub fn ctor(mut self, ctor: SharedMethod) -> Self {
        self.ctor = Some(ctor);
        self
    }

    #[must_use]
    pub fn method(mut self, method: SharedMethod) -> Self {
        self.methods.push(method);
        self
    }
}

/// Hook registration pattern: an exact full name (`class.method`), a class
/// wildcard (`class.*`), or the global wildcard (`*`).
fn pattern_matches(pattern: &str, full_name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(class_prefix) = pattern.strip_suffix(".*") {
        return full_name
            .strip_prefix(class_prefix)
            .is_some_and(|rest| rest.starts_with('.'));
    }
    pattern == full_name
}

/// Registry of shared classes plus the before/after hook pipeline.
#[derive(Clone, Default)]
pub struct Registry {
    classes: Vec<SharedClass>,
    before: Vec<(String, Hook)>,
    after: Vec<(String, Hook)>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared class. Declaration order is preserved; it feeds the
    /// route builder's pre-sort ordering.
    pub fn define(&mut self, class: SharedClass) {
        debug!(class = %class.name, methods = class.methods.len(), "Shared class defined");
        self.classes.push(class);
    }

    #[must_use]
    pub fn classes(&self) -> &[SharedClass] {
        &self.classes
    }

    /// Register a hook to run before matching methods are invoked.
    pub fn before<F>(&mut self, pattern: impl Into<String>, hook: F)
    where
        F: Fn(&mut InvocationContext) -> Result<(), RemoteError> + Send + Sync + 'static,
    {
        self.before.push((pattern.into(), Arc::new(hook)));
    }

    /// Register a hook to run after matching methods produce their results.
    pub fn after<F>(&mut self, pattern: impl Into<String>, hook: F)
    where
        F: Fn(&mut InvocationContext) -> Result<(), RemoteError> + Send + Sync + 'static,
    {
        self.after.push((pattern.into(), Arc::new(hook)));
    }

    /// Run the before-hook pipeline for the context's method, in registration
    /// order. The first failing hook short-circuits.
    pub fn run_before(&self, ctx: &mut InvocationContext) -> Result<(), RemoteError> {
        Self::run_pipeline(&self.before, ctx)
    }

    /// Run the after-hook pipeline with the produced results available on the
    /// context. The first failing hook short-circuits.
    pub fn run_after(&self, ctx: &mut InvocationContext) -> Result<(), RemoteError> {
        Self::run_pipeline(&self.after, ctx)
    }

    fn run_pipeline(
        hooks: &[(String, Hook)],
        ctx: &mut InvocationContext,
    ) -> Result<(), RemoteError> {
        let full_name = ctx.method.full_name.clone();
        for (pattern, hook) in hooks {
            if pattern_matches(pattern, &full_name) {
                hook(ctx)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("classes", &self.classes)
            .field("before_hooks", &self.before.len())
            .field("after_hooks", &self.after.len())
            .finish()
    }
}
