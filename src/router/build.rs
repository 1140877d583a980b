//! Route table construction from registry metadata.
//!
//! Turns each shared class and method into [`Route`] entries: the class
//! contributes a path prefix (its first HTTP hint, default `/<className>`),
//! instance methods gain the shared-constructor prefix (default `/:id`), and
//! each method HTTP hint yields one route bound to the same descriptor. The
//! output order groups one class's methods contiguously; the final order is
//! imposed by [`super::sort_routes`].

use crate::registry::{
    ArgSource, ArgSpec, ArgType, MethodFn, Registry, ReturnSpec, RouteDef, SharedMethod, Verb,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Metadata violation detected while building the route table.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("method {method}: a root return must be the sole return spec")]
    RootReturnConflict { method: String },
    #[error("method {method}: path argument `{arg}` has no `:{arg}` segment in any route")]
    UnboundPathArg { method: String, arg: String },
}

/// Immutable description of one mounted method, shared by all of its routes.
#[derive(Clone)]
pub struct MethodDescriptor {
    pub name: String,
    /// `class.method` for statics, `class.prototype.method` for instance
    /// methods, `class.sharedCtor` for the shared constructor.
    pub full_name: String,
    /// Class-relative routes (constructor prefix included for instance
    /// methods), in hint declaration order.
    pub routes: Vec<RouteDef>,
    /// Path prefix of the owning class.
    pub class_path: String,
    pub accepts: Vec<ArgSpec>,
    pub returns: Vec<ReturnSpec>,
    pub description: Option<String>,
    pub handler: MethodFn,
}

impl MethodDescriptor {
    /// Path of the first route, class-relative.
    #[must_use]
    pub fn http_path(&self) -> &str {
        self.routes.first().map(|r| r.path.as_str()).unwrap_or("/")
    }

    /// Class path plus the first route's path.
    #[must_use]
    pub fn full_path(&self) -> String {
        join_paths(&self.class_path, self.http_path())
    }

    /// Concrete HTTP method of the first route: the wildcard verb maps to
    /// POST, `del` to DELETE, everything else to its upper-case self.
    #[must_use]
    pub fn http_method(&self) -> http::Method {
        self.routes
            .first()
            .map(|r| r.verb.as_http_method())
            .unwrap_or(http::Method::POST)
    }

    /// True when the method takes exactly one argument sourced from the whole
    /// request body.
    #[must_use]
    pub fn accepts_single_body_argument(&self) -> bool {
        match self.accepts.as_slice() {
            [only] => matches!(only.source, ArgSource::Body),
            _ => false,
        }
    }

    /// True when the sole return is a root-flagged array.
    #[must_use]
    pub fn is_returning_array(&self) -> bool {
        match self.returns.as_slice() {
            [only] => only.root && only.ty == ArgType::Array,
            _ => false,
        }
    }

    fn validate(&self, full_routes: &[RouteDef]) -> Result<(), BuildError> {
        if self.returns.iter().any(|r| r.root) && self.returns.len() > 1 {
            return Err(BuildError::RootReturnConflict {
                method: self.full_name.clone(),
            });
        }
        for spec in &self.accepts {
            if matches!(spec.source, ArgSource::Path) {
                let segment = format!(":{}", spec.name);
                let bound = full_routes
                    .iter()
                    .any(|r| r.path.split('/').any(|s| s == segment));
                if !bound {
                    return Err(BuildError::UnboundPathArg {
                        method: self.full_name.clone(),
                        arg: spec.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("full_name", &self.full_name)
            .field("routes", &self.routes)
            .field("class_path", &self.class_path)
            .field("accepts", &self.accepts)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// One mountable route: a verb plus the fully-prefixed path pattern, bound to
/// its method descriptor.
#[derive(Debug, Clone)]
pub struct Route {
    pub verb: Verb,
    pub path: String,
    pub method: Arc<MethodDescriptor>,
}

/// Shared constructor routes of a class, as declared (class-relative).
#[derive(Debug, Clone)]
pub struct RestCtor {
    pub routes: Vec<RouteDef>,
}

/// One class's slice of the route table.
#[derive(Debug, Clone)]
pub struct RestClass {
    pub name: String,
    /// Class-level routes (the prefix hints), as declared or defaulted.
    pub routes: Vec<RouteDef>,
    pub ctor: Option<RestCtor>,
    pub methods: Vec<Arc<MethodDescriptor>>,
}

impl RestClass {
    /// Path of the first class route; the prefix for every method.
    #[must_use]
    pub fn path(&self) -> &str {
        self.routes.first().map(|r| r.path.as_str()).unwrap_or("/")
    }
}

/// Builds the flat route table from registry metadata. No side effects.
pub struct RouteBuilder;

impl RouteBuilder {
    /// Group the registry's classes into [`RestClass`] entries.
    pub fn build_classes(registry: &Registry) -> Result<Vec<RestClass>, BuildError> {
        registry
            .classes()
            .iter()
            .map(|class| {
                let class_routes = if class.http.is_empty() {
                    vec![RouteDef::new(Verb::All, format!("/{}", class.name))]
                } else {
                    class.http.clone()
                };
                let class_path = class_routes
                    .first()
                    .map(|r| r.path.clone())
                    .unwrap_or_else(|| "/".to_string());

                let has_instance_methods = class.methods.iter().any(|m| !m.is_static);
                let ctor = class.ctor.as_ref().map(|c| RestCtor {
                    routes: default_routes(c, "/:id"),
                });
                let ctor = ctor.or_else(|| {
                    has_instance_methods.then(|| RestCtor {
                        routes: vec![RouteDef::new(Verb::All, "/:id".to_string())],
                    })
                });
                let ctor_path = ctor
                    .as_ref()
                    .and_then(|c| c.routes.first())
                    .map(|r| r.path.clone())
                    .unwrap_or_else(|| "/:id".to_string());

                let mut methods = Vec::new();
                for method in &class.methods {
                    let own = default_routes(method, &format!("/{}", method.name));
                    let routes = own
                        .into_iter()
                        .map(|def| {
                            let path = if method.is_static {
                                def.path
                            } else {
                                join_paths(&ctor_path, &def.path)
                            };
                            RouteDef::new(def.verb, path)
                        })
                        .collect();
                    let full_name = if method.is_static {
                        format!("{}.{}", class.name, method.name)
                    } else {
                        format!("{}.prototype.{}", class.name, method.name)
                    };
                    methods.push(Arc::new(MethodDescriptor {
                        name: method.name.clone(),
                        full_name,
                        routes,
                        class_path: class_path.clone(),
                        accepts: method.accepts.clone(),
                        returns: method.returns.clone(),
                        description: method.description.clone(),
                        handler: Arc::clone(&method.handler),
                    }));
                }

                // The shared ctor is dispatchable itself, so a bare request to
                // the class path (plus the ctor pattern) reaches it.
                if let Some(ctor_method) = &class.ctor {
                    methods.push(Arc::new(MethodDescriptor {
                        name: ctor_method.name.clone(),
                        full_name: format!("{}.sharedCtor", class.name),
                        routes: default_routes(ctor_method, "/:id"),
                        class_path: class_path.clone(),
                        accepts: ctor_method.accepts.clone(),
                        returns: ctor_method.returns.clone(),
                        description: ctor_method.description.clone(),
                        handler: Arc::clone(&ctor_method.handler),
                    }));
                }

                Ok(RestClass {
                    name: class.name.clone(),
                    routes: class_routes,
                    ctor,
                    methods,
                })
            })
            .collect()
    }

    /// Flatten classes into the unsorted route table and validate metadata
    /// invariants against the fully-prefixed patterns.
    pub fn build(registry: &Registry) -> Result<Vec<Route>, BuildError> {
        let classes = Self::build_classes(registry)?;
        let mut routes = Vec::new();
        for class in &classes {
            let class_path = class.path();
            for method in &class.methods {
                let full_routes: Vec<RouteDef> = method
                    .routes
                    .iter()
                    .map(|def| RouteDef::new(def.verb, join_paths(class_path, &def.path)))
                    .collect();
                method.validate(&full_routes)?;
                for def in full_routes {
                    debug!(
                        verb = %def.verb,
                        path = %def.path,
                        method = %method.full_name,
                        "Route built"
                    );
                    routes.push(Route {
                        verb: def.verb,
                        path: def.path,
                        method: Arc::clone(method),
                    });
                }
            }
        }
        Ok(routes)
    }
}

fn default_routes(method: &SharedMethod, default_path: &str) -> Vec<RouteDef> {
    if method.http.is_empty() {
        vec![RouteDef::new(Verb::All, default_path.to_string())]
    } else {
        method.http.clone()
    }
}

/// Join two path fragments into a single-slash path. An empty or `/` tail
/// leaves the prefix intact.
pub(crate) fn join_paths(prefix: &str, tail: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let tail = tail.trim_start_matches('/');
    if tail.is_empty() {
        if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }
    } else {
        format!("{}/{}", prefix, tail)
    }
}
