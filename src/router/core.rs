//! Route table compilation and request-time matching.

use super::build::{MethodDescriptor, Route};
use super::sort::sort_routes;
use crate::registry::Verb;
use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum number of path parameters before heap allocation. Deeply nested
/// instance routes rarely exceed four captures.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated storage for extracted path parameters. Names come from the
/// compiled table (shared `Arc<str>`), values are per-request strings.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Result of matching a request against the sorted table.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub method: Arc<MethodDescriptor>,
    pub verb: Verb,
    /// Pattern that matched, fully prefixed.
    pub path_pattern: Arc<str>,
    pub path_params: ParamVec,
}

impl RouteMatch {
    /// Last-write-wins lookup of a path parameter by name.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

struct CompiledRoute {
    verb: Verb,
    pattern: Arc<str>,
    regex: Regex,
    param_names: Vec<Arc<str>>,
    method: Arc<MethodDescriptor>,
}

/// Immutable, sorted route table. Built once at startup; safe for unbounded
/// concurrent reads afterwards.
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    /// Sort the built table and compile each pattern.
    #[must_use]
    pub fn new(mut routes: Vec<Route>) -> Self {
        sort_routes(&mut routes);
        let routes: Vec<CompiledRoute> = routes
            .into_iter()
            .map(|route| {
                let (regex, param_names) = path_to_regex(&route.path);
                CompiledRoute {
                    verb: route.verb,
                    pattern: Arc::from(route.path.as_str()),
                    regex,
                    param_names,
                    method: route.method,
                }
            })
            .collect();

        let routes_summary: Vec<String> = routes
            .iter()
            .take(10)
            .map(|r| format!("{} {} -> {}", r.verb, r.pattern, r.method.full_name))
            .collect();
        info!(
            routes_count = routes.len(),
            routes_summary = ?routes_summary,
            "Routing table loaded"
        );

        Self { routes }
    }

    /// Match a request against the table: first sorted route whose verb
    /// matches (exactly or wildcard) and whose pattern matches the path wins.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        debug!(method = %method, path = %path, "Route match attempt");
        let path = normalize_request_path(path);

        for route in &self.routes {
            if !route.verb.matches(method) {
                continue;
            }
            let Some(captures) = route.regex.captures(path) else {
                continue;
            };
            let mut path_params = ParamVec::new();
            for (i, name) in route.param_names.iter().enumerate() {
                if let Some(value) = captures.get(i + 1) {
                    path_params.push((Arc::clone(name), value.as_str().to_string()));
                }
            }
            info!(
                method = %method,
                path = %path,
                pattern = %route.pattern,
                target = %route.method.full_name,
                path_params = ?path_params,
                "Route matched"
            );
            return Some(RouteMatch {
                method: Arc::clone(&route.method),
                verb: route.verb,
                path_pattern: Arc::clone(&route.pattern),
                path_params,
            });
        }

        warn!(method = %method, path = %path, "No route matched");
        None
    }

    /// All compiled patterns in sorted order, for diagnostics.
    #[must_use]
    pub fn path_patterns(&self) -> Vec<String> {
        self.routes
            .iter()
            .map(|r| format!("{} {}", r.verb, r.pattern))
            .collect()
    }
}

/// A trailing slash carries no extra segment; the bare root stays `/`.
fn normalize_request_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Convert a `:name` path pattern to an anchored regex plus the ordered
/// capture names. `/notes/:id` becomes `^/notes/([^/]+)$` with `["id"]`.
fn path_to_regex(path: &str) -> (Regex, Vec<Arc<str>>) {
    let normalized = normalize_request_path(path);
    if normalized == "/" {
        #[allow(clippy::expect_used)]
        return (Regex::new(r"^/$").expect("root regex"), Vec::new());
    }

    let mut pattern = String::with_capacity(normalized.len() + 8);
    pattern.push('^');
    let mut param_names = Vec::new();
    for segment in normalized.split('/').filter(|s| !s.is_empty()) {
        if let Some(name) = segment.strip_prefix(':') {
            pattern.push_str("/([^/]+)");
            param_names.push(Arc::from(name));
        } else {
            pattern.push('/');
            pattern.push_str(&regex::escape(segment));
        }
    }
    pattern.push('$');
    #[allow(clippy::expect_used)]
    let regex = Regex::new(&pattern).expect("path pattern regex");
    (regex, param_names)
}
