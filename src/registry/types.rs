use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::dispatcher::InvocationContext;

/// Route verb as declared on an HTTP hint.
///
/// This is a superset of the HTTP methods the router serves: `All` is the
/// wildcard verb that matches every request method. The declaration aliases
/// `del` and `any` parse to `Delete` and `All` respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    All,
}

impl Verb {
    /// Parse a declared verb, accepting the `del`/`any` aliases.
    #[must_use]
    pub fn parse(s: &str) -> Option<Verb> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Some(Verb::Get),
            "head" => Some(Verb::Head),
            "post" => Some(Verb::Post),
            "put" => Some(Verb::Put),
            "patch" => Some(Verb::Patch),
            "delete" | "del" => Some(Verb::Delete),
            "all" | "any" => Some(Verb::All),
            _ => None,
        }
    }

    /// Sort rank: lower ranks sort first, wildcard last.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Verb::Get => 0,
            Verb::Head => 1,
            Verb::Post => 2,
            Verb::Put => 3,
            Verb::Patch => 4,
            Verb::Delete => 5,
            Verb::All => 6,
        }
    }

    /// Whether a request with the given HTTP method is served by this verb.
    ///
    /// `All` matches everything. A HEAD request also matches a `get` route,
    /// matching the hosting-framework behavior callers rely on.
    #[must_use]
    pub fn matches(self, method: &http::Method) -> bool {
        match self {
            Verb::All => true,
            Verb::Get => method == http::Method::GET || method == http::Method::HEAD,
            Verb::Head => method == http::Method::HEAD,
            Verb::Post => method == http::Method::POST,
            Verb::Put => method == http::Method::PUT,
            Verb::Patch => method == http::Method::PATCH,
            Verb::Delete => method == http::Method::DELETE,
        }
    }

    /// The concrete HTTP method a client should use to invoke a route with
    /// this verb: the wildcard maps to POST, everything else to itself.
    #[must_use]
    pub fn as_http_method(self) -> http::Method {
        match self {
            Verb::Get => http::Method::GET,
            Verb::Head => http::Method::HEAD,
            Verb::Post | Verb::All => http::Method::POST,
            Verb::Put => http::Method::PUT,
            Verb::Patch => http::Method::PATCH,
            Verb::Delete => http::Method::DELETE,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verb::Get => "get",
            Verb::Head => "head",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
            Verb::All => "all",
        };
        write!(f, "{}", s)
    }
}

/// One verb+path pair from an HTTP hint. Paths use `:name` parameter segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDef {
    pub verb: Verb,
    pub path: String,
}

impl RouteDef {
    pub fn new(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
        }
    }
}

/// Declared type of an argument or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    Number,
    Boolean,
    /// Structured value; nested leaves are coerced by their own shape.
    Object,
    /// Structured list; nested leaves are coerced by their own shape.
    Array,
    /// ISO-8601 date, plain or via the `{"$type":"date","$data":…}` wrapper.
    Date,
    /// Base64-encoded binary payload.
    Buffer,
    Any,
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArgType::String => "string",
            ArgType::Number => "number",
            ArgType::Boolean => "boolean",
            ArgType::Object => "object",
            ArgType::Array => "array",
            ArgType::Date => "date",
            ArgType::Buffer => "buffer",
            ArgType::Any => "any",
        };
        write!(f, "{}", s)
    }
}

/// Custom extraction function: receives the invocation context, returns the
/// raw value to coerce. `Null` counts as "not supplied".
pub type CustomSourceFn = Arc<dyn Fn(&InvocationContext) -> Value + Send + Sync>;

/// Where an argument's raw value is extracted from.
#[derive(Clone)]
pub enum ArgSource {
    /// Named capture from the matched route pattern.
    Path,
    /// Named query-string field, including bracketed nested keys.
    Query,
    /// The entire parsed request body.
    Body,
    /// Named request header (case-insensitive).
    Header,
    /// JSON snapshot of the raw request.
    Request,
    /// JSON snapshot of the full invocation context.
    Context,
    /// Caller-supplied extraction function.
    Custom(CustomSourceFn),
}

impl fmt::Debug for ArgSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArgSource::Path => "path",
            ArgSource::Query => "query",
            ArgSource::Body => "body",
            ArgSource::Header => "header",
            ArgSource::Request => "req",
            ArgSource::Context => "context",
            ArgSource::Custom(_) => "custom(fn)",
        };
        write!(f, "{}", s)
    }
}

/// One declared parameter of a shared method.
#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub name: String,
    pub ty: ArgType,
    pub source: ArgSource,
    pub required: bool,
}

impl ArgSpec {
    /// New argument sourced from the query string (the default source).
    pub fn new(name: impl Into<String>, ty: ArgType) -> Self {
        Self {
            name: name.into(),
            ty,
            source: ArgSource::Query,
            required: false,
        }
    }

    #[must_use]
    pub fn from(mut self, source: ArgSource) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// One declared return value of a shared method.
#[derive(Debug, Clone)]
pub struct ReturnSpec {
    pub name: String,
    pub ty: ArgType,
    /// When set, the produced value becomes the entire response body.
    pub root: bool,
}

impl ReturnSpec {
    pub fn new(name: impl Into<String>, ty: ArgType) -> Self {
        Self {
            name: name.into(),
            ty,
            root: false,
        }
    }

    /// A root return: sole return spec whose value is the whole body.
    pub fn root(ty: ArgType) -> Self {
        Self {
            name: String::new(),
            ty,
            root: true,
        }
    }
}
