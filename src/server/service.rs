//! `may_minihttp` service glue: parse, route, dispatch, write.

use super::request::parse_request;
use super::response::{write_error, write_reply};
use crate::dispatcher::{CancelToken, Dispatcher, RequestContext};
use crate::error::RemoteError;
use crate::ids::RequestId;
use crate::registry::Registry;
use crate::router::{BuildError, RouteBuilder, Router};
use may_minihttp::{HttpService, Request, Response};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Hosting-layer knobs. The body limit is enforced before routing, so an
/// oversized payload never reaches argument resolution.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// Maximum accepted request body, in bytes.
    pub body_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            body_limit: 1024 * 1024,
        }
    }
}

/// Index of in-flight invocations by request id.
///
/// `may_minihttp` exposes no client-disconnect callback, so the hosting layer
/// cannot observe an aborted connection itself. A supervising component that
/// knows a request's id (the client-supplied `x-request-id` header) aborts
/// the invocation through this registry instead. Entries are released as soon
/// as their dispatch returns.
#[derive(Clone, Default)]
pub struct CancelRegistry {
    inner: Arc<Mutex<HashMap<RequestId, CancelToken>>>,
}

impl CancelRegistry {
    /// Abort the invocation dispatched under `id`. Returns `false` when no
    /// such request is in flight.
    pub fn cancel(&self, id: &RequestId) -> bool {
        let token = self.lock().get(id).cloned();
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of requests currently being dispatched.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn register(&self, id: RequestId, token: CancelToken) {
        self.lock().insert(id, token);
    }

    fn release(&self, id: &RequestId) {
        self.lock().remove(id);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, CancelToken>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The mounted registry as an HTTP service. Cheap to clone; the route table,
/// registry, and cancellation index are shared.
#[derive(Clone)]
pub struct RestService {
    router: Arc<Router>,
    dispatcher: Dispatcher,
    cancellations: CancelRegistry,
    config: ServiceConfig,
}

impl RestService {
    /// Build the sorted route table from the registry and wire the dispatcher.
    pub fn new(registry: Arc<Registry>) -> Result<Self, BuildError> {
        Self::with_config(registry, ServiceConfig::default())
    }

    pub fn with_config(registry: Arc<Registry>, config: ServiceConfig) -> Result<Self, BuildError> {
        let routes = RouteBuilder::build(&registry)?;
        let router = Arc::new(Router::new(routes));
        Ok(Self {
            router,
            dispatcher: Dispatcher::new(registry),
            cancellations: CancelRegistry::default(),
            config,
        })
    }

    #[must_use]
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle onto in-flight invocations, for cancelling them from outside
    /// the connection coroutine. Clone it before handing the service to the
    /// server.
    #[must_use]
    pub fn cancellations(&self) -> &CancelRegistry {
        &self.cancellations
    }
}

impl HttpService for RestService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let parsed = match parse_request(req, self.config.body_limit) {
            Ok(parsed) => parsed,
            Err(err) => {
                write_error(res, &err);
                return Ok(());
            }
        };
        let request_id =
            RequestId::from_header_or_new(parsed.headers.get("x-request-id").map(String::as_str));

        let Some(route_match) = self.router.route(&parsed.method, &parsed.path) else {
            let err = RemoteError::not_found(format!(
                "there is no method handling {} {}",
                parsed.method, parsed.path
            ));
            write_error(res, &err);
            return Ok(());
        };

        let request = RequestContext {
            request_id,
            method: parsed.method,
            path: parsed.path,
            headers: parsed.headers,
            cookies: parsed.cookies,
            query: parsed.query,
            path_params: route_match.path_params.clone(),
            body: parsed.body,
        };

        // The token lives in the cancellation registry while the dispatch is
        // in flight; aborts arrive from outside the connection coroutine.
        let cancel = CancelToken::new();
        self.cancellations.register(request_id, cancel.clone());
        let reply = self
            .dispatcher
            .dispatch(Arc::clone(&route_match.method), request, &cancel);
        self.cancellations.release(&request_id);
        match reply {
            Some(reply) => write_reply(res, &reply),
            None => {
                // Cancelled: the client is gone, nothing to write.
                info!(request_id = %request_id, "Request cancelled; response suppressed");
            }
        }
        Ok(())
    }
}
