use std::collections::HashMap;

use http::Method;
use tracing::{debug, info};

use crate::error::ServerError;
use crate::handlers::{self, AppState, Handler, RequestContext};
use crate::http::Response;

/// One table entry: method, path pattern, handler.
pub struct Route {
    pub method: Method,
    pub path: &'static str,
    pub handler: Handler,
}

impl Route {
    fn new(method: Method, path: &'static str, handler: Handler) -> Self {
        Self {
            method,
            path,
            handler,
        }
    }
}

/// Router over a fixed route table.
///
/// Exact paths live in a per-method hash table for O(1) lookup; patterned
/// paths (containing `{`) are kept separate and scanned in registration
/// order.
pub struct Router {
    exact: HashMap<Method, HashMap<String, Handler>>,
    patterns: Vec<(Method, String, Handler)>,
}

impl Router {
    #[must_use]
    pub fn new(routes: Vec<Route>) -> Self {
        let mut exact: HashMap<Method, HashMap<String, Handler>> = HashMap::new();
        let mut patterns = Vec::new();
        let mut exact_count = 0;
        for route in routes {
            if route.path.contains('{') {
                patterns.push((route.method, route.path.to_string(), route.handler));
            } else {
                exact
                    .entry(route.method)
                    .or_default()
                    .insert(route.path.to_string(), route.handler);
                exact_count += 1;
            }
        }
        info!(
            exact_count,
            pattern_count = patterns.len(),
            "routing table loaded"
        );
        Self { exact, patterns }
    }

    /// Resolve a handler for the request, or `None` when the content
    /// generator should take over.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<Handler> {
        if let Some(handler) = self.exact.get(method).and_then(|table| table.get(path)) {
            debug!(method = %method, path = %path, "route matched");
            return Some(*handler);
        }
        for (route_method, pattern, handler) in &self.patterns {
            if route_method != method {
                continue;
            }
            let prefix = pattern.split('{').next().unwrap_or(pattern);
            if path.starts_with(prefix) {
                debug!(method = %method, path = %path, pattern = %pattern, "pattern route matched");
                return Some(*handler);
            }
        }
        None
    }

    /// Full dispatch: table lookup, then the content-generator fallback with
    /// the security header set and `X-Coherence` stamped on.
    pub fn dispatch(
        &self,
        state: &AppState,
        ctx: &RequestContext,
    ) -> Result<Response, ServerError> {
        if let Some(handler) = self.route(&ctx.request.method, &ctx.request.path) {
            return handler(state, ctx);
        }

        debug!(path = %ctx.request.path, "no route matched, falling back to content generator");
        let mut resp = state
            .content
            .generate(&ctx.request.path, ctx.user.as_deref(), ctx.coherence);
        for (name, value) in state.security.security_headers() {
            resp.push_header(name, value);
        }
        resp.push_header("X-Coherence", &format!("{:?}", ctx.coherence));
        Ok(resp)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(app_routes())
    }
}

/// The application route table. Page routes serve rendered templates, API
/// routes serve JSON, and the POST group drives login, chat, and training.
#[must_use]
pub fn app_routes() -> Vec<Route> {
    vec![
        Route::new(Method::GET, "/", handlers::dashboard),
        Route::new(Method::GET, "/dashboard", handlers::dashboard),
        Route::new(Method::GET, "/admin", handlers::admin_page),
        Route::new(Method::GET, "/training", handlers::training_page),
        Route::new(Method::GET, "/entities", handlers::entities_page),
        Route::new(Method::GET, "/userdash", handlers::userdash_page),
        Route::new(Method::GET, "/auth", handlers::auth_page),
        Route::new(Method::GET, "/metrics", handlers::metrics),
        Route::new(Method::GET, "/api/entities", handlers::api_entities),
        Route::new(Method::GET, "/api/metrics", handlers::api_metrics),
        Route::new(Method::POST, "/login", handlers::login),
        Route::new(Method::POST, "/logout", handlers::logout),
        Route::new(Method::POST, "/register", handlers::register),
        Route::new(Method::POST, "/chat", handlers::chat),
        Route::new(Method::POST, "/collective_chat", handlers::collective_chat),
        Route::new(Method::POST, "/train", handlers::train),
        Route::new(Method::POST, "/assign_entity", handlers::assign_entity),
    ]
}
