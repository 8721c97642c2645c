//! Security middleware.
//!
//! Currently: [`CorsMiddleware`] for Cross-Origin Resource Sharing.

use std::sync::Arc;

use crate::http::{Method, Response, StatusCode};
use crate::middleware::Middleware;
use crate::router::Handler;

/// CORS middleware — origin validation, preflight short-circuiting, and
/// `Access-Control-*` response decoration.
///
/// Because OPTIONS requests bypass routing and hit the app's OPTIONS
/// fallback, installing this middleware on the root router is enough to
/// answer preflights for every route.
///
/// # Behavior
///
/// - The allow-origin header is `*` when the wildcard origin is allowed,
///   or the echoed request origin when it is on the allow-list; requests
///   from other origins receive no CORS headers.
/// - `OPTIONS` requests short-circuit with `204 No Content` carrying the
///   allowed methods and headers; the downstream handler never runs.
/// - Other requests run normally and the response is decorated.
///
/// # Examples
///
/// ```
/// use swerve::security::CorsMiddleware;
///
/// let cors = CorsMiddleware::new()
///     .allow_origin("https://example.com")
///     .allow_method("PATCH")
///     .allow_header("X-Custom-Header");
/// ```
pub struct CorsMiddleware {
    allowed_origins: Vec<String>,
    allowed_methods: Vec<String>,
    allowed_headers: Vec<String>,
    exposed_headers: Vec<String>,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl CorsMiddleware {
    /// Creates a permissive configuration: every origin, the standard
    /// methods, and the common request headers.
    pub fn new() -> Self {
        Self {
            allowed_origins: vec!["*".to_owned()],
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "HEAD"]
                .map(str::to_owned)
                .to_vec(),
            allowed_headers: ["Accept", "Content-Type", "Content-Length", "Authorization"]
                .map(str::to_owned)
                .to_vec(),
            exposed_headers: Vec::new(),
        }
    }

    /// Replaces the wildcard allow-list with specific origins; may be
    /// called repeatedly to allow several.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origins.retain(|o| o != "*");
        self.allowed_origins.push(origin.into());
        self
    }

    /// Adds a method to `Access-Control-Allow-Methods`.
    #[must_use]
    pub fn allow_method(mut self, method: impl Into<String>) -> Self {
        self.allowed_methods.push(method.into());
        self
    }

    /// Adds a header to `Access-Control-Allow-Headers`.
    #[must_use]
    pub fn allow_header(mut self, header: impl Into<String>) -> Self {
        self.allowed_headers.push(header.into());
        self
    }

    /// Adds a header to `Access-Control-Expose-Headers`.
    #[must_use]
    pub fn expose_header(mut self, header: impl Into<String>) -> Self {
        self.exposed_headers.push(header.into());
        self
    }

    /// Erases the configuration into a [`Middleware`].
    pub fn build(self) -> Middleware {
        let config = Arc::new(self);
        Arc::new(move |next: Handler| -> Handler {
            let config = config.clone();
            Arc::new(move |ctx| {
                let next = next.clone();
                let config = config.clone();
                Box::pin(async move {
                    let origin = ctx
                        .request()
                        .headers()
                        .get("origin")
                        .map(str::to_owned);

                    let allow_origin = config.resolve_allow_origin(origin.as_deref());

                    if ctx.request().method() == &Method::Options {
                        let mut response = Response::new(StatusCode::NoContent);
                        if let Some(value) = allow_origin {
                            response.set_header("Access-Control-Allow-Origin", value);
                        }
                        response.set_header(
                            "Access-Control-Allow-Methods",
                            config.allowed_methods.join(", "),
                        );
                        response.set_header(
                            "Access-Control-Allow-Headers",
                            config.allowed_headers.join(", "),
                        );
                        if !config.exposed_headers.is_empty() {
                            response.set_header(
                                "Access-Control-Expose-Headers",
                                config.exposed_headers.join(", "),
                            );
                        }
                        return response;
                    }

                    let mut response = next(ctx).await;
                    if let Some(value) = allow_origin {
                        response.set_header("Access-Control-Allow-Origin", value);
                    }
                    response
                })
            })
        })
    }

    /// Picks the `Access-Control-Allow-Origin` value for a request origin,
    /// or `None` when the origin is not allowed.
    fn resolve_allow_origin(&self, origin: Option<&str>) -> Option<String> {
        if self.allowed_origins.iter().any(|o| o == "*") {
            return Some("*".to_owned());
        }
        let origin = origin?;
        self.allowed_origins
            .iter()
            .find(|o| o.as_str() == origin)
            .cloned()
    }
}
