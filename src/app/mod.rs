//! The application surface: route registration and request dispatch.
//!
//! An [`App`] owns one routing trie per method bucket plus the 404/405/
//! OPTIONS fallback handlers. Routes are registered through [`Router`]
//! groups during a configuration phase; once [`App::listen`] is called the
//! tables are treated as immutable and shared read-only across connection
//! tasks.
//!
//! ```no_run
//! use swerve::{App, Response, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), swerve::ServerError> {
//!     let mut app = App::new();
//!     let mut api = app.router("/api");
//!
//!     api.get("/users/:id").handle(|ctx: swerve::Context| async move {
//!         let id = ctx.params().get("id").unwrap_or("unknown").to_owned();
//!         Response::new(StatusCode::Ok).body(id)
//!     });
//!
//!     app.listen(8080).await
//! }
//! ```

use std::sync::Arc;

use crate::context::Context;
use crate::http::{Method, Request, Response, StatusCode};
use crate::middleware::{Middleware, compose};
use crate::router::path::clean_path;
use crate::router::{BUCKET_COUNT, Bucket, Handler, IntoHandler, Tree, erase};
use crate::server::{Server, ServerConfig, ServerError};

/// Application-level configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppConfig {
    /// Enables automatic handling of `TRACE` requests (reflecting the
    /// request head back as `message/http`). Off by default; a disabled
    /// `TRACE` answers 405.
    pub allow_trace: bool,
}

/// The router application: per-method route tries, fallback handlers, and
/// the dispatch entry point.
pub struct App {
    config: AppConfig,
    trees: [Tree; BUCKET_COUNT],
    not_found: Handler,
    not_allowed: Handler,
    options: Handler,
    /// Middleware of the root router, captured so [`App::listen`] can wrap
    /// the fallback handlers with it. Sub-group middleware is deliberately
    /// not included.
    root_middlewares: Vec<Middleware>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Creates an app with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Creates an app with the given configuration.
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config,
            trees: std::array::from_fn(|_| Tree::new()),
            not_found: default_not_found(),
            not_allowed: default_not_allowed(),
            options: default_options(),
            root_middlewares: Vec::new(),
        }
    }

    /// Creates the root router scoped at `prefix`.
    ///
    /// The root router's middleware list (added via [`Router::with`]) also
    /// wraps the 404/405/OPTIONS fallbacks once the server starts
    /// listening.
    pub fn router(&mut self, prefix: &str) -> Router<'_> {
        self.root_middlewares.clear();
        Router {
            path: clean_path(prefix),
            middlewares: Vec::new(),
            is_root: true,
            app: self,
        }
    }

    /// Replaces the 404 fallback handler.
    pub fn not_found(&mut self, handler: impl IntoHandler) {
        self.not_found = erase(handler);
    }

    /// Replaces the 405 fallback handler.
    pub fn not_allowed(&mut self, handler: impl IntoHandler) {
        self.not_allowed = erase(handler);
    }

    /// Replaces the OPTIONS handler. The default answers an empty 200 and
    /// leaves decoration to CORS middleware.
    pub fn options(&mut self, handler: impl IntoHandler) {
        self.options = erase(handler);
    }

    /// Returns every registered route as sorted `"METHOD PATH"` strings.
    /// Websocket routes list under the method name `WS`.
    pub fn routes(&self) -> Vec<String> {
        let mut routes = Vec::new();
        for bucket in Bucket::ALL {
            self.trees[bucket.index()].capture_routes(bucket.as_str(), &mut routes);
        }
        routes.sort();
        routes
    }

    /// Dispatches one request: the single request-time entry point.
    ///
    /// Order of decisions: `TRACE` reflection (iff enabled), `OPTIONS`
    /// short-circuit, bucket selection (WebSocket upgrades override the
    /// request-line method; unknown methods answer 405), then trie
    /// resolution (a miss answers 404). On a hit the captured parameters
    /// are attached to the request context and the stored handler runs.
    pub async fn dispatch(&self, request: Request) -> Response {
        if request.method() == &Method::Trace {
            if self.config.allow_trace {
                return reflect_trace(&request);
            }
            return (self.not_allowed)(Context::new(request)).await;
        }
        if request.method() == &Method::Options {
            return (self.options)(Context::new(request)).await;
        }

        let Some(bucket) = Bucket::select(&request) else {
            return (self.not_allowed)(Context::new(request)).await;
        };

        let resolved = self.trees[bucket.index()]
            .find(request.path())
            .map(|(endpoint, params)| (endpoint.handler.clone(), params));
        match resolved {
            Some((handler, params)) => handler(Context::with_params(request, params)).await,
            None => (self.not_found)(Context::new(request)).await,
        }
    }

    /// Starts serving on `0.0.0.0:port` with default server configuration.
    pub async fn listen(self, port: u16) -> Result<(), ServerError> {
        self.listen_with(port, ServerConfig::default()).await
    }

    /// Starts serving with explicit [`ServerConfig`] (timeouts).
    ///
    /// Before accepting traffic the fallback handlers are wrapped with the
    /// root router's middleware list, so logging/CORS applied at the root
    /// also covers 404s, 405s, and preflights.
    pub async fn listen_with(mut self, port: u16, config: ServerConfig) -> Result<(), ServerError> {
        self.not_found = compose(&self.root_middlewares, self.not_found.clone());
        self.not_allowed = compose(&self.root_middlewares, self.not_allowed.clone());
        self.options = compose(&self.root_middlewares, self.options.clone());

        let server = Server::bind(format!("0.0.0.0:{port}"))
            .await?
            .with_config(config);
        let app = Arc::new(self);
        server
            .run(move |request| {
                let app = Arc::clone(&app);
                async move { app.dispatch(request).await }
            })
            .await
    }
}

/// A group of routes sharing a path prefix and a middleware list.
///
/// Obtained from [`App::router`] or [`Router::group`]. Middleware
/// accumulates down the group chain: a child group starts with its
/// parent's list, so the effective order at a route is parent → child →
/// per-route → handler.
pub struct Router<'app> {
    path: String,
    middlewares: Vec<Middleware>,
    is_root: bool,
    app: &'app mut App,
}

impl Router<'_> {
    /// Appends a middleware to this router.
    #[must_use]
    pub fn with(mut self, middleware: Middleware) -> Self {
        if self.is_root {
            self.app.root_middlewares.push(middleware.clone());
        }
        self.middlewares.push(middleware);
        self
    }

    /// Creates a sub-group under `prefix`, inheriting this router's
    /// middleware list.
    pub fn group(&mut self, prefix: &str) -> Router<'_> {
        Router {
            path: clean_path(&format!("{}{prefix}", self.path)),
            middlewares: self.middlewares.clone(),
            is_root: false,
            app: &mut *self.app,
        }
    }

    /// Binds a `GET` route (also served for `HEAD` requests).
    pub fn get(&mut self, path: &str) -> Route<'_> {
        self.bind(Bucket::Get, path)
    }

    /// Binds a `POST` route.
    pub fn post(&mut self, path: &str) -> Route<'_> {
        self.bind(Bucket::Post, path)
    }

    /// Binds a `PUT` route.
    pub fn put(&mut self, path: &str) -> Route<'_> {
        self.bind(Bucket::Put, path)
    }

    /// Binds a `PATCH` route.
    pub fn patch(&mut self, path: &str) -> Route<'_> {
        self.bind(Bucket::Patch, path)
    }

    /// Binds a `DELETE` route.
    pub fn delete(&mut self, path: &str) -> Route<'_> {
        self.bind(Bucket::Delete, path)
    }

    /// Binds a WebSocket route: matched when a request carries a
    /// `Connection`/`Upgrade: websocket` pair, whatever its method.
    pub fn websocket(&mut self, path: &str) -> Route<'_> {
        self.bind(Bucket::Websocket, path)
    }

    fn bind(&mut self, bucket: Bucket, path: &str) -> Route<'_> {
        Route {
            bucket,
            path: clean_path(&format!("{}{path}", self.path)),
            middlewares: self.middlewares.clone(),
            app: &mut *self.app,
        }
    }
}

/// A pending route binding: the target bucket, the full cleaned path, and
/// the middleware list accumulated so far. [`Route::handle`] composes and
/// inserts.
pub struct Route<'app> {
    bucket: Bucket,
    path: String,
    middlewares: Vec<Middleware>,
    app: &'app mut App,
}

impl Route<'_> {
    /// Appends a per-route middleware, innermost-so-far.
    #[must_use]
    pub fn with(mut self, middleware: Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Wraps `handler` in the accumulated middleware and inserts the
    /// route. Registering the same method and path again replaces the
    /// previous handler.
    pub fn handle(self, handler: impl IntoHandler) {
        let wrapped = compose(&self.middlewares, erase(handler));
        self.app.trees[self.bucket.index()].insert(&self.path, wrapped);
    }
}

/// Reflects the request head back at the client, `message/http` style.
fn reflect_trace(request: &Request) -> Response {
    let mut body = format!(
        "{} {} HTTP/1.{}\r\n",
        request.method(),
        request.request_target(),
        request.version()
    );
    for (name, value) in request.headers().iter() {
        body.push_str(name);
        body.push_str(": ");
        body.push_str(value);
        body.push_str("\r\n");
    }
    Response::new(StatusCode::Ok)
        .header("Content-Type", "message/http")
        .body(body)
}

fn default_not_found() -> Handler {
    Arc::new(|_ctx| Box::pin(async { Response::new(StatusCode::NotFound).body("Not found") }))
}

fn default_not_allowed() -> Handler {
    Arc::new(|_ctx| {
        Box::pin(async { Response::new(StatusCode::MethodNotAllowed).body("Method not allowed") })
    })
}

fn default_options() -> Handler {
    // Left empty so CORS middleware can fill the response.
    Arc::new(|_ctx| Box::pin(async { Response::new(StatusCode::Ok) }))
}
