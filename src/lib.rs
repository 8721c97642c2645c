//! # swerve
//!
//! A compressed-trie HTTP router and web framework.
//!
//! Routes are stored in one radix trie per method bucket, so lookup cost
//! follows the request path's length rather than the number of routes.
//! Patterns mix literal segments, single-segment parameters (`:id`), and
//! a trailing catch-all (`*`); matching prefers literal over parameter
//! over catch-all. Middleware composes into an onion around each handler
//! once, at registration.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use swerve::{App, Context, Response, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), swerve::ServerError> {
//!     let mut app = App::new();
//!     let mut api = app.router("/api");
//!
//!     api.get("/users/:id").handle(|ctx: Context| async move {
//!         let id = ctx.params().get("id").unwrap_or("unknown").to_owned();
//!         Response::new(StatusCode::Ok).body(id)
//!     });
//!
//!     let mut v1 = api.group("/v1");
//!     v1.post("/users").handle(|_ctx: Context| async {
//!         Response::new(StatusCode::Created)
//!     });
//!
//!     app.listen(8080).await
//! }
//! ```

pub mod app;
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod security;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use app::{App, AppConfig, Route, Router};
pub use context::{Context, Extensions, Parameters};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use middleware::Middleware;
pub use router::{Handler, IntoHandler};
pub use server::{Server, ServerConfig, ServerError};
