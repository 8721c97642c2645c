//! Request logging middleware.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::info;

use super::Middleware;
use crate::router::Handler;

/// Logs one line per request — method, path, status, elapsed time — after
/// the downstream handler completes.
///
/// Emitted through `tracing` with structured fields; rendering (including
/// any terminal coloring) belongs to whichever subscriber the application
/// installs. Paths on the skip list are passed through silently.
///
/// # Examples
///
/// ```
/// use swerve::middleware::LoggerMiddleware;
///
/// let logger = LoggerMiddleware::new().skip("/health").build();
/// ```
pub struct LoggerMiddleware {
    skip: Vec<String>,
}

impl Default for LoggerMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerMiddleware {
    /// Creates a logger with an empty skip list.
    pub fn new() -> Self {
        Self { skip: Vec::new() }
    }

    /// Excludes a path from logging. May be called multiple times.
    #[must_use]
    pub fn skip(mut self, path: impl Into<String>) -> Self {
        self.skip.push(path.into());
        self
    }

    /// Erases the configuration into a [`Middleware`].
    pub fn build(self) -> Middleware {
        let skip = Arc::new(self.skip);
        Arc::new(move |next: Handler| -> Handler {
            let skip = skip.clone();
            Arc::new(move |ctx| {
                let next = next.clone();
                let skip = skip.clone();
                Box::pin(async move {
                    if skip.iter().any(|p| p == ctx.request().path()) {
                        return next(ctx).await;
                    }

                    let start = Instant::now();
                    let method = ctx.request().method().as_str().to_owned();
                    let path = ctx.request().path().to_owned();
                    let peer = ctx.request().peer_addr();

                    let response = next(ctx).await;

                    info!(
                        method = %method,
                        path = %path,
                        status = response.status().as_u16(),
                        peer = ?peer,
                        elapsed = ?start.elapsed(),
                        "request"
                    );
                    response
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::http::{Request, Response, StatusCode};
    use crate::middleware::compose;

    fn make_context(path: &str) -> Context {
        let raw = format!("GET {path} HTTP/1.1\r\nHost: x\r\n\r\n");
        Context::new(Request::parse(raw.as_bytes()).unwrap().0)
    }

    #[tokio::test]
    async fn passes_response_through() {
        let handler: Handler =
            Arc::new(|_ctx| Box::pin(async { Response::new(StatusCode::Created).body("made") }));
        let chain = compose(&[LoggerMiddleware::new().build()], handler);
        let response = chain(make_context("/items")).await;
        assert_eq!(response.status(), StatusCode::Created);
        assert_eq!(response.body_ref(), b"made");
    }

    #[tokio::test]
    async fn skipped_path_still_dispatches() {
        let handler: Handler = Arc::new(|_ctx| Box::pin(async { Response::new(StatusCode::Ok) }));
        let chain = compose(&[LoggerMiddleware::new().skip("/health").build()], handler);
        assert_eq!(chain(make_context("/health")).await.status(), StatusCode::Ok);
    }
}
