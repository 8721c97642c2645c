//! Middleware: handler-to-handler wrappers composed into an onion.
//!
//! A middleware is a function from [`Handler`] to [`Handler`]. Composing
//! the ordered list `[m1, m2, …, mN]` around a terminal handler `h`
//! produces `m1(m2(…mN(h)))`: on the way in the leftmost middleware runs
//! first, on the way out it runs last.
//!
//! Composition happens **once, at route registration** — the trie stores
//! the fully wrapped handler, and per-request cost is a single indirect
//! call into the outermost wrapper. Nothing re-walks a middleware list at
//! request time.
//!
//! Built-in middlewares:
//!
//! - [`LoggerMiddleware`](logger::LoggerMiddleware) — request logging
//! - [`RequestIdMiddleware`](request_id::RequestIdMiddleware) — id tracking
//! - [`ClientIpMiddleware`](client_ip::ClientIpMiddleware) — client IP detection
//! - [`RecoverMiddleware`](recover::RecoverMiddleware) — panic to 500
//! - [`CorsMiddleware`](crate::security::CorsMiddleware) — CORS handling
//!
//! Ad-hoc middleware is an `Arc`-wrapped closure:
//!
//! ```
//! use std::sync::Arc;
//! use swerve::{Handler, Middleware};
//!
//! let set_server_header: Middleware = Arc::new(|next: Handler| -> Handler {
//!     Arc::new(move |ctx| {
//!         let next = next.clone();
//!         Box::pin(async move {
//!             let mut response = next(ctx).await;
//!             response.set_header("Server", "swerve");
//!             response
//!         })
//!     })
//! });
//! ```

use std::sync::Arc;

use crate::router::Handler;

pub mod client_ip;
pub mod logger;
pub mod recover;
pub mod request_id;

pub use client_ip::{ClientIp, ClientIpMiddleware};
pub use logger::LoggerMiddleware;
pub use recover::RecoverMiddleware;
pub use request_id::{RequestId, RequestIdMiddleware};

/// A type-erased middleware: wraps a [`Handler`], yielding a new one.
///
/// The `Arc` makes middlewares cheap to clone, so group and per-route
/// lists can share them freely.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync + 'static>;

/// Folds `middlewares` around `handler`, right to left, so that
/// `middlewares[0]` ends up outermost.
pub(crate) fn compose(middlewares: &[Middleware], handler: Handler) -> Handler {
    middlewares
        .iter()
        .rev()
        .fold(handler, |next, middleware| middleware(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::http::{Request, Response, StatusCode};
    use std::sync::Mutex;

    fn make_context() -> Context {
        let raw = b"GET /test HTTP/1.1\r\nHost: x\r\n\r\n";
        Context::new(Request::parse(raw).unwrap().0)
    }

    /// Middleware that records entry and exit against a shared log.
    fn tracing_mw(tag: &'static str, log: Arc<Mutex<Vec<String>>>) -> Middleware {
        Arc::new(move |next: Handler| -> Handler {
            let log = log.clone();
            Arc::new(move |ctx| {
                let next = next.clone();
                let log = log.clone();
                Box::pin(async move {
                    log.lock().unwrap().push(format!("enter_{tag}"));
                    let response = next(ctx).await;
                    log.lock().unwrap().push(format!("exit_{tag}"));
                    response
                })
            })
        })
    }

    #[tokio::test]
    async fn onion_ordering() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler_log = log.clone();
        let handler: Handler = Arc::new(move |_ctx| {
            let log = handler_log.clone();
            Box::pin(async move {
                log.lock().unwrap().push("handler".to_owned());
                Response::new(StatusCode::Ok)
            })
        });

        let chain = compose(
            &[tracing_mw("m1", log.clone()), tracing_mw("m2", log.clone())],
            handler,
        );
        let response = chain(make_context()).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["enter_m1", "enter_m2", "handler", "exit_m2", "exit_m1"]
        );
    }

    #[tokio::test]
    async fn empty_chain_is_the_handler() {
        let handler: Handler =
            Arc::new(|_ctx| Box::pin(async { Response::new(StatusCode::Created) }));
        let chain = compose(&[], handler);
        assert_eq!(chain(make_context()).await.status(), StatusCode::Created);
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let deny: Middleware = Arc::new(|_next: Handler| -> Handler {
            Arc::new(|_ctx| Box::pin(async { Response::new(StatusCode::Forbidden) }))
        });
        let handler: Handler = Arc::new(|_ctx| Box::pin(async { Response::new(StatusCode::Ok) }));
        let chain = compose(&[deny], handler);
        assert_eq!(chain(make_context()).await.status(), StatusCode::Forbidden);
    }
}
