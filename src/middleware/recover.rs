//! Panic recovery middleware.

use std::sync::Arc;

use tracing::error;

use super::Middleware;
use crate::http::{Response, StatusCode};
use crate::router::Handler;

/// Converts a panicking handler into a `500 Internal Server Error`.
///
/// The downstream call runs in its own spawned task, so a panic unwinds
/// that task instead of the connection task; the join error is logged and
/// answered with a 500. Without this wrapper a panic closes the
/// connection with no response at all.
pub struct RecoverMiddleware;

impl RecoverMiddleware {
    /// Erases the middleware into a [`Middleware`].
    pub fn build(self) -> Middleware {
        Arc::new(|next: Handler| -> Handler {
            Arc::new(move |ctx| {
                let next = next.clone();
                Box::pin(async move {
                    match tokio::spawn(next(ctx)).await {
                        Ok(response) => response,
                        Err(join_error) => {
                            if join_error.is_panic() {
                                error!(error = %join_error, "handler panicked");
                            }
                            Response::new(StatusCode::InternalServerError)
                                .body("Internal server error")
                        }
                    }
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::http::Request;
    use crate::middleware::compose;

    fn make_context() -> Context {
        let raw = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        Context::new(Request::parse(raw).unwrap().0)
    }

    #[tokio::test]
    async fn panicking_handler_becomes_500() {
        let handler: Handler = Arc::new(|_ctx| Box::pin(async { panic!("boom") }));
        let chain = compose(&[RecoverMiddleware.build()], handler);
        let response = chain(make_context()).await;
        assert_eq!(response.status(), StatusCode::InternalServerError);
    }

    #[tokio::test]
    async fn healthy_handler_is_untouched() {
        let handler: Handler =
            Arc::new(|_ctx| Box::pin(async { Response::new(StatusCode::Ok).body("fine") }));
        let chain = compose(&[RecoverMiddleware.build()], handler);
        let response = chain(make_context()).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.body_ref(), b"fine");
    }
}
