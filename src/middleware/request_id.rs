//! Request-id tracking middleware.

use std::sync::Arc;

use uuid::Uuid;

use super::Middleware;
use crate::router::Handler;

/// The id assigned to the current request, stored as a typed context
/// extension by [`RequestIdMiddleware`].
///
/// ```
/// # use swerve::middleware::RequestId;
/// # fn read(ctx: &swerve::Context) -> Option<String> {
/// ctx.extensions().get::<RequestId>().map(|id| id.0.clone())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Assigns each request an id and echoes it on the response.
///
/// An id already present on the inbound header (default `X-Request-ID`)
/// is kept, so ids survive proxy hops; otherwise a UUIDv4 is minted. The
/// id is exposed to handlers as a [`RequestId`] extension and written to
/// the response under the same header.
pub struct RequestIdMiddleware {
    header: String,
}

impl Default for RequestIdMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdMiddleware {
    /// Creates the middleware with the default `X-Request-ID` header.
    pub fn new() -> Self {
        Self {
            header: "X-Request-ID".to_owned(),
        }
    }

    /// Uses a different header name (e.g. `X-Correlation-ID`).
    #[must_use]
    pub fn header(mut self, name: impl Into<String>) -> Self {
        self.header = name.into();
        self
    }

    /// Erases the configuration into a [`Middleware`].
    pub fn build(self) -> Middleware {
        let header = Arc::new(self.header);
        Arc::new(move |next: Handler| -> Handler {
            let header = header.clone();
            Arc::new(move |mut ctx| {
                let next = next.clone();
                let header = header.clone();
                Box::pin(async move {
                    let id = ctx
                        .request()
                        .headers()
                        .get(&header)
                        .map(str::to_owned)
                        .unwrap_or_else(|| Uuid::new_v4().to_string());

                    ctx.extensions_mut().insert(RequestId(id.clone()));
                    let mut response = next(ctx).await;
                    response.set_header(header.as_str(), id);
                    response
                })
            })
        })
    }
}
