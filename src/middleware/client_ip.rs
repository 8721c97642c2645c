//! Client-IP detection middleware.

use std::sync::Arc;

use super::Middleware;
use crate::router::Handler;

/// The client address resolved for the current request, stored as a typed
/// context extension by [`ClientIpMiddleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// Resolves the originating client address and exposes it to handlers.
///
/// Resolution order, first hit wins:
///
/// 1. the first entry of `X-Forwarded-For` (proxies append, so the first
///    entry is the original client),
/// 2. the configured real-IP header (default `X-Real-IP`),
/// 3. the connection's peer address.
///
/// Proxy headers are spoofable by anyone who can reach the listener
/// directly, so 1 and 2 are only consulted while `trust_proxy` is set
/// (the default). The resolved value is stored as a [`ClientIp`]
/// extension and written to the response as `X-Client-IP`.
pub struct ClientIpMiddleware {
    header: String,
    trust_proxy: bool,
}

impl Default for ClientIpMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientIpMiddleware {
    /// Creates the middleware with `X-Real-IP` fallback and proxy trust on.
    pub fn new() -> Self {
        Self {
            header: "X-Real-IP".to_owned(),
            trust_proxy: true,
        }
    }

    /// Uses a different real-IP header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>) -> Self {
        self.header = name.into();
        self
    }

    /// Controls whether proxy headers are consulted at all.
    #[must_use]
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    /// Erases the configuration into a [`Middleware`].
    pub fn build(self) -> Middleware {
        let header = Arc::new(self.header);
        let trust_proxy = self.trust_proxy;
        Arc::new(move |next: Handler| -> Handler {
            let header = header.clone();
            Arc::new(move |mut ctx| {
                let next = next.clone();
                let header = header.clone();
                Box::pin(async move {
                    let mut client_ip = String::new();

                    if trust_proxy {
                        if let Some(xff) = ctx.request().headers().get("x-forwarded-for") {
                            client_ip = xff
                                .split(',')
                                .next()
                                .unwrap_or_default()
                                .trim()
                                .to_owned();
                        }
                        if client_ip.is_empty() {
                            if let Some(real) = ctx.request().headers().get(&header) {
                                client_ip = real.trim().to_owned();
                            }
                        }
                    }
                    if client_ip.is_empty() {
                        if let Some(peer) = ctx.request().peer_addr() {
                            client_ip = peer.ip().to_string();
                        }
                    }

                    ctx.extensions_mut().insert(ClientIp(client_ip.clone()));
                    let mut response = next(ctx).await;
                    response.set_header("X-Client-IP", client_ip);
                    response
                })
            })
        })
    }
}
