//! Request routing — compressed-trie route matching with per-method
//! dispatch.
//!
//! Routes live in one trie per *method bucket*. A bucket is coarser than an
//! HTTP method: `HEAD` shares the `GET` bucket (the server suppresses the
//! body on the wire), and a request that asks for a WebSocket upgrade is
//! steered to the dedicated [`Bucket::Websocket`] trie regardless of its
//! request-line method.
//!
//! Pattern syntax, matched with literal > parameter > catch-all priority:
//!
//! | Pattern           | Example match        | Captured params   |
//! |-------------------|----------------------|-------------------|
//! | `/users`          | `/users`             | *(none)*          |
//! | `/users/:id`      | `/users/42`          | `id → "42"`       |
//! | `/files/*`        | `/files/a/b.txt`     | `* → "a/b.txt"`   |

use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::http::{Method, Request, Response};

pub(crate) mod path;
pub(crate) mod tree;

pub(crate) use tree::Tree;

/// Type-erased, heap-allocated async handler: takes a [`Context`], returns
/// a [`Response`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so the trie, the middleware
/// chain, and every connection task can share them without copying the
/// underlying closure. You rarely construct this type directly — route
/// binding methods accept any [`IntoHandler`].
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Implemented for every `Fn(Context) -> impl Future<Output = Response> +
/// Send` that is `Send + Sync + 'static`, via the blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

/// Erases an [`IntoHandler`] into the shared [`Handler`] representation.
pub(crate) fn erase<H: IntoHandler>(handler: H) -> Handler {
    Arc::new(move |ctx| handler.call(ctx))
}

/// A method bucket: one routing trie per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Websocket,
}

/// Number of buckets; sizes the per-app trie table.
pub(crate) const BUCKET_COUNT: usize = 6;

impl Bucket {
    /// All buckets, in table order.
    pub(crate) const ALL: [Bucket; BUCKET_COUNT] = [
        Bucket::Get,
        Bucket::Post,
        Bucket::Put,
        Bucket::Patch,
        Bucket::Delete,
        Bucket::Websocket,
    ];

    /// Index into the per-app trie table.
    pub(crate) fn index(self) -> usize {
        match self {
            Bucket::Get => 0,
            Bucket::Post => 1,
            Bucket::Put => 2,
            Bucket::Patch => 3,
            Bucket::Delete => 4,
            Bucket::Websocket => 5,
        }
    }

    /// The name used in the route table listing (`WS` for websocket routes).
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Bucket::Get => "GET",
            Bucket::Post => "POST",
            Bucket::Put => "PUT",
            Bucket::Patch => "PATCH",
            Bucket::Delete => "DELETE",
            Bucket::Websocket => "WS",
        }
    }

    /// Selects the bucket for an inbound request.
    ///
    /// A WebSocket upgrade (`Connection` header present together with
    /// `Upgrade: websocket`, compared case-insensitively) wins over the
    /// request-line method. `HEAD` shares the `GET` bucket. Anything else
    /// outside the table returns `None`, which dispatch answers with 405.
    pub(crate) fn select(request: &Request) -> Option<Bucket> {
        if is_websocket_upgrade(request) {
            return Some(Bucket::Websocket);
        }
        match request.method() {
            Method::Get | Method::Head => Some(Bucket::Get),
            Method::Post => Some(Bucket::Post),
            Method::Put => Some(Bucket::Put),
            Method::Patch => Some(Bucket::Patch),
            Method::Delete => Some(Bucket::Delete),
            _ => None,
        }
    }
}

/// Returns `true` when the request asks to switch protocols to WebSocket.
fn is_websocket_upgrade(request: &Request) -> bool {
    request.headers().get("connection").is_some()
        && request
            .headers()
            .get("upgrade")
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}
