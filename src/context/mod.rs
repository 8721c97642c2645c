//! Per-request context: the parsed request, the matched route's path
//! parameters, and a typed extensions map for middleware-injected state.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use crate::Request;

/// Type-erased per-request state, keyed by type.
///
/// Middleware stores values here for downstream middleware and the handler
/// to read — a request id, a resolved client IP, an authenticated
/// principal. Each type has at most one slot.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Creates an empty extensions map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous value of the same type.
    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.map.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Returns a reference to the stored value of type `T`, if any.
    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Removes and returns the stored value of type `T`, if any.
    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

/// Path parameters extracted by the route resolver.
///
/// For a route `/users/:id` matched against `/users/123`, the map holds
/// `id -> "123"`. A trailing catch-all stores the rest of the path under
/// the key `*`.
#[derive(Default, Debug, Clone)]
pub struct Parameters {
    map: HashMap<String, String>,
}

impl Parameters {
    /// Creates an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a captured value.
    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    /// Returns the captured value for `key`, if the route declared it.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Returns the number of captured parameters.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the matched route had no dynamic segments.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over `(name, value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Everything a handler sees for one request.
///
/// Owned by the handler invocation; dropped when the handler returns.
pub struct Context {
    request: Request,
    params: Parameters,
    extensions: Extensions,
}

impl Context {
    /// Creates a context with no path parameters (fallback handlers,
    /// OPTIONS/TRACE short-circuits).
    pub fn new(request: Request) -> Self {
        Self::with_params(request, Parameters::new())
    }

    /// Creates a context carrying the resolver's parameter map.
    pub fn with_params(request: Request, params: Parameters) -> Self {
        Self {
            request,
            params,
            extensions: Extensions::new(),
        }
    }

    /// Returns the underlying request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the matched route's path parameters.
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Returns the typed extensions map.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Returns the typed extensions map mutably, for middleware.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Deserializes the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request() -> Request {
        let raw = b"GET /users/7 HTTP/1.1\r\nHost: x\r\n\r\n";
        Request::parse(raw).unwrap().0
    }

    #[test]
    fn extensions_are_typed_slots() {
        #[derive(Debug, PartialEq)]
        struct Tag(u32);

        let mut ext = Extensions::new();
        ext.insert(Tag(1));
        ext.insert(Tag(2)); // replaces
        assert_eq!(ext.get::<Tag>(), Some(&Tag(2)));
        assert_eq!(ext.remove::<Tag>(), Some(Tag(2)));
        assert!(ext.get::<Tag>().is_none());
    }

    #[test]
    fn params_round_trip() {
        let mut params = Parameters::new();
        params.insert("id".to_owned(), "7".to_owned());
        assert_eq!(params.get("id"), Some("7"));
        assert_eq!(params.get("name"), None);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn context_carries_params() {
        let mut params = Parameters::new();
        params.insert("id".to_owned(), "7".to_owned());
        let ctx = Context::with_params(make_request(), params);
        assert_eq!(ctx.params().get("id"), Some("7"));
        assert_eq!(ctx.request().path(), "/users/7");
    }

    #[test]
    fn json_body_decoding() {
        let raw = b"POST /u HTTP/1.1\r\nHost: x\r\nContent-Length: 14\r\n\r\n{\"name\":\"ada\"}";
        let (req, _) = Request::parse(raw).unwrap();
        let ctx = Context::new(req);
        let value: serde_json::Value = ctx.json().unwrap();
        assert_eq!(value["name"], "ada");
    }
}
