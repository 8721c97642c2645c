//! The compressed route trie: node store, inserter, and resolver.
//!
//! Edges carry multi-byte labels, so a run of static path bytes is one
//! edge rather than a chain of single-byte nodes. Each node indexes its
//! literal children by first byte and carries at most one parameter child
//! and one catch-all child. Inserting a route whose literal prefix
//! diverges partway through an existing edge splits that edge in place:
//! the old node keeps the common prefix and its contents move into a new
//! tail node reattached underneath it.
//!
//! Resolution walks the trie byte-wise with literal > parameter >
//! catch-all priority. Dynamic alternatives passed over on the way down
//! are remembered, and a dead end backtracks to the nearest junction with
//! an untried parameter or catch-all branch.

use std::collections::HashMap;
use std::fmt;

use tracing::warn;

use super::Handler;
use super::path::{Token, clean_path, is_valid_pattern, longest_common_prefix, split_tokens};
use crate::context::Parameters;

/// The terminal record on a matched node.
///
/// Created once at registration and never mutated; re-registering the same
/// pattern replaces the whole record.
pub(crate) struct Endpoint {
    /// The fully composed (middleware-wrapped) handler.
    pub(crate) handler: Handler,
    /// The cleaned pattern the route was registered under.
    pub(crate) full_path: String,
    /// Names of the dynamic segments in path order; a catch-all
    /// contributes the literal name `*`.
    pub(crate) param_keys: Vec<String>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("full_path", &self.full_path)
            .field("param_keys", &self.param_keys)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Static,
    Param,
    CatchAll,
}

struct Node {
    kind: NodeKind,
    /// Literal bytes labelling the edge into this node; empty for param
    /// and catch-all nodes.
    prefix: String,
    /// Literal children, indexed by the first byte of their prefix.
    children: HashMap<u8, Node>,
    /// At most one parameter child per node.
    param: Option<Box<Node>>,
    /// At most one catch-all child per node.
    catch_all: Option<Box<Node>>,
    endpoint: Option<Endpoint>,
}

impl Node {
    fn new(kind: NodeKind, prefix: &str) -> Self {
        Self {
            kind,
            prefix: prefix.to_owned(),
            children: HashMap::new(),
            param: None,
            catch_all: None,
            endpoint: None,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("prefix", &self.prefix)
            .field("children", &self.children.len())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// One routing trie (one method bucket's worth of routes).
#[derive(Debug)]
pub(crate) struct Tree {
    root: Node,
}

/// An untried dynamic branch, remembered while descending so a dead end
/// can resume at the nearest junction with the path restored.
struct Frame<'t, 'p> {
    node: &'t Node,
    p: &'p str,
    values_len: usize,
    alt: Alt,
}

enum Alt {
    Param,
    CatchAll,
}

impl Tree {
    pub(crate) fn new() -> Self {
        Self {
            root: Node::new(NodeKind::Static, ""),
        }
    }

    /// Inserts a route pattern with its (already composed) handler.
    ///
    /// The pattern is cleaned first; a pattern that fails validation is
    /// dropped and the route never goes live. Registering a pattern twice
    /// replaces the endpoint in place.
    pub(crate) fn insert(&mut self, pattern: &str, handler: Handler) {
        let path = clean_path(pattern);
        if !is_valid_pattern(&path) {
            warn!(pattern = %path, "invalid route pattern dropped");
            return;
        }

        let tokens = split_tokens(&path);
        let mut param_keys = Vec::new();
        let mut cur = &mut self.root;

        for token in &tokens {
            match token {
                Token::Literal(lit) => cur = descend_literal(cur, lit),
                Token::Param(name) => {
                    param_keys.push(name.clone());
                    cur = cur
                        .param
                        .get_or_insert_with(|| Box::new(Node::new(NodeKind::Param, "")))
                        .as_mut();
                }
                Token::CatchAll => {
                    param_keys.push("*".to_owned());
                    cur = cur
                        .catch_all
                        .get_or_insert_with(|| Box::new(Node::new(NodeKind::CatchAll, "")))
                        .as_mut();
                }
            }
        }

        cur.endpoint = Some(Endpoint {
            handler,
            full_path: path,
            param_keys,
        });
    }

    /// Resolves a request path to its endpoint and captured parameters.
    ///
    /// The walk consumes `path` byte-wise. At each junction an exact
    /// literal edge wins; failing that, a parameter child captures one
    /// segment; failing that, a catch-all child captures the rest. A dead
    /// end further down resumes at the nearest junction whose dynamic
    /// branches were not yet tried, with the unconsumed path restored.
    ///
    /// A separator in the request is tolerated wherever the matching
    /// literal edge does not itself expect one, so `/users/` resolves like
    /// `/users`.
    pub(crate) fn find(&self, path: &str) -> Option<(&Endpoint, Parameters)> {
        let mut cur = &self.root;
        let mut p = path;
        let mut values: Vec<&str> = Vec::new();
        let mut stack: Vec<Frame<'_, '_>> = Vec::new();
        // Mid-edge state: a partially consumed edge keeps `cur` at the
        // junction, remembers the edge label, and tracks how far into the
        // edge prefix the walk has matched.
        let mut deferred: Option<u8> = None;
        let mut start = 0usize;

        loop {
            // Separator tolerance: drop leading slashes unless the literal
            // continuation expects one (joined literal runs embed `/`).
            let expects_slash = match deferred {
                Some(label) => cur
                    .children
                    .get(&label)
                    .is_some_and(|c| c.prefix.as_bytes().get(start) == Some(&b'/')),
                None => cur.children.contains_key(&b'/'),
            };
            if !expects_slash {
                while let Some(rest) = p.strip_prefix('/') {
                    p = rest;
                }
            }

            if p.is_empty() {
                if let Some(endpoint) = cur.endpoint.as_ref() {
                    let mut params = Parameters::new();
                    for (key, value) in endpoint.param_keys.iter().zip(&values) {
                        params.insert(key.clone(), (*value).to_owned());
                    }
                    return Some((endpoint, params));
                }
                // No terminal here; resume an untried branch below.
            } else {
                let label = deferred.unwrap_or(p.as_bytes()[0]);
                let fresh = deferred.is_none();

                // Literal attempt.
                let mut advanced = false;
                if let Some(child) = cur.children.get(&label) {
                    let lcp = longest_common_prefix(p, &child.prefix[start..]);
                    if lcp > 0 {
                        if fresh {
                            if cur.catch_all.is_some() {
                                stack.push(Frame {
                                    node: cur,
                                    p,
                                    values_len: values.len(),
                                    alt: Alt::CatchAll,
                                });
                            }
                            if cur.param.is_some() {
                                stack.push(Frame {
                                    node: cur,
                                    p,
                                    values_len: values.len(),
                                    alt: Alt::Param,
                                });
                            }
                        }
                        if start + lcp == child.prefix.len() {
                            cur = child;
                            p = &p[lcp..];
                            deferred = None;
                            start = 0;
                        } else {
                            deferred = Some(label);
                            start += lcp;
                            p = &p[lcp..];
                        }
                        advanced = true;
                    }
                }
                if advanced {
                    continue;
                }

                if fresh {
                    // Parameter attempt: capture one segment.
                    if let Some(param) = cur.param.as_deref() {
                        if cur.catch_all.is_some() {
                            stack.push(Frame {
                                node: cur,
                                p,
                                values_len: values.len(),
                                alt: Alt::CatchAll,
                            });
                        }
                        (cur, p) = capture_segment(param, p, &mut values);
                        continue;
                    }
                    // Catch-all attempt: capture the remainder.
                    if let Some(catch_all) = cur.catch_all.as_deref() {
                        (cur, p) = capture_rest(catch_all, p, &mut values);
                        continue;
                    }
                }
                // Dead end; resume an untried branch below.
            }

            // Dead end: resume the nearest junction with a usable branch,
            // path restored to what was unconsumed there.
            loop {
                let frame = stack.pop()?;
                if frame.p.trim_start_matches('/').is_empty() {
                    // Nothing left for a dynamic segment to bind.
                    continue;
                }
                values.truncate(frame.values_len);
                deferred = None;
                start = 0;
                match frame.alt {
                    Alt::Param => {
                        let param = frame.node.param.as_deref()?;
                        (cur, p) = capture_segment(param, frame.p, &mut values);
                    }
                    Alt::CatchAll => {
                        let catch_all = frame.node.catch_all.as_deref()?;
                        (cur, p) = capture_rest(catch_all, frame.p, &mut values);
                    }
                }
                break;
            }
        }
    }

    /// Appends `"METHOD PATH"` strings for every endpoint in this trie.
    pub(crate) fn capture_routes(&self, method_name: &str, out: &mut Vec<String>) {
        capture(&self.root, method_name, out);
    }
}

/// Descends into a parameter child, capturing one slash-delimited segment
/// and consuming its trailing separator.
fn capture_segment<'t, 'p>(
    param: &'t Node,
    p: &'p str,
    values: &mut Vec<&'p str>,
) -> (&'t Node, &'p str) {
    let trimmed = p.trim_start_matches('/');
    match trimmed.find('/') {
        Some(idx) => {
            values.push(&trimmed[..idx]);
            (param, &trimmed[idx + 1..])
        }
        None => {
            values.push(trimmed);
            (param, "")
        }
    }
}

/// Descends into a catch-all child, capturing the rest of the path minus
/// its leading separator.
fn capture_rest<'t, 'p>(
    catch_all: &'t Node,
    p: &'p str,
    values: &mut Vec<&'p str>,
) -> (&'t Node, &'p str) {
    values.push(p.trim_start_matches('/'));
    (catch_all, "")
}

/// Walks or extends the trie along one literal token, splitting existing
/// edges where the token diverges from them mid-prefix.
fn descend_literal<'n>(mut cur: &'n mut Node, token: &str) -> &'n mut Node {
    use std::collections::hash_map::Entry;

    let mut search = token;
    while !search.is_empty() {
        let label = search.as_bytes()[0];
        match cur.children.entry(label) {
            Entry::Vacant(slot) => {
                cur = slot.insert(Node::new(NodeKind::Static, search));
                search = "";
            }
            Entry::Occupied(slot) => {
                let next = slot.into_mut();
                let lcp = longest_common_prefix(search, &next.prefix);
                if lcp == next.prefix.len() {
                    // Edge fully shared; keep descending.
                    cur = next;
                    search = &search[lcp..];
                    continue;
                }

                // Divergence inside the edge: cut it at the common prefix.
                // The existing node keeps the shared prefix; its contents
                // move into a new tail node reattached underneath.
                let tail_prefix = next.prefix.split_off(lcp);
                let mut tail = Node::new(NodeKind::Static, &tail_prefix);
                std::mem::swap(&mut tail.children, &mut next.children);
                tail.param = next.param.take();
                tail.catch_all = next.catch_all.take();
                tail.endpoint = next.endpoint.take();
                next.children.insert(tail_prefix.as_bytes()[0], tail);

                if lcp < search.len() {
                    // The new route continues past the divergence point.
                    let rest = &search[lcp..];
                    cur = next
                        .children
                        .entry(rest.as_bytes()[0])
                        .or_insert_with(|| Node::new(NodeKind::Static, rest));
                } else {
                    // The new route ends exactly at the divergence point.
                    cur = next;
                }
                search = "";
            }
        }
    }
    cur
}

fn capture(node: &Node, method_name: &str, out: &mut Vec<String>) {
    if let Some(endpoint) = &node.endpoint {
        out.push(format!("{method_name} {}", endpoint.full_path));
    }
    if let Some(param) = node.param.as_deref() {
        capture(param, method_name, out);
    }
    if let Some(catch_all) = node.catch_all.as_deref() {
        capture(catch_all, method_name, out);
    }
    for child in node.children.values() {
        capture(child, method_name, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::http::{Response, StatusCode};
    use std::sync::Arc;

    fn handler(tag: &'static str) -> Handler {
        Arc::new(move |_ctx: Context| {
            Box::pin(async move { Response::new(StatusCode::Ok).body(tag) })
        })
    }

    fn tree_with(routes: &[&str]) -> Tree {
        let mut tree = Tree::new();
        for route in routes {
            tree.insert(route, handler("x"));
        }
        tree
    }

    fn matched_path(tree: &Tree, path: &str) -> Option<String> {
        tree.find(path).map(|(e, _)| e.full_path.clone())
    }

    fn matched_params(tree: &Tree, path: &str) -> Parameters {
        tree.find(path).map(|(_, p)| p).unwrap_or_default()
    }

    #[test]
    fn static_route_hit_and_miss() {
        let tree = tree_with(&["/users"]);
        assert_eq!(matched_path(&tree, "/users").as_deref(), Some("/users"));
        assert!(tree.find("/posts").is_none());
        assert!(tree.find("/users/7").is_none());
    }

    #[test]
    fn root_route() {
        let tree = tree_with(&["/"]);
        assert_eq!(matched_path(&tree, "/").as_deref(), Some("/"));
    }

    #[test]
    fn overlapping_static_routes_split_edges() {
        let tree = tree_with(&["/users", "/user", "/usage"]);
        assert_eq!(matched_path(&tree, "/users").as_deref(), Some("/users"));
        assert_eq!(matched_path(&tree, "/user").as_deref(), Some("/user"));
        assert_eq!(matched_path(&tree, "/usage").as_deref(), Some("/usage"));
        assert!(tree.find("/us").is_none());
    }

    #[test]
    fn split_preserves_descendants() {
        // Registering /team then /test cuts the "te" edge; the original
        // subtree must survive under the tail.
        let tree = tree_with(&["/team/alpha", "/test"]);
        assert_eq!(
            matched_path(&tree, "/team/alpha").as_deref(),
            Some("/team/alpha")
        );
        assert_eq!(matched_path(&tree, "/test").as_deref(), Some("/test"));
        assert!(tree.find("/te").is_none());
    }

    #[test]
    fn prefix_route_can_also_be_terminal() {
        let tree = tree_with(&["/users", "/users/active"]);
        assert_eq!(matched_path(&tree, "/users").as_deref(), Some("/users"));
        assert_eq!(
            matched_path(&tree, "/users/active").as_deref(),
            Some("/users/active")
        );
    }

    #[test]
    fn param_extraction() {
        let tree = tree_with(&["/users/:id"]);
        let params = matched_params(&tree, "/users/123");
        assert_eq!(params.get("id"), Some("123"));
        assert!(tree.find("/users").is_none());
    }

    #[test]
    fn multi_param_extraction() {
        let tree = tree_with(&["/users/:id/posts/:post_id"]);
        let params = matched_params(&tree, "/users/7/posts/99");
        assert_eq!(params.get("id"), Some("7"));
        assert_eq!(params.get("post_id"), Some("99"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn catch_all_captures_remainder() {
        let tree = tree_with(&["/files/*"]);
        let params = matched_params(&tree, "/files/a/b/c");
        assert_eq!(params.get("*"), Some("a/b/c"));
    }

    #[test]
    fn catch_all_value_excludes_leading_slash() {
        let tree = tree_with(&["/files/*"]);
        let params = matched_params(&tree, "/files/readme.txt");
        assert_eq!(params.get("*"), Some("readme.txt"));
    }

    #[test]
    fn priority_literal_over_param_over_catch_all() {
        let tree = tree_with(&["/a/b", "/a/:x", "/a/*"]);

        assert_eq!(matched_path(&tree, "/a/b").as_deref(), Some("/a/b"));

        let (endpoint, params) = tree.find("/a/c").unwrap();
        assert_eq!(endpoint.full_path, "/a/:x");
        assert_eq!(params.get("x"), Some("c"));

        let (endpoint, params) = tree.find("/a/c/d").unwrap();
        assert_eq!(endpoint.full_path, "/a/*");
        assert_eq!(params.get("*"), Some("c/d"));
    }

    #[test]
    fn dead_end_backtracks_to_catch_all() {
        let tree = tree_with(&["/a/:x/edit", "/a/*"]);
        // The param branch consumes "c" but dead-ends at "view"; the walk
        // must resume at the catch-all with the full remainder.
        let (endpoint, params) = tree.find("/a/c/view").unwrap();
        assert_eq!(endpoint.full_path, "/a/*");
        assert_eq!(params.get("*"), Some("c/view"));

        let (endpoint, params) = tree.find("/a/c/edit").unwrap();
        assert_eq!(endpoint.full_path, "/a/:x/edit");
        assert_eq!(params.get("x"), Some("c"));
    }

    #[test]
    fn partial_edge_falls_back_to_param_with_full_segment() {
        let tree = tree_with(&["/a/bc", "/a/:x"]);
        let (endpoint, params) = tree.find("/a/bd").unwrap();
        assert_eq!(endpoint.full_path, "/a/:x");
        assert_eq!(params.get("x"), Some("bd"));
    }

    #[test]
    fn trailing_slash_does_not_bind_empty_param() {
        let tree = tree_with(&["/a/b", "/a/:x"]);
        assert!(tree.find("/a/").is_none());
    }

    #[test]
    fn literal_interleaved_with_params() {
        let tree = tree_with(&["/api/v1/users/:id/settings"]);
        let params = matched_params(&tree, "/api/v1/users/42/settings");
        assert_eq!(params.get("id"), Some("42"));
        assert!(tree.find("/api/v1/users/42").is_none());
    }

    #[test]
    fn trailing_slash_tolerated_on_requests() {
        let tree = tree_with(&["/users", "/users/:id"]);
        assert_eq!(matched_path(&tree, "/users/").as_deref(), Some("/users"));
        let params = matched_params(&tree, "/users/9/");
        assert_eq!(params.get("id"), Some("9"));
    }

    #[test]
    fn registration_strips_trailing_slash() {
        let tree = tree_with(&["/users/"]);
        assert_eq!(matched_path(&tree, "/users").as_deref(), Some("/users"));
    }

    #[test]
    fn doubled_slash_in_request_is_tolerated() {
        let tree = tree_with(&["/api/users"]);
        assert_eq!(
            matched_path(&tree, "/api//users").as_deref(),
            Some("/api/users")
        );
    }

    #[test]
    fn invalid_patterns_are_dropped() {
        let tree = tree_with(&["/users/:", "/files/*name", "/a/:x/:y"]);
        let mut routes = Vec::new();
        tree.capture_routes("GET", &mut routes);
        assert!(routes.is_empty());
        assert!(tree.find("/users/1").is_none());
    }

    #[tokio::test]
    async fn reregistration_replaces_handler_in_place() {
        let mut tree = Tree::new();
        tree.insert("/x", handler("first"));
        tree.insert("/x", handler("second"));

        let mut routes = Vec::new();
        tree.capture_routes("GET", &mut routes);
        assert_eq!(routes, vec!["GET /x"]);

        let (endpoint, _) = tree.find("/x").unwrap();
        let request = crate::http::Request::parse(b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n")
            .unwrap()
            .0;
        let response = (endpoint.handler)(Context::new(request)).await;
        assert_eq!(response.body_ref(), b"second");
    }

    #[test]
    fn capture_routes_lists_every_endpoint_once() {
        let tree = tree_with(&["/users", "/users/:id", "/files/*", "/"]);
        let mut routes = Vec::new();
        tree.capture_routes("GET", &mut routes);
        routes.sort();
        assert_eq!(
            routes,
            vec!["GET /", "GET /files/*", "GET /users", "GET /users/:id"]
        );
    }

    #[test]
    fn param_node_keys_live_on_the_terminal() {
        // Two routes share one param node but carry different key lists;
        // extraction must use the terminal's list.
        let tree = tree_with(&["/a/:x", "/a/:y/b"]);
        let params = matched_params(&tree, "/a/7");
        assert_eq!(params.get("x"), Some("7"));
        let params = matched_params(&tree, "/a/7/b");
        assert_eq!(params.get("y"), Some("7"));
    }
}
