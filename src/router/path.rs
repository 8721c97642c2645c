//! Route pattern cleaning, tokenization, and validation.
//!
//! A pattern is a `/`-separated sequence of segments. Segments are
//! classified by first byte: `:name` captures one segment, a bare `*`
//! captures the rest of the path, anything else is literal. For insertion
//! the tokenizer joins consecutive literal segments into one token,
//! keeping the `/` between them, so a run of static segments becomes a
//! single compressed edge in the trie.

/// One insertion token produced by [`split_tokens`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// A literal run, possibly spanning several segments (`foo/bar`).
    Literal(String),
    /// A named single-segment capture (`:id` — the name, without `:`).
    Param(String),
    /// The trailing catch-all (`*`).
    CatchAll,
}

/// Normalizes a pattern or prefix: strips leading/trailing slashes, drops
/// empty segments from repeated slashes, and re-roots the result.
///
/// `clean_path("//api//v1/")` is `"/api/v1"`; the bare root cleans to `"/"`.
pub(crate) fn clean_path(p: &str) -> String {
    let joined = p
        .split('/')
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{joined}")
}

/// Splits a cleaned pattern into insertion tokens, joining consecutive
/// literal segments with their separating `/`. The root pattern `"/"`
/// yields no tokens (the endpoint lands on the trie root).
pub(crate) fn split_tokens(p: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut run = String::new();

    for seg in p.split('/').filter(|seg| !seg.is_empty()) {
        match seg.as_bytes()[0] {
            b':' => {
                flush_literal_run(&mut tokens, &mut run);
                tokens.push(Token::Param(seg[1..].to_owned()));
            }
            b'*' => {
                flush_literal_run(&mut tokens, &mut run);
                tokens.push(Token::CatchAll);
            }
            _ => {
                if !run.is_empty() {
                    run.push('/');
                }
                run.push_str(seg);
            }
        }
    }
    flush_literal_run(&mut tokens, &mut run);
    tokens
}

fn flush_literal_run(tokens: &mut Vec<Token>, run: &mut String) {
    if !run.is_empty() {
        tokens.push(Token::Literal(std::mem::take(run)));
    }
}

/// Validates a cleaned pattern against the registration rules:
///
/// - no two adjacent dynamic segments (param or catch-all),
/// - a catch-all only as the final segment, spelled exactly `*`,
/// - parameter names unique within the pattern and shaped like
///   identifiers (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// Invalid patterns are dropped by the inserter; the route never goes live.
pub(crate) fn is_valid_pattern(p: &str) -> bool {
    let segments: Vec<&str> = p.split('/').filter(|seg| !seg.is_empty()).collect();
    let mut seen_names: Vec<&str> = Vec::new();
    let mut prev_dynamic = false;

    for (i, seg) in segments.iter().enumerate() {
        match seg.as_bytes()[0] {
            b':' => {
                let name = &seg[1..];
                if prev_dynamic || !is_valid_param_name(name) || seen_names.contains(&name) {
                    return false;
                }
                seen_names.push(name);
                prev_dynamic = true;
            }
            b'*' => {
                if prev_dynamic || *seg != "*" || i != segments.len() - 1 {
                    return false;
                }
                prev_dynamic = true;
            }
            _ => prev_dynamic = false,
        }
    }
    true
}

fn is_valid_param_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Length of the longest common prefix of two byte strings.
pub(crate) fn longest_common_prefix(a: &str, b: &str) -> usize {
    a.bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_path_normalizes() {
        assert_eq!(clean_path("/users/"), "/users");
        assert_eq!(clean_path("users"), "/users");
        assert_eq!(clean_path("//api//v1/"), "/api/v1");
        assert_eq!(clean_path("/"), "/");
        assert_eq!(clean_path(""), "/");
    }

    #[test]
    fn literal_runs_join_with_separator() {
        assert_eq!(
            split_tokens("/foo/bar"),
            vec![Token::Literal("foo/bar".to_owned())]
        );
        assert_eq!(
            split_tokens("/foo/:id/bar/baz"),
            vec![
                Token::Literal("foo".to_owned()),
                Token::Param("id".to_owned()),
                Token::Literal("bar/baz".to_owned()),
            ]
        );
    }

    #[test]
    fn root_has_no_tokens() {
        assert!(split_tokens("/").is_empty());
    }

    #[test]
    fn catch_all_token() {
        assert_eq!(
            split_tokens("/files/*"),
            vec![Token::Literal("files".to_owned()), Token::CatchAll]
        );
    }

    #[test]
    fn rejects_malformed_patterns() {
        for p in [
            "/users/:123id",
            "/users/:user@id",
            "/users/:",
            "/users/:id/:name",
            "/users/*/posts",
            "/files/*filename",
            "/files/*/*",
            "/files/*/:id",
        ] {
            assert!(!is_valid_pattern(p), "{p} should be rejected");
        }
    }

    #[test]
    fn accepts_well_formed_patterns() {
        for p in [
            "/",
            "/users",
            "/users/:id",
            "/users/:userID",
            "/users/:user_id",
            "/users/:id/posts/:post_id",
            "/files/*",
            "/a/:b/c/:d/e",
        ] {
            assert!(is_valid_pattern(p), "{p} should be accepted");
        }
    }

    #[test]
    fn duplicate_param_names_rejected() {
        assert!(!is_valid_pattern("/a/:id/b/:id"));
        assert!(is_valid_pattern("/a/:id/b/:name"));
    }

    #[test]
    fn common_prefix_length() {
        assert_eq!(longest_common_prefix("users", "user"), 4);
        assert_eq!(longest_common_prefix("abc", "abc"), 3);
        assert_eq!(longest_common_prefix("abc", "xyz"), 0);
        assert_eq!(longest_common_prefix("", "abc"), 0);
    }
}
