//! Upstream URL construction.

/// Builds the upstream URL for a backend and an already-rewritten path.
///
/// The backend `host` carries the scheme (`http://` or `https://`); the port
/// is appended explicitly so backends behind non-default ports work without
/// extra configuration.
pub fn format_target(host: &str, port: u16, path_and_query: &str) -> String {
    let trimmed = host.trim_end_matches('/');
    if path_and_query.starts_with('/') {
        format!("{}:{}{}", trimmed, port, path_and_query)
    } else {
        format!("{}:{}/{}", trimmed, port, path_and_query)
    }
}

/// Joins a rewritten base path with the remainder of a prefix match.
///
/// `rewrite` replaces the matched prefix, `rest` is whatever followed it.
pub fn join_rewrite(rewrite: &str, rest: &str) -> String {
    let base = rewrite.trim_end_matches('/');
    if rest.is_empty() {
        if base.is_empty() {
            "/".to_string()
        } else {
            base.to_string()
        }
    } else if rest.starts_with('/') {
        format!("{}{}", base, rest)
    } else {
        format!("{}/{}", base, rest)
    }
}
