//! REST mapping: pattern compilation and request assembly.
//!
//! Patterns accept `:param` and `{param}` placeholders; each compiles to an
//! anchored regex plus the ordered parameter names. Request assembly merges
//! path parameters, query parameters and the JSON body into one object;
//! dot-separated keys build nested objects.

use bytes::Bytes;
use regex::Regex;
use serde_json::{Map, Value};

/// One compiled mapping, built at route load.
#[derive(Debug, Clone)]
pub struct CompiledMapping {
    pub http_method: String,
    pub regex: Regex,
    pub params: Vec<String>,
    pub service: String,
    pub method: String,
    pub body: Option<String>,
}

impl CompiledMapping {
    /// Path parameters when this mapping matches.
    pub fn capture(&self, method: &str, path: &str) -> Option<Vec<(String, String)>> {
        if !method.eq_ignore_ascii_case(&self.http_method) {
            return None;
        }
        let captures = self.regex.captures(path)?;
        Some(
            self.params
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let value = captures
                        .get(i + 1)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default();
                    (name.clone(), value)
                })
                .collect(),
        )
    }
}

/// Compiles a pattern into an anchored regex and its parameter names.
pub fn compile_pattern(pattern: &str) -> Result<(Regex, Vec<String>), String> {
    if !pattern.starts_with('/') {
        return Err("pattern must start with '/'".to_string());
    }
    let mut regex = String::from("^");
    let mut params = Vec::new();
    for segment in pattern.split('/').skip(1) {
        regex.push('/');
        if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() {
                return Err("':' placeholder needs a name".to_string());
            }
            params.push(name.to_string());
            regex.push_str("([^/]+)");
        } else if segment.starts_with('{') && segment.ends_with('}') && segment.len() > 2 {
            params.push(segment[1..segment.len() - 1].to_string());
            regex.push_str("([^/]+)");
        } else if segment.contains('{') || segment.contains('}') {
            return Err(format!("malformed placeholder in segment '{}'", segment));
        } else {
            regex.push_str(&regex::escape(segment));
        }
    }
    regex.push('$');
    let compiled = Regex::new(&regex).map_err(|e| e.to_string())?;
    Ok((compiled, params))
}

/// Merges path params, query params and body into the RPC request object.
pub fn assemble_request(
    path_params: &[(String, String)],
    query: &str,
    body: &Bytes,
    body_field: Option<&str>,
) -> Value {
    let mut root = Map::new();

    for (name, value) in path_params {
        insert_dot_path(&mut root, name, Value::String(value.clone()));
    }
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let mut it = pair.splitn(2, '=');
        let name = it.next().unwrap_or_default();
        let value = it.next().unwrap_or_default();
        if !name.is_empty() {
            insert_dot_path(&mut root, name, Value::String(value.to_string()));
        }
    }

    if !body.is_empty() {
        if let Ok(parsed) = serde_json::from_slice::<Value>(body) {
            match body_field {
                Some("*") => {
                    if let Value::Object(fields) = parsed {
                        for (key, value) in fields {
                            root.insert(key, value);
                        }
                    }
                }
                Some(field) => {
                    insert_dot_path(&mut root, field, parsed);
                }
                None => {}
            }
        }
    }

    Value::Object(root)
}

/// `a.b.c` creates `{"a":{"b":{"c": value}}}`, merging into existing
/// objects along the way.
fn insert_dot_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut parts = path.split('.').peekable();
    let mut current = root;
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            current.insert(part.to_string(), value);
            return;
        }
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = slot.as_object_mut().expect("just ensured object");
    }
}
