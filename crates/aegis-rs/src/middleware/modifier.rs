//! Declarative request/response modifier rules.
//!
//! Each rule has a type, an optional condition, an optional else branch, a
//! scope (`request | response | both`) and a priority. Rules are stably
//! sorted by descending priority at load, so declaration order decides ties.
//! Conditions are hermetic: they read only the request, never the response.

use crate::middleware::context::{CapturedResponse, RequestCtx};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierType {
    /// Set a header to a fixed value.
    HeaderSet,
    /// Copy one request header into another header.
    HeaderCopy,
    /// Set a cookie (request `Cookie` pair or response `Set-Cookie`).
    Cookie,
    /// Set or override a query parameter.
    Query,
    /// Save the original URL into a header.
    Stash,
    /// Override the upstream port.
    Port,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierScope {
    Request,
    Response,
    Both,
}

impl Default for ModifierScope {
    fn default() -> Self {
        ModifierScope::Request
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModifierCondition {
    /// Existence check on a request header.
    #[serde(default)]
    pub header: Option<String>,
    /// Existence check on a request cookie.
    #[serde(default)]
    pub cookie: Option<String>,
    /// Existence check on a query parameter.
    #[serde(default)]
    pub query: Option<String>,
    /// Regex the found value must match (with header/cookie/query).
    #[serde(default)]
    pub matches: Option<String>,
    /// Regex on the request path, independent of the other checks.
    #[serde(default)]
    pub path_regex: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierRule {
    #[serde(rename = "type")]
    pub kind: ModifierType,
    /// Header/cookie/query name for set-style rules, or the stash target
    /// header (default `X-Original-URL`).
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    /// Source header for `header_copy`.
    #[serde(default)]
    pub from: Option<String>,
    /// Destination header for `header_copy`.
    #[serde(default)]
    pub to: Option<String>,
    /// Upstream port for `port`.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub condition: Option<ModifierCondition>,
    /// Applied when the condition does not hold.
    #[serde(default, rename = "else")]
    pub otherwise: Option<Box<ModifierRule>>,
    #[serde(default)]
    pub scope: ModifierScope,
    #[serde(default)]
    pub priority: i32,
}

impl ModifierRule {
    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            ModifierType::HeaderSet | ModifierType::Cookie | ModifierType::Query => {
                if self.name.is_none() || self.value.is_none() {
                    return Err(format!("{:?} rule requires 'name' and 'value'", self.kind));
                }
            }
            ModifierType::HeaderCopy => {
                if self.from.is_none() || self.to.is_none() {
                    return Err("header_copy rule requires 'from' and 'to'".to_string());
                }
            }
            ModifierType::Stash => {}
            ModifierType::Port => {
                if self.port.is_none() {
                    return Err("port rule requires 'port'".to_string());
                }
            }
        }
        if let Some(cond) = &self.condition {
            for pattern in [cond.matches.as_ref(), cond.path_regex.as_ref()]
                .into_iter()
                .flatten()
            {
                Regex::new(pattern).map_err(|e| format!("invalid modifier regex: {}", e))?;
            }
        }
        if let Some(other) = &self.otherwise {
            other.validate()?;
        }
        Ok(())
    }
}

struct CompiledCondition {
    header: Option<String>,
    cookie: Option<String>,
    query: Option<String>,
    matches: Option<Regex>,
    path_regex: Option<Regex>,
}

struct CompiledRule {
    rule: ModifierRule,
    condition: Option<CompiledCondition>,
    otherwise: Option<Box<CompiledRule>>,
}

/// Rules compiled and sorted once per route.
pub struct ModifierChain {
    rules: Vec<CompiledRule>,
}

impl ModifierChain {
    pub fn new(mut rules: Vec<ModifierRule>) -> Result<Self, String> {
        for rule in &rules {
            rule.validate()?;
        }
        // Stable by construction: equal priorities keep declaration order.
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        let compiled = rules
            .into_iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Self { rules: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Request-phase application for rules scoped `request` or `both`.
    pub fn apply_request(&self, ctx: &mut RequestCtx) {
        for rule in &self.rules {
            if matches!(
                rule.rule.scope,
                ModifierScope::Request | ModifierScope::Both
            ) {
                apply(rule, ctx, None);
            }
        }
    }

    /// Response-phase application for rules scoped `response` or `both`.
    pub fn apply_response(&self, ctx: &mut RequestCtx, resp: &mut CapturedResponse) {
        for rule in &self.rules {
            if matches!(
                rule.rule.scope,
                ModifierScope::Response | ModifierScope::Both
            ) {
                apply(rule, ctx, Some(&mut *resp));
            }
        }
    }
}

fn compile_rule(rule: ModifierRule) -> Result<CompiledRule, String> {
    let condition = match &rule.condition {
        Some(cond) => Some(CompiledCondition {
            header: cond.header.clone(),
            cookie: cond.cookie.clone(),
            query: cond.query.clone(),
            matches: cond
                .matches
                .as_ref()
                .map(|p| Regex::new(p).map_err(|e| e.to_string()))
                .transpose()?,
            path_regex: cond
                .path_regex
                .as_ref()
                .map(|p| Regex::new(p).map_err(|e| e.to_string()))
                .transpose()?,
        }),
        None => None,
    };
    let otherwise = match rule.otherwise.clone() {
        Some(inner) => Some(Box::new(compile_rule(*inner)?)),
        None => None,
    };
    Ok(CompiledRule {
        rule,
        condition,
        otherwise,
    })
}

/// Condition evaluation reads the request only.
fn condition_holds(condition: &CompiledCondition, ctx: &RequestCtx) -> bool {
    if let Some(path_regex) = &condition.path_regex {
        if !path_regex.is_match(&ctx.path) {
            return false;
        }
    }
    let source = ctx.key_source();
    let subject = if let Some(name) = &condition.header {
        match source.header(name) {
            Some(v) => Some(v),
            None => return false,
        }
    } else if let Some(name) = &condition.cookie {
        match source.cookie(name) {
            Some(v) => Some(v),
            None => return false,
        }
    } else if let Some(name) = &condition.query {
        match source.query_param(name) {
            Some(v) => Some(v),
            None => return false,
        }
    } else {
        None
    };
    match (&condition.matches, subject) {
        (Some(regex), Some(value)) => regex.is_match(&value),
        (Some(_), None) => true,
        _ => true,
    }
}

fn apply(rule: &CompiledRule, ctx: &mut RequestCtx, resp: Option<&mut CapturedResponse>) {
    if let Some(condition) = &rule.condition {
        if !condition_holds(condition, ctx) {
            if let Some(other) = &rule.otherwise {
                apply(other, ctx, resp);
            }
            return;
        }
    }
    perform(&rule.rule, ctx, resp);
}

fn perform(rule: &ModifierRule, ctx: &mut RequestCtx, resp: Option<&mut CapturedResponse>) {
    use actix_web::http::header::{HeaderName, HeaderValue};
    match rule.kind {
        ModifierType::HeaderSet => {
            let (Some(name), Some(value)) = (&rule.name, &rule.value) else {
                return;
            };
            match resp {
                Some(resp) => resp.insert_header(name, value),
                None => {
                    if let (Ok(name), Ok(value)) = (
                        HeaderName::from_bytes(name.as_bytes()),
                        HeaderValue::from_str(value),
                    ) {
                        ctx.headers.insert(name, value);
                    }
                }
            }
        }
        ModifierType::HeaderCopy => {
            let (Some(from), Some(to)) = (&rule.from, &rule.to) else {
                return;
            };
            let Some(value) = ctx.header(from).map(|v| v.to_string()) else {
                return;
            };
            match resp {
                Some(resp) => resp.insert_header(to, &value),
                None => {
                    if let (Ok(name), Ok(value)) = (
                        HeaderName::from_bytes(to.as_bytes()),
                        HeaderValue::from_str(&value),
                    ) {
                        ctx.headers.insert(name, value);
                    }
                }
            }
        }
        ModifierType::Cookie => {
            let (Some(name), Some(value)) = (&rule.name, &rule.value) else {
                return;
            };
            match resp {
                Some(resp) => {
                    let header = HeaderName::from_static("set-cookie");
                    if let Ok(value) = HeaderValue::from_str(&format!("{}={}", name, value)) {
                        resp.headers.append(header, value);
                    }
                }
                None => {
                    let pair = format!("{}={}", name, value);
                    let merged = match ctx.header("cookie") {
                        Some(existing) => format!("{}; {}", existing, pair),
                        None => pair,
                    };
                    if let Ok(value) = HeaderValue::from_str(&merged) {
                        ctx.headers
                            .insert(HeaderName::from_static("cookie"), value);
                    }
                }
            }
        }
        ModifierType::Query => {
            // Request-side only: rewrites the forwarded query string.
            if resp.is_some() {
                return;
            }
            let (Some(name), Some(value)) = (&rule.name, &rule.value) else {
                return;
            };
            let mut pairs: Vec<String> = ctx
                .query
                .split('&')
                .filter(|p| !p.is_empty() && p.split('=').next() != Some(name.as_str()))
                .map(|p| p.to_string())
                .collect();
            pairs.push(format!("{}={}", name, value));
            ctx.query = pairs.join("&");
        }
        ModifierType::Stash => {
            if resp.is_some() {
                return;
            }
            let header = rule.name.as_deref().unwrap_or("X-Original-URL");
            let original = ctx.original_url.clone();
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(header.as_bytes()),
                HeaderValue::from_str(&original),
            ) {
                ctx.headers.insert(name, value);
            }
        }
        ModifierType::Port => {
            if resp.is_some() {
                return;
            }
            ctx.port_override = rule.port;
        }
    }
}
