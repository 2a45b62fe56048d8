//! JMESPath response rewriting.
//!
//! The expression is compiled once at route load. JSON responses are
//! decoded, the expression applied, and the body replaced; array results can
//! be wrapped as `{"collection": [...]}`. Non-JSON responses and any decode
//! or evaluation failure pass the original body through untouched.

use bytes::Bytes;
use jmespath::{Expression, Variable};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JmesPathConfig {
    pub expression: String,
    /// Wrap array results in `{"collection": [...]}`.
    #[serde(default)]
    pub wrap_collection: bool,
}

pub struct JmesPathRewriter {
    source: String,
    expression: Expression<'static>,
    wrap_collection: bool,
}

impl JmesPathRewriter {
    pub fn new(config: &JmesPathConfig) -> Result<Self, String> {
        let expression = jmespath::compile(&config.expression)
            .map_err(|e| format!("invalid JMESPath expression '{}': {}", config.expression, e))?;
        Ok(Self {
            source: config.expression.clone(),
            expression,
            wrap_collection: config.wrap_collection,
        })
    }

    pub fn expression(&self) -> &str {
        &self.source
    }

    /// Rewrites a JSON body; `None` means pass-through.
    pub fn apply(&self, content_type: Option<&str>, body: &Bytes) -> Option<Bytes> {
        if !is_json(content_type?) {
            return None;
        }
        let text = std::str::from_utf8(body).ok()?;
        let data = Variable::from_json(text).ok()?;
        let result = self.expression.search(data).ok()?;
        let mut rewritten = serde_json::to_value(&*result).ok()?;
        if self.wrap_collection && rewritten.is_array() {
            rewritten = serde_json::json!({ "collection": rewritten });
        }
        serde_json::to_vec(&rewritten).ok().map(Bytes::from)
    }
}

fn is_json(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence == "text/json"
}
