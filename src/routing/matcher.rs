//! Prefix rule matching and rewriting.
//!
//! # Design Decisions
//! - Prefixes match whole path segments: "/api/items" matches "/api/items"
//!   and "/api/items/42" but not "/api/itemsx"
//! - Path matching is case-sensitive
//! - Trailing slashes on configured prefixes are ignored

use crate::config::RouteConfig;

/// One row of the prefix table: `prefix` is replaced by `rewrite` and the
/// request goes to `service`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRule {
    prefix: String,
    service: String,
    rewrite: String,
}

impl PrefixRule {
    pub fn new(prefix: &str, service: impl Into<String>, rewrite: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            service: service.into(),
            rewrite: rewrite.trim_end_matches('/').to_string(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn prefix(&self) -> &str {
        if self.prefix.is_empty() {
            "/"
        } else {
            &self.prefix
        }
    }

    /// The service-local path for `path`, or `None` if the rule does not apply.
    pub fn rewrite(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(&self.prefix)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }

        let rewritten = format!("{}{}", self.rewrite, rest);
        if rewritten.is_empty() {
            Some("/".to_string())
        } else {
            Some(rewritten)
        }
    }
}

impl From<&RouteConfig> for PrefixRule {
    fn from(config: &RouteConfig) -> Self {
        Self::new(&config.prefix, config.service.clone(), &config.rewrite)
    }
}
