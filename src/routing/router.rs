//! Route lookup.
//!
//! # Responsibilities
//! - Store the compiled prefix table
//! - Map an inbound path (and query) to a service and its local path
//! - Return an explicit no-match rather than a silent default
//!
//! # Design Decisions
//! - Immutable after construction; hot reload swaps the whole table
//! - O(n) prefix scan, first match wins in declaration order

use crate::config::RouteConfig;
use crate::routing::matcher::PrefixRule;

/// Where an inbound request should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub service: String,
    /// Rewritten path with the original query string, e.g. "/items/42?x=1".
    pub path_and_query: String,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<PrefixRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<PrefixRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(routes: &[RouteConfig]) -> Self {
        Self::new(routes.iter().map(PrefixRule::from).collect())
    }

    pub fn resolve(&self, path: &str, query: Option<&str>) -> Option<RouteTarget> {
        self.rules.iter().find_map(|rule| {
            let mut path_and_query = rule.rewrite(path)?;
            if let Some(query) = query.filter(|q| !q.is_empty()) {
                path_and_query.push('?');
                path_and_query.push_str(query);
            }
            Some(RouteTarget {
                service: rule.service().to_string(),
                path_and_query,
            })
        })
    }

    pub fn rules(&self) -> &[PrefixRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
