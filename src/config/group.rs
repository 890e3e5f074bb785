//! Group membership rules.

use gridmap_types::NodeType;
use serde::{Deserialize, Serialize};

use super::glob::glob_match;

/// Picks nodes by name pattern, type pattern and literal name prefix.
///
/// An empty field places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Selector {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub prefix: String,
}

impl Selector {
    /// Selector for a name pattern of any type.
    pub fn name(pattern: impl Into<String>) -> Self {
        Self {
            name: pattern.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, pattern: impl Into<String>) -> Self {
        self.node_type = pattern.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn matches(&self, name: &str, node_type: NodeType) -> bool {
        if !name.starts_with(&self.prefix) {
            return false;
        }
        if !self.name.is_empty() && !glob_match(name, &self.name) {
            return false;
        }
        self.node_type.is_empty() || glob_match(node_type.as_str(), &self.node_type)
    }
}

/// A named set of leaves that render together inside a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub selectors: Vec<Selector>,
}

impl Group {
    pub fn new(name: impl Into<String>, selectors: Vec<Selector>) -> Self {
        Self {
            name: name.into(),
            selectors,
        }
    }

    /// The group a node falls back to when no configured group claims it.
    ///
    /// Named after the node and selecting that name with any type.
    pub fn singleton(name: &str) -> Self {
        Self::new(name, vec![Selector::name(name)])
    }

    pub fn matches(&self, name: &str, node_type: NodeType) -> bool {
        self.selectors.iter().any(|s| s.matches(name, node_type))
    }
}

/// First group in `groups` claiming the node, in configured order.
pub fn find_group<'a>(groups: &'a [Group], name: &str, node_type: NodeType) -> Option<&'a Group> {
    groups.iter().find(|g| g.matches(name, node_type))
}
