//! Flow addressing — parses a request path into a structured flow identity.
//!
//! Subscribers address a routing rule with one of two path shapes:
//! `/flow/<namespace>/<name>` for a namespaced flow, or
//! `/clusterflow/<name>` for a cluster-scoped flow. Anything else is a
//! parse error; there is never a partial or best-effort result.

use serde::{Deserialize, Serialize};

/// Path segment selecting a namespaced flow.
const FLOW_SEGMENT: &str = "flow";
/// Path segment selecting a cluster-scoped flow.
const CLUSTER_FLOW_SEGMENT: &str = "clusterflow";

/// Errors from parsing a flow reference path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowParseError {
    /// First path segment is not a known flow kind.
    #[error("unknown flow kind: {0:?}")]
    UnknownKind(String),

    /// Segment count does not match the kind's expected shape.
    #[error("invalid flow path shape: {0:?}")]
    InvalidShape(String),

    /// A namespace or name segment is empty.
    #[error("empty segment in flow path: {0:?}")]
    EmptySegment(String),
}

/// Scope of a log routing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    /// Namespace-scoped routing rule.
    Flow,
    /// Cluster-scoped routing rule (no namespace).
    ClusterFlow,
}

/// Identity of a log routing destination. Immutable once constructed.
///
/// Invariant: `namespace` is empty iff `kind == ClusterFlow`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowReference {
    /// Scope of the referenced rule.
    pub kind: FlowKind,
    /// Namespace of the rule; empty for cluster-scoped flows.
    pub namespace: String,
    /// Name of the rule.
    pub name: String,
}

impl FlowReference {
    /// Build a namespaced flow reference.
    pub fn flow(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: FlowKind::Flow,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build a cluster-scoped flow reference.
    pub fn cluster_flow(name: impl Into<String>) -> Self {
        Self {
            kind: FlowKind::ClusterFlow,
            namespace: String::new(),
            name: name.into(),
        }
    }

    /// Parse a request path into a flow reference.
    ///
    /// The leading `/` is optional. Accepted shapes:
    /// `flow/<namespace>/<name>` and `clusterflow/<name>`.
    pub fn parse(path: &str) -> Result<Self, FlowParseError> {
        let trimmed = path.trim_start_matches('/');
        let segments: Vec<&str> = trimmed.split('/').collect();

        let reference = match segments.as_slice() {
            [FLOW_SEGMENT, namespace, name] => Self::flow(*namespace, *name),
            [CLUSTER_FLOW_SEGMENT, name] => Self::cluster_flow(*name),
            [kind, ..] if *kind != FLOW_SEGMENT && *kind != CLUSTER_FLOW_SEGMENT => {
                return Err(FlowParseError::UnknownKind((*kind).to_string()));
            }
            _ => return Err(FlowParseError::InvalidShape(path.to_string())),
        };

        if reference.name.is_empty()
            || (reference.kind == FlowKind::Flow && reference.namespace.is_empty())
        {
            return Err(FlowParseError::EmptySegment(path.to_string()));
        }

        Ok(reference)
    }
}

impl std::fmt::Display for FlowReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            FlowKind::Flow => write!(f, "flow/{}/{}", self.namespace, self.name),
            FlowKind::ClusterFlow => write!(f, "clusterflow/{}", self.name),
        }
    }
}
