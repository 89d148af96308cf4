//! Structural validation of rule flow graphs.
//!
//! The graph is stored opaquely and interpreted only by an external
//! executor; this module checks shape (nodes with id/type, edges with
//! source/target) and nothing else.

use crate::error::{BillingError, BillingResult};
use error_common::Entity;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Deserialize)]
pub struct FlowData {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

/// Check that a flow document has the expected shape. The original value is
/// stored verbatim on success; its semantics are never inspected here.
pub fn validate_flow_data(value: &serde_json::Value) -> BillingResult<()> {
    let flow: FlowData = serde_json::from_value(value.clone()).map_err(|e| {
        BillingError::validation(
            Entity::Rule,
            format!("flowData must be a graph of nodes and edges: {}", e),
        )
    })?;

    for edge in &flow.edges {
        let known = |id: &str| flow.nodes.iter().any(|n| n.id == id);
        if !known(&edge.source) || !known(&edge.target) {
            return Err(BillingError::validation(
                Entity::Rule,
                format!("flowData edge {} references an unknown node", edge.id),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_well_formed_graph() {
        let value = json!({
            "nodes": [
                {"id": "1", "type": "trigger", "data": {"label": "Visit Scheduled"}},
                {"id": "2", "type": "action", "data": {"label": "Check Eligibility"}}
            ],
            "edges": [{"id": "e1-2", "source": "1", "target": "2"}]
        });
        assert!(validate_flow_data(&value).is_ok());
    }

    #[test]
    fn rejects_missing_sections() {
        let value = json!({"nodes": []});
        assert!(matches!(
            validate_flow_data(&value),
            Err(BillingError::Validation { .. })
        ));
    }

    #[test]
    fn rejects_dangling_edges() {
        let value = json!({
            "nodes": [{"id": "1", "type": "trigger"}],
            "edges": [{"id": "e1-9", "source": "1", "target": "9"}]
        });
        assert!(matches!(
            validate_flow_data(&value),
            Err(BillingError::Validation { .. })
        ));
    }
}
