// SPDX-License-Identifier: MIT OR Apache-2.0
//! The static discovery document served at `/.well-known/agent-card.json`.
//!
//! Built once at startup from [`solver_core::SolverIdentity`] and never
//! touched again: no clock, no entropy, no per-request variation. Declared as
//! a typed struct (not assembled with the `json!` macro) so field order is
//! guaranteed by serde's declaration-order serialization rather than by
//! `serde_json::Map`'s incidental key ordering.

use serde::Serialize;
use solver_core::SolverIdentity;

/// `endpoints` sub-object of the discovery document.
#[derive(Debug, Clone, Serialize)]
pub struct AgentEndpoints {
    /// Liveness endpoint path.
    pub health: String,
    /// Prometheus-format metrics endpoint path.
    pub metrics: String,
    /// Sentinel `"N/A"` — this deployment has no interactive execute endpoint.
    pub execute: String,
}

/// `links` sub-object of the discovery document.
#[derive(Debug, Clone, Serialize)]
pub struct AgentLinks {
    /// Link to human-readable documentation.
    pub documentation: String,
    /// Link to the source repository.
    pub repository: String,
}

/// The `/.well-known/agent-card.json` discovery document.
///
/// Field order here is the wire order: `agentId, name, description, version,
/// capabilities, endpoints, supportedTrust, links, standards`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentCard {
    #[serde(rename = "agentId")]
    agent_id: String,
    name: String,
    description: String,
    version: String,
    capabilities: Vec<String>,
    endpoints: AgentEndpoints,
    #[serde(rename = "supportedTrust")]
    supported_trust: Vec<String>,
    links: AgentLinks,
    standards: Vec<String>,
}

impl AgentCard {
    /// Build the discovery document for `identity`.
    #[must_use]
    pub fn new(identity: &SolverIdentity) -> Self {
        Self {
            agent_id: identity.service.clone(),
            name: "Solver/Executor".to_string(),
            description: "Deterministic off-chain solver/executor for an on-chain accountability protocol".to_string(),
            version: identity.service_version.clone(),
            capabilities: vec!["SAFE_REPORT".to_string()],
            endpoints: AgentEndpoints {
                health: "/healthz".to_string(),
                metrics: "/metrics".to_string(),
                execute: "N/A".to_string(),
            },
            supported_trust: vec!["evidence-manifest-sha256".to_string(), "secp256k1-receipt-signature".to_string()],
            links: AgentLinks {
                documentation: "https://github.com/EffortlessMetrics/solver-core".to_string(),
                repository: "https://github.com/EffortlessMetrics/solver-core".to_string(),
            },
            standards: vec!["rfc8785-adjacent-canonical-json".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_order_matches_the_discovery_document_contract() {
        let card = AgentCard::new(&SolverIdentity {
            service: "solver-core".to_string(),
            service_version: "0.1.0".to_string(),
            git_commit: None,
        });

        // Serialize directly to a string (not via `serde_json::Value`, whose
        // `Map` re-sorts keys without the `preserve_order` feature) so the
        // declaration order serde actually emits on the wire is what's checked.
        let json = serde_json::to_string(&card).unwrap();
        let order = ["agentId", "name", "description", "version", "capabilities", "endpoints", "supportedTrust", "links", "standards"];
        let positions: Vec<usize> = order.iter().map(|k| json.find(&format!("\"{k}\"")).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "fields out of order: {json}");

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["endpoints"]["execute"], serde_json::json!("N/A"));
    }
}
