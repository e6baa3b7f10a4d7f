//! Capability negotiation types exchanged during `initialize`.
//!
//! Each nested flag is an independent capability gate (§3): the presence of
//! a field (not its truthiness) is what advertises the feature, mirroring
//! the MCP wire format where e.g. `"tools": {}` means "tools supported, no
//! sub-features" and the key's absence means "not supported at all".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use lucentmcp_types::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<ElicitationCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingCapability {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootsCapability {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElicitationCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListChangedCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListChangedCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<CompletionsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListChangedCapability {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcesCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingCapability {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionsCapability {}

/// Which MCP capability gate a given method belongs to, used by the peer
/// engine's strict-mode local pre-flight check (§4.2) and by inbound
/// dispatch's "target an unadvertised capability" rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityGate {
    ServerTools,
    ServerResources,
    ServerPrompts,
    ServerLogging,
    ServerCompletions,
    ClientSampling,
    ClientRoots,
    ClientElicitation,
    /// Methods with no capability gate (e.g. `ping`, `initialize` itself).
    None,
}

impl CapabilityGate {
    pub fn for_method(method: &str) -> Self {
        match method {
            "tools/list" | "tools/call" => Self::ServerTools,
            "resources/list" | "resources/read" | "resources/subscribe" | "resources/unsubscribe"
            | "resources/templates/list" => Self::ServerResources,
            "prompts/list" | "prompts/get" => Self::ServerPrompts,
            "logging/setLevel" => Self::ServerLogging,
            "completion/complete" => Self::ServerCompletions,
            "sampling/createMessage" => Self::ClientSampling,
            "roots/list" => Self::ClientRoots,
            "elicitation/create" => Self::ClientElicitation,
            _ => Self::None,
        }
    }

    /// Is this gate satisfied by the given negotiated capability pair?
    pub fn satisfied(&self, client: &ClientCapabilities, server: &ServerCapabilities) -> bool {
        match self {
            Self::ServerTools => server.tools.is_some(),
            Self::ServerResources => server.resources.is_some(),
            Self::ServerPrompts => server.prompts.is_some(),
            Self::ServerLogging => server.logging.is_some(),
            Self::ServerCompletions => server.completions.is_some(),
            Self::ClientSampling => client.sampling.is_some(),
            Self::ClientRoots => client.roots.is_some(),
            Self::ClientElicitation => client.elicitation.is_some(),
            Self::None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_rejects_unadvertised_server_capability() {
        let client = ClientCapabilities::default();
        let server = ServerCapabilities::default();
        assert!(!CapabilityGate::ServerTools.satisfied(&client, &server));
    }

    #[test]
    fn gate_accepts_advertised_capability() {
        let client = ClientCapabilities::default();
        let mut server = ServerCapabilities::default();
        server.tools = Some(ListChangedCapability { list_changed: Some(true) });
        assert!(CapabilityGate::ServerTools.satisfied(&client, &server));
    }

    #[test]
    fn ping_has_no_gate() {
        assert_eq!(CapabilityGate::for_method("ping"), CapabilityGate::None);
    }
}
