//! Descriptors returned by the emulation server

use serde::{Deserialize, Serialize};

/// A backend project. Only the fields the range relies on are modelled;
/// the rest of the server's payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// A virtual node inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: String,
    pub name: String,
    #[serde(default)]
    pub node_type: Option<String>,
    /// "started", "stopped" or "suspended"
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub console: Option<u16>,
    #[serde(default)]
    pub console_host: Option<String>,
    #[serde(default)]
    pub console_type: Option<String>,
}

impl NodeInfo {
    pub fn is_started(&self) -> bool {
        self.status.as_deref() == Some("started")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_payload_ignores_unknown_fields() {
        let raw = r#"{
            "node_id": "n1",
            "name": "fw-1",
            "node_type": "qemu",
            "status": "started",
            "console": 5000,
            "console_host": "10.0.0.5",
            "console_type": "telnet",
            "x": 10, "y": -20, "properties": {"ram": 512}
        }"#;
        let node: NodeInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(node.name, "fw-1");
        assert_eq!(node.console, Some(5000));
        assert!(node.is_started());
    }

    #[test]
    fn test_project_payload_minimal() {
        let project: ProjectInfo =
            serde_json::from_str(r#"{"project_id": "p-1", "name": "lab"}"#).unwrap();
        assert_eq!(project.project_id, "p-1");
        assert!(project.status.is_none());
    }
}
