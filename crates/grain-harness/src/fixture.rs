// crates/grain-harness/src/fixture.rs
// ============================================================================
// Module: Flow Fixtures
// Description: Flow definitions submitted to the admin API.
// Purpose: Build or load a node graph and attach a WebSocket output tap.
// Dependencies: rand, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`FlowFixture`] serializes to the admin API flow body:
//! `{ "label", "nodes": [...], "configs": [...] }`. Node ids are generated in
//! the runtime's `xxxxxxxx.xxxxxx` hex format so each fixture is fresh.
//! Invariants:
//! - Node ids are unique within a fixture.
//! - Wires only reference nodes present in the fixture.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::config::host_port;
use crate::error::HarnessError;
use crate::error::HarnessResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Node type of the runtime's WebSocket output node.
pub const WS_OUT_NODE_TYPE: &str = "websocket out";
/// Config node type holding the WebSocket client endpoint.
pub const WS_CLIENT_CONFIG_TYPE: &str = "websocket-client";
/// Maximum fixture file size in bytes.
const MAX_FIXTURE_FILE_SIZE: usize = 1024 * 1024;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One node or config node in a flow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    /// Node identifier.
    pub id: String,
    /// Runtime node type.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Output wiring: one list of target ids per output port.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wires: Vec<Vec<String>>,
    /// Node-specific properties.
    #[serde(flatten)]
    pub props: Map<String, Value>,
}

/// Flow definition submitted to the admin API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowFixture {
    /// Flow tab label.
    pub label: String,
    /// Processing nodes.
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    /// Config nodes.
    #[serde(default)]
    pub configs: Vec<FlowNode>,
}

impl FlowFixture {
    /// Creates an empty fixture.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            nodes: Vec::new(),
            configs: Vec::new(),
        }
    }

    /// Parses a fixture from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Fixture`] when the value is not a flow
    /// definition or has duplicate ids or dangling wires.
    pub fn from_value(value: Value) -> HarnessResult<Self> {
        let fixture: Self = serde_json::from_value(value)
            .map_err(|err| HarnessError::Fixture(format!("invalid flow definition: {err}")))?;
        fixture.validate()?;
        Ok(fixture)
    }

    /// Loads a fixture from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Fixture`] when the file is unreadable, too
    /// large, not JSON, or not a valid flow definition.
    pub fn from_json_file(path: &Path) -> HarnessResult<Self> {
        let bytes = fs::read(path)
            .map_err(|err| HarnessError::Fixture(format!("{}: {err}", path.display())))?;
        if bytes.len() > MAX_FIXTURE_FILE_SIZE {
            return Err(HarnessError::Fixture(format!(
                "{}: fixture exceeds size limit",
                path.display()
            )));
        }
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|err| HarnessError::Fixture(format!("{}: {err}", path.display())))?;
        Self::from_value(value)
    }

    /// Adds a processing node and returns its generated id.
    pub fn add_node(&mut self, node_type: &str, name: &str, props: Map<String, Value>) -> String {
        let id = self.fresh_id();
        self.nodes.push(FlowNode {
            id: id.clone(),
            node_type: node_type.to_string(),
            name: name.to_string(),
            wires: Vec::new(),
            props,
        });
        id
    }

    /// Adds a config node and returns its generated id.
    pub fn add_config(&mut self, node_type: &str, props: Map<String, Value>) -> String {
        let id = self.fresh_id();
        self.configs.push(FlowNode {
            id: id.clone(),
            node_type: node_type.to_string(),
            name: String::new(),
            wires: Vec::new(),
            props,
        });
        id
    }

    /// Wires output `port` of `from` into `to`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Fixture`] when either node is missing.
    pub fn wire(&mut self, from: &str, port: usize, to: &str) -> HarnessResult<()> {
        if self.node(to).is_none() {
            return Err(HarnessError::Fixture(format!("wire target {to} not found")));
        }
        let source = self
            .nodes
            .iter_mut()
            .find(|node| node.id == from)
            .ok_or_else(|| HarnessError::Fixture(format!("wire source {from} not found")))?;
        if source.wires.len() <= port {
            source.wires.resize(port.saturating_add(1), Vec::new());
        }
        if let Some(targets) = source.wires.get_mut(port)
            && !targets.iter().any(|target| target == to)
        {
            targets.push(to.to_string());
        }
        Ok(())
    }

    /// Returns the processing node with the given id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Attaches a WebSocket output tap fed by output 0 of `source`.
    ///
    /// Adds a client config pointing at `ws_url` plus an output node, and
    /// returns the output node id.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Fixture`] when `source` is not in the fixture.
    pub fn attach_ws_tap(&mut self, source: &str, ws_url: &str) -> HarnessResult<String> {
        if self.node(source).is_none() {
            return Err(HarnessError::Fixture(format!("tap source {source} not found")));
        }
        let mut client = Map::new();
        client.insert("path".to_string(), Value::String(ws_url.to_string()));
        client.insert("tls".to_string(), Value::String(String::new()));
        client.insert("wholemsg".to_string(), Value::String("false".to_string()));
        let client_id = self.add_config(WS_CLIENT_CONFIG_TYPE, client);

        let mut out = Map::new();
        out.insert("server".to_string(), Value::String(String::new()));
        out.insert("client".to_string(), Value::String(client_id));
        let out_id = self.add_node(WS_OUT_NODE_TYPE, "harness tap", out);
        self.wire(source, 0, &out_id)?;
        Ok(out_id)
    }

    /// Serializes the fixture into the admin API body.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Fixture`] when serialization fails.
    pub fn to_value(&self) -> HarnessResult<Value> {
        serde_json::to_value(self)
            .map_err(|err| HarnessError::Fixture(format!("serialize fixture: {err}")))
    }

    /// Checks id uniqueness and wire targets.
    fn validate(&self) -> HarnessResult<()> {
        let mut ids = HashSet::new();
        for node in self.nodes.iter().chain(&self.configs) {
            if node.id.trim().is_empty() {
                return Err(HarnessError::Fixture("node with empty id".to_string()));
            }
            if !ids.insert(node.id.as_str()) {
                return Err(HarnessError::Fixture(format!("duplicate node id {}", node.id)));
            }
        }
        for node in &self.nodes {
            for target in node.wires.iter().flatten() {
                if !ids.contains(target.as_str()) {
                    return Err(HarnessError::Fixture(format!(
                        "node {} wires to unknown node {target}",
                        node.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Generates an id not yet used in this fixture.
    fn fresh_id(&self) -> String {
        loop {
            let id = generate_node_id();
            let taken = self.nodes.iter().chain(&self.configs).any(|node| node.id == id);
            if !taken {
                return id;
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Generates a node id in the runtime's `xxxxxxxx.xxxxxx` hex format.
#[must_use]
pub fn generate_node_id() -> String {
    let mut rng = rand::thread_rng();
    let head: u32 = rng.r#gen();
    let tail: u32 = rng.gen_range(0..0x0100_0000);
    format!("{head:08x}.{tail:06x}")
}

/// Builds the WebSocket URL a tap connects to.
#[must_use]
pub fn ws_url(host: &str, port: u16) -> String {
    format!("ws://{}/", host_port(host, port))
}

#[cfg(test)]
#[path = "fixture_tests.rs"]
mod tests;
