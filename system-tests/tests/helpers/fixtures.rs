// system-tests/tests/helpers/fixtures.rs
// ============================================================================
// Module: Flow Fixtures
// Description: Fixture builders for live-runtime scenarios.
// Purpose: Build fresh flow definitions per test, tapped into the harness.
// Dependencies: grain-harness, serde_json
// ============================================================================

use grain_harness::FlowContext;
use grain_harness::FlowFixture;
use grain_harness::HarnessError;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

/// Node type of the synthetic grain generator.
pub const SPOUT_NODE_TYPE: &str = "funnelGrain";

/// Builds a spout emitting `pushes` video grains, tapped into the harness.
pub fn spout_fixture(context: &FlowContext, pushes: u64) -> Result<FlowFixture, HarnessError> {
    let mut fixture = FlowFixture::new(format!("spout {pushes} pushes"));
    let spout = fixture.add_node(SPOUT_NODE_TYPE, "spout", spout_props(pushes));
    fixture.attach_ws_tap(&spout, &context.ws_url())?;
    Ok(fixture)
}

/// Properties of a synthetic spout node.
fn spout_props(pushes: u64) -> Map<String, Value> {
    let mut props = Map::new();
    props.insert("numPushes".to_string(), json!(pushes));
    props.insert("format".to_string(), json!("video"));
    props.insert("width".to_string(), json!(1920));
    props.insert("height".to_string(), json!(1080));
    props.insert("maxBuffer".to_string(), json!(10));
    props
}
