// system-tests/tests/suites/live_runtime.rs
// ============================================================================
// Module: Live Runtime Tests
// Description: Flow lifecycle scenarios against a running flow runtime.
// Purpose: Validate grains, teardown and staging end to end.
// Dependencies: system-tests helpers, grain-harness
// ============================================================================

//! ## Overview
//! Runs real flows through a runtime reachable at the configured admin port.
//! Harness settings come from `GRAIN_HARNESS_*` variables.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use grain_harness::CompletionReason;
use grain_harness::FlowDriver;
use grain_harness::GrainCollector;
use grain_harness::HarnessConfig;
use grain_harness::download;
use grain_harness::remove_tree;
use serde_json::json;
use system_tests::config::SystemTestConfig;

use crate::helpers::artifacts::TestArtifacts;
use crate::helpers::fixtures::spout_fixture;
use crate::helpers::readiness::wait_for_admin_ready;

/// Loads both config layers and waits for the runtime.
async fn ready_driver(keep_flow: bool) -> (FlowDriver, SystemTestConfig) {
    let system = SystemTestConfig::load().expect("system test config");
    let mut config = HarnessConfig::load(None).expect("harness config");
    config.keep_flow = keep_flow;
    wait_for_admin_ready(&config, system.ready_timeout).await.expect("admin ready");
    (FlowDriver::new(config).expect("driver"), system)
}

#[tokio::test(flavor = "multi_thread")]
async fn spout_pushes_ten_valid_grains_then_closes() {
    let (driver, system) = ready_driver(false).await;
    let artifacts = TestArtifacts::new(&system, "spout_pushes_ten").expect("artifacts");
    let end_field = driver.config().end_field.clone();
    let mut collector = GrainCollector::new(end_field).expect_grains(10);

    let report = driver.run(|context| spout_fixture(context, 10), &mut collector).await.unwrap();

    artifacts.write_json("report.json", &report).unwrap();
    assert_eq!(report.completion.reason, CompletionReason::EndMarker);
    assert!(report.state.end_received);
    assert!(report.flow_deleted);
    let grains = collector.grains();
    assert_eq!(grains.len(), 10);
    let flow_id = grains[0].flow_id();
    assert!(grains.iter().all(|grain| grain.flow_id() == flow_id));
    assert!(grains.iter().all(|grain| grain.payload_sizes()[0] > 0));
}

#[tokio::test(flavor = "multi_thread")]
async fn kept_flow_can_be_deleted_afterwards() {
    let (driver, system) = ready_driver(true).await;
    let artifacts = TestArtifacts::new(&system, "kept_flow").expect("artifacts");
    let mut collector = GrainCollector::from_config(driver.config()).expect_grains(2);

    let report = driver.run(|context| spout_fixture(context, 2), &mut collector).await.unwrap();
    assert!(!report.flow_deleted);
    assert!(report.state.closedown_completed);

    driver.admin().delete_flow(&report.flow_id).await.unwrap();
    artifacts
        .write_json("report.json", &json!({"report": report, "deletedAfterwards": true}))
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn staged_media_is_fetched_and_removed() {
    let system = SystemTestConfig::load().expect("system test config");
    let Some(uri) = system.media_uri.clone() else {
        return;
    };
    let temp = tempfile::tempdir().unwrap();
    let staging = temp.path().join("staging");

    let path = download(&uri, &staging).await.unwrap();
    assert!(path.starts_with(&staging));
    assert!(std::fs::metadata(&path).unwrap().len() > 0);

    remove_tree(&staging).await.unwrap();
    assert!(!staging.exists());
    remove_tree(&staging).await.unwrap();
}
