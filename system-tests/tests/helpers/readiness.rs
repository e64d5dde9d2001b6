// system-tests/tests/helpers/readiness.rs
// ============================================================================
// Module: Readiness Helpers
// Description: Readiness probe for the flow runtime's admin API.
// Purpose: Ensure the runtime is up without arbitrary sleeps.
// Dependencies: grain-harness, reqwest, tokio
// ============================================================================

use std::time::Duration;
use std::time::Instant;

use grain_harness::HarnessConfig;
use tokio::time::sleep;

/// Polls `GET /flows` until the admin API answers or `timeout` expires.
pub async fn wait_for_admin_ready(config: &HarnessConfig, timeout: Duration) -> Result<(), String> {
    let url = format!("{}/flows", config.admin_base_url());
    let client = reqwest::Client::new();
    let start = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts = attempts.saturating_add(1);
        match client.get(&url).send().await {
            Ok(_) => return Ok(()),
            Err(err) => {
                if start.elapsed() > timeout {
                    return Err(format!(
                        "admin readiness timeout after {attempts} attempts: {err}"
                    ));
                }
                sleep(Duration::from_millis(100)).await;
            }
        }
    }
}
