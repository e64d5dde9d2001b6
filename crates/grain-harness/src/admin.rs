// crates/grain-harness/src/admin.rs
// ============================================================================
// Module: Admin API Client
// Description: HTTP client for the flow runtime's admin endpoints.
// Purpose: Create and delete flows with strict status expectations.
// Dependencies: reqwest, serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! `POST /flow` must answer 200 with `{"id": "..."}`; `DELETE /flow/{id}`
//! must answer 204. Anything else is a terminal [`HarnessError::Admin`].
//! Requests carry no client-side timeout; runs are bounded by the stall
//! detector instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use reqwest::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::fixture::FlowFixture;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum response body characters kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 512;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Identifier the admin API assigned to a created flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(String);

impl FlowId {
    /// Wraps a raw identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body returned by `POST /flow`.
#[derive(Debug, Deserialize)]
struct CreateFlowResponse {
    /// Assigned flow id.
    #[serde(default)]
    id: Option<String>,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Client for the admin flow endpoints.
#[derive(Debug, Clone)]
pub struct AdminClient {
    /// Base URL without trailing slash.
    base_url: String,
    /// Underlying HTTP client.
    client: Client,
}

impl AdminClient {
    /// Creates a client for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AdminTransport`] when the HTTP client cannot
    /// be built.
    pub fn new(base_url: impl Into<String>) -> HarnessResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder().build().map_err(|err| HarnessError::AdminTransport {
            method: "INIT",
            path: base_url.clone(),
            detail: err.to_string(),
        })?;
        Ok(Self {
            base_url,
            client,
        })
    }

    /// Creates a client for the configured admin API.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AdminTransport`] when the HTTP client cannot
    /// be built.
    pub fn from_config(config: &HarnessConfig) -> HarnessResult<Self> {
        Self::new(config.admin_base_url())
    }

    /// Returns the admin API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submits a flow definition and returns the assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Admin`] for any status other than 200,
    /// [`HarnessError::MissingFlowId`] when the body has no non-empty id, and
    /// [`HarnessError::AdminTransport`] when the request fails.
    pub async fn create_flow(&self, fixture: &FlowFixture) -> HarnessResult<FlowId> {
        let path = "/flow".to_string();
        let body = fixture.to_value()?;
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error("POST", &path, &err))?;
        let status = response.status();
        let text = response.text().await.map_err(|err| transport_error("POST", &path, &err))?;
        if status != StatusCode::OK {
            return Err(admin_error("POST", path, status, &text));
        }
        let parsed: CreateFlowResponse = serde_json::from_str(&text)
            .map_err(|_| HarnessError::MissingFlowId(truncate_body(&text)))?;
        match parsed.id {
            Some(id) if !id.trim().is_empty() => {
                tracing::info!(flow_id = %id, label = %fixture.label, "flow created");
                Ok(FlowId(id))
            }
            _ => Err(HarnessError::MissingFlowId(truncate_body(&text))),
        }
    }

    /// Deletes a previously created flow.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Admin`] for any status other than 204 and
    /// [`HarnessError::AdminTransport`] when the request fails.
    pub async fn delete_flow(&self, id: &FlowId) -> HarnessResult<()> {
        let path = format!("/flow/{id}");
        let response = self
            .client
            .delete(format!("{}{path}", self.base_url))
            .json(&json!({ "id": id.as_str() }))
            .send()
            .await
            .map_err(|err| transport_error("DELETE", &path, &err))?;
        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            let text = response.text().await.unwrap_or_default();
            return Err(admin_error("DELETE", path, status, &text));
        }
        tracing::info!(flow_id = %id, "flow deleted");
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds an unexpected-status error.
fn admin_error(method: &'static str, path: String, status: StatusCode, body: &str) -> HarnessError {
    HarnessError::Admin {
        method,
        path,
        status: status.as_u16(),
        body: truncate_body(body),
    }
}

/// Builds a transport error.
fn transport_error(method: &'static str, path: &str, err: &reqwest::Error) -> HarnessError {
    HarnessError::AdminTransport {
        method,
        path: path.to_string(),
        detail: err.to_string(),
    }
}

/// Caps a response body for error messages.
fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut out: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    out.push_str("...");
    out
}
