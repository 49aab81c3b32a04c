//! Gateway version monitor
//!
//! Classifies a bounded-time `check_health` call into a `CompatibilityState`.
//! The result only annotates trust in the UI; no failure here is ever
//! returned as an error.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::gateway::{
    strip_url_query, CompatibilityState, GatewayAction, GatewayClient, GatewayError,
};

/// Gateway version this client was built against
pub const EXPECTED_GATEWAY_VERSION: &str = "2.3.0";

/// Outcome of one health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub endpoint: String,
    pub state: CompatibilityState,
    /// Version string reported by the gateway, if any
    pub reported_version: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Periodic or on-demand gateway compatibility checks
pub struct VersionMonitor {
    client: Arc<GatewayClient>,
    expected_version: String,
    /// Overrides `healthTimeoutSecs` from the client's configuration
    timeout: Option<Duration>,
    last: Mutex<Option<HealthReport>>,
}

impl VersionMonitor {
    pub fn new(client: Arc<GatewayClient>) -> Self {
        Self {
            client,
            expected_version: EXPECTED_GATEWAY_VERSION.to_string(),
            timeout: None,
            last: Mutex::new(None),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_expected_version(mut self, version: impl Into<String>) -> Self {
        self.expected_version = version.into();
        self
    }

    /// Bound for one health check: the override, else the configured value
    pub async fn timeout(&self) -> Duration {
        match self.timeout {
            Some(timeout) => timeout,
            None => {
                let config = self.client.config().snapshot().await;
                Duration::from_secs(config.health_timeout_secs.max(1))
            }
        }
    }

    /// Check `endpoint` and classify the result
    pub async fn check(&self, endpoint: &str) -> CompatibilityState {
        self.check_report(endpoint).await.state
    }

    /// Check `endpoint`, returning the full report and remembering it
    pub async fn check_report(&self, endpoint: &str) -> HealthReport {
        let endpoint = endpoint.trim();
        let (state, reported_version) = if endpoint.is_empty() {
            (CompatibilityState::NotConfigured, None)
        } else {
            let timeout = self.timeout().await;
            match self
                .client
                .post_json(endpoint, &GatewayAction::CheckHealth, Some(timeout))
                .await
            {
                Ok(body) => {
                    let version = reported_version(&body);
                    (self.classify_version(version.as_deref()), version)
                }
                Err(e) => (classify_failure(&e), None),
            }
        };

        match state {
            CompatibilityState::Matches => {
                info!(
                    "Gateway {} matches version {}",
                    strip_url_query(endpoint),
                    self.expected_version
                )
            }
            CompatibilityState::NotConfigured => debug!("No gateway endpoint configured"),
            other => warn!("Gateway {}: {:?}", strip_url_query(endpoint), other),
        }

        let report = HealthReport {
            endpoint: endpoint.to_string(),
            state,
            reported_version,
            checked_at: Utc::now(),
        };
        *self.last.lock().await = Some(report.clone());
        report
    }

    /// State for `endpoint`, re-checking only when it differs from the last
    /// checked endpoint
    pub async fn state_for(&self, endpoint: &str) -> CompatibilityState {
        if let Some(ref last) = *self.last.lock().await {
            if last.endpoint == endpoint.trim() {
                return last.state;
            }
        }
        self.check(endpoint).await
    }

    /// Last report, or `None` before the first check
    pub async fn last_report(&self) -> Option<HealthReport> {
        self.last.lock().await.clone()
    }

    fn classify_version(&self, reported: Option<&str>) -> CompatibilityState {
        match reported {
            Some(version) if versions_match(version, &self.expected_version) => {
                CompatibilityState::Matches
            }
            _ => CompatibilityState::Outdated,
        }
    }
}

fn classify_failure(error: &GatewayError) -> CompatibilityState {
    match error {
        GatewayError::Timeout | GatewayError::Transport(_) => CompatibilityState::ConnectionError,
        GatewayError::Protocol(_) => CompatibilityState::ProtocolError,
        GatewayError::Configuration(_) => CompatibilityState::NotConfigured,
        _ => CompatibilityState::Outdated,
    }
}

/// The `version` field, as a string even when sent as a number
fn reported_version(body: &Value) -> Option<String> {
    match body.get("version")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn versions_match(reported: &str, expected: &str) -> bool {
    let reported = reported.trim().trim_start_matches(['v', 'V']);
    let expected = expected.trim().trim_start_matches(['v', 'V']);
    if reported == expected {
        return true;
    }
    match (semver::Version::parse(reported), semver::Version::parse(expected)) {
        (Ok(r), Ok(e)) => r == e,
        _ => false,
    }
}
