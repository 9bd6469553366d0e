/*!
 * # Health and diagnostics
 *
 * Operational surface for the isolation engine:
 *
 * - Basic health (`/`) - up/degraded from the last schema audit
 * - Liveness (`/live`) - process alive + uptime
 * - Schema audit (`/schema`) - runs a full consistency check on demand
 * - Quick audit (`/schema/quick`) - representative-subset presence check
 * - Diagnostics (`/diagnostics`) - registry version, last report, cache stats
 *
 * A failed or stale schema check never blocks or denies queries; it only
 * degrades the reported status. Requests read the last-known-good report
 * from a cache refreshed by a background task.
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::check::{SchemaCheckReport, SchemaChecker};
use crate::policy::ScopeCache;

/// Health status of the isolation engine.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Degraded,
}

impl HealthStatus {
    fn status_code(self) -> StatusCode {
        // Degraded still serves traffic; enforcement falls back to its
        // fail-closed defaults rather than hard-failing.
        StatusCode::OK
    }
}

/// Shared state for the health endpoints.
#[derive(Clone)]
pub struct HealthState {
    checker: Arc<SchemaChecker>,
    last_report: Arc<RwLock<Option<SchemaCheckReport>>>,
    cache: Option<Arc<ScopeCache>>,
    check_interval: Duration,
    start_time: SystemTime,
}

impl HealthState {
    pub fn new(checker: Arc<SchemaChecker>, check_interval: Duration) -> Self {
        Self {
            checker,
            last_report: Arc::new(RwLock::new(None)),
            cache: None,
            check_interval,
            start_time: SystemTime::now(),
        }
    }

    /// Attaches a scope cache so diagnostics can report its counters and
    /// the background loop can purge expired entries.
    pub fn with_scope_cache(mut self, cache: Arc<ScopeCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn uptime(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or(Duration::from_secs(0))
            .as_secs()
    }

    /// Runs a fresh schema audit and stores it as the last-known result.
    pub async fn refresh(&self) -> SchemaCheckReport {
        let report = self.checker.check_schema().await;
        if let Some(err) = self.checker.classify_failure(&report) {
            warn!(
                error = %err,
                missing = report.missing_columns.len(),
                mismatched = report.type_mismatches.len(),
                "schema audit found drift"
            );
        }
        *self.last_report.write().await = Some(report.clone());
        report
    }

    /// Status from the cached report; an audit that has not run yet counts
    /// as up (absence of evidence, surfaced as `last_checked_at: null`).
    pub async fn status(&self) -> HealthStatus {
        match self.last_report.read().await.as_ref() {
            Some(report) if !report.valid => HealthStatus::Degraded,
            _ => HealthStatus::Up,
        }
    }

    pub async fn last_checked_at(&self) -> Option<DateTime<Utc>> {
        self.last_report.read().await.as_ref().map(|r| r.checked_at)
    }
}

/// Basic health endpoint; reads the cached report only.
async fn health_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let status = state.status().await;
    (
        status.status_code(),
        Json(json!({
            "status": status,
            "version": env!("CARGO_PKG_VERSION"),
            "last_checked_at": state.last_checked_at().await,
            "timestamp": Utc::now(),
        })),
    )
}

/// Liveness endpoint.
async fn liveness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "alive": true,
            "uptime_seconds": state.uptime(),
            "timestamp": Utc::now(),
        })),
    )
}

/// On-demand full schema audit.
async fn schema_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let report = state.refresh().await;
    let status = if report.valid {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Cheap representative-subset audit.
async fn schema_quick_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let report = state.checker.quick_check().await;
    let status = if report.missing_columns.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// One-document overview for operators.
async fn diagnostics(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let last_report = state.last_report.read().await.clone();
    Json(json!({
        "schema_version": state.checker.registry().version(),
        "status": state.status().await,
        "last_report": last_report,
        "scope_cache": state.cache.as_ref().map(|c| c.stats()),
        "uptime_seconds": state.uptime(),
    }))
}

/// Returns build and version information.
async fn version_info() -> impl IntoResponse {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "commit": option_env!("GIT_HASH").unwrap_or("unknown"),
    }))
}

/// Periodic schema audit loop. Requests never wait on this; they read the
/// last completed report.
pub async fn run_schema_checker(state: Arc<HealthState>) {
    info!(
        interval_secs = state.check_interval.as_secs(),
        "starting periodic schema checker"
    );

    let mut interval = tokio::time::interval(state.check_interval);
    loop {
        interval.tick().await;
        let report = state.refresh().await;
        if !report.valid {
            warn!(
                missing = ?report.missing_columns,
                "isolation schema is degraded"
            );
        }
        if let Some(cache) = &state.cache {
            cache.purge_expired();
        }
    }
}

/// Creates the health router and starts the background checker.
pub fn health_routes(state: Arc<HealthState>) -> Router {
    tokio::spawn(run_schema_checker(state.clone()));

    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness_check))
        .route("/schema", get(schema_check))
        .route("/schema/quick", get(schema_quick_check))
        .route("/diagnostics", get(diagnostics))
        .route("/version", get(version_info))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CatalogError, ColumnCatalog, ColumnInfo};
    use crate::schema::SchemaRegistry;
    use async_trait::async_trait;

    struct EmptyCatalog;

    #[async_trait]
    impl ColumnCatalog for EmptyCatalog {
        async fn table_columns(&self, _table: &str) -> Result<Vec<ColumnInfo>, CatalogError> {
            Err(CatalogError::Unavailable("no catalog".into()))
        }

        async fn probe_column(&self, _table: &str, column: &str) -> Result<(), CatalogError> {
            Err(CatalogError::Unavailable(format!("no column {column}")))
        }
    }

    fn degraded_state() -> HealthState {
        let checker = SchemaChecker::new(
            Arc::new(SchemaRegistry::new()),
            Arc::new(EmptyCatalog),
            Duration::from_millis(100),
        );
        HealthState::new(Arc::new(checker), Duration::from_secs(300))
    }

    #[tokio::test]
    async fn status_is_up_before_first_audit() {
        let state = degraded_state();
        assert_eq!(state.status().await, HealthStatus::Up);
        assert!(state.last_checked_at().await.is_none());
    }

    #[tokio::test]
    async fn refresh_degrades_on_drift() {
        let state = degraded_state();
        let report = state.refresh().await;
        assert!(!report.valid);
        assert_eq!(state.status().await, HealthStatus::Degraded);
        assert!(state.last_checked_at().await.is_some());
    }
}
