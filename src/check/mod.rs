//! Runtime auditing of the `store_locations` schema against live storage.
//!
//! The checker compares what the registry declares with what the database
//! actually has, through an ordered chain of named strategies: the
//! catalog interface first, then per-column zero-row projections when the
//! catalog is unavailable. Every strategy returns a typed result; the
//! first to succeed decides the report. The checker itself never fails:
//! any path that cannot produce an answer degrades to `valid: false` with
//! a diagnostic, because an uncaught error here would hide exactly the
//! drift it exists to surface.

pub mod catalog;

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use strum::Display;
use tokio::time::timeout;
use tracing::{instrument, warn};
use utoipa::ToSchema;

use crate::errors::PolicyError;
use crate::schema::SchemaRegistry;

pub use catalog::{CatalogError, ColumnCatalog, ColumnInfo, DbCatalog};

/// A declared column whose physical type disagrees with the registry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TypeMismatch {
    pub column: String,
    pub expected: String,
    pub actual: String,
}

/// Structured drift report for the full column set.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchemaCheckReport {
    pub valid: bool,
    pub missing_columns: Vec<String>,
    pub type_mismatches: Vec<TypeMismatch>,
    /// Diagnostics from strategies that failed before one succeeded.
    pub errors: Vec<String>,
    /// Which strategy produced the verdict, if any did.
    pub strategy: Option<String>,
    pub schema_version: u32,
    pub checked_at: DateTime<Utc>,
}

impl SchemaCheckReport {
    fn unavailable(errors: Vec<String>, schema_version: u32) -> Self {
        Self {
            valid: false,
            missing_columns: Vec::new(),
            type_mismatches: Vec::new(),
            errors,
            strategy: None,
            schema_version,
            checked_at: Utc::now(),
        }
    }
}

/// Cheap presence check of a representative isolation-column subset, for
/// hot paths such as startup probes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuickCheckReport {
    pub has_isolation_mode: bool,
    pub has_isolation_columns: bool,
    pub missing_columns: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

/// The ordered strategies the checker runs. Order matters: the catalog
/// answers in one round trip and reports types; projection probes prove
/// presence only, one query per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
enum CheckStrategy {
    CatalogListing,
    ColumnProjection,
}

const STRATEGY_ORDER: [CheckStrategy; 2] =
    [CheckStrategy::CatalogListing, CheckStrategy::ColumnProjection];

/// What a strategy learned about the table, when it succeeded.
enum CatalogView {
    /// Full column listing with reported types.
    Columns(Vec<ColumnInfo>),
    /// Presence-only: the named expected columns could not be projected.
    MissingOnly(Vec<String>),
}

/// Compares the schema registry against live storage and reports drift.
///
/// Read-only; has no effect on query behavior. A failing check marks the
/// deployment degraded through the health surface; enforcement itself
/// keeps running on its fail-closed defaults.
pub struct SchemaChecker {
    registry: Arc<SchemaRegistry>,
    catalog: Arc<dyn ColumnCatalog>,
    io_timeout: Duration,
}

impl SchemaChecker {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        catalog: Arc<dyn ColumnCatalog>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            catalog,
            io_timeout,
        }
    }

    /// Convenience constructor for the common case of a live database.
    pub fn for_database(
        registry: Arc<SchemaRegistry>,
        db: Arc<DatabaseConnection>,
        io_timeout: Duration,
    ) -> Self {
        Self::new(registry, Arc::new(DbCatalog::new(db)), io_timeout)
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Full audit of every expected column. Never panics and never
    /// returns an error: all failures degrade into the report.
    #[instrument(skip(self), fields(table = %self.registry.table()))]
    pub async fn check_schema(&self) -> SchemaCheckReport {
        let mut errors = Vec::new();

        for strategy in STRATEGY_ORDER {
            match timeout(self.io_timeout, self.run_strategy(strategy)).await {
                Ok(Ok(view)) => return self.evaluate(strategy, view, errors),
                Ok(Err(err)) => {
                    warn!(%strategy, error = %err, "schema check strategy failed");
                    errors.push(format!("{strategy}: {err}"));
                }
                Err(_) => {
                    warn!(%strategy, "schema check strategy timed out");
                    errors.push("timeout".to_string());
                }
            }
        }

        SchemaCheckReport::unavailable(errors, self.registry.version())
    }

    /// Presence check of `isolation_mode` plus three representative share
    /// flags, trading completeness for latency.
    #[instrument(skip(self), fields(table = %self.registry.table()))]
    pub async fn quick_check(&self) -> QuickCheckReport {
        const SUBSET: [&str; 4] = [
            "isolation_mode",
            "share_products",
            "share_sales",
            "share_customers",
        ];

        let missing = match timeout(self.io_timeout, self.probe_columns(&SUBSET)).await {
            Ok(missing) => missing,
            Err(_) => {
                warn!("quick check timed out; reporting all probed columns missing");
                SUBSET.iter().map(|c| c.to_string()).collect()
            }
        };

        QuickCheckReport {
            has_isolation_mode: !missing.iter().any(|c| c == "isolation_mode"),
            has_isolation_columns: missing.iter().all(|c| c == "isolation_mode"),
            missing_columns: missing,
            checked_at: Utc::now(),
        }
    }

    async fn run_strategy(&self, strategy: CheckStrategy) -> Result<CatalogView, CatalogError> {
        let table = self.registry.table();
        match strategy {
            CheckStrategy::CatalogListing => {
                let columns = self.catalog.table_columns(table).await?;
                Ok(CatalogView::Columns(columns))
            }
            CheckStrategy::ColumnProjection => {
                let expected: Vec<&str> = self
                    .registry
                    .expected_columns()
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect();
                Ok(CatalogView::MissingOnly(
                    self.probe_columns(&expected).await,
                ))
            }
        }
    }

    /// Maps a failed report onto the engine's error taxonomy, for
    /// operator-facing logs and alerts.
    pub fn classify_failure(&self, report: &SchemaCheckReport) -> Option<PolicyError> {
        if report.valid {
            return None;
        }
        let isolation = self.registry.isolation_columns();
        if let Some(column) = report
            .missing_columns
            .iter()
            .find(|c| isolation.contains(&c.as_str()))
        {
            return Some(PolicyError::MissingIsolationColumn(column.clone()));
        }
        if report.errors.iter().any(|e| e == "timeout") {
            return Some(PolicyError::SchemaCheckTimeout(self.io_timeout.as_secs()));
        }
        Some(PolicyError::SchemaCheckUnavailable(if report.errors.is_empty() {
            format!(
                "schema drift: {} missing, {} mismatched",
                report.missing_columns.len(),
                report.type_mismatches.len()
            )
        } else {
            report.errors.join("; ")
        }))
    }

    /// Probes each column individually so failures carry names instead of
    /// one opaque error for the whole projection.
    async fn probe_columns(&self, columns: &[&str]) -> Vec<String> {
        let table = self.registry.table();
        let mut missing = Vec::new();
        for column in columns {
            if let Err(err) = self.catalog.probe_column(table, column).await {
                warn!(column, error = %err, "column projection failed");
                missing.push(column.to_string());
            }
        }
        missing
    }

    fn evaluate(
        &self,
        strategy: CheckStrategy,
        view: CatalogView,
        errors: Vec<String>,
    ) -> SchemaCheckReport {
        let (missing_columns, type_mismatches) = match view {
            CatalogView::Columns(actual) => {
                let mut missing = Vec::new();
                let mut mismatches = Vec::new();
                for expected in self.registry.expected_columns() {
                    match actual.iter().find(|c| c.name == expected.name) {
                        None => missing.push(expected.name.clone()),
                        Some(found) if !expected.column_type.accepts(&found.data_type) => {
                            mismatches.push(TypeMismatch {
                                column: expected.name.clone(),
                                expected: format!("{:?}", expected.column_type),
                                actual: found.data_type.clone(),
                            });
                        }
                        Some(_) => {}
                    }
                }
                (missing, mismatches)
            }
            CatalogView::MissingOnly(missing) => (missing, Vec::new()),
        };

        SchemaCheckReport {
            valid: missing_columns.is_empty() && type_mismatches.is_empty(),
            missing_columns,
            type_mismatches,
            errors,
            strategy: Some(strategy.to_string()),
            schema_version: self.registry.version(),
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Simulated storage catalog with a configurable column set.
    struct FakeCatalog {
        columns: Vec<ColumnInfo>,
        listing_available: bool,
    }

    impl FakeCatalog {
        fn with_registry_columns(registry: &SchemaRegistry) -> Self {
            let columns = registry
                .expected_columns()
                .iter()
                .map(|c| ColumnInfo {
                    name: c.name.clone(),
                    data_type: match c.column_type {
                        crate::schema::ColumnType::Uuid => "uuid".into(),
                        crate::schema::ColumnType::Text => "text".into(),
                        crate::schema::ColumnType::Boolean => "boolean".into(),
                        crate::schema::ColumnType::Json => "jsonb".into(),
                        crate::schema::ColumnType::Timestamp => {
                            "timestamp with time zone".into()
                        }
                    },
                    is_nullable: c.nullable,
                })
                .collect();
            Self {
                columns,
                listing_available: true,
            }
        }

        fn drop_column(&mut self, name: &str) {
            self.columns.retain(|c| c.name != name);
        }
    }

    #[async_trait]
    impl ColumnCatalog for FakeCatalog {
        async fn table_columns(&self, _table: &str) -> Result<Vec<ColumnInfo>, CatalogError> {
            if self.listing_available {
                Ok(self.columns.clone())
            } else {
                Err(CatalogError::Unavailable("listing disabled".into()))
            }
        }

        async fn probe_column(&self, _table: &str, column: &str) -> Result<(), CatalogError> {
            if self.columns.iter().any(|c| c.name == column) {
                Ok(())
            } else {
                Err(CatalogError::Unavailable(format!("no such column: {column}")))
            }
        }
    }

    fn checker(catalog: FakeCatalog) -> SchemaChecker {
        SchemaChecker::new(
            Arc::new(SchemaRegistry::new()),
            Arc::new(catalog),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn intact_schema_is_valid() {
        let registry = SchemaRegistry::new();
        let report = checker(FakeCatalog::with_registry_columns(&registry))
            .check_schema()
            .await;

        assert!(report.valid, "errors: {:?}", report.errors);
        assert!(report.missing_columns.is_empty());
        assert!(report.type_mismatches.is_empty());
        assert_eq!(report.strategy.as_deref(), Some("catalog_listing"));
    }

    #[tokio::test]
    async fn dropped_isolation_column_is_reported() {
        let registry = SchemaRegistry::new();
        let mut catalog = FakeCatalog::with_registry_columns(&registry);
        catalog.drop_column("share_devices");
        catalog.drop_column("isolation_mode");

        let report = checker(catalog).check_schema().await;

        assert!(!report.valid);
        let missing: HashSet<&str> =
            report.missing_columns.iter().map(String::as_str).collect();
        assert!(missing.contains("share_devices"));
        assert!(missing.contains("isolation_mode"));
    }

    #[tokio::test]
    async fn type_drift_is_reported() {
        let registry = SchemaRegistry::new();
        let mut catalog = FakeCatalog::with_registry_columns(&registry);
        for column in &mut catalog.columns {
            if column.name == "share_sales" {
                column.data_type = "character varying".into();
            }
        }

        let report = checker(catalog).check_schema().await;

        assert!(!report.valid);
        assert_eq!(report.type_mismatches.len(), 1);
        assert_eq!(report.type_mismatches[0].column, "share_sales");
    }

    #[tokio::test]
    async fn projection_fallback_when_listing_unavailable() {
        let registry = SchemaRegistry::new();
        let mut catalog = FakeCatalog::with_registry_columns(&registry);
        catalog.listing_available = false;
        catalog.drop_column("share_reminders");

        let report = checker(catalog).check_schema().await;

        assert!(!report.valid);
        assert_eq!(report.strategy.as_deref(), Some("column_projection"));
        assert_eq!(report.missing_columns, vec!["share_reminders".to_string()]);
        assert!(
            report.errors.iter().any(|e| e.starts_with("catalog_listing")),
            "first strategy's failure should be recorded: {:?}",
            report.errors
        );
    }

    #[tokio::test]
    async fn projection_fallback_all_present_is_valid() {
        let registry = SchemaRegistry::new();
        let mut catalog = FakeCatalog::with_registry_columns(&registry);
        catalog.listing_available = false;

        let report = checker(catalog).check_schema().await;
        assert!(report.valid);
        assert_eq!(report.strategy.as_deref(), Some("column_projection"));
    }

    #[tokio::test]
    async fn quick_check_flags_missing_subset() {
        let registry = SchemaRegistry::new();
        let mut catalog = FakeCatalog::with_registry_columns(&registry);
        catalog.drop_column("share_sales");

        let report = checker(catalog).quick_check().await;

        assert!(report.has_isolation_mode);
        assert!(!report.has_isolation_columns);
        assert_eq!(report.missing_columns, vec!["share_sales".to_string()]);
    }

    #[tokio::test]
    async fn quick_check_intact_subset() {
        let registry = SchemaRegistry::new();
        let report = checker(FakeCatalog::with_registry_columns(&registry))
            .quick_check()
            .await;

        assert!(report.has_isolation_mode);
        assert!(report.has_isolation_columns);
        assert!(report.missing_columns.is_empty());
    }

    struct HangingCatalog;

    #[async_trait]
    impl ColumnCatalog for HangingCatalog {
        async fn table_columns(&self, _table: &str) -> Result<Vec<ColumnInfo>, CatalogError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }

        async fn probe_column(&self, _table: &str, _column: &str) -> Result<(), CatalogError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn failures_classify_onto_the_error_taxonomy() {
        let registry = SchemaRegistry::new();

        // Missing isolation column dominates
        let mut catalog = FakeCatalog::with_registry_columns(&registry);
        catalog.drop_column("share_expenses");
        let checker = checker(catalog);
        let report = checker.check_schema().await;
        assert!(matches!(
            checker.classify_failure(&report),
            Some(PolicyError::MissingIsolationColumn(c)) if c == "share_expenses"
        ));

        // A clean report classifies as nothing
        let registry = SchemaRegistry::new();
        let checker = super::SchemaChecker::new(
            Arc::new(SchemaRegistry::new()),
            Arc::new(FakeCatalog::with_registry_columns(&registry)),
            Duration::from_secs(1),
        );
        let report = checker.check_schema().await;
        assert!(checker.classify_failure(&report).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_storage_reports_timeout_instead_of_hanging() {
        let checker = SchemaChecker::new(
            Arc::new(SchemaRegistry::new()),
            Arc::new(HangingCatalog),
            Duration::from_millis(50),
        );

        let report = checker.check_schema().await;

        assert!(!report.valid);
        assert!(report.strategy.is_none());
        assert!(report.errors.iter().any(|e| e == "timeout"));
        assert!(matches!(
            checker.classify_failure(&report),
            Some(PolicyError::SchemaCheckTimeout(_))
        ));
    }
}
