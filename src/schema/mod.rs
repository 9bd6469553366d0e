//! Canonical description of the `store_locations` table: its columns,
//! their expected types, the closed value sets, and the defaults applied
//! when branch-administration tooling creates a record.
//!
//! The registry is an explicitly constructed, immutable value: callers
//! build one (usually once, behind an `Arc`) and hand it to the resolver,
//! enforcer, and checker. There is no module-level state.

pub mod entity_type;

use serde::Serialize;
use std::collections::HashSet;
use strum::IntoEnumIterator;
use uuid::Uuid;

use crate::entities::store_location;
use crate::errors::PolicyError;

pub use entity_type::{IsolationMode, PricingModel, ShareableEntity};

/// Bumped whenever the declared shape of `store_locations` changes.
pub const SCHEMA_VERSION: u32 = 4;

const STORE_LOCATIONS_TABLE: &str = "store_locations";

/// Coarse column type classes, matched loosely against what the live
/// catalog reports (backends disagree on spelling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Uuid,
    Text,
    Boolean,
    Json,
    Timestamp,
}

impl ColumnType {
    /// Whether a catalog-reported type string is an acceptable physical
    /// representation of this class.
    pub fn accepts(&self, reported: &str) -> bool {
        let reported = reported.to_ascii_lowercase();
        let accepted: &[&str] = match self {
            // SQLite stores uuids as text
            Self::Uuid => &["uuid", "text", "char(36)", "character"],
            Self::Text => &["text", "character varying", "varchar", "character"],
            // SQLite declares bools as boolean but affines them to integer
            Self::Boolean => &["boolean", "bool", "integer", "tinyint(1)"],
            Self::Json => &["json", "jsonb", "text"],
            Self::Timestamp => &[
                "timestamp",
                "timestamp with time zone",
                "timestamp without time zone",
                "timestamptz",
                "datetime",
                "text",
            ],
        };
        accepted.iter().any(|a| reported.starts_with(a))
    }
}

/// One column the registry expects to exist in storage.
#[derive(Debug, Clone, Serialize)]
pub struct ExpectedColumn {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// Isolation columns gate scoping decisions; their absence degrades
    /// the deployment's health, not just a single feature.
    pub isolation: bool,
}

impl ExpectedColumn {
    fn new(name: &str, column_type: ColumnType, nullable: bool, isolation: bool) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable,
            isolation,
        }
    }
}

/// Defaults applied by administration tooling for omitted fields when a
/// branch record is created.
#[derive(Debug, Clone, Serialize)]
pub struct StoreLocationDefaults {
    pub isolation_mode: IsolationMode,
    pub pricing_model: PricingModel,
    pub allow_stock_transfer: bool,
    pub auto_sync_products: bool,
    pub auto_sync_prices: bool,
    pub require_approval_for_transfers: bool,
    pub can_view_other_branches: bool,
}

impl StoreLocationDefaults {
    /// The default share flag for an entity type: reference data is shared,
    /// operational data is not.
    pub fn share_flag(&self, entity: ShareableEntity) -> bool {
        entity.shared_by_default()
    }

    /// Fills every field the caller left unset. Explicitly provided values
    /// (including explicit `false` flags) are never overwritten.
    pub fn apply(&self, row: &mut store_location::ActiveModel) {
        use sea_orm::ActiveValue::{NotSet, Set};

        if matches!(row.isolation_mode, NotSet) {
            row.isolation_mode = Set(self.isolation_mode.to_string());
        }
        if matches!(row.pricing_model, NotSet) {
            row.pricing_model = Set(self.pricing_model.to_string());
        }
        if matches!(row.allow_stock_transfer, NotSet) {
            row.allow_stock_transfer = Set(self.allow_stock_transfer);
        }
        if matches!(row.auto_sync_products, NotSet) {
            row.auto_sync_products = Set(self.auto_sync_products);
        }
        if matches!(row.auto_sync_prices, NotSet) {
            row.auto_sync_prices = Set(self.auto_sync_prices);
        }
        if matches!(row.require_approval_for_transfers, NotSet) {
            row.require_approval_for_transfers = Set(self.require_approval_for_transfers);
        }
        if matches!(row.can_view_other_branches, NotSet) {
            row.can_view_other_branches = Set(self.can_view_other_branches);
        }
        if matches!(row.can_transfer_to_branches, NotSet) {
            row.can_transfer_to_branches = Set(serde_json::json!([]));
        }
        for entity in ShareableEntity::iter() {
            if !row.share_flag_is_set(entity) {
                row.set_share_flag(entity, self.share_flag(entity));
            }
        }
    }
}

impl Default for StoreLocationDefaults {
    fn default() -> Self {
        Self {
            isolation_mode: IsolationMode::Shared,
            pricing_model: PricingModel::Fixed,
            allow_stock_transfer: true,
            auto_sync_products: true,
            auto_sync_prices: true,
            require_approval_for_transfers: false,
            can_view_other_branches: false,
        }
    }
}

/// The single source of truth for the branch entity's persisted shape.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    table: String,
    columns: Vec<ExpectedColumn>,
    defaults: StoreLocationDefaults,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        let mut columns = vec![
            ExpectedColumn::new("id", ColumnType::Uuid, false, false),
            ExpectedColumn::new("code", ColumnType::Text, false, false),
            ExpectedColumn::new("name", ColumnType::Text, false, false),
            ExpectedColumn::new("is_main", ColumnType::Boolean, false, false),
            ExpectedColumn::new("is_active", ColumnType::Boolean, false, false),
            ExpectedColumn::new("isolation_mode", ColumnType::Text, false, true),
            ExpectedColumn::new("pricing_model", ColumnType::Text, false, false),
        ];
        for entity in ShareableEntity::iter() {
            columns.push(ExpectedColumn::new(
                entity.share_column(),
                ColumnType::Boolean,
                true,
                true,
            ));
        }
        columns.extend([
            ExpectedColumn::new("allow_stock_transfer", ColumnType::Boolean, false, false),
            ExpectedColumn::new("auto_sync_products", ColumnType::Boolean, false, false),
            ExpectedColumn::new("auto_sync_prices", ColumnType::Boolean, false, false),
            ExpectedColumn::new(
                "require_approval_for_transfers",
                ColumnType::Boolean,
                false,
                false,
            ),
            ExpectedColumn::new("can_view_other_branches", ColumnType::Boolean, false, false),
            ExpectedColumn::new("can_transfer_to_branches", ColumnType::Json, false, false),
            ExpectedColumn::new("created_at", ColumnType::Timestamp, false, false),
            ExpectedColumn::new("updated_at", ColumnType::Timestamp, false, false),
        ]);

        Self {
            table: STORE_LOCATIONS_TABLE.to_string(),
            columns,
            defaults: StoreLocationDefaults::default(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn version(&self) -> u32 {
        SCHEMA_VERSION
    }

    pub fn defaults(&self) -> &StoreLocationDefaults {
        &self.defaults
    }

    /// Every column the checker must verify exists in storage.
    pub fn expected_columns(&self) -> &[ExpectedColumn] {
        &self.columns
    }

    /// The 25 columns that control isolation: `isolation_mode` plus one
    /// share flag per entity type.
    pub fn isolation_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.isolation)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Maps an entity type to its share-flag column.
    pub fn entity_column(&self, entity: ShareableEntity) -> &'static str {
        entity.share_column()
    }

    /// Dynamic-caller variant of [`Self::entity_column`]. Fails with
    /// `UnknownEntityType` instead of ever producing a blank name.
    pub fn entity_column_named(&self, entity: &str) -> Result<&'static str, PolicyError> {
        Ok(ShareableEntity::parse(entity)?.share_column())
    }

    pub fn validate_isolation_mode(&self, value: &str) -> bool {
        IsolationMode::parse(value).is_ok()
    }

    pub fn validate_pricing_model(&self, value: &str) -> bool {
        PricingModel::parse(value).is_ok()
    }

    /// Checks a branch record's closed-set fields. Run by administration
    /// tooling before persisting and by operators when triaging a
    /// misbehaving deployment; the resolver performs the same mode check
    /// per call and fails closed instead of erroring out.
    pub fn validate_branch(&self, branch: &store_location::Model) -> Result<(), PolicyError> {
        IsolationMode::parse(&branch.isolation_mode)?;
        PricingModel::parse(&branch.pricing_model)?;
        Ok(())
    }

    /// Verifies every transfer target references a known active branch.
    /// Dangling ids are an integrity error, not something to drop quietly.
    pub fn validate_transfer_targets(
        &self,
        branch: &store_location::Model,
        active_branch_ids: &HashSet<Uuid>,
    ) -> Result<(), PolicyError> {
        for target in branch.transfer_targets() {
            if !active_branch_ids.contains(&target) {
                return Err(PolicyError::DanglingBranchReference(target));
            }
        }
        Ok(())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use chrono::{TimeZone, Utc};

    /// A hybrid-mode branch with every flag unset, suitable as a baseline
    /// for unit tests.
    pub fn branch_fixture() -> store_location::Model {
        store_location::Model {
            id: Uuid::new_v4(),
            code: "DT-01".into(),
            name: "Downtown".into(),
            is_main: false,
            is_active: true,
            isolation_mode: "hybrid".into(),
            pricing_model: "fixed".into(),
            share_products: None,
            share_inventory: None,
            share_customers: None,
            share_suppliers: None,
            share_categories: None,
            share_employees: None,
            share_accounts: None,
            share_sales: None,
            share_purchase_orders: None,
            share_devices: None,
            share_payments: None,
            share_appointments: None,
            share_reminders: None,
            share_expenses: None,
            share_trade_ins: None,
            share_special_orders: None,
            share_attendance: None,
            share_loyalty_points: None,
            share_gift_cards: None,
            share_quality_checks: None,
            share_recurring_expenses: None,
            share_communications: None,
            share_reports: None,
            share_finance_transfers: None,
            allow_stock_transfer: true,
            auto_sync_products: true,
            auto_sync_prices: true,
            require_approval_for_transfers: false,
            can_view_other_branches: false,
            can_transfer_to_branches: serde_json::json!([]),
            created_at: Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap(),
        }
    }
}
