use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use crate::schema::entity_type::ShareableEntity;

/// A store location (branch): the unit of data isolation.
///
/// `isolation_mode` selects how the `share_*` flags are interpreted; the
/// flags are nullable so that "never configured" is distinguishable from an
/// explicit `false`. The resolver treats both the same way under hybrid
/// mode (deny), but administration tooling needs the distinction.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_locations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub name: String,
    pub is_main: bool,
    pub is_active: bool,
    pub isolation_mode: String,
    pub pricing_model: String,

    // Reference data
    pub share_products: Option<bool>,
    pub share_inventory: Option<bool>,
    pub share_customers: Option<bool>,
    pub share_suppliers: Option<bool>,
    pub share_categories: Option<bool>,
    pub share_employees: Option<bool>,
    pub share_accounts: Option<bool>,

    // Operational data
    pub share_sales: Option<bool>,
    pub share_purchase_orders: Option<bool>,
    pub share_devices: Option<bool>,
    pub share_payments: Option<bool>,
    pub share_appointments: Option<bool>,
    pub share_reminders: Option<bool>,
    pub share_expenses: Option<bool>,
    pub share_trade_ins: Option<bool>,
    pub share_special_orders: Option<bool>,
    pub share_attendance: Option<bool>,
    pub share_loyalty_points: Option<bool>,
    pub share_gift_cards: Option<bool>,
    pub share_quality_checks: Option<bool>,
    pub share_recurring_expenses: Option<bool>,
    pub share_communications: Option<bool>,
    pub share_reports: Option<bool>,
    pub share_finance_transfers: Option<bool>,

    // Transfer and visibility extensions
    pub allow_stock_transfer: bool,
    pub auto_sync_products: bool,
    pub auto_sync_prices: bool,
    pub require_approval_for_transfers: bool,
    pub can_view_other_branches: bool,
    /// JSON array of branch ids this location may transfer stock to.
    /// An empty array means "no restriction".
    pub can_transfer_to_branches: Json,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Reads the share flag for an entity type. Exhaustive by construction:
    /// adding a variant to `ShareableEntity` will not compile until this
    /// mapping covers it.
    pub fn share_flag(&self, entity: ShareableEntity) -> Option<bool> {
        match entity {
            ShareableEntity::Products => self.share_products,
            ShareableEntity::Inventory => self.share_inventory,
            ShareableEntity::Customers => self.share_customers,
            ShareableEntity::Suppliers => self.share_suppliers,
            ShareableEntity::Categories => self.share_categories,
            ShareableEntity::Employees => self.share_employees,
            ShareableEntity::Accounts => self.share_accounts,
            ShareableEntity::Sales => self.share_sales,
            ShareableEntity::PurchaseOrders => self.share_purchase_orders,
            ShareableEntity::Devices => self.share_devices,
            ShareableEntity::Payments => self.share_payments,
            ShareableEntity::Appointments => self.share_appointments,
            ShareableEntity::Reminders => self.share_reminders,
            ShareableEntity::Expenses => self.share_expenses,
            ShareableEntity::TradeIns => self.share_trade_ins,
            ShareableEntity::SpecialOrders => self.share_special_orders,
            ShareableEntity::Attendance => self.share_attendance,
            ShareableEntity::LoyaltyPoints => self.share_loyalty_points,
            ShareableEntity::GiftCards => self.share_gift_cards,
            ShareableEntity::QualityChecks => self.share_quality_checks,
            ShareableEntity::RecurringExpenses => self.share_recurring_expenses,
            ShareableEntity::Communications => self.share_communications,
            ShareableEntity::Reports => self.share_reports,
            ShareableEntity::FinanceTransfers => self.share_finance_transfers,
        }
    }

    /// Parses `can_transfer_to_branches` into a set of branch ids.
    /// Malformed entries are skipped with a warning rather than failing the
    /// whole read; integrity is checked separately by
    /// `SchemaRegistry::validate_transfer_targets`.
    pub fn transfer_targets(&self) -> BTreeSet<Uuid> {
        let mut targets = BTreeSet::new();
        let Some(items) = self.can_transfer_to_branches.as_array() else {
            warn!(
                branch = %self.code,
                "can_transfer_to_branches is not a JSON array; treating as empty"
            );
            return targets;
        };
        for item in items {
            match item.as_str().map(Uuid::parse_str) {
                Some(Ok(id)) => {
                    targets.insert(id);
                }
                _ => warn!(
                    branch = %self.code,
                    value = %item,
                    "skipping malformed transfer target"
                ),
            }
        }
        targets
    }

    /// Monotonic version of this branch's isolation configuration, used as
    /// part of scope-cache keys. Administration tooling touches
    /// `updated_at` on every mutation.
    pub fn config_version(&self) -> i64 {
        self.updated_at.timestamp_millis()
    }
}

impl ActiveModel {
    /// Writes the share flag for an entity type; counterpart of
    /// `Model::share_flag` for defaults application on the write path.
    pub fn set_share_flag(&mut self, entity: ShareableEntity, value: bool) {
        let flag = sea_orm::ActiveValue::Set(Some(value));
        match entity {
            ShareableEntity::Products => self.share_products = flag,
            ShareableEntity::Inventory => self.share_inventory = flag,
            ShareableEntity::Customers => self.share_customers = flag,
            ShareableEntity::Suppliers => self.share_suppliers = flag,
            ShareableEntity::Categories => self.share_categories = flag,
            ShareableEntity::Employees => self.share_employees = flag,
            ShareableEntity::Accounts => self.share_accounts = flag,
            ShareableEntity::Sales => self.share_sales = flag,
            ShareableEntity::PurchaseOrders => self.share_purchase_orders = flag,
            ShareableEntity::Devices => self.share_devices = flag,
            ShareableEntity::Payments => self.share_payments = flag,
            ShareableEntity::Appointments => self.share_appointments = flag,
            ShareableEntity::Reminders => self.share_reminders = flag,
            ShareableEntity::Expenses => self.share_expenses = flag,
            ShareableEntity::TradeIns => self.share_trade_ins = flag,
            ShareableEntity::SpecialOrders => self.share_special_orders = flag,
            ShareableEntity::Attendance => self.share_attendance = flag,
            ShareableEntity::LoyaltyPoints => self.share_loyalty_points = flag,
            ShareableEntity::GiftCards => self.share_gift_cards = flag,
            ShareableEntity::QualityChecks => self.share_quality_checks = flag,
            ShareableEntity::RecurringExpenses => self.share_recurring_expenses = flag,
            ShareableEntity::Communications => self.share_communications = flag,
            ShareableEntity::Reports => self.share_reports = flag,
            ShareableEntity::FinanceTransfers => self.share_finance_transfers = flag,
        }
    }

    /// Reads the share flag, `NotSet`-aware.
    pub fn share_flag_is_set(&self, entity: ShareableEntity) -> bool {
        use sea_orm::ActiveValue;
        let value = match entity {
            ShareableEntity::Products => &self.share_products,
            ShareableEntity::Inventory => &self.share_inventory,
            ShareableEntity::Customers => &self.share_customers,
            ShareableEntity::Suppliers => &self.share_suppliers,
            ShareableEntity::Categories => &self.share_categories,
            ShareableEntity::Employees => &self.share_employees,
            ShareableEntity::Accounts => &self.share_accounts,
            ShareableEntity::Sales => &self.share_sales,
            ShareableEntity::PurchaseOrders => &self.share_purchase_orders,
            ShareableEntity::Devices => &self.share_devices,
            ShareableEntity::Payments => &self.share_payments,
            ShareableEntity::Appointments => &self.share_appointments,
            ShareableEntity::Reminders => &self.share_reminders,
            ShareableEntity::Expenses => &self.share_expenses,
            ShareableEntity::TradeIns => &self.share_trade_ins,
            ShareableEntity::SpecialOrders => &self.share_special_orders,
            ShareableEntity::Attendance => &self.share_attendance,
            ShareableEntity::LoyaltyPoints => &self.share_loyalty_points,
            ShareableEntity::GiftCards => &self.share_gift_cards,
            ShareableEntity::QualityChecks => &self.share_quality_checks,
            ShareableEntity::RecurringExpenses => &self.share_recurring_expenses,
            ShareableEntity::Communications => &self.share_communications,
            ShareableEntity::Reports => &self.share_reports,
            ShareableEntity::FinanceTransfers => &self.share_finance_transfers,
        };
        !matches!(value, ActiveValue::NotSet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::test_support::branch_fixture;

    #[test]
    fn transfer_targets_skips_malformed_entries() {
        let peer = Uuid::new_v4();
        let mut branch = branch_fixture();
        branch.can_transfer_to_branches =
            serde_json::json!([peer.to_string(), "not-a-uuid", 42]);

        let targets = branch.transfer_targets();
        assert_eq!(targets.len(), 1);
        assert!(targets.contains(&peer));
    }

    #[test]
    fn transfer_targets_tolerates_non_array() {
        let mut branch = branch_fixture();
        branch.can_transfer_to_branches = serde_json::json!({"oops": true});
        assert!(branch.transfer_targets().is_empty());
    }

    #[test]
    fn config_version_tracks_updated_at() {
        let mut branch = branch_fixture();
        let before = branch.config_version();
        branch.updated_at += chrono::Duration::seconds(1);
        assert!(branch.config_version() > before);
    }
}
