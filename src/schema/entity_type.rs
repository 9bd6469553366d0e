use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::errors::PolicyError;

/// The business entity types whose visibility a branch can govern.
///
/// The wire/storage form is snake_case (`purchase_orders`,
/// `finance_transfers`). Every variant has a dedicated `share_*` column on
/// `store_locations`; the mappings in this module and on the entity model
/// are exhaustive matches, so extending this enum is a compile-time-checked
/// change everywhere a flag or column is consulted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumIter,
    EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ShareableEntity {
    Products,
    Inventory,
    Customers,
    Suppliers,
    Categories,
    Employees,
    Accounts,
    Sales,
    PurchaseOrders,
    Devices,
    Payments,
    Appointments,
    Reminders,
    Expenses,
    TradeIns,
    SpecialOrders,
    Attendance,
    LoyaltyPoints,
    GiftCards,
    QualityChecks,
    RecurringExpenses,
    Communications,
    Reports,
    FinanceTransfers,
}

impl ShareableEntity {
    pub const COUNT: usize = 24;

    /// Parses an entity-type name from a dynamic caller. Unlike the raw
    /// `FromStr` impl, this surfaces the engine's own error type.
    pub fn parse(name: &str) -> Result<Self, PolicyError> {
        Self::from_str(name).map_err(|_| PolicyError::UnknownEntityType(name.to_string()))
    }

    /// The `store_locations` column holding this entity's share flag.
    /// Never returns an empty name; a blank column would silently disable
    /// scoping for the entity.
    pub fn share_column(&self) -> &'static str {
        match self {
            Self::Products => "share_products",
            Self::Inventory => "share_inventory",
            Self::Customers => "share_customers",
            Self::Suppliers => "share_suppliers",
            Self::Categories => "share_categories",
            Self::Employees => "share_employees",
            Self::Accounts => "share_accounts",
            Self::Sales => "share_sales",
            Self::PurchaseOrders => "share_purchase_orders",
            Self::Devices => "share_devices",
            Self::Payments => "share_payments",
            Self::Appointments => "share_appointments",
            Self::Reminders => "share_reminders",
            Self::Expenses => "share_expenses",
            Self::TradeIns => "share_trade_ins",
            Self::SpecialOrders => "share_special_orders",
            Self::Attendance => "share_attendance",
            Self::LoyaltyPoints => "share_loyalty_points",
            Self::GiftCards => "share_gift_cards",
            Self::QualityChecks => "share_quality_checks",
            Self::RecurringExpenses => "share_recurring_expenses",
            Self::Communications => "share_communications",
            Self::Reports => "share_reports",
            Self::FinanceTransfers => "share_finance_transfers",
        }
    }

    /// The column on this entity's own table that references the owning
    /// branch, or `None` for global-only tables that carry no branch
    /// reference at all.
    pub fn branch_ref_column(&self) -> Option<&'static str> {
        match self {
            // Generated artifacts, not branch-owned rows
            Self::Reports => None,
            // Transfers are keyed by their originating branch
            Self::FinanceTransfers => Some("source_branch_id"),
            _ => Some("branch_id"),
        }
    }

    /// True for reference data that new deployments share by default.
    pub fn shared_by_default(&self) -> bool {
        matches!(
            self,
            Self::Products
                | Self::Customers
                | Self::Suppliers
                | Self::Categories
                | Self::Accounts
                | Self::GiftCards
        )
    }
}

/// Branch-level switch governing whether per-entity share flags are
/// consulted at all.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IsolationMode {
    /// All branches see the same rows; flags are ignored.
    Shared,
    /// Each branch sees only its own rows; flags are ignored.
    Isolated,
    /// Visibility decided per entity type by the branch's share flags.
    Hybrid,
}

impl IsolationMode {
    pub fn parse(value: &str) -> Result<Self, PolicyError> {
        Self::from_str(value).map_err(|_| PolicyError::InvalidIsolationMode(value.to_string()))
    }
}

/// How a branch prices its catalogue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PricingModel {
    /// One price list across the deployment.
    Fixed,
    /// Quantity-tiered pricing, still deployment-wide.
    Tiered,
    /// Each branch maintains its own price list.
    Branch,
}

impl PricingModel {
    pub fn parse(value: &str) -> Result<Self, PolicyError> {
        Self::from_str(value).map_err(|_| PolicyError::InvalidPricingModel(value.to_string()))
    }
}
