//! Shared fixtures for the scenario suites.
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use meridian_isolation::entities::store_location;
use uuid::Uuid;

/// A hybrid-mode branch with every share flag unset.
pub fn hybrid_branch() -> store_location::Model {
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

/// A branch in the given isolation mode.
pub fn branch_in_mode(mode: &str) -> store_location::Model {
    let mut branch = hybrid_branch();
    branch.isolation_mode = mode.into();
    branch
}

/// Minimal row entities for enforcement tests.
pub mod rows {
    pub mod sale {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
        #[sea_orm(table_name = "sales")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub id: Uuid,
            pub branch_id: Uuid,
            pub total_cents: i64,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod customer {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
        #[sea_orm(table_name = "customers")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub id: Uuid,
            pub branch_id: Uuid,
            pub full_name: String,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }
}

/// Renders a select into Postgres SQL for assertions.
pub fn select_sql<E: sea_orm::EntityTrait>(select: &sea_orm::Select<E>) -> String {
    sea_orm::QueryTrait::as_query(select).to_string(sea_orm::sea_query::PostgresQueryBuilder)
}
