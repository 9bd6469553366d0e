//! Policy resolution and query scoping.
//!
//! The resolver and enforcer are pure functions over an immutable branch
//! configuration snapshot; they hold no locks and are safe to call from any
//! number of request tasks.

pub mod cache;
pub mod enforcer;
pub mod resolver;
pub mod transfer;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub use cache::{CacheStats, ScopeCache};
pub use enforcer::{ScopeEnforcer, ScopedQuery};
pub use resolver::PolicyResolver;
pub use transfer::{TransferDecision, TransferDenial};

/// The resolved visibility decision for one `(branch, entity type)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "branches", rename_all = "snake_case")]
pub enum Scope {
    /// No branch filter; every branch sees the same rows.
    AllBranches,
    /// Rows belonging to this branch only.
    OwnBranchOnly(Uuid),
    /// Rows belonging to an explicit set of branches. Produced by the
    /// main-branch cross-view upgrade; never collapses to `AllBranches`.
    BranchSet(BTreeSet<Uuid>),
}

impl Scope {
    /// Whether this scope restricts visibility at all.
    pub fn is_restricted(&self) -> bool {
        !matches!(self, Scope::AllBranches)
    }

    /// The branch ids a restricted scope admits; `None` for `AllBranches`.
    pub fn branch_ids(&self) -> Option<BTreeSet<Uuid>> {
        match self {
            Scope::AllBranches => None,
            Scope::OwnBranchOnly(id) => Some(BTreeSet::from([*id])),
            Scope::BranchSet(ids) => Some(ids.clone()),
        }
    }

    /// True when the scope admits rows owned by `branch_id`.
    pub fn includes(&self, branch_id: Uuid) -> bool {
        match self {
            Scope::AllBranches => true,
            Scope::OwnBranchOnly(id) => *id == branch_id,
            Scope::BranchSet(ids) => ids.contains(&branch_id),
        }
    }
}
