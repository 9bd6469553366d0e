use std::sync::Arc;
use tracing::{debug, instrument};

use crate::entities::store_location;
use crate::errors::PolicyError;
use crate::policy::Scope;
use crate::schema::{IsolationMode, SchemaRegistry, ShareableEntity};

/// Decides the effective visibility scope for `(branch, entity type)`.
///
/// Resolution is a total, deterministic function of the branch
/// configuration snapshot and the requested entity type; it never reads
/// row data, performs I/O, or panics. Results are therefore cacheable per
/// `(branch id, entity, config version)`; see [`crate::policy::ScopeCache`].
#[derive(Clone)]
pub struct PolicyResolver {
    registry: Arc<SchemaRegistry>,
}

impl PolicyResolver {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Resolves the scope for a typed entity.
    ///
    /// Errors only on a configuration-integrity problem
    /// (`InvalidIsolationMode`); the enforcer maps that to the most
    /// restrictive scope rather than letting it reach callers.
    #[instrument(skip(self, branch), fields(branch = %branch.code, %entity))]
    pub fn resolve(
        &self,
        branch: &store_location::Model,
        entity: ShareableEntity,
    ) -> Result<Scope, PolicyError> {
        let mode = IsolationMode::parse(&branch.isolation_mode)?;

        let scope = match mode {
            IsolationMode::Shared => Scope::AllBranches,
            IsolationMode::Isolated => self.own_scope(branch),
            IsolationMode::Hybrid => {
                // Unset flags deny. A null here is an admin omission, and
                // isolation failures must fail closed.
                if branch.share_flag(entity).unwrap_or(false) {
                    Scope::AllBranches
                } else {
                    self.own_scope(branch)
                }
            }
        };

        debug!(?scope, "resolved");
        Ok(scope)
    }

    /// Resolves for a dynamic caller holding an entity-type name.
    /// Unknown names fail with `UnknownEntityType`, never a blank lookup.
    pub fn resolve_named(
        &self,
        branch: &store_location::Model,
        entity: &str,
    ) -> Result<Scope, PolicyError> {
        self.resolve(branch, ShareableEntity::parse(entity)?)
    }

    /// The branch's own visibility, with the cross-branch-view upgrade.
    ///
    /// Only the main branch is upgraded: it sees its own rows plus its
    /// authorized peers' as a `BranchSet`, while those peers' view of the
    /// main branch is unchanged. The flag on a non-main branch is ignored
    /// until the record states its intent through `is_main`.
    fn own_scope(&self, branch: &store_location::Model) -> Scope {
        if branch.can_view_other_branches {
            if branch.is_main {
                let mut ids = branch.transfer_targets();
                if !ids.is_empty() {
                    ids.insert(branch.id);
                    return Scope::BranchSet(ids);
                }
            } else {
                debug!(
                    branch = %branch.code,
                    "can_view_other_branches ignored for non-main branch"
                );
            }
        }
        Scope::OwnBranchOnly(branch.id)
    }
}
