use sea_orm::sea_query::{Alias, Expr};
use sea_orm::{EntityTrait, QueryFilter, Select};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::entities::store_location;
use crate::errors::PolicyError;
use crate::policy::{PolicyResolver, Scope, ScopeCache};
use crate::schema::{SchemaRegistry, ShareableEntity};

/// A query that has passed through the enforcer, carrying the scope that
/// was applied so a second pass is a no-op.
///
/// Wraps the caller's `Select` in the same shape it was handed in;
/// `into_inner` returns it for execution by the data-access layer.
#[derive(Debug, Clone)]
pub struct ScopedQuery<E: EntityTrait> {
    query: Select<E>,
    applied: Option<Scope>,
}

impl<E: EntityTrait> ScopedQuery<E> {
    /// The scope applied to this query, if any.
    pub fn scope(&self) -> Option<&Scope> {
        self.applied.as_ref()
    }

    pub fn is_scoped(&self) -> bool {
        self.applied.is_some()
    }

    /// Unwraps the (possibly filtered) select for execution.
    pub fn into_inner(self) -> Select<E> {
        self.query
    }
}

impl<E: EntityTrait> From<Select<E>> for ScopedQuery<E> {
    fn from(query: Select<E>) -> Self {
        Self {
            query,
            applied: None,
        }
    }
}

/// Injects branch-scoping filters into outgoing queries.
///
/// Callers never learn the isolation mode: they hand in a select, an
/// entity type, and the branch configuration snapshot, and get back a
/// query they can execute as-is. Ambiguous configuration is never
/// interpreted as "no restriction"; any resolution failure collapses to
/// `OwnBranchOnly` on the current branch.
#[derive(Clone)]
pub struct ScopeEnforcer {
    resolver: PolicyResolver,
    cache: Option<Arc<ScopeCache>>,
}

impl ScopeEnforcer {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            resolver: PolicyResolver::new(registry),
            cache: None,
        }
    }

    /// Enables bounded-TTL caching of resolved scopes on the hot path.
    pub fn with_cache(mut self, cache: Arc<ScopeCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn resolver(&self) -> &PolicyResolver {
        &self.resolver
    }

    /// Scopes a query for `entity` under `branch`'s configuration.
    pub fn enforce<E: EntityTrait>(
        &self,
        query: impl Into<ScopedQuery<E>>,
        entity: ShareableEntity,
        branch: &store_location::Model,
    ) -> ScopedQuery<E> {
        let scoped = query.into();
        if scoped.is_scoped() {
            debug!(%entity, "query already scoped; skipping");
            return scoped;
        }

        let scope = match self.resolve(branch, entity) {
            Ok(scope) => scope,
            Err(err) => {
                // Fail closed: an unscoped query under ambiguous
                // configuration would leak other branches' rows.
                warn!(
                    %entity,
                    branch = %branch.code,
                    error = %err,
                    "scope resolution failed; restricting to own branch"
                );
                Scope::OwnBranchOnly(branch.id)
            }
        };

        Self::apply(scoped, scope, entity)
    }

    /// Dynamic-caller variant taking an entity-type name. An unknown name
    /// fails closed to the current branch rather than erroring.
    pub fn enforce_named<E: EntityTrait>(
        &self,
        query: impl Into<ScopedQuery<E>>,
        entity: &str,
        branch: &store_location::Model,
    ) -> ScopedQuery<E> {
        match ShareableEntity::parse(entity) {
            Ok(entity) => self.enforce(query, entity, branch),
            Err(err) => {
                warn!(
                    entity,
                    branch = %branch.code,
                    error = %err,
                    "unknown entity type; restricting to own branch"
                );
                let scoped = query.into();
                if scoped.is_scoped() {
                    return scoped;
                }
                // Without metadata for the entity we assume the
                // conventional branch column; over-restriction is the safe
                // direction.
                let filter = Expr::col(Alias::new("branch_id")).eq(branch.id);
                ScopedQuery {
                    query: scoped.query.filter(filter),
                    applied: Some(Scope::OwnBranchOnly(branch.id)),
                }
            }
        }
    }

    fn resolve(
        &self,
        branch: &store_location::Model,
        entity: ShareableEntity,
    ) -> Result<Scope, PolicyError> {
        match &self.cache {
            Some(cache) => cache.resolve(&self.resolver, branch, entity),
            None => self.resolver.resolve(branch, entity),
        }
    }

    fn apply<E: EntityTrait>(
        scoped: ScopedQuery<E>,
        scope: Scope,
        entity: ShareableEntity,
    ) -> ScopedQuery<E> {
        let Some(column) = entity.branch_ref_column() else {
            // Global-only table: nothing to filter on. Record the decision
            // so a second enforcement pass stays a no-op.
            debug!(%entity, "entity has no branch reference column; query left unscoped");
            return ScopedQuery {
                query: scoped.query,
                applied: Some(Scope::AllBranches),
            };
        };

        let query = match &scope {
            Scope::AllBranches => scoped.query,
            Scope::OwnBranchOnly(id) => scoped
                .query
                .filter(Expr::col(Alias::new(column)).eq(*id)),
            Scope::BranchSet(ids) => scoped
                .query
                .filter(Expr::col(Alias::new(column)).is_in(ids.iter().copied())),
        };

        ScopedQuery {
            query,
            applied: Some(scope),
        }
    }
}
