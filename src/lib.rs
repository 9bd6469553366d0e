//! Meridian Isolation Library
//!
//! Branch data-isolation policy engine for the Meridian platform: decides,
//! per entity type and per store location, whether records are shared
//! across branches, isolated to one branch, or governed by per-entity
//! overrides, and keeps the declared branch schema audited against live
//! storage.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod check;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod health;
pub mod policy;
pub mod schema;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::check::SchemaChecker;
use crate::config::AppConfig;
use crate::health::HealthState;
use crate::policy::{PolicyResolver, ScopeCache, ScopeEnforcer};
use crate::schema::SchemaRegistry;

pub use crate::errors::PolicyError;
pub use crate::policy::Scope;
pub use crate::schema::{IsolationMode, PricingModel, ShareableEntity};

/// Fully wired isolation engine: registry, resolver, enforcer, scope
/// cache, and schema checker sharing one registry value.
///
/// The data-access layer keeps one of these in its application state and
/// calls [`ScopeEnforcer::enforce`] on every outgoing query that needs
/// branch scoping.
#[derive(Clone)]
pub struct IsolationEngine {
    registry: Arc<SchemaRegistry>,
    enforcer: ScopeEnforcer,
    cache: Arc<ScopeCache>,
    checker: Arc<SchemaChecker>,
}

impl IsolationEngine {
    pub fn new(db: Arc<DatabaseConnection>, cfg: &AppConfig) -> Self {
        let registry = Arc::new(SchemaRegistry::new());
        let cache = Arc::new(ScopeCache::new(cfg.scope_cache_ttl()));
        let enforcer = ScopeEnforcer::new(registry.clone()).with_cache(cache.clone());
        let checker = Arc::new(SchemaChecker::for_database(
            registry.clone(),
            db,
            cfg.schema_check_timeout(),
        ));

        Self {
            registry,
            enforcer,
            cache,
            checker,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &PolicyResolver {
        self.enforcer.resolver()
    }

    pub fn enforcer(&self) -> &ScopeEnforcer {
        &self.enforcer
    }

    pub fn scope_cache(&self) -> &Arc<ScopeCache> {
        &self.cache
    }

    pub fn checker(&self) -> &Arc<SchemaChecker> {
        &self.checker
    }

    /// Builds the health/diagnostics state for this engine, wired to its
    /// checker and scope cache.
    pub fn health_state(&self, cfg: &AppConfig) -> Arc<HealthState> {
        Arc::new(
            HealthState::new(self.checker.clone(), cfg.schema_check_interval())
                .with_scope_cache(self.cache.clone()),
        )
    }
}
