//! Registers every stored permission as a gate rule.

use crate::registry::Gate;
use crate::rule::Rule;
use std::sync::{Arc, Weak};
use tracing::{info, instrument, warn};
use warden_acl::{AclStore, Permission, PermissionCache, PermissionListener};

/// Counts from one registration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Abilities checked against the actor's permission slugs.
    pub rules: usize,
    /// Abilities delegated to a `Controller@method` action.
    pub delegates: usize,
}

impl RegistrationReport {
    pub fn total(&self) -> usize {
        self.rules + self.delegates
    }
}

/// Loads permissions through the snapshot cache and defines one ability each.
pub struct GateRegistrar {
    gate: Arc<dyn Gate>,
    store: Arc<dyn AclStore>,
    cache: PermissionCache,
}

impl GateRegistrar {
    pub fn new(gate: Arc<dyn Gate>, store: Arc<dyn AclStore>, cache: PermissionCache) -> Self {
        Self { gate, store, cache }
    }

    /// All permissions with their roles, from the cache or the store.
    ///
    /// Never fails. On any store or cache error the snapshot key is
    /// forgotten and an empty list is returned, so no abilities get defined.
    pub async fn permissions(&self) -> Vec<Permission> {
        let store = self.store.clone();
        let loaded = self
            .cache
            .remember(move || async move { store.permissions_with_roles().await })
            .await;

        match loaded {
            Ok(permissions) => permissions,
            Err(e) => {
                warn!(error = %e, key = self.cache.key(), "could not load permissions; registering none");
                if let Err(e) = self.cache.forget().await {
                    warn!(error = %e, key = self.cache.key(), "could not forget permission cache");
                }
                Vec::new()
            }
        }
    }

    /// Replace the gate's abilities with one per stored permission.
    #[instrument(skip(self))]
    pub async fn register(&self) -> RegistrationReport {
        let permissions = self.permissions().await;
        self.install(&permissions)
    }

    /// Keep the gate in step with every catalog write made through this cache.
    pub fn follow_changes(self: &Arc<Self>) {
        self.cache.subscribe(Arc::new(Follower(Arc::downgrade(self))));
    }

    /// Reset the gate, then define an ability for each of `permissions`.
    /// Abilities of permissions no longer present disappear.
    fn install(&self, permissions: &[Permission]) -> RegistrationReport {
        let mut report = RegistrationReport::default();
        self.gate.reset();

        for permission in permissions {
            if permission.is_controller_action() {
                self.gate
                    .define(permission.ability(), Rule::delegate(permission.slug.clone()));
                report.delegates += 1;
            } else {
                self.gate
                    .define(permission.ability(), Rule::permission(permission.slug.clone()));
                report.rules += 1;
            }
        }

        info!(rules = report.rules, delegates = report.delegates, "gate abilities registered");
        report
    }

    /// Drop the snapshot and register again from the store.
    pub async fn refresh(&self) -> RegistrationReport {
        if let Err(e) = self.cache.forget().await {
            warn!(error = %e, key = self.cache.key(), "could not forget permission cache");
        }
        self.register().await
    }
}

impl PermissionListener for GateRegistrar {
    fn permissions_changed(&self, permissions: &[Permission]) {
        self.install(permissions);
    }
}

/// Weak so the cache's listener list does not keep the registrar alive.
struct Follower(Weak<GateRegistrar>);

impl PermissionListener for Follower {
    fn permissions_changed(&self, permissions: &[Permission]) {
        if let Some(registrar) = self.0.upgrade() {
            registrar.install(permissions);
        }
    }
}
