//! Access decisions for authenticated and unauthenticated callers.

use crate::actor::Authorizable;
use crate::audit::log_authz;
use crate::role::{Role, GUEST_ROLE};
use crate::store::AclStore;
use std::sync::Arc;
use tracing::warn;

/// Who is asking.
#[derive(Clone, Copy)]
pub enum Caller<'a> {
    Authenticated(&'a dyn Authorizable),
    /// Unauthenticated; resolved through the `guest` role.
    Guest,
}

impl<'a> Caller<'a> {
    pub fn from_option(actor: Option<&'a dyn Authorizable>) -> Self {
        actor.map_or(Self::Guest, Self::Authenticated)
    }
}

/// Resolves access checks, falling back to the `guest` role for
/// unauthenticated callers. Never fails: store errors deny.
#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<dyn AclStore>,
}

impl AccessResolver {
    pub fn new(store: Arc<dyn AclStore>) -> Self {
        Self { store }
    }

    /// Whether the caller holds at least one of `required`.
    pub async fn can_at_least(&self, caller: Caller<'_>, required: &[&str]) -> bool {
        match caller {
            Caller::Authenticated(actor) => {
                let granted = actor.can_at_least(required);
                log_authz(Some(actor.key()), required, granted, (!granted).then_some("no role grants a required permission"));
                granted
            }
            Caller::Guest => match self.guest_role().await {
                Some(guest) => {
                    let granted = guest.can_at_least(required);
                    log_authz(None, required, granted, (!granted).then_some("guest role lacks permission"));
                    granted
                }
                None => {
                    log_authz(None, required, false, Some("no guest role"));
                    false
                }
            },
        }
    }

    /// Permission path OR role path. Guests hold no roles of their own.
    pub async fn can_access(&self, caller: Caller<'_>, required: &[&str]) -> bool {
        if let Caller::Authenticated(actor) = caller {
            if actor.has_any_role_slug(required) {
                log_authz(Some(actor.key()), required, true, None);
                return true;
            }
        }
        self.can_at_least(caller, required).await
    }

    pub async fn has_permission(&self, caller: Caller<'_>, slug: &str) -> bool {
        self.can_access(caller, &[slug]).await
    }

    async fn guest_role(&self) -> Option<Role> {
        match self.store.find_role_by_slug(GUEST_ROLE).await {
            Ok(role) => role,
            Err(e) => {
                warn!(error = %e, "guest role lookup failed; denying");
                None
            }
        }
    }
}
