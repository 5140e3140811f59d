//! The gate port and its in-memory registry.

use crate::rule::{Check, Rule};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use warden_acl::{log_authz, Authorizable};

/// Something that accepts ability definitions.
pub trait Gate: Send + Sync {
    /// Define (or redefine) the rule for `ability`.
    fn define(&self, ability: &str, rule: Rule);

    /// Drop every defined ability. Action handlers stay registered.
    fn reset(&self);
}

/// In-memory gate: ability rules plus the action handlers delegates resolve to.
#[derive(Default)]
pub struct GateRegistry {
    rules: DashMap<String, Rule>,
    actions: DashMap<String, Check>,
}

impl GateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler a `Controller@method` delegate resolves to.
    pub fn register_action<F>(&self, action: &str, handler: F)
    where
        F: Fn(&dyn Authorizable) -> bool + Send + Sync + 'static,
    {
        self.actions.insert(action.to_string(), Arc::new(handler));
    }

    pub fn has(&self, ability: &str) -> bool {
        self.rules.contains_key(ability)
    }

    /// Defined abilities, sorted.
    pub fn abilities(&self) -> Vec<String> {
        let mut abilities: Vec<String> = self.rules.iter().map(|e| e.key().clone()).collect();
        abilities.sort();
        abilities
    }

    pub fn rule(&self, ability: &str) -> Option<Rule> {
        self.rules.get(ability).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate `ability` for `actor`. Undefined abilities deny.
    pub fn allows(&self, ability: &str, actor: &dyn Authorizable) -> bool {
        // Clone out so no map guard is held while user code runs.
        let granted = match self.rule(ability) {
            Some(Rule::Check(check)) => check(actor),
            Some(Rule::Delegate(action)) => match self.actions.get(&action).map(|e| e.value().clone()) {
                Some(handler) => handler(actor),
                None => {
                    warn!(ability, action = %action, "no handler registered for delegated ability");
                    false
                }
            },
            None => {
                debug!(ability, "ability not defined");
                false
            }
        };

        log_authz(Some(actor.key()), &[ability], granted, None);
        granted
    }

    pub fn denies(&self, ability: &str, actor: &dyn Authorizable) -> bool {
        !self.allows(ability, actor)
    }
}

impl Gate for GateRegistry {
    fn define(&self, ability: &str, rule: Rule) {
        debug!(ability, delegate = rule.is_delegate(), "ability defined");
        self.rules.insert(ability.to_string(), rule);
    }

    fn reset(&self) {
        debug!(abilities = self.rules.len(), "gate reset");
        self.rules.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_acl::{Actor, HasRoles, NewPermission, NewRole, RoleHolder};

    fn editor() -> Actor {
        let mut role = NewRole::new("Editor", "editor").into_role();
        role.permissions = vec![NewPermission::new("create", "create-posts").into_permission()];
        let mut actor = Actor::new("ada");
        actor.set_roles(vec![role]);
        actor
    }

    #[test]
    fn test_undefined_ability_denies() {
        let gate = GateRegistry::new();
        assert!(gate.denies("create-posts", &editor()));
        assert!(!gate.has("create-posts"));
    }

    #[test]
    fn test_check_rule() {
        let gate = GateRegistry::new();
        gate.define("create-posts", Rule::permission("create-posts"));

        assert!(gate.allows("create-posts", &editor()));
        assert!(gate.denies("create-posts", &Actor::new("bob")));
    }

    #[test]
    fn test_delegate_uses_registered_action() {
        let gate = GateRegistry::new();
        gate.define("destroy", Rule::delegate("PostController@destroy"));
        assert!(gate.denies("destroy", &editor()));

        gate.register_action("PostController@destroy", |actor| actor.is_role("editor"));
        assert!(gate.allows("destroy", &editor()));
        assert!(gate.denies("destroy", &Actor::new("bob")));
    }

    #[test]
    fn test_redefine_overwrites() {
        let gate = GateRegistry::new();
        gate.define("export", Rule::check(|_| false));
        gate.define("export", Rule::check(|_| true));

        assert_eq!(gate.len(), 1);
        assert!(gate.allows("export", &Actor::new("bob")));
    }

    #[test]
    fn test_abilities_sorted_and_reset() {
        let gate = GateRegistry::new();
        gate.define("b", Rule::check(|_| true));
        gate.define("a", Rule::delegate("PostController@publish"));
        gate.register_action("PostController@publish", |_| true);

        assert_eq!(gate.abilities(), vec!["a", "b"]);
        gate.reset();
        assert!(gate.is_empty());
        assert!(gate.denies("a", &Actor::new("bob")));

        gate.define("a", Rule::delegate("PostController@publish"));
        assert!(gate.allows("a", &Actor::new("bob")));
    }
}
