//! Authorization rules.

use std::fmt;
use std::sync::Arc;
use warden_acl::Authorizable;

/// A predicate over the acting actor.
pub type Check = Arc<dyn Fn(&dyn Authorizable) -> bool + Send + Sync>;

/// What a gate evaluates for an ability.
#[derive(Clone)]
pub enum Rule {
    /// Evaluate in place.
    Check(Check),
    /// Hand off to a registered `Controller@method` action.
    Delegate(String),
}

impl Rule {
    pub fn check<F>(f: F) -> Self
    where
        F: Fn(&dyn Authorizable) -> bool + Send + Sync + 'static,
    {
        Self::Check(Arc::new(f))
    }

    /// Granted when the actor's roles carry `slug`.
    pub fn permission(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self::check(move |actor| actor.permission_slugs().contains(&slug.as_str()))
    }

    pub fn delegate(action: impl Into<String>) -> Self {
        Self::Delegate(action.into())
    }

    pub fn is_delegate(&self) -> bool {
        matches!(self, Self::Delegate(_))
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Check(_) => f.write_str("Rule::Check(..)"),
            Self::Delegate(action) => f.debug_tuple("Rule::Delegate").field(action).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_acl::{Actor, NewPermission, NewRole, RoleHolder};

    fn actor_with(slugs: &[&str]) -> Actor {
        let mut role = NewRole::new("Editor", "editor").into_role();
        role.permissions = slugs
            .iter()
            .map(|s| NewPermission::new(*s, *s).into_permission())
            .collect();
        let mut actor = Actor::new("ada");
        actor.set_roles(vec![role]);
        actor
    }

    #[test]
    fn test_permission_rule_matches_slug() {
        let rule = Rule::permission("create-posts");
        let Rule::Check(check) = rule else {
            panic!("expected a check rule");
        };

        assert!(check(&actor_with(&["create-posts"])));
        assert!(!check(&actor_with(&["view-posts"])));
        assert!(!check(&Actor::new("nobody")));
    }

    #[test]
    fn test_debug_output() {
        assert_eq!(format!("{:?}", Rule::check(|_| true)), "Rule::Check(..)");
        assert_eq!(
            format!("{:?}", Rule::delegate("PostController@store")),
            "Rule::Delegate(\"PostController@store\")"
        );
        assert!(Rule::delegate("A@b").is_delegate());
    }
}
