//! End-to-end authorization flows over the in-memory store and cache.

use std::sync::Arc;
use warden_acl::{
    AccessResolver, Actor, AclStore, Authorizable, Caller, InMemoryCache, MemoryStore, NewPermission,
    NewRole, PermissionCache, PermissionCatalog, RoleAssignments, RoleCatalog, GUEST_ROLE,
};
use warden_common_config::CacheConfig;
use warden_gate::{GateRegistrar, GateRegistry};
use warden_test_utils::{assert_ok, init_test_tracing};

struct Harness {
    store: Arc<MemoryStore>,
    cache_store: Arc<InMemoryCache>,
    cache: PermissionCache,
    gate: Arc<GateRegistry>,
    registrar: Arc<GateRegistrar>,
    permissions: PermissionCatalog,
    roles: RoleCatalog,
    assignments: RoleAssignments,
}

fn harness() -> Harness {
    init_test_tracing();
    let store = Arc::new(MemoryStore::new());
    let cache_store = Arc::new(InMemoryCache::new());
    let cache = PermissionCache::new(cache_store.clone(), CacheConfig::default());
    let gate = Arc::new(GateRegistry::new());
    let dyn_store: Arc<dyn AclStore> = store.clone();
    let registrar = Arc::new(GateRegistrar::new(gate.clone(), dyn_store.clone(), cache.clone()));
    registrar.follow_changes();

    Harness {
        registrar,
        permissions: PermissionCatalog::new(dyn_store.clone(), cache.clone()),
        roles: RoleCatalog::new(dyn_store.clone(), cache.clone()),
        assignments: RoleAssignments::new(dyn_store, cache.clone()),
        store,
        cache_store,
        cache,
        gate,
    }
}

#[tokio::test]
async fn cache_holds_five_then_ten_permissions() {
    let h = harness();

    h.permissions.create_resource("Users").await.unwrap();
    assert_eq!(h.cache.cached().await.unwrap().unwrap().len(), 5);
    assert_eq!(h.gate.len(), 5);

    h.permissions.create_resource("Posts").await.unwrap();
    assert_eq!(h.cache.cached().await.unwrap().unwrap().len(), 10);
    assert_eq!(h.gate.len(), 10);
    assert!(h.gate.has("viewAny-posts"));
}

#[tokio::test]
async fn cache_failure_after_write_leaves_it_forgotten_and_empty() {
    let h = harness();
    h.permissions.create_resource("Users").await.unwrap();
    assert!(h.cache_store.contains(h.cache.key()));

    h.permissions.create_resource("Posts").await.unwrap();
    h.cache_store.set_failing(true);

    assert!(h.registrar.permissions().await.is_empty());
    assert!(!h.cache_store.contains(h.cache.key()));
}

#[tokio::test]
async fn store_outage_resolves_to_no_permissions() {
    let h = harness();
    h.permissions.create_resource("Users").await.unwrap();
    assert_eq!(h.gate.len(), 5);
    h.store.set_unavailable(true);

    assert_eq!(h.registrar.refresh().await.total(), 0);
    assert!(h.gate.is_empty());
    assert!(h.registrar.permissions().await.is_empty());
    assert!(!h.cache_store.contains(h.cache.key()));
}

#[tokio::test]
async fn deleting_a_delegate_permission_revokes_its_ability() {
    let h = harness();
    let publish = h
        .permissions
        .create(NewPermission::new("publish", "PostController@publish"))
        .await
        .unwrap();
    h.gate.register_action("PostController@publish", |_| true);
    assert!(h.gate.allows("publish", &Actor::new("bob")));

    h.permissions.delete(publish.id).await.unwrap();

    assert!(!h.gate.has("publish"));
    assert!(h.gate.denies("publish", &Actor::new("bob")));
    assert_eq!(h.registrar.refresh().await.total(), 0);
}

#[tokio::test]
async fn admin_gains_delete_users_through_the_gate() {
    let h = harness();
    h.permissions.create_resource("Users").await.unwrap();
    let mut admin = h.roles.create(NewRole::new("Admin", "admin")).await.unwrap();
    h.roles.grant_permission_by_slug(&mut admin, "delete-users").await.unwrap();
    h.registrar.register().await;

    let mut actor = Actor::new("ada");
    assert!(!actor.can_access(&["delete-users"]));
    assert!(h.gate.denies("delete-users", &actor));

    assert_ok!(h.assignments.attach_role(&mut actor, &admin).await);
    assert!(actor.can_access(&["delete-users"]));
    assert!(h.gate.allows("delete-users", &actor));
    assert!(h.gate.denies("view-users", &actor));
}

#[tokio::test]
async fn can_at_least_is_an_or_over_roles() {
    let h = harness();
    h.permissions.create_resource("Posts").await.unwrap();
    let reader = h.roles.create(NewRole::new("Reader", "reader")).await.unwrap();
    let mut writer = h.roles.create(NewRole::new("Writer", "writer")).await.unwrap();
    h.roles.grant_permission_by_slug(&mut writer, "create-posts").await.unwrap();

    let mut actor = Actor::new("ada");
    h.assignments.attach_role(&mut actor, &reader).await.unwrap();
    h.assignments.attach_role(&mut actor, &writer).await.unwrap();

    assert!(actor.can_at_least(&["create-posts"]));
}

#[tokio::test]
async fn guest_role_decides_unauthenticated_access() {
    let h = harness();
    let resolver = AccessResolver::new(h.store.clone());
    h.permissions.create_resource("Posts").await.unwrap();
    assert!(!resolver.can_at_least(Caller::Guest, &["view-posts"]).await);

    let mut guest = h.roles.create(NewRole::new("Guest", GUEST_ROLE).system()).await.unwrap();
    h.roles.grant_permission_by_slug(&mut guest, "view-posts").await.unwrap();

    assert!(resolver.can_at_least(Caller::Guest, &["view-posts"]).await);
    assert!(!resolver.can_at_least(Caller::Guest, &["delete-posts"]).await);
}

#[tokio::test]
async fn controller_action_permissions_delegate() {
    let h = harness();
    h.permissions
        .create(NewPermission::new("publish-post", "PostController@publish"))
        .await
        .unwrap();
    h.gate
        .register_action("PostController@publish", |actor| actor.has_permission("publish-posts"));

    let report = h.registrar.register().await;
    assert_eq!(report.delegates, 1);
    assert!(h.gate.has("publish-post"));
    assert!(h.gate.denies("publish-post", &Actor::new("bob")));
}

#[test]
fn refresh_after_role_delete_drops_its_grants() {
    tokio_test::block_on(async {
        let h = harness();
        h.permissions.create_resource("Users").await.unwrap();
        let mut admin = h.roles.create(NewRole::new("Admin", "admin")).await.unwrap();
        h.roles.grant_permission_by_slug(&mut admin, "delete-users").await.unwrap();
        h.registrar.register().await;

        let cached = h.cache.cached().await.unwrap().unwrap();
        let delete = cached.iter().find(|p| p.slug == "delete-users").unwrap();
        assert_eq!(delete.roles.as_ref().map(Vec::len), Some(1));

        h.roles.delete(&admin).await.unwrap();
        h.registrar.refresh().await;

        let cached = h.cache.cached().await.unwrap().unwrap();
        let delete = cached.iter().find(|p| p.slug == "delete-users").unwrap();
        assert_eq!(delete.roles.as_ref().map(Vec::len), Some(0));
    });
}
