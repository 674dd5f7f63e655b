use std::sync::Arc;
use std::time::Duration;

use hulul_application::{RemoteSignOut, SessionStore, Sidebar, SignUpOutcome};
use hulul_core::auth::{AuthState, PersistedAuthState, SessionStorage, SignUpMetadata};
use hulul_core::config::RouteConfig;
use hulul_infrastructure::{FileSessionStorage, InMemoryAuthGateway, MemorySessionStorage};
use tempfile::TempDir;

fn routes() -> RouteConfig {
    RouteConfig {
        login_path: "/login".to_string(),
        reset_password_url: "https://app.hulul.test/reset-password".to_string(),
    }
}

fn gateway() -> Arc<InMemoryAuthGateway> {
    Arc::new(
        InMemoryAuthGateway::new()
            .with_account("a@b.com", "pw", Some("admin"))
            .with_account("member@b.com", "pw", Some("client")),
    )
}

fn store(gateway: Arc<InMemoryAuthGateway>, storage: Arc<dyn SessionStorage>) -> SessionStore {
    SessionStore::new(gateway, storage, routes(), Duration::from_secs(5))
}

#[tokio::test]
async fn check_session_without_session_is_unauthenticated() {
    let storage = Arc::new(MemorySessionStorage::new());
    let store = store(gateway(), storage.clone());

    let state = store.check_session().await;

    assert_eq!(state.user, None);
    assert!(!state.is_authenticated);
    assert!(!state.is_admin);
    assert_eq!(store.state(), AuthState::unauthenticated());
}

#[tokio::test]
async fn sign_in_with_admin_role_sets_admin_flag() {
    let storage = Arc::new(MemorySessionStorage::new());
    let store = store(gateway(), storage.clone());

    let state = store.sign_in("a@b.com", "pw").await.unwrap();

    assert!(state.is_authenticated);
    assert!(state.is_admin);
    let persisted = storage.record().unwrap().into_state().unwrap();
    assert_eq!(persisted, state);
}

#[tokio::test]
async fn other_role_claims_are_not_admin() {
    let store = store(gateway(), Arc::new(MemorySessionStorage::new()));
    let state = store.sign_in("member@b.com", "pw").await.unwrap();
    assert!(state.is_authenticated);
    assert!(!state.is_admin);
}

#[tokio::test]
async fn revoked_session_is_cleared_on_check() {
    let gateway = gateway();
    let storage = Arc::new(MemorySessionStorage::new());
    let store = store(gateway.clone(), storage.clone());
    let state = store.sign_in("a@b.com", "pw").await.unwrap();

    gateway.revoke(state.access_token().unwrap());
    let checked = store.check_session().await;

    assert!(!checked.is_authenticated);
    assert!(!storage.record().unwrap().state.is_authenticated);
}

#[tokio::test]
async fn unreachable_provider_fails_safe_on_check() {
    let gateway = gateway();
    let store = store(gateway.clone(), Arc::new(MemorySessionStorage::new()));
    store.sign_in("a@b.com", "pw").await.unwrap();

    gateway.set_unreachable(true);
    assert!(!store.check_session().await.is_authenticated);
}

#[tokio::test]
async fn sign_out_clears_everything_when_remote_succeeds() {
    let gateway = gateway();
    let storage = Arc::new(MemorySessionStorage::new());
    let store = store(gateway.clone(), storage.clone());
    let state = store.sign_in("a@b.com", "pw").await.unwrap();
    storage.put_ephemeral("draft:T1", "hello");

    let outcome = store.sign_out().await;

    assert_eq!(outcome.route, "/login");
    assert_eq!(outcome.remote, RemoteSignOut::Confirmed);
    assert!(!store.is_authenticated());
    assert!(storage.record().is_none());
    assert_eq!(storage.ephemeral_len(), 0);
    assert!(!gateway.is_live(state.access_token().unwrap()));
}

#[tokio::test]
async fn sign_out_clears_everything_when_remote_fails() {
    let gateway = gateway();
    let storage = Arc::new(MemorySessionStorage::new());
    let store = store(gateway.clone(), storage.clone());
    store.sign_in("a@b.com", "pw").await.unwrap();
    storage.put_ephemeral("draft:T1", "hello");
    gateway.set_fail_sign_out(true);

    let outcome = store.sign_out().await;

    assert_eq!(outcome.route, "/login");
    assert!(matches!(outcome.remote, RemoteSignOut::Failed(_)));
    assert!(!store.is_authenticated());
    assert!(storage.record().is_none());
    assert_eq!(storage.ephemeral_len(), 0);
}

#[tokio::test]
async fn sign_out_without_session_skips_remote_call() {
    let gateway = gateway();
    let storage = Arc::new(MemorySessionStorage::with_record(PersistedAuthState::new(
        AuthState::unauthenticated(),
    )));
    let store = store(gateway.clone(), storage.clone());

    let outcome = store.sign_out().await;

    assert_eq!(outcome.remote, RemoteSignOut::Skipped);
    assert_eq!(gateway.sign_out_calls(), 0);
    assert!(storage.record().is_none());
}

#[tokio::test]
async fn sidebar_sign_out_returns_login_route() {
    let store = Arc::new(store(gateway(), Arc::new(MemorySessionStorage::new())));
    store.sign_in("a@b.com", "pw").await.unwrap();

    let outcome = Sidebar::new(store.clone()).sign_out().await;

    assert_eq!(outcome.route, store.login_route());
    assert!(!store.is_authenticated());
}

#[tokio::test]
async fn init_restores_persisted_state() {
    let gateway = gateway();
    let first = store(gateway.clone(), Arc::new(MemorySessionStorage::new()));
    let state = first.sign_in("a@b.com", "pw").await.unwrap();

    let storage = Arc::new(MemorySessionStorage::with_record(PersistedAuthState::new(
        state.clone(),
    )));
    let second = store(gateway, storage);
    assert_eq!(second.init().await, state);
    assert!(second.is_admin());
}

#[tokio::test]
async fn init_discards_incompatible_record() {
    let mut record = PersistedAuthState::new(AuthState::unauthenticated());
    record.version = 99;
    let storage = Arc::new(MemorySessionStorage::with_record(record));
    let store = store(gateway(), storage.clone());

    assert_eq!(store.init().await, AuthState::unauthenticated());
    assert!(storage.record().is_none());
}

#[tokio::test]
async fn sign_up_starts_session_or_waits_for_confirmation() {
    let gateway = gateway();
    let store = store(gateway.clone(), Arc::new(MemorySessionStorage::new()));
    let metadata = SignUpMetadata {
        full_name: Some("Amal".to_string()),
        ..SignUpMetadata::default()
    };

    let outcome = store.sign_up("new@b.com", "pw", &metadata).await.unwrap();
    assert_eq!(outcome, SignUpOutcome::SessionStarted);
    assert!(store.is_authenticated());
    assert!(!store.is_admin());

    gateway.set_require_confirmation(true);
    let outcome = store.sign_up("later@b.com", "pw", &metadata).await.unwrap();
    assert_eq!(outcome, SignUpOutcome::ConfirmationRequired);

    assert!(store.sign_up("a@b.com", "pw", &metadata).await.unwrap_err().is_auth());
}

#[tokio::test]
async fn reset_password_uses_configured_redirect() {
    let gateway = gateway();
    let store = store(gateway.clone(), Arc::new(MemorySessionStorage::new()));

    store.reset_password("a@b.com").await.unwrap();

    assert_eq!(
        gateway.reset_requests(),
        vec![(
            "a@b.com".to_string(),
            "https://app.hulul.test/reset-password".to_string()
        )]
    );
}

#[tokio::test]
async fn file_storage_survives_restart_and_is_wiped_on_sign_out() {
    let temp_dir = TempDir::new().unwrap();
    let record_path = temp_dir.path().join("auth-storage.toml");
    let session_dir = temp_dir.path().join("session");
    let gateway = gateway();

    let first = store(
        gateway.clone(),
        Arc::new(FileSessionStorage::new(record_path.clone(), session_dir.clone())),
    );
    let state = first.sign_in("a@b.com", "pw").await.unwrap();
    assert!(record_path.exists());
    std::fs::create_dir_all(session_dir.join("drafts")).unwrap();

    let second = store(
        gateway,
        Arc::new(FileSessionStorage::new(record_path.clone(), session_dir.clone())),
    );
    assert_eq!(second.init().await, state);
    assert!(second.check_session().await.is_authenticated);

    second.sign_out().await;
    assert!(!record_path.exists());
    assert!(!session_dir.exists());
}
