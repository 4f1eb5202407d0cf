//! Integration tests for the client auth session.
//!
//! These drive a real `AuthSession` against an in-process axum stub that
//! mimics the account API contract (envelope shapes, status codes, and
//! login-revokes-prior-tokens), so the client's observable behavior is
//! tested without a database.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use custodia::api::auth::{Role, UserBody};
use custodia::client::{ApiClient, AuthFailure, AuthSession, NewAccount, SessionStore};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex},
};

#[derive(Default)]
struct StubState {
    // email -> (password, user id, name)
    users: HashMap<String, (String, String, String)>,
    // token -> email
    tokens: HashMap<String, String>,
    issued: u32,
}

type Shared = Arc<Mutex<StubState>>;

fn user_json(id: &str, name: &str, email: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "email": email,
        "role": "user",
        "office_id": null,
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-01T00:00:00Z",
    })
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

async fn stub_register(State(state): State<Shared>, Json(payload): Json<Value>) -> impl IntoResponse {
    let mut state = state.lock().unwrap();

    let email = payload["email"].as_str().unwrap_or_default().to_string();
    let name = payload["name"].as_str().unwrap_or_default().to_string();
    let password = payload["password"].as_str().unwrap_or_default().to_string();

    if state.users.contains_key(&email) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "The given data was invalid.",
                "errors": { "email": ["The email has already been taken."] },
            })),
        );
    }

    state.issued += 1;
    let id = format!("00000000-0000-0000-0000-{:012}", state.issued);
    let token = format!("token-{}", state.issued);
    state
        .users
        .insert(email.clone(), (password, id.clone(), name.clone()));
    state.tokens.insert(token.clone(), email.clone());

    (
        StatusCode::OK,
        Json(json!({
            "message": "User registered successfully",
            "data": {
                "user": user_json(&id, &name, &email),
                "token": token,
                "role": "user",
            },
        })),
    )
}

async fn stub_login(State(state): State<Shared>, Json(payload): Json<Value>) -> impl IntoResponse {
    let mut state = state.lock().unwrap();

    let email = payload["email"].as_str().unwrap_or_default().to_string();
    let password = payload["password"].as_str().unwrap_or_default();

    let Some((stored_password, id, name)) = state.users.get(&email).cloned() else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid email or password" })),
        );
    };
    if stored_password != password {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid email or password" })),
        );
    }

    // Login revokes every prior token before issuing the replacement.
    state.tokens.retain(|_, owner| owner != &email);
    state.issued += 1;
    let token = format!("token-{}", state.issued);
    state.tokens.insert(token.clone(), email.clone());

    (
        StatusCode::OK,
        Json(json!({
            "message": "Login successful",
            "data": {
                "user": user_json(&id, &name, &email),
                "token": token,
                "role": "user",
            },
        })),
    )
}

async fn stub_logout(State(state): State<Shared>, headers: HeaderMap) -> impl IntoResponse {
    let mut state = state.lock().unwrap();
    match bearer(&headers).filter(|token| state.tokens.contains_key(token)) {
        Some(token) => {
            state.tokens.remove(&token);
            (
                StatusCode::OK,
                Json(json!({ "message": "Successfully logged out" })),
            )
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthenticated." })),
        ),
    }
}

async fn stub_profile(State(state): State<Shared>, headers: HeaderMap) -> impl IntoResponse {
    let state = state.lock().unwrap();
    let user = bearer(&headers)
        .and_then(|token| state.tokens.get(&token).cloned())
        .and_then(|email| {
            state
                .users
                .get(&email)
                .map(|(_, id, name)| user_json(id, name, &email))
        });

    match user {
        Some(user) => (
            StatusCode::OK,
            Json(json!({
                "message": "User profile retrieved successfully",
                "data": { "user": user },
            })),
        ),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthenticated." })),
        ),
    }
}

async fn spawn_stub() -> (SocketAddr, Shared, tokio::task::JoinHandle<()>) {
    let state: Shared = Arc::new(Mutex::new(StubState::default()));
    let app = Router::new()
        .route("/api/v1/register", post(stub_register))
        .route("/api/v1/login", post(stub_login))
        .route("/api/v1/logout", post(stub_logout))
        .route("/api/v1/profile", get(stub_profile))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, state, server)
}

fn scratch_store() -> (SessionStore, PathBuf) {
    let path = std::env::temp_dir().join(format!("custodia-session-{}.json", ulid::Ulid::new()));
    (SessionStore::new(&path), path)
}

fn session_for(addr: SocketAddr) -> (AuthSession, PathBuf) {
    let (store, path) = scratch_store();
    let api = ApiClient::new(format!("http://{addr}")).unwrap();
    (AuthSession::new(api, store), path)
}

fn cached_user() -> UserBody {
    UserBody {
        id: "00000000-0000-0000-0000-000000000001".to_string(),
        name: "A".to_string(),
        email: "a@x.com".to_string(),
        role: Role::User,
        office_id: None,
        created_at: "2025-01-01T00:00:00Z".to_string(),
        updated_at: "2025-01-01T00:00:00Z".to_string(),
    }
}

fn new_account(email: &str) -> NewAccount {
    NewAccount {
        name: "A".to_string(),
        email: email.to_string(),
        password: "password1".to_string(),
        password_confirmation: "password1".to_string(),
        role: None,
    }
}

#[tokio::test]
async fn register_authenticates_and_persists_cache() {
    let (addr, _state, _server) = spawn_stub().await;
    let (mut session, path) = session_for(addr);

    session.register(new_account("a@x.com")).await.unwrap();

    assert!(session.is_authenticated());
    assert_eq!(session.role(), Some(Role::User));
    assert!(!session.is_admin());
    assert!(session.has_role(&[Role::User, Role::Admin]));
    assert!(!session.can_manage_users());

    // The durable cache holds both halves of the session.
    let cached: Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(cached["auth_token"].as_str().is_some());
    assert_eq!(cached["user"]["email"].as_str(), Some("a@x.com"));

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn login_failures_are_structured_not_thrown() {
    let (addr, _state, _server) = spawn_stub().await;
    let (mut session, path) = session_for(addr);

    session.register(new_account("a@x.com")).await.unwrap();
    session.logout().await;

    // Wrong password and unknown email yield the same credentials message.
    let wrong_password = session.login("a@x.com", "nope-nope-nope").await.unwrap_err();
    let unknown_email = session.login("ghost@x.com", "password1").await.unwrap_err();

    let AuthFailure::Credentials(first) = wrong_password else {
        panic!("expected credentials failure, got {wrong_password:?}");
    };
    let AuthFailure::Credentials(second) = unknown_email else {
        panic!("expected credentials failure, got {unknown_email:?}");
    };
    assert_eq!(first, second);
    assert!(!session.is_authenticated());

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn duplicate_email_registration_is_a_validation_failure() {
    let (addr, _state, _server) = spawn_stub().await;
    let (mut session, path) = session_for(addr);

    session.register(new_account("a@x.com")).await.unwrap();
    let failure = session.register(new_account("a@x.com")).await.unwrap_err();

    match failure {
        AuthFailure::Validation { errors, .. } => {
            assert!(errors.contains_key("email"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn login_revokes_the_registration_token() {
    let (addr, _state, _server) = spawn_stub().await;
    let (mut session, path) = session_for(addr);

    session.register(new_account("a@x.com")).await.unwrap();
    let registration_token = session.token().unwrap().to_string();

    session.login("a@x.com", "password1").await.unwrap();
    let login_token = session.token().unwrap().to_string();
    assert_ne!(registration_token, login_token);

    // A stale cache still holding the registration token no longer verifies.
    let (stale_store, stale_path) = scratch_store();
    stale_store
        .save(&registration_token, &cached_user())
        .unwrap();
    let api = ApiClient::new(format!("http://{addr}")).unwrap();
    let mut stale_session = AuthSession::new(api, SessionStore::new(&stale_path));

    assert!(!stale_session.restore().await);
    assert!(!stale_session.is_authenticated());
    assert!(!stale_path.exists());

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn restore_verifies_and_refreshes_the_cached_user() {
    let (addr, state, _server) = spawn_stub().await;
    let (mut session, path) = session_for(addr);

    session.register(new_account("a@x.com")).await.unwrap();
    let token = session.token().unwrap().to_string();
    drop(session);

    // The server-side name changed since the cache was written.
    {
        let mut state = state.lock().unwrap();
        if let Some(entry) = state.users.get_mut("a@x.com") {
            entry.2 = "Alice".to_string();
        }
    }

    let api = ApiClient::new(format!("http://{addr}")).unwrap();
    let mut restored = AuthSession::new(api, SessionStore::new(&path));
    assert!(restored.restore().await);
    assert!(restored.is_authenticated());
    assert_eq!(restored.token(), Some(token.as_str()));
    assert_eq!(
        restored.current_user().map(|user| user.name.as_str()),
        Some("Alice")
    );

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn failed_startup_verification_clears_everything() {
    let (addr, _state, _server) = spawn_stub().await;

    let (store, path) = scratch_store();
    store.save("token-that-was-revoked", &cached_user()).unwrap();

    let api = ApiClient::new(format!("http://{addr}")).unwrap();
    let mut session = AuthSession::new(api, SessionStore::new(&path));

    assert!(!session.restore().await);
    assert!(!session.is_authenticated());
    assert!(session.current_user().is_none());
    assert!(!path.exists());
}

#[tokio::test]
async fn logout_clears_local_state_even_when_server_is_unreachable() {
    let (addr, _state, server) = spawn_stub().await;
    let (mut session, path) = session_for(addr);
    session.register(new_account("a@x.com")).await.unwrap();
    assert!(session.is_authenticated());
    assert!(path.exists());

    // Kill the server while the session is live; the revocation call will
    // fail with a connection error.
    server.abort();
    let _ = server.await;

    session.logout().await;
    assert!(!session.is_authenticated());
    assert!(session.current_user().is_none());
    assert!(!path.exists());
}

#[tokio::test]
async fn protected_call_with_revoked_token_clears_the_session() {
    let (addr, state, _server) = spawn_stub().await;
    let (mut session, path) = session_for(addr);

    session.register(new_account("a@x.com")).await.unwrap();
    assert!(session.is_authenticated());

    // Revoke the token server side behind the session's back.
    state.lock().unwrap().tokens.clear();

    let failure = session.profile().await.unwrap_err();
    assert!(matches!(failure, AuthFailure::Credentials(_)));
    assert!(!session.is_authenticated());
    assert!(!path.exists());
}
