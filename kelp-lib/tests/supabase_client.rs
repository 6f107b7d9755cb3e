//! Drives the Supabase client against a fake project served by axum.

use std::{collections::HashMap, net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use kelp_lib::{
    Backend, ProfileEditor, Screen, SessionController,
    backend::{AuthChangeEvent, auth, storage},
    config::CoreConfig,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tempfile::TempDir;

const ANON_KEY: &str = "anon-key";
const EMAIL: &str = "a@x.com";
const PASSWORD: &str = "hunter2";

#[derive(Debug, Default)]
struct Fake {
    profiles: HashMap<String, Value>,
    objects: HashMap<String, (String, Vec<u8>)>,
    /// Headers seen on the most recent row API request
    last_rest_headers: Option<HeaderMap>,
    /// Bearer token of the most recent object upload
    last_upload_auth: Option<String>,
    logouts: usize,
    confirm_signups: bool,
}

type Shared = Arc<Mutex<Fake>>;

fn user() -> Value {
    json!({ "id": "u1", "email": EMAIL, "aud": "authenticated" })
}

fn token(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": refresh,
        "user": user(),
    })
}

fn has_anon_key(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(ANON_KEY)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn jwt_expired() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "code": "PGRST301", "message": "JWT expired" })),
    )
        .into_response()
}

async fn token_grant(
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !has_anon_key(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "No API key found" })))
            .into_response();
    }

    match query.get("grant_type").map(String::as_str) {
        Some("password") if body["email"] == EMAIL && body["password"] == PASSWORD => {
            Json(token("access-1", "refresh-1")).into_response()
        }
        Some("refresh_token") if body["refresh_token"] == "refresh-old" => {
            Json(token("access-2", "refresh-2")).into_response()
        }
        Some("refresh_token") => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "Invalid Refresh Token" })),
        )
            .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })),
        )
            .into_response(),
    }
}

async fn signup(State(fake): State<Shared>, Json(body): Json<Value>) -> Response {
    if fake.lock().confirm_signups {
        Json(json!({ "id": "u2", "email": body["email"] })).into_response()
    } else {
        Json(token("access-new", "refresh-new")).into_response()
    }
}

async fn logout(State(fake): State<Shared>, headers: HeaderMap) -> StatusCode {
    fake.lock().logouts += 1;
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer access-1") => StatusCode::NO_CONTENT,
        _ => StatusCode::UNAUTHORIZED,
    }
}

async fn select_profile(
    State(fake): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut fake = fake.lock();
    fake.last_rest_headers = Some(headers.clone());

    if bearer(&headers).as_deref() == Some("Bearer access-old") {
        return jwt_expired();
    }

    let single = headers.get("accept").and_then(|v| v.to_str().ok())
        == Some("application/vnd.pgrst.object+json");
    let columns = query.get("select").map(String::as_str);
    let id = query.get("id").and_then(|id| id.strip_prefix("eq."));

    if !single || columns != Some("first_name,last_name,avatar_url") {
        return StatusCode::BAD_REQUEST.into_response();
    }

    match id.and_then(|id| fake.profiles.get(id)) {
        Some(row) => Json(json!({
            "first_name": row["first_name"],
            "last_name": row["last_name"],
            "avatar_url": row["avatar_url"],
        }))
        .into_response(),
        None => (
            StatusCode::NOT_ACCEPTABLE,
            Json(json!({
                "code": "PGRST116",
                "details": "The result contains 0 rows",
                "message": "JSON object requested, multiple (or no) rows returned",
            })),
        )
            .into_response(),
    }
}

async fn upsert_profile(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Json(row): Json<Value>,
) -> StatusCode {
    let mut fake = fake.lock();
    fake.last_rest_headers = Some(headers.clone());

    let merge = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("resolution=merge-duplicates"));
    if !merge {
        return StatusCode::CONFLICT;
    }

    let Some(id) = row["id"].as_str() else {
        return StatusCode::BAD_REQUEST;
    };
    fake.profiles.insert(id.to_string(), row.clone());
    StatusCode::CREATED
}

async fn put_object(
    State(fake): State<Shared>,
    Path((bucket, path)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let mut fake = fake.lock();
    fake.last_upload_auth = bearer(&headers);
    fake.objects
        .insert(format!("{bucket}/{path}"), (content_type, body.to_vec()));
    StatusCode::OK
}

async fn get_object(
    State(fake): State<Shared>,
    Path((bucket, path)): Path<(String, String)>,
) -> Response {
    match fake.lock().objects.get(&format!("{bucket}/{path}")) {
        Some((_, bytes)) => bytes.clone().into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "statusCode": "404",
                "error": "not_found",
                "message": "Object not found"
            })),
        )
            .into_response(),
    }
}

async fn serve() -> (SocketAddr, Shared) {
    let fake = Shared::default();
    let app = Router::new()
        .route("/auth/v1/token", post(token_grant))
        .route("/auth/v1/signup", post(signup))
        .route("/auth/v1/logout", post(logout))
        .route("/rest/v1/profiles", get(select_profile).post(upsert_profile))
        .route(
            "/storage/v1/object/{bucket}/{*path}",
            get(get_object).post(put_object),
        )
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, fake)
}

struct Harness {
    backend: Backend,
    fake: Shared,
    session_file: PathBuf,
    cfg: CoreConfig,
    _dir: TempDir,
}

impl Harness {
    async fn new() -> Self {
        let (addr, fake) = serve().await;
        let dir = tempfile::tempdir().unwrap();
        let session_file = dir.path().join("session.json");
        let cfg = CoreConfig {
            url: format!("http://{addr}/"),
            anon_key: ANON_KEY.into(),
            ..CoreConfig::default()
        };
        let backend =
            Backend::supabase_with_session_file(cfg.clone(), Some(session_file.clone())).unwrap();

        Self {
            backend,
            fake,
            session_file,
            cfg,
            _dir: dir,
        }
    }

    /// A second client sharing the first one's session file, as after a restart.
    fn restart(&self) -> Backend {
        Backend::supabase_with_session_file(self.cfg.clone(), Some(self.session_file.clone()))
            .unwrap()
    }
}

#[tokio::test]
async fn test_sign_in_persists_session() {
    let harness = Harness::new().await;
    let auth = harness.backend.auth();
    let mut events = auth.subscribe();

    let session = auth.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();

    assert_eq!(session.access_token, "access-1");
    assert_eq!(session.user_id(), Some("u1"));
    assert_eq!(session.email(), Some(EMAIL));
    assert!(session.expires_at.unwrap() > Utc::now().timestamp());

    let event = events.next().await.unwrap();
    assert_eq!(event.kind, AuthChangeEvent::SignedIn);
    assert_eq!(event.session.as_ref(), Some(&session));

    assert!(harness.session_file.exists());
    let restored = harness.restart().auth().current_session().await.unwrap();
    assert_eq!(restored, Some(session));
}

#[tokio::test]
async fn test_sign_in_wrong_password() {
    let harness = Harness::new().await;

    let err = harness
        .backend
        .auth()
        .sign_in_with_password(EMAIL, "wrong")
        .await
        .unwrap_err();

    assert!(matches!(err, auth::Error::Response { status: 400, .. }));
    assert_eq!(err.to_string(), "Invalid login credentials");
    assert!(!harness.session_file.exists());
}

#[tokio::test]
async fn test_sign_up() {
    let harness = Harness::new().await;
    let auth = harness.backend.auth();

    let session = auth.sign_up("new@x.com", "pw").await.unwrap();
    assert_eq!(session.unwrap().access_token, "access-new");

    harness.fake.lock().confirm_signups = true;
    assert_eq!(auth.sign_up("other@x.com", "pw").await.unwrap(), None);
}

#[tokio::test]
async fn test_sign_out() {
    let harness = Harness::new().await;
    let auth = harness.backend.auth();
    auth.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();
    let mut events = auth.subscribe();

    auth.sign_out().await.unwrap();

    assert_eq!(harness.fake.lock().logouts, 1);
    assert_eq!(auth.current_session().await.unwrap(), None);
    assert!(!harness.session_file.exists());
    let event = events.next().await.unwrap();
    assert_eq!(event.kind, AuthChangeEvent::SignedOut);
    assert_eq!(event.session, None);

    // Signing out while signed out doesn't bother the server
    auth.sign_out().await.unwrap();
    assert_eq!(harness.fake.lock().logouts, 1);
}

#[tokio::test]
async fn test_expired_session_is_refreshed() {
    let harness = Harness::new().await;
    let stale = json!({
        "access_token": "access-old",
        "refresh_token": "refresh-old",
        "expires_at": Utc::now().timestamp() - 60,
        "user": user(),
    });
    std::fs::write(&harness.session_file, stale.to_string()).unwrap();

    let backend = harness.restart();
    let mut events = backend.auth().subscribe();

    let session = backend.auth().current_session().await.unwrap().unwrap();

    assert_eq!(session.access_token, "access-2");
    assert_eq!(session.refresh_token, "refresh-2");
    assert_eq!(events.next().await.unwrap().kind, AuthChangeEvent::TokenRefreshed);
}

#[tokio::test]
async fn test_expired_session_is_refreshed_before_requests() {
    let harness = Harness::new().await;
    let stale = json!({
        "access_token": "access-old",
        "refresh_token": "refresh-old",
        "expires_at": Utc::now().timestamp() - 60,
        "user": user(),
    });
    std::fs::write(&harness.session_file, stale.to_string()).unwrap();

    // Straight to the profile, without asking for the session first
    let backend = harness.restart();
    let session: auth::Session = serde_json::from_value(stale).unwrap();
    let mut editor = ProfileEditor::new(session);

    assert_eq!(editor.load(&backend).await, None);
    let headers = harness.fake.lock().last_rest_headers.clone().unwrap();
    assert_eq!(headers.get("authorization").unwrap(), "Bearer access-2");

    backend
        .storage()
        .upload("avatars", "u1/me.png", b"png".to_vec(), "image/png")
        .await
        .unwrap();
    assert_eq!(
        harness.fake.lock().last_upload_auth.as_deref(),
        Some("Bearer access-2")
    );

    let stored = backend.auth().current_session().await.unwrap().unwrap();
    assert_eq!(stored.access_token, "access-2");
}

#[tokio::test]
async fn test_rejected_refresh_signs_out() {
    let harness = Harness::new().await;
    let stale = json!({
        "access_token": "access-old",
        "refresh_token": "revoked",
        "expires_at": Utc::now().timestamp() - 60,
        "user": user(),
    });
    std::fs::write(&harness.session_file, stale.to_string()).unwrap();

    let backend = harness.restart();
    let mut events = backend.auth().subscribe();

    let err = backend.auth().current_session().await.unwrap_err();

    assert_eq!(err.to_string(), "Invalid Refresh Token");
    assert_eq!(events.next().await.unwrap().kind, AuthChangeEvent::SignedOut);
    assert!(!harness.session_file.exists());

    // The controller treats the failure as no session
    let controller = SessionController::mount(harness.restart()).await;
    assert_eq!(controller.screen(), Screen::SignIn);
}

#[tokio::test]
async fn test_profile_round_trip() {
    let harness = Harness::new().await;
    let session = harness
        .backend
        .auth()
        .sign_in_with_password(EMAIL, PASSWORD)
        .await
        .unwrap();

    let records = harness.backend.records();
    let err = records.select_profile("u1").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        err.to_string(),
        "JSON object requested, multiple (or no) rows returned"
    );

    let headers = harness.fake.lock().last_rest_headers.clone().unwrap();
    assert_eq!(headers.get("apikey").unwrap(), ANON_KEY);
    assert_eq!(headers.get("authorization").unwrap(), "Bearer access-1");

    // First save creates the row, later loads see it
    let mut editor = ProfileEditor::new(session.clone());
    assert_eq!(editor.load(&harness.backend).await, None);
    editor.set_first_name("Ann");
    editor.set_last_name("Lee");
    assert_eq!(editor.avatar_uploaded(&harness.backend, "u1/avatar.png").await, None);

    let row = harness.fake.lock().profiles.get("u1").cloned().unwrap();
    assert_eq!(row["id"], "u1");
    assert_eq!(row["first_name"], "Ann");
    assert_eq!(row["last_name"], "Lee");
    assert_eq!(row["avatar_url"], "u1/avatar.png");
    assert!(row["updated_at"].is_string());

    let mut fresh = ProfileEditor::new(session);
    assert_eq!(fresh.load(&harness.backend).await, None);
    assert_eq!(fresh.first_name(), "Ann");
    assert_eq!(fresh.last_name(), "Lee");
    assert_eq!(fresh.avatar_url(), "u1/avatar.png");
    assert!(!fresh.loading());
}

#[tokio::test]
async fn test_objects() {
    let harness = Harness::new().await;
    let storage = harness.backend.storage();

    let key = storage
        .upload("avatars", "u1/me.png", b"png bytes".to_vec(), "image/png")
        .await
        .unwrap();
    assert_eq!(key, "u1/me.png");
    assert_eq!(
        harness.fake.lock().objects.get("avatars/u1/me.png").unwrap(),
        &("image/png".to_string(), b"png bytes".to_vec())
    );

    let bytes = storage.download("avatars", "u1/me.png").await.unwrap();
    assert_eq!(bytes, b"png bytes");

    let err = storage.download("avatars", "u1/gone.png").await.unwrap_err();
    assert_eq!(err, storage::Error::NotFound("Object not found".into()));
}
