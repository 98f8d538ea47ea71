//! Session/Request Boundary against a mock API server.

use axum::{
    extract::{Form, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use datemate_client::client::{ClientCore, ClientMetrics, ClientMiddleware, RequestOptions};
use datemate_client::common::config::ApiConfig;
use datemate_client::common::forms::RegistrationForm;
use datemate_client::common::messages::Recommendations;
use datemate_client::session::{KvStore, MemoryStore, PHOTO_CACHE_KEY, TOKEN_KEY};
use datemate_client::ApiError;

const TOKEN: &str = "tok-1";

#[derive(Default)]
struct MockState {
    /// (path, Authorization header) for every request that reached the server
    seen: Mutex<Vec<(String, Option<String>)>>,
    origins: Mutex<Vec<Option<String>>>,
}

impl MockState {
    fn record(&self, path: &str, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.seen
            .lock()
            .unwrap()
            .push((path.to_string(), header("authorization")));
        self.origins.lock().unwrap().push(header("origin"));
    }

    fn auth_for(&self, path: &str) -> Vec<Option<String>> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, auth)| auth.clone())
            .collect()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some(format!("Bearer {}", TOKEN).as_str())
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Could not validate credentials" })),
    )
}

fn ana() -> Value {
    json!({
        "_id": "u-ana",
        "name": "Ana",
        "email": "ana@example.com",
        "age": 29,
        "gender": "female",
        "hobbies": "Hiking, Yoga",
        "languages": ["English"]
    })
}

async fn token(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    state.record("/token", &headers);
    match form.get("password").map(String::as_str) {
        Some("right") => (
            StatusCode::OK,
            Json(json!({ "access_token": TOKEN, "token_type": "bearer" })),
        ),
        Some("no-token") => (StatusCode::OK, Json(json!({ "token_type": "bearer" }))),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Incorrect email or password" })),
        ),
    }
}

async fn create_user(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.record("/users", &headers);
    if body["email"] == "taken@example.com" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Email already registered" })),
        );
    }
    let mut profile = body;
    if let Some(fields) = profile.as_object_mut() {
        fields.remove("password");
        fields.insert("_id".to_string(), json!("u-new"));
    }
    (StatusCode::OK, Json(profile))
}

async fn me(State(state): State<Arc<MockState>>, headers: HeaderMap) -> impl IntoResponse {
    state.record("/profiles/me", &headers);
    if !authorized(&headers) {
        return unauthorized();
    }
    (StatusCode::OK, Json(ana()))
}

async fn update_me(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(update): Json<Value>,
) -> impl IntoResponse {
    state.record("/profiles/me", &headers);
    if !authorized(&headers) {
        return unauthorized();
    }
    if update.get("age").is_some_and(|age| !age.is_u64()) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": "age must be a number" })),
        );
    }
    let mut profile = ana();
    if let (Some(fields), Some(changes)) = (profile.as_object_mut(), update.as_object()) {
        for (key, value) in changes {
            fields.insert(key.clone(), value.clone());
        }
    }
    (StatusCode::OK, Json(profile))
}

async fn next(State(state): State<Arc<MockState>>, headers: HeaderMap) -> impl IntoResponse {
    state.record("/profiles/next", &headers);
    if !authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": "No more profiles available" })),
    )
}

async fn swipe(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.record("/swipes", &headers);
    if !authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "_id": "s-1",
            "swiper_id": "u-ana",
            "swiped_id": body["swiped_id"],
            "liked": body["liked"]
        })),
    )
}

async fn recommended(State(state): State<Arc<MockState>>, headers: HeaderMap) -> impl IntoResponse {
    state.record("/profiles/recommended", &headers);
    if !authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "message": "Based on your likes",
            "data": { "profiles": [ana(), { "_id": "u-bo", "name": "Bo", "hobbies": "" }] }
        })),
    )
}

async fn malformed(State(state): State<Arc<MockState>>, headers: HeaderMap) -> impl IntoResponse {
    state.record("/malformed", &headers);
    Json(json!({ "profiles": [] }))
}

async fn broken(State(state): State<Arc<MockState>>, headers: HeaderMap) -> impl IntoResponse {
    state.record("/broken", &headers);
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
}

async fn spawn_api() -> (String, Arc<MockState>) {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/api/token", post(token))
        .route("/api/users", post(create_user))
        .route("/api/profiles/me", get(me).put(update_me))
        .route("/api/profiles/next", get(next))
        .route("/api/profiles/recommended", get(recommended))
        .route("/api/swipes", post(swipe))
        .route("/api/malformed", get(malformed))
        .route("/api/broken", get(broken))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api", addr), state)
}

async fn client_for(base_url: &str, store: Arc<dyn KvStore>) -> ClientMiddleware {
    let core = Arc::new(
        ClientCore::new(&ApiConfig {
            base_url: base_url.to_string(),
            ..ApiConfig::default()
        })
        .unwrap(),
    );
    ClientMiddleware::restore(core, store).await.unwrap()
}

#[tokio::test]
async fn test_login_stores_token_and_authenticates_later_requests() {
    let (base_url, state) = spawn_api().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let client = client_for(&base_url, store.clone()).await;

    client.login("ana@example.com", "right").await.unwrap();
    assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some(TOKEN));
    assert!(client.is_authenticated());

    let profile = client.my_profile().await.unwrap();
    assert_eq!(profile.name, "Ana");
    assert_eq!(profile.hobbies, vec!["Hiking", "Yoga"]);

    assert_eq!(state.auth_for("/token"), vec![None]);
    assert_eq!(
        state.auth_for("/profiles/me"),
        vec![Some(format!("Bearer {}", TOKEN))]
    );
    assert!(state
        .origins
        .lock()
        .unwrap()
        .iter()
        .all(|origin| origin.as_deref() == Some("http://localhost:3000")));
}

#[tokio::test]
async fn test_session_survives_restart_through_the_store() {
    let (base_url, _state) = spawn_api().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());

    client_for(&base_url, store.clone())
        .await
        .login("ana@example.com", "right")
        .await
        .unwrap();

    let restored = client_for(&base_url, store).await;
    assert!(restored.is_authenticated());
    assert_eq!(restored.my_profile().await.unwrap().id, "u-ana");
}

#[tokio::test]
async fn test_login_without_token_leaves_store_untouched() {
    let (base_url, _state) = spawn_api().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let client = client_for(&base_url, store.clone()).await;

    let err = client.login("ana@example.com", "no-token").await.unwrap_err();
    assert!(matches!(err, ApiError::AuthFailed(ref detail) if detail == "No token received"));
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_rejected_login_is_not_an_expired_session() {
    let (base_url, _state) = spawn_api().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let hook_calls = calls.clone();
    let client = client_for(&base_url, store)
        .await
        .with_unauthorized_handler(move || {
            hook_calls.fetch_add(1, Ordering::SeqCst);
        });

    let err = client.login("ana@example.com", "wrong").await.unwrap_err();
    assert!(
        matches!(err, ApiError::AuthFailed(ref detail) if detail == "Incorrect email or password")
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unauthorized_clears_session_once() {
    let (base_url, _state) = spawn_api().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    store.set(TOKEN_KEY, "expired".to_string()).await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let hook_calls = calls.clone();
    let client = client_for(&base_url, store.clone())
        .await
        .with_unauthorized_handler(move || {
            hook_calls.fetch_add(1, Ordering::SeqCst);
        });
    assert!(client.is_authenticated());

    let err = client.my_profile().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
    assert!(!client.is_authenticated());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_request_failure_carries_server_detail() {
    let (base_url, _state) = spawn_api().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let client = client_for(&base_url, store.clone()).await;
    client.login("ana@example.com", "right").await.unwrap();

    let err = client
        .update_profile(&json!({ "age": "old" }))
        .await
        .unwrap_err();
    match err {
        ApiError::RequestFailed { status, detail } => {
            assert_eq!(status, 422);
            assert_eq!(detail, "age must be a number");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let err = client
        .request("/broken", RequestOptions::get())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::RequestFailed { status: 500, ref detail } if detail == "Request failed"
    ));

    // Non-401 failures keep the session
    assert!(client.is_authenticated());
    assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some(TOKEN));
}

#[tokio::test]
async fn test_register_sends_no_bearer() {
    let (base_url, state) = spawn_api().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    store.set(TOKEN_KEY, TOKEN.to_string()).await.unwrap();
    let client = client_for(&base_url, store).await;

    let form = {
        let mut form = RegistrationForm::default();
        form.email = "new@example.com".to_string();
        form.password = "pw".to_string();
        form.name = "Noor".to_string();
        form.age = "31".to_string();
        form.gender = "Female".to_string();
        form.preferred_gender = "Male".to_string();
        form.location = "Lisbon".to_string();
        form.smoker = "Regularly".to_string();
        form.drinker = "Socially".to_string();
        form.hobbies = vec!["Chess".to_string()];
        form.languages = vec!["Portuguese".to_string()];
        form
    };
    let created = client.register(&form.into_new_user().unwrap()).await.unwrap();

    assert_eq!(created.id, "u-new");
    assert_eq!(created.gender.as_deref(), Some("female"));
    assert_eq!(created.smoking, Some(true));
    assert_eq!(created.drinking, Some(false));
    assert_eq!(state.auth_for("/users"), vec![None]);

    let err = client
        .register(&taken_form().into_new_user().unwrap())
        .await
        .unwrap_err();
    assert!(
        matches!(err, ApiError::RegistrationFailed(ref detail) if detail == "Email already registered")
    );
}

fn taken_form() -> RegistrationForm {
    {
        let mut form = RegistrationForm::default();
        form.email = "taken@example.com".to_string();
        form.password = "pw".to_string();
        form.name = "Taken".to_string();
        form.age = "40".to_string();
        form.gender = "Male".to_string();
        form.preferred_gender = "Female".to_string();
        form.location = "Porto".to_string();
        form.hobbies = vec!["Surf".to_string()];
        form.languages = vec!["English".to_string()];
        form
    }
}

#[tokio::test]
async fn test_logout_is_idempotent_and_drops_photo_cache() {
    let (base_url, _state) = spawn_api().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let client = client_for(&base_url, store.clone()).await;
    client.login("ana@example.com", "right").await.unwrap();

    let photo = client
        .photo_cache()
        .photo_for("u-ana", "female")
        .await
        .unwrap();
    assert!(photo.starts_with("https://"));
    assert!(store.get(PHOTO_CACHE_KEY).await.unwrap().is_some());

    client.logout().await.unwrap();
    client.logout().await.unwrap();

    assert!(!client.is_authenticated());
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
    assert_eq!(store.get(PHOTO_CACHE_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_discovery_and_matches() {
    let (base_url, _state) = spawn_api().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let client = client_for(&base_url, store).await;
    client.login("ana@example.com", "right").await.unwrap();

    assert_eq!(client.next_profile().await.unwrap(), None);

    let ack = client.record_swipe("u-bo", true).await.unwrap();
    assert_eq!(ack.swiped_id, "u-bo");
    assert!(ack.liked);

    let recommendations = client.recommendations().await.unwrap();
    assert_eq!(recommendations.message.as_deref(), Some("Based on your likes"));
    assert_eq!(recommendations.profiles.len(), 2);
    assert_eq!(recommendations.profiles[0].hobbies, vec!["Hiking", "Yoga"]);
    assert!(recommendations.profiles[1].hobbies.is_empty());
    assert_eq!(recommendations.profiles[1].languages, Vec::<String>::new());

    let body = client
        .request("/malformed", RequestOptions::get())
        .await
        .unwrap();
    assert!(matches!(
        Recommendations::from_response(body),
        Err(ApiError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_metrics_record_every_request() {
    let (base_url, _state) = spawn_api().await;
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let metrics = Arc::new(Mutex::new(ClientMetrics::new("test".to_string())));
    let client = client_for(&base_url, store)
        .await
        .with_metrics(metrics.clone());

    client.login("ana@example.com", "right").await.unwrap();
    client.my_profile().await.unwrap();
    client.logout().await.unwrap();
    let _ = client.my_profile().await;

    let stats = metrics.lock().unwrap().aggregate();
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.successful_requests, 2);
    assert_eq!(stats.unauthorized_responses, 1);
    assert_eq!(stats.endpoint_distribution.get("GET /profiles/me"), Some(&2));
}
