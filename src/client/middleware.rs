//! # Client Middleware
//!
//! The Session/Request Boundary: the single choke point every API call goes
//! through, and the only owner of the bearer token.
//!
//! ## Responsibilities
//!
//! The [`ClientMiddleware`] struct manages:
//! - **Session lifecycle**: restores the token from the durable store, persists it
//!   on login, drops it on logout or on a 401
//! - **Request decoration**: bearer token (when a session exists), content
//!   negotiation and credential passthrough via [`ClientCore`]
//! - **Error translation**: 401 → `Unauthorized`, other non-2xx →
//!   `RequestFailed` with the server's detail
//! - **Unauthorized signal**: invokes the caller's handler so the caller decides
//!   where to send the user; nothing is redirected from in here
//! - **Metrics**: optional per-request latency and outcome recording
//!
//! ## Architecture
//!
//! - It owns a [`ClientCore`] via `Arc` for the actual HTTP exchange
//! - It owns the [`Session`] value and the [`KvStore`] it is mirrored into
//! - Endpoint helpers (`next_profile`, `record_swipe`, ...) are thin typed
//!   wrappers over [`ClientMiddleware::request`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! let core = Arc::new(ClientCore::new(&config.api)?);
//! let store: Arc<dyn KvStore> = Arc::new(FileStore::for_origin(&config.storage.dir, &config.api.base_url)?);
//!
//! let client = ClientMiddleware::restore(core, store)
//!     .await?
//!     .with_unauthorized_handler(|| eprintln!("session expired, please log in"));
//!
//! client.login("ana@example.com", "s3cret").await?;
//! let next = client.next_profile().await?;
//! ```
//!
//! No request is ever retried.

use log::{debug, error, info, warn};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock, RwLockWriteGuard};
use std::time::Instant;

use super::client::{ClientCore, Payload, RawResponse};
use super::metrics::ClientMetrics;
use crate::common::messages::{NewUser, Profile, Recommendations, SwipeAck, SwipeRequest, TokenResponse};
use crate::error::{ApiError, Result};
use crate::session::{KvStore, PhotoCache, Session, TOKEN_KEY};

/// Called once for every request that ends in a 401.
pub type UnauthorizedHandler = Arc<dyn Fn() + Send + Sync>;

/// Method and body of an authenticated request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            body: None,
        }
    }

    pub fn post<T: Serialize>(body: &T) -> Result<Self> {
        Ok(Self {
            method: Method::POST,
            body: Some(to_json(body)?),
        })
    }

    pub fn put<T: Serialize>(body: &T) -> Result<Self> {
        Ok(Self {
            method: Method::PUT,
            body: Some(to_json(body)?),
        })
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

fn to_json<T: Serialize>(body: &T) -> Result<Value> {
    serde_json::to_value(body)
        .map_err(|e| ApiError::InvalidForm(format!("payload cannot be serialized: {}", e)))
}

fn from_json<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::InvalidResponse(format!("unreadable {}: {}", what, e)))
}

/// The Session/Request Boundary.
pub struct ClientMiddleware {
    /// HTTP transport
    core: Arc<ClientCore>,
    /// Durable storage the token is mirrored into
    store: Arc<dyn KvStore>,
    /// Current session; the lock is never held across an await
    session: RwLock<Session>,
    /// Caller's reaction to a 401
    on_unauthorized: Option<UnauthorizedHandler>,
    /// Optional request metrics
    metrics: Option<Arc<Mutex<ClientMetrics>>>,
}

impl ClientMiddleware {
    /// Creates the middleware, restoring any token left in the durable store.
    ///
    /// # Errors
    /// `Store` if the durable store cannot be read.
    pub async fn restore(core: Arc<ClientCore>, store: Arc<dyn KvStore>) -> Result<Self> {
        let token = store.get(TOKEN_KEY).await?;
        if token.is_some() {
            info!("Restored session from durable store");
        }

        Ok(Self {
            core,
            store,
            session: RwLock::new(Session::new(token)),
            on_unauthorized: None,
            metrics: None,
        })
    }

    /// Sets the handler run when the server answers 401.
    pub fn with_unauthorized_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_unauthorized = Some(Arc::new(handler));
        self
    }

    /// Records every request into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<Mutex<ClientMetrics>>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        let session = self.session.read().unwrap_or_else(|poisoned| {
            error!("Session lock poisoned, reading the last session value");
            poisoned.into_inner()
        });
        session.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_active()
    }

    /// Photo cache sharing this client's durable store.
    pub fn photo_cache(&self) -> PhotoCache {
        PhotoCache::new(self.store.clone())
    }

    // ========== SESSION ==========

    /// Exchanges credentials for a bearer token and starts a session.
    ///
    /// Credentials go out form-encoded (`username`, `password`), never as JSON.
    ///
    /// # Errors
    /// - `AuthFailed` with the server's detail on a non-2xx answer
    /// - `AuthFailed` when a 2xx answer carries no `access_token`; the store is
    ///   left untouched
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse> {
        info!("Logging in as {}", email);

        let form = vec![
            ("username".to_string(), email.to_string()),
            ("password".to_string(), password.to_string()),
        ];
        let response = self
            .send_recorded(Method::POST, "/token", None, Payload::Form(form))
            .await?;

        if !response.is_success() {
            let detail = response.detail().unwrap_or_else(|| "Login failed".to_string());
            warn!("❌ Login rejected ({}): {}", response.status.as_u16(), detail);
            return Err(ApiError::AuthFailed(detail));
        }

        let body = response.body.unwrap_or(Value::Null);
        let token_response: TokenResponse = serde_json::from_value(body)
            .map_err(|_| ApiError::AuthFailed("No token received".to_string()))?;

        let token = match token_response.access_token.as_deref() {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                warn!("❌ Login response carried no access token");
                return Err(ApiError::AuthFailed("No token received".to_string()));
            }
        };

        self.store.set(TOKEN_KEY, token.clone()).await?;
        self.session_mut().begin(token);

        info!("✅ Logged in as {}", email);
        Ok(token_response)
    }

    /// Creates an account. Never sends a bearer token.
    ///
    /// # Errors
    /// `RegistrationFailed` with the server's detail on a non-2xx answer.
    pub async fn register(&self, user: &NewUser) -> Result<Profile> {
        info!("Registering {}", user.email);

        let response = self
            .send_recorded(Method::POST, "/users", None, Payload::Json(to_json(user)?))
            .await?;

        if !response.is_success() {
            let detail = response
                .detail()
                .unwrap_or_else(|| "Registration failed".to_string());
            warn!(
                "❌ Registration rejected ({}): {}",
                response.status.as_u16(),
                detail
            );
            return Err(ApiError::RegistrationFailed(detail));
        }

        let profile = from_json(response.body.unwrap_or(Value::Null), "created profile")?;
        info!("✅ Registered {}", user.email);
        Ok(profile)
    }

    /// Ends the session: token out of the durable store and memory, photo cache
    /// dropped. Safe to call without a session.
    pub async fn logout(&self) -> Result<()> {
        let had_session = self.session_mut().end();

        self.store.remove(TOKEN_KEY).await?;
        self.photo_cache().clear().await?;

        if had_session {
            info!("Logged out");
        } else {
            debug!("Logout without an active session");
        }
        Ok(())
    }

    // ========== REQUESTS ==========

    /// Sends an authenticated request and returns the parsed body (`null` when
    /// the body is empty).
    ///
    /// # Errors
    /// - `Unauthorized` on 401, after the token has been cleared from the store
    ///   and the session, and the unauthorized handler has run (once)
    /// - `RequestFailed` on any other non-2xx, carrying the server's detail or
    ///   `"Request failed"`
    /// - `Transport`/`InvalidResponse` for network or body failures
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Value> {
        let token = self.session().token().map(str::to_string);
        let payload = match options.body {
            Some(body) => Payload::Json(body),
            None => Payload::Empty,
        };

        let response = self
            .send_recorded(options.method, endpoint, token.as_deref(), payload)
            .await?;

        if response.status == StatusCode::UNAUTHORIZED {
            self.end_unauthorized_session(endpoint).await;
            return Err(ApiError::Unauthorized);
        }

        if !response.is_success() {
            let detail = response
                .detail()
                .unwrap_or_else(|| "Request failed".to_string());
            error!(
                "API request error: {} -> {} {}",
                endpoint,
                response.status.as_u16(),
                detail
            );
            return Err(ApiError::RequestFailed {
                status: response.status.as_u16(),
                detail,
            });
        }

        Ok(response.body.unwrap_or(Value::Null))
    }

    /// [`request`](Self::request), deserializing the body into `T`.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let body = self.request(endpoint, options).await?;
        from_json(body, endpoint)
    }

    // ========== ENDPOINTS ==========

    /// Next candidate in the discovery feed; `None` once the feed is exhausted.
    pub async fn next_profile(&self) -> Result<Option<Profile>> {
        match self.request_as("/profiles/next", RequestOptions::get()).await {
            Ok(profile) => Ok(Some(profile)),
            Err(ApiError::RequestFailed { status, detail })
                if status == 404 || detail.contains("No more profiles") =>
            {
                info!("No more profiles available");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Records a like (`liked = true`) or pass on a profile.
    pub async fn record_swipe(&self, profile_id: &str, liked: bool) -> Result<SwipeAck> {
        let swipe = SwipeRequest {
            swiped_id: profile_id.to_string(),
            liked,
        };
        self.request_as("/swipes", RequestOptions::post(&swipe)?)
            .await
    }

    /// Recommended matches, with hobbies/languages normalized.
    ///
    /// # Errors
    /// `InvalidResponse` when the body has no `data.profiles` array.
    pub async fn recommendations(&self) -> Result<Recommendations> {
        let body = self
            .request("/profiles/recommended", RequestOptions::get())
            .await?;
        Recommendations::from_response(body)
    }

    /// The current user's profile.
    pub async fn my_profile(&self) -> Result<Profile> {
        self.request_as("/profiles/me", RequestOptions::get()).await
    }

    /// Replaces fields of the current user's profile.
    pub async fn update_profile<T: Serialize>(&self, update: &T) -> Result<Profile> {
        self.request_as("/profiles/me", RequestOptions::put(update)?)
            .await
    }

    // ========== INTERNALS ==========

    /// Write access to the session. Every update is a single assignment, so
    /// the value behind a poisoned lock is still whole and is used as-is.
    fn session_mut(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(|poisoned| {
            error!("Session lock poisoned, updating the last session value");
            poisoned.into_inner()
        })
    }

    /// Tears the session down after a 401. Runs before the failing call returns.
    async fn end_unauthorized_session(&self, endpoint: &str) {
        warn!("❌ {} answered 401, ending session", endpoint);

        self.session_mut().end();
        if let Err(e) = self.store.remove(TOKEN_KEY).await {
            error!("Failed to clear stored token after 401: {}", e);
        }
        if let Some(handler) = &self.on_unauthorized {
            handler();
        }
    }

    /// Sends through the core, recording metrics when enabled.
    async fn send_recorded(
        &self,
        method: Method,
        endpoint: &str,
        token: Option<&str>,
        payload: Payload,
    ) -> Result<RawResponse> {
        let started = Instant::now();
        let result = self
            .core
            .send(method.clone(), endpoint, token, payload)
            .await;

        if let Some(metrics) = &self.metrics {
            let (status, failure) = match &result {
                Ok(response) if response.is_success() => (Some(response.status.as_u16()), None),
                Ok(response) => (
                    Some(response.status.as_u16()),
                    Some(
                        response
                            .status
                            .canonical_reason()
                            .unwrap_or("HTTP error")
                            .to_string(),
                    ),
                ),
                Err(e) => (None, Some(e.to_string())),
            };
            if let Ok(mut metrics) = metrics.lock() {
                metrics.record_request(
                    method.as_str(),
                    endpoint,
                    started.elapsed(),
                    status,
                    failure,
                );
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::ApiConfig;
    use crate::session::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_request_options() {
        assert_eq!(RequestOptions::default().method, Method::GET);
        assert!(RequestOptions::get().body.is_none());

        let swipe = SwipeRequest {
            swiped_id: "p1".to_string(),
            liked: true,
        };
        let options = RequestOptions::post(&swipe).unwrap();
        assert_eq!(options.method, Method::POST);
        assert_eq!(options.body, Some(json!({ "swiped_id": "p1", "liked": true })));

        let options = RequestOptions::put(&json!({ "location": "Lisbon" })).unwrap();
        assert_eq!(options.method, Method::PUT);
    }

    #[tokio::test]
    async fn test_restore_picks_up_stored_token() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        store.set(TOKEN_KEY, "abc".to_string()).await.unwrap();

        let core = Arc::new(ClientCore::new(&ApiConfig::default()).unwrap());
        let client = ClientMiddleware::restore(core, store).await.unwrap();

        assert!(client.is_authenticated());
        assert_eq!(client.session().token(), Some("abc"));
    }

    #[tokio::test]
    async fn test_logout_without_session_is_noop() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let core = Arc::new(ClientCore::new(&ApiConfig::default()).unwrap());
        let client = ClientMiddleware::restore(core, store.clone()).await.unwrap();

        client.logout().await.unwrap();
        client.logout().await.unwrap();

        assert!(!client.is_authenticated());
        assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_poisoned_session_lock_still_tracks_the_token() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        store.set(TOKEN_KEY, "abc".to_string()).await.unwrap();
        let core = Arc::new(ClientCore::new(&ApiConfig::default()).unwrap());
        let client = ClientMiddleware::restore(core, store.clone()).await.unwrap();

        let lock = &client.session;
        std::thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = lock.write().unwrap();
                    panic!("poison the session lock");
                })
                .join();
        });
        assert!(client.session.is_poisoned());

        assert_eq!(client.session().token(), Some("abc"));

        client.logout().await.unwrap();
        assert!(!client.is_authenticated());
        assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
    }
}
