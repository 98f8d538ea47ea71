//! # Session State
//!
//! - [`Session`]: the in-memory session value (at most one bearer token)
//! - [`store`]: durable key-value storage the token and photo cache live in
//! - [`photo_cache`]: per-profile photo URLs with a 24 hour freshness window
//!
//! Only [`ClientMiddleware`](crate::client::ClientMiddleware) writes the token;
//! everything else asks it.

pub mod photo_cache;
pub mod store;

pub use photo_cache::PhotoCache;
pub use store::{FileStore, KvStore, MemoryStore, PHOTO_CACHE_KEY, TOKEN_KEY};

/// The current session.
///
/// Holding a token does not mean it is valid; the server decides that, and a
/// 401 ends the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.token.is_some()
    }

    /// Starts a new session, replacing any previous token.
    pub fn begin(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Ends the session. Returns whether there was one.
    pub fn end(&mut self) -> bool {
        self.token.take().is_some()
    }
}
