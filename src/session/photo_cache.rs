//! Profile photo cache.
//!
//! Keeps the photo picked for each profile stable across runs for 24 hours,
//! so a profile does not change face every time it is shown. The whole cache
//! shares one timestamp, refreshed on every write.

use anyhow::Result;
use chrono::Utc;
use log::{debug, warn};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::store::{KvStore, PHOTO_CACHE_KEY};

/// How long cached photos stay valid (milliseconds).
pub const CACHE_EXPIRY_MS: i64 = 24 * 60 * 60 * 1000;

const FALLBACK_MALE: &[&str] = &[
    "https://images.unsplash.com/photo-1500648767791-00dcc994a43e",
    "https://images.unsplash.com/photo-1568602471122-7832951cc4c5",
    "https://images.unsplash.com/photo-1570295999919-56ceb5ecca61",
    "https://images.unsplash.com/photo-1506794778202-cad84cf45f1d",
    "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d",
    "https://images.unsplash.com/photo-1519085360753-af0119f7cbe7",
    "https://images.unsplash.com/photo-1563351672-62b74891a28a",
    "https://images.unsplash.com/photo-1557862921-37829c790f19",
    "https://images.unsplash.com/photo-1564564321837-a57b7070ac4f",
    "https://images.unsplash.com/photo-1548372290-8d01b6c8e78c",
];

const FALLBACK_FEMALE: &[&str] = &[
    "https://images.unsplash.com/photo-1494790108377-be9c29b29330",
    "https://images.unsplash.com/photo-1438761681033-6461ffad8d80",
    "https://images.unsplash.com/photo-1544005313-94ddf0286df2",
    "https://images.unsplash.com/photo-1531123897727-8f129e1688ce",
    "https://images.unsplash.com/photo-1554151228-14d9def656e4",
    "https://images.unsplash.com/photo-1529626455594-4ff0802cfb7e",
    "https://images.unsplash.com/photo-1573496359142-b8d87734a5a2",
    "https://images.unsplash.com/photo-1487412720507-e7ab37603c6f",
    "https://images.unsplash.com/photo-1502823403499-6ccfcf4fb453",
    "https://images.unsplash.com/photo-1546961329-78bef0414d7c",
];

/// Stored form of the cache.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CachedPhotos {
    /// Milliseconds since epoch of the last write
    timestamp: i64,
    photos: HashMap<String, String>,
}

/// Photo URLs per profile id, persisted in a [`KvStore`].
pub struct PhotoCache {
    store: Arc<dyn KvStore>,
}

impl PhotoCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// All cached photos, or an empty map once the cache has expired.
    pub async fn photos(&self) -> Result<HashMap<String, String>> {
        self.photos_at(Utc::now().timestamp_millis()).await
    }

    /// The cached photo for a profile, or a random fallback for its gender that
    /// is cached before being returned.
    pub async fn photo_for(&self, profile_id: &str, gender: &str) -> Result<String> {
        self.photo_for_at(profile_id, gender, Utc::now().timestamp_millis())
            .await
    }

    /// Drops the whole cache.
    pub async fn clear(&self) -> Result<()> {
        self.store.remove(PHOTO_CACHE_KEY).await?;
        Ok(())
    }

    async fn photos_at(&self, now_ms: i64) -> Result<HashMap<String, String>> {
        let raw = match self.store.get(PHOTO_CACHE_KEY).await? {
            Some(raw) => raw,
            None => return Ok(HashMap::new()),
        };

        match serde_json::from_str::<CachedPhotos>(&raw) {
            Ok(cached) if now_ms - cached.timestamp < CACHE_EXPIRY_MS => Ok(cached.photos),
            Ok(_) => {
                debug!("Photo cache expired");
                Ok(HashMap::new())
            }
            Err(e) => {
                warn!("Ignoring unreadable photo cache: {}", e);
                Ok(HashMap::new())
            }
        }
    }

    async fn photo_for_at(&self, profile_id: &str, gender: &str, now_ms: i64) -> Result<String> {
        let mut photos = self.photos_at(now_ms).await?;
        if let Some(url) = photos.get(profile_id) {
            return Ok(url.clone());
        }

        let url = fallback_photo(gender).to_string();
        photos.insert(profile_id.to_string(), url.clone());

        let cached = CachedPhotos {
            timestamp: now_ms,
            photos,
        };
        self.store
            .set(PHOTO_CACHE_KEY, serde_json::to_string(&cached)?)
            .await?;

        Ok(url)
    }
}

/// Random photo from the collection matching `gender`; anything but "female"
/// uses the male collection.
fn fallback_photo(gender: &str) -> &'static str {
    let collection = if gender.eq_ignore_ascii_case("female") {
        FALLBACK_FEMALE
    } else {
        FALLBACK_MALE
    };
    collection
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FALLBACK_MALE[0])
}
