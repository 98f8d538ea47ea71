//! # Wire Types
//!
//! JSON shapes exchanged with the dating API.
//!
//! - Authentication: [`TokenResponse`]
//! - Registration: [`NewUser`]
//! - Discovery: [`Profile`], [`SwipeRequest`], [`SwipeAck`]
//! - Matches: [`Recommendations`]
//!
//! Profiles are read defensively: multi-value fields go through
//! [`deserialize_list`] and unknown fields are kept in [`Profile::extra`] so a
//! profile can be sent back without losing data.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::fields::deserialize_list;
use crate::error::ApiError;

/// Characters left alone by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Body of a successful `POST /token`.
///
/// `access_token` is optional here on purpose: a 2xx without it is an
/// `AuthFailed`, not a parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Registration payload for `POST /users`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub age: u32,
    /// Lower-cased
    pub gender: String,
    /// Lower-cased
    pub preferred_gender: String,
    pub location: String,
    pub religion: Option<String>,
    pub education_level: Option<String>,
    pub profession: Option<String>,
    pub smoking: bool,
    pub drinking: bool,
    pub diet: Option<String>,
    pub hobbies: Vec<String>,
    pub languages: Vec<String>,
    /// JPEG data URI produced by the image pipeline
    pub profile_image: Option<String>,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("age", &self.age)
            .field("gender", &self.gender)
            .field("preferred_gender", &self.preferred_gender)
            .field("location", &self.location)
            .field("has_profile_image", &self.profile_image.is_some())
            .finish_non_exhaustive()
    }
}

/// A user profile as served by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub preferred_gender: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub hobbies: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub languages: Vec<String>,
    #[serde(default)]
    pub profession: Option<String>,
    #[serde(default)]
    pub education_level: Option<String>,
    #[serde(default)]
    pub religion: Option<String>,
    #[serde(default)]
    pub diet: Option<String>,
    /// Free-text smoking status, when the server kept it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoker: Option<String>,
    /// Free-text drinking status, when the server kept it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drinker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoking: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drinking: Option<bool>,
    #[serde(default)]
    pub profile_image: Option<String>,
    /// Fields this client does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    /// URL to show for this profile: its own image, or a generated initials avatar.
    pub fn avatar_url(&self) -> String {
        match self.profile_image.as_deref() {
            Some(image) if !image.is_empty() => image.to_string(),
            _ => format!(
                "https://ui-avatars.com/api/?name={}&background=random&size=150",
                utf8_percent_encode(&self.name, URI_COMPONENT)
            ),
        }
    }
}

/// Body of `POST /swipes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwipeRequest {
    pub swiped_id: String,
    pub liked: bool,
}

/// The server's record of a swipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwipeAck {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub swiper_id: Option<String>,
    #[serde(default)]
    pub swiped_id: String,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Recommended matches for the current user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    /// Hint from the server, e.g. when there are no likes to learn from yet
    pub message: Option<String>,
    pub profiles: Vec<Profile>,
}

impl Recommendations {
    /// Extracts recommendations from a `{ message?, data: { profiles: [...] } }` body.
    ///
    /// # Errors
    /// `InvalidResponse` when `data.profiles` is missing or not an array, or when a
    /// profile in it cannot be read.
    pub fn from_response(body: Value) -> Result<Self, ApiError> {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);

        let profiles = match body.get("data").and_then(|data| data.get("profiles")) {
            Some(Value::Array(profiles)) => profiles.clone(),
            _ => {
                return Err(ApiError::InvalidResponse(
                    "Invalid response format from server".to_string(),
                ))
            }
        };

        let profiles = profiles
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Profile>, _>>()
            .map_err(|e| ApiError::InvalidResponse(format!("unreadable profile: {}", e)))?;

        Ok(Self { message, profiles })
    }
}

/// Pulls the server's `detail` message out of an error body.
///
/// String details are returned as-is; structured ones (validation errors) are
/// rendered as compact JSON.
pub fn error_detail(body: Option<&Value>) -> Option<String> {
    match body?.get("detail")? {
        Value::Null => None,
        Value::String(detail) => Some(detail.clone()),
        other => Some(other.to_string()),
    }
}
