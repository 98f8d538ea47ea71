//! # Registration Form
//!
//! Turns raw collected input into the [`NewUser`] payload the API expects.

use serde::{Deserialize, Serialize};

use super::messages::NewUser;
use crate::error::ApiError;
use crate::processing::ImageAsset;

pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: u32 = 120;

/// Status that maps to `true` for the boolean `smoking`/`drinking` fields.
const REGULAR_HABIT: &str = "Regularly";

/// Raw registration input, as typed by the user.
///
/// Every text field may be empty; `into_new_user` decides what is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub name: String,
    /// Kept as text until validation
    pub age: String,
    pub gender: String,
    pub preferred_gender: String,
    pub location: String,
    pub religion: String,
    pub education_level: String,
    pub profession: String,
    /// One of "Never", "Occasionally", "Regularly", "Trying to quit", "Prefer not to say"
    pub smoker: String,
    /// One of "Never", "Socially", "Occasionally", "Regularly", "Prefer not to say"
    pub drinker: String,
    pub diet: String,
    pub hobbies: Vec<String>,
    pub languages: Vec<String>,
    #[serde(skip)]
    profile_image: Option<String>,
}

impl RegistrationForm {
    /// Attaches a processed profile photo, consuming the asset.
    pub fn attach_image(&mut self, asset: ImageAsset) {
        self.profile_image = Some(asset.into_data_uri());
    }

    pub fn has_image(&self) -> bool {
        self.profile_image.is_some()
    }

    /// Validates the form and builds the registration payload.
    ///
    /// # Errors
    /// `InvalidForm` when a required field is empty or the age is not a number
    /// between 18 and 120.
    pub fn into_new_user(self) -> Result<NewUser, ApiError> {
        let required = [
            &self.email,
            &self.password,
            &self.name,
            &self.age,
            &self.gender,
            &self.preferred_gender,
            &self.location,
        ];
        if required.iter().any(|field| field.trim().is_empty())
            || self.hobbies.is_empty()
            || self.languages.is_empty()
        {
            return Err(ApiError::InvalidForm(
                "Please fill in all required fields including hobbies and languages".to_string(),
            ));
        }

        let age = leading_integer(&self.age)
            .filter(|age| (MIN_AGE..=MAX_AGE).contains(age))
            .ok_or_else(|| {
                ApiError::InvalidForm(format!(
                    "Please enter a valid age between {} and {}",
                    MIN_AGE, MAX_AGE
                ))
            })?;

        Ok(NewUser {
            email: self.email,
            password: self.password,
            name: self.name,
            age,
            gender: self.gender.to_lowercase(),
            preferred_gender: self.preferred_gender.to_lowercase(),
            location: self.location,
            religion: non_empty(self.religion),
            education_level: non_empty(self.education_level),
            profession: non_empty(self.profession),
            // Only "Regularly" counts; every other status collapses to false.
            smoking: self.smoker == REGULAR_HABIT,
            drinking: self.drinker == REGULAR_HABIT,
            diet: non_empty(self.diet),
            hobbies: self.hobbies,
            languages: self.languages,
            profile_image: self.profile_image,
        })
    }
}

/// Reads the integer at the start of `text` the way form inputs are usually
/// read: leading whitespace and a `+` sign are skipped, digits are taken up to
/// the first non-digit ("29.5" and "29yo" both read as 29). `None` when no digit
/// leads, or for a negative or overflowing number.
fn leading_integer(text: &str) -> Option<u32> {
    let text = text.trim_start();
    let text = text.strip_prefix('+').unwrap_or(text);
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    text[..end].parse().ok()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
