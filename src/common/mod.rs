//! # Common Components
//!
//! Shared utilities and data structures used by the client and the pipeline.
//!
//! ## Modules
//!
//! - [`config`]: TOML configuration with defaults
//! - [`messages`]: JSON wire types exchanged with the dating API
//! - [`fields`]: normalization of multi-value profile fields
//! - [`forms`]: registration form validation and payload building

pub mod config;
pub mod fields;
pub mod forms;
pub mod messages;
