//! # Configuration
//!
//! Client settings loaded from a TOML file. Every section has defaults, so an
//! empty file (or no file at all) yields a working local setup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Arguments
/// - `path`: Path to the TOML configuration file
///
/// # Returns
/// - `Ok(T)`: Successfully loaded and parsed configuration
/// - `Err`: File I/O or parsing error
///
/// # Example
/// ```ignore
/// let config: ClientConfig = load_config("config/datemate.toml")?;
/// ```
pub fn load_config<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: T = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Complete client configuration.
///
/// # Example TOML
///
/// ```toml
/// [api]
/// base_url = "http://127.0.0.1:8000/api"
/// origin = "http://localhost:3000"
/// timeout_secs = 30
///
/// [storage]
/// dir = ".datemate"
///
/// [images]
/// max_file_bytes = 5242880
/// max_dimension = 800
/// jpeg_quality = 70
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Where the dating API lives and how to talk to it
    pub api: ApiConfig,
    /// Durable client-side storage
    pub storage: StorageConfig,
    /// Image ingestion limits
    pub images: ImageConfig,
}

/// API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to
    pub base_url: String,
    /// Value of the `Origin` header sent with each request
    pub origin: String,
    /// Whole-request timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            origin: "http://localhost:3000".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Durable storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one store file per API origin
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".datemate"),
        }
    }
}

/// Image ingestion limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Largest accepted file before compression (bytes)
    pub max_file_bytes: u64,
    /// Bound on both width and height after resizing (pixels)
    pub max_dimension: u32,
    /// JPEG quality factor, 1-100
    pub jpeg_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 5 * 1024 * 1024,
            max_dimension: 800,
            jpeg_quality: 70,
        }
    }
}

impl ClientConfig {
    /// Loads the configuration from `path`, or the defaults when no path is given.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => load_config(path),
            None => Ok(Self::default()),
        }
    }
}
