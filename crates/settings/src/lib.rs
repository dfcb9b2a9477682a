//! EagleTunnel Settings
//!
//! Node configuration, stored as JSON.
//!
//! ## Features
//!
//! - Listen address and next hop
//! - Shared cipher key and authentication switch
//! - Local identity and accepted user table
//! - Static hosts and location tables
//!
//! ## Usage
//!
//! ```no_run
//! use eagletunnel_settings::Settings;
//!
//! // Load or create default settings
//! let mut settings = Settings::load_or_default()?;
//!
//! // Modify settings
//! settings.relayer = Some("10.0.0.2:8080".to_string());
//!
//! // Save settings
//! settings.save()?;
//! # Ok::<(), eagletunnel_settings::SettingsError>(())
//! ```

mod config;

pub use config::{Settings, UserEntry};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Failed to create config directory: {0}")]
    CreateDirError(std::io::Error),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Directory holding the settings file
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eagletunnel")
}

/// Get the default settings file path
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.json")
}
