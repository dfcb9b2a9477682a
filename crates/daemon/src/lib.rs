//! EagleTunnel Daemon
//!
//! Runs an ET node: accepts inbound connections, drives each one through
//! the protocol engine on its own task and pumps bytes for kept-alive TCP
//! tunnels.
//!
//! ## Components
//!
//! - **NodeConfig**: everything the node needs, built from [`Settings`]
//! - **NodeService**: listener, accept loop and per-connection tasks
//!
//! [`Settings`]: eagletunnel_settings::Settings

mod node;

pub use node::{NodeConfig, NodeService, CACHE_EVICTION_INTERVAL};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Settings error: {0}")]
    Settings(#[from] eagletunnel_settings::SettingsError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
