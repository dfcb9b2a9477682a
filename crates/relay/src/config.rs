//! Engine configuration

use std::sync::Arc;
use std::time::Duration;

use eagletunnel_core::{Identity, IdentityTable};

/// Key used when none is configured.
pub const DEFAULT_ENCRYPT_KEY: u8 = 0x22;

/// Startup-time settings shared by every connection task.
///
/// Written once before the listener starts and read-only afterwards.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Shared one-byte cipher key for every leg
    pub encrypt_key: u8,
    /// Require credentials from inbound peers
    pub auth_enabled: bool,
    /// Identity this node presents to the next hop (`root` skips auth)
    pub local_identity: Arc<Identity>,
    /// Identities accepted from inbound peers
    pub identities: Arc<IdentityTable>,
    /// Next hop `host:port`, if this node chains
    pub relayer: Option<String>,
    /// Dial timeout for the next hop
    pub relay_connect_timeout: Duration,
    /// Per-read/write limit during handshake and authentication (none by default)
    pub handshake_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            encrypt_key: DEFAULT_ENCRYPT_KEY,
            auth_enabled: false,
            local_identity: Arc::new(Identity::root()),
            identities: Arc::new(IdentityTable::new()),
            relayer: None,
            relay_connect_timeout: Duration::from_secs(5),
            handshake_timeout: None,
        }
    }
}
