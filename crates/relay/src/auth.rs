//! Authentication gate
//!
//! Inbound, the peer sends `id:password` on the left leg and gets back
//! `valid` or the reason it was refused. Outbound, this node does the same
//! towards the next hop on the right leg, unless it runs as `root`.

use std::sync::Arc;
use std::time::Duration;

use eagletunnel_core::{EtError, Identity, IdentityError, IdentityTable, Result, Tunnel};

use crate::io::{read_message, write_message, Side};
use crate::EngineConfig;

/// Reply to an accepted credential line.
pub const VALID_AUTH_REPLY: &str = "valid";

#[derive(Debug, Clone)]
pub struct AuthenticationGate {
    enabled: bool,
    identities: Arc<IdentityTable>,
    local: Arc<Identity>,
    timeout: Option<Duration>,
}

impl AuthenticationGate {
    pub fn new(
        enabled: bool,
        identities: Arc<IdentityTable>,
        local: Arc<Identity>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            enabled,
            identities,
            local,
            timeout,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.auth_enabled,
            config.identities.clone(),
            config.local_identity.clone(),
            config.handshake_timeout,
        )
    }

    /// Validate the peer on the left leg.
    ///
    /// Returns the matched identity, or `None` when authentication is
    /// disabled and nothing was read.
    pub async fn verify_inbound(&self, tunnel: &mut Tunnel) -> Result<Option<Arc<Identity>>> {
        if !self.enabled {
            return Ok(None);
        }

        let line = read_message(tunnel, Side::Left, self.timeout).await?;
        let candidate = match Identity::parse(&line, tunnel.peer_ip()) {
            Ok(candidate) => candidate,
            Err(e) => return Err(self.refuse(tunnel, e).await),
        };
        if candidate.is_root() {
            return Err(self.refuse(tunnel, IdentityError::ReservedRoot).await);
        }

        // Unknown id and wrong secret must read the same to the peer
        let Some(registered) = self.identities.get(candidate.id()) else {
            return Err(self.refuse(tunnel, IdentityError::IncorrectCredentials).await);
        };
        if let Err(e) = registered.check_auth(&candidate) {
            return Err(self.refuse(tunnel, e).await);
        }

        let written = write_message(tunnel, Side::Left, VALID_AUTH_REPLY, self.timeout).await?;
        if written != VALID_AUTH_REPLY.len() {
            return Err(EtError::AuthRejected(format!(
                "short reply write: {} of {} bytes",
                written,
                VALID_AUTH_REPLY.len()
            )));
        }

        registered.add_tunnel(tunnel.id());
        Ok(Some(registered))
    }

    /// Present the local identity to the next hop on the right leg.
    pub async fn present_outbound(&self, tunnel: &mut Tunnel) -> Result<()> {
        if self.local.is_root() {
            return Ok(());
        }

        write_message(tunnel, Side::Right, &self.local.to_wire(), self.timeout).await?;
        let reply = read_message(tunnel, Side::Right, self.timeout).await?;
        if reply != VALID_AUTH_REPLY {
            return Err(EtError::AuthRejected(reply));
        }

        self.local.add_tunnel(tunnel.id());
        Ok(())
    }

    /// Tell the peer why it was refused and build the matching error.
    async fn refuse(&self, tunnel: &mut Tunnel, reason: IdentityError) -> EtError {
        // The connection is dropped either way; a failed write changes nothing.
        let _ = write_message(tunnel, Side::Left, &reason.to_string(), self.timeout).await;
        EtError::Identity(reason)
    }
}
