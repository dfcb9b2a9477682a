//! Relay chaining
//!
//! Turns this node into a client of the next hop: dial, handshake, switch on
//! the right-leg cipher, then authenticate. No retries and no alternate hops.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use eagletunnel_core::{EtError, Leg, Result, Tunnel};

use crate::{AuthenticationGate, EngineConfig, VersionNegotiator};

#[derive(Debug, Clone)]
pub struct RelayChainer {
    relayer: Option<String>,
    connect_timeout: Duration,
    negotiator: VersionNegotiator,
    gate: Arc<AuthenticationGate>,
}

impl RelayChainer {
    pub fn new(
        relayer: Option<String>,
        connect_timeout: Duration,
        negotiator: VersionNegotiator,
        gate: Arc<AuthenticationGate>,
    ) -> Self {
        Self {
            relayer,
            connect_timeout,
            negotiator,
            gate,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.relayer.clone(),
            config.relay_connect_timeout,
            VersionNegotiator::new(config.handshake_timeout),
            Arc::new(AuthenticationGate::from_config(config)),
        )
    }

    pub fn has_relayer(&self) -> bool {
        self.relayer.is_some()
    }

    /// Open an authenticated right leg on `tunnel` to the configured hop.
    pub async fn connect(&self, tunnel: &mut Tunnel) -> Result<()> {
        let addr = self.relayer.as_deref().ok_or(EtError::NoRelayer)?;
        self.connect_to(tunnel, addr).await
    }

    /// Open an authenticated right leg on `tunnel` to `addr`.
    ///
    /// On failure the right leg may be half set up; the caller closes it.
    pub async fn connect_to(&self, tunnel: &mut Tunnel, addr: &str) -> Result<()> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| EtError::ConnectTimeout(addr.to_string()))??;
        tunnel.set_right(Leg::from_tcp(stream));

        self.negotiator.open(tunnel).await?;
        tunnel.enable_right_encryption()?;
        self.gate.present_outbound(tunnel).await?;

        debug!("Tunnel {} chained to {}", tunnel.short_id(), addr);
        Ok(())
    }
}
