//! The `EagleTunnel` protocol engine
//!
//! Inbound: handshake on the opening line, switch on the left-leg cipher,
//! authenticate, then route the next request. Outbound: `send` hands a
//! [`NetArg`] to the handler registered for its type.

use std::sync::Arc;

use tracing::debug;

use eagletunnel_core::{EtError, EtType, NetArg, Request, Result, Tunnel};

use crate::io::{read_message, Side};
use crate::{AuthenticationGate, EngineConfig, HandlerRegistry, RequestRouter, VersionNegotiator};

#[derive(Debug, Clone)]
pub struct EagleTunnel {
    negotiator: VersionNegotiator,
    gate: Arc<AuthenticationGate>,
    router: RequestRouter,
    config: Arc<EngineConfig>,
}

impl EagleTunnel {
    pub fn new(config: EngineConfig, registry: HandlerRegistry) -> Self {
        let negotiator = VersionNegotiator::new(config.handshake_timeout);
        let gate = Arc::new(AuthenticationGate::from_config(&config));
        let router = RequestRouter::new(Arc::new(registry), config.handshake_timeout);
        Self {
            negotiator,
            gate,
            router,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        self.router.registry()
    }

    /// Read the opening line from the left leg and serve the connection.
    pub async fn serve(&self, tunnel: &mut Tunnel) -> Result<bool> {
        let line = read_message(tunnel, Side::Left, self.config.handshake_timeout).await?;
        self.handle(&Request::new(line), tunnel).await
    }

    /// Serve a connection whose opening line is `request`.
    ///
    /// Returns whether the tunnel should stay open for [`Tunnel::flow`].
    /// On error the caller closes both legs.
    pub async fn handle(&self, request: &Request, tunnel: &mut Tunnel) -> Result<bool> {
        self.negotiator.serve(tunnel, request.raw()).await?;
        tunnel.enable_left_encryption()?;
        if let Some(identity) = self.gate.verify_inbound(tunnel).await? {
            debug!("Tunnel {} authenticated as {}", tunnel.short_id(), identity.id());
        }
        self.router.route(tunnel).await
    }

    /// Perform an outbound request of type `arg.ty`.
    pub async fn send(&self, arg: &mut NetArg) -> Result<()> {
        if arg.ty == EtType::Unknown {
            return Err(EtError::InvalidRequest("cannot send UNKNOWN".to_string()));
        }
        self.router.registry().send(arg).await
    }
}
