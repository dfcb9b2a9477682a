//! TCP handler
//!
//! Opens the right leg towards the requested destination, either directly
//! or through the next hop as the proxy mode decides, and answers `ok` so the daemon can start
//! pumping bytes. This is the only handler that keeps a connection open.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use eagletunnel_core::{EtError, EtType, Leg, NetArg, Request, Result, Tunnel};
use eagletunnel_relay::EtHandler;

use crate::{EtRequest, ExitContext, REPLY_NOK, REPLY_OK};

pub struct TcpHandler {
    context: ExitContext,
}

impl TcpHandler {
    pub fn new(context: ExitContext) -> Self {
        Self { context }
    }

    async fn open_direct(&self, tunnel: &mut Tunnel, host: &str, port: u16) -> Result<()> {
        let stream = tokio::time::timeout(
            self.context.config.dial_timeout,
            TcpStream::connect((host, port)),
        )
        .await
        .map_err(|_| EtError::ConnectTimeout(format!("{}:{}", host, port)))??;

        tunnel.set_right(Leg::from_tcp(stream));
        Ok(())
    }

    async fn open_chained(&self, tunnel: &mut Tunnel, host: &str, port: u16) -> Result<()> {
        let hop = Arc::new(Mutex::new(Tunnel::new(self.context.config.encrypt_key)));
        let mut arg = NetArg::new(EtType::Tcp)
            .with_domain(host)
            .with_port(port)
            .with_tunnel(hop.clone());
        self.send(&mut arg).await?;

        let leg = hop
            .lock()
            .await
            .take_right()
            .ok_or(EtError::MissingLeg("right"))?;
        tunnel.set_right(leg);
        Ok(())
    }
}

#[async_trait]
impl EtHandler for TcpHandler {
    fn ty(&self) -> EtType {
        EtType::Tcp
    }

    async fn handle(&self, request: &Request, tunnel: &mut Tunnel) -> Result<bool> {
        let (host, port) = match EtRequest::parse(request)? {
            EtRequest::Tcp { host, port } => (host, port),
            other => {
                return Err(EtError::InvalidRequest(format!(
                    "expected TCP request, got {}",
                    other.ty()
                )))
            }
        };

        let opened = if self.context.chains_to(&host).await {
            self.open_chained(tunnel, &host, port).await
        } else {
            self.open_direct(tunnel, &host, port).await
        };

        match opened {
            Ok(()) => {
                tunnel.write_left(REPLY_OK.as_bytes()).await?;
                info!("Tunnel {} connected to {}:{}", tunnel.short_id(), host, port);
                Ok(true)
            }
            Err(e) => {
                warn!(
                    "Tunnel {} failed to reach {}:{}: {}",
                    tunnel.short_id(),
                    host,
                    port,
                    e
                );
                tunnel.write_left(REPLY_NOK.as_bytes()).await?;
                Ok(false)
            }
        }
    }

    /// Chain to the next hop on `arg.tunnel` and ask it for the destination.
    ///
    /// On success the tunnel's right leg is connected end to end.
    async fn send(&self, arg: &mut NetArg) -> Result<()> {
        let request = EtRequest::from_arg(arg)?;
        let shared = arg
            .tunnel
            .clone()
            .ok_or_else(|| EtError::InvalidRequest("TCP send without a tunnel".to_string()))?;
        let mut tunnel = shared.lock().await;

        let reply = match self.context.exchange(&mut tunnel, &request).await {
            Ok(reply) => reply,
            Err(e) => {
                drop(tunnel.take_right());
                return Err(e);
            }
        };
        arg.reply = reply;

        if arg.reply != REPLY_OK {
            debug!("Next hop refused {}: {:?}", request.to_line(), arg.reply);
            drop(tunnel.take_right());
            return Err(EtError::RequestFailed(format!(
                "next hop answered {:?}",
                arg.reply
            )));
        }
        Ok(())
    }
}
