//! DNS handler
//!
//! Answers `DNS <domain>` with the first IPv4 address for the name, or
//! `nok`. Static hosts and the cache answer first. With a relayer, `enable`
//! mode asks the next hop before the system resolver while `smart` mode keeps
//! an inside local answer and only asks the next hop for the rest.

use std::net::IpAddr;

use async_trait::async_trait;

use eagletunnel_core::{EtError, EtType, NetArg, Request, Result, Tunnel};
use eagletunnel_relay::EtHandler;

use crate::{EtRequest, ExitContext, REPLY_NOK};

pub struct DnsHandler {
    context: ExitContext,
}

impl DnsHandler {
    pub fn new(context: ExitContext) -> Self {
        Self { context }
    }

    /// Resolve `domain` in the order the proxy mode calls for.
    pub async fn resolve(&self, domain: &str) -> Option<IpAddr> {
        self.context.resolve(domain).await
    }
}

#[async_trait]
impl EtHandler for DnsHandler {
    fn ty(&self) -> EtType {
        EtType::Dns
    }

    async fn handle(&self, request: &Request, tunnel: &mut Tunnel) -> Result<bool> {
        let domain = match EtRequest::parse(request)? {
            EtRequest::Dns { domain } => domain,
            other => {
                return Err(EtError::InvalidRequest(format!(
                    "expected DNS request, got {}",
                    other.ty()
                )))
            }
        };

        let reply = match self.resolve(&domain).await {
            Some(ip) => ip.to_string(),
            None => REPLY_NOK.to_string(),
        };
        tunnel.write_left(reply.as_bytes()).await?;
        Ok(false)
    }

    /// Ask the next hop to resolve `arg.domain`; the answer lands in `arg.ip`.
    async fn send(&self, arg: &mut NetArg) -> Result<()> {
        let request = EtRequest::from_arg(arg)?;
        arg.reply = self.context.exchange_once(&request).await?;

        match arg.reply.parse::<IpAddr>() {
            Ok(ip) => {
                arg.ip = Some(ip);
                Ok(())
            }
            Err(_) => Err(EtError::RequestFailed(format!(
                "cannot resolve {}: {}",
                arg.domain, arg.reply
            ))),
        }
    }
}
