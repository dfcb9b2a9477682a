//! ASK handler: small control queries answered locally.

use async_trait::async_trait;

use eagletunnel_core::{EtError, EtType, NetArg, Request, Result, Tunnel, PROTOCOL_VERSION};
use eagletunnel_relay::EtHandler;

use crate::{EtRequest, ExitContext};

/// Reply to a question this node does not know.
pub const UNKNOWN_QUESTION_REPLY: &str = "unknown question";

pub struct AskHandler {
    context: ExitContext,
}

impl AskHandler {
    pub fn new(context: ExitContext) -> Self {
        Self { context }
    }

    pub fn answer(question: &str) -> String {
        match question {
            "PING" => "PONG".to_string(),
            "VERSION" => PROTOCOL_VERSION.to_string(),
            _ => UNKNOWN_QUESTION_REPLY.to_string(),
        }
    }
}

#[async_trait]
impl EtHandler for AskHandler {
    fn ty(&self) -> EtType {
        EtType::Ask
    }

    async fn handle(&self, request: &Request, tunnel: &mut Tunnel) -> Result<bool> {
        let question = match EtRequest::parse(request)? {
            EtRequest::Ask { question } => question,
            other => {
                return Err(EtError::InvalidRequest(format!(
                    "expected ASK request, got {}",
                    other.ty()
                )))
            }
        };

        tunnel.write_left(Self::answer(&question).as_bytes()).await?;
        Ok(false)
    }

    /// Put `arg.args` to the next hop as a question.
    async fn send(&self, arg: &mut NetArg) -> Result<()> {
        let request = EtRequest::from_arg(arg)?;
        arg.reply = self.context.exchange_once(&request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use eagletunnel_core::Leg;
    use eagletunnel_relay::{EngineConfig, LookupCaches, RelayChainer};
    use tokio::io::{duplex, AsyncReadExt};

    use crate::ExitConfig;

    #[test]
    fn test_answers() {
        assert_eq!(AskHandler::answer("PING"), "PONG");
        assert_eq!(AskHandler::answer("VERSION"), "1.2");
        assert_eq!(AskHandler::answer("ping"), "unknown question");
        assert_eq!(AskHandler::answer("WHO ARE YOU"), "unknown question");
    }

    #[tokio::test]
    async fn test_handle_writes_answer() {
        let handler = AskHandler::new(ExitContext::new(
            ExitConfig::default(),
            RelayChainer::from_config(&EngineConfig::default()),
            Arc::new(LookupCaches::new()),
        ));
        let (ours, mut peer) = duplex(1024);
        let mut tunnel = Tunnel::with_left(0x22, Leg::new(ours, None));

        let keep_alive = handler
            .handle(&Request::new("ASK PING"), &mut tunnel)
            .await
            .unwrap();
        assert!(!keep_alive);

        let mut buf = [0u8; 16];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"PONG");
    }
}
