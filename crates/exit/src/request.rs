//! Typed request lines
//!
//! `TCP <host> <port>` (or `TCP <host>:<port>`), `DNS <domain>`,
//! `LOCATION <ip>` and `ASK <question>`.

use std::net::IpAddr;

use eagletunnel_core::{EtError, EtType, NetArg, Request, Result};

/// Reply for a request that succeeded without a payload
pub const REPLY_OK: &str = "ok";

/// Reply for a request that failed
pub const REPLY_NOK: &str = "nok";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EtRequest {
    Tcp { host: String, port: u16 },
    Dns { domain: String },
    Location { ip: IpAddr },
    Ask { question: String },
}

impl EtRequest {
    /// Parse a routed request line.
    pub fn parse(request: &Request) -> Result<Self> {
        let tokens = request.tokens();
        match (request.ty(), tokens.as_slice()) {
            (EtType::Tcp, [_, host, port]) => Ok(Self::Tcp {
                host: host.to_string(),
                port: parse_port(port)?,
            }),
            (EtType::Tcp, [_, target]) => {
                let (host, port) = target.rsplit_once(':').ok_or_else(|| {
                    EtError::InvalidRequest(format!("missing port in {:?}", target))
                })?;
                Ok(Self::Tcp {
                    host: host.trim_matches(['[', ']']).to_string(),
                    port: parse_port(port)?,
                })
            }
            (EtType::Dns, [_, domain]) => Ok(Self::Dns {
                domain: domain.to_string(),
            }),
            (EtType::Location, [_, ip]) => Ok(Self::Location {
                ip: ip
                    .parse()
                    .map_err(|_| EtError::InvalidRequest(format!("invalid ip {:?}", ip)))?,
            }),
            (EtType::Ask, [_, question @ ..]) if !question.is_empty() => Ok(Self::Ask {
                question: question.join(" "),
            }),
            (ty, _) => Err(EtError::InvalidRequest(format!(
                "malformed {} request: {:?}",
                ty,
                request.raw()
            ))),
        }
    }

    /// Build the request an outbound `NetArg` describes.
    pub fn from_arg(arg: &NetArg) -> Result<Self> {
        let missing =
            |what: &str| EtError::InvalidRequest(format!("{} send without {}", arg.ty, what));
        match arg.ty {
            EtType::Tcp => Ok(Self::Tcp {
                host: arg.host().ok_or_else(|| missing("a host"))?,
                port: arg.port,
            }),
            EtType::Dns if !arg.domain.is_empty() => Ok(Self::Dns {
                domain: arg.domain.clone(),
            }),
            EtType::Location => Ok(Self::Location {
                ip: arg.ip.ok_or_else(|| missing("an ip"))?,
            }),
            EtType::Ask if !arg.args.is_empty() => Ok(Self::Ask {
                question: arg.args.join(" "),
            }),
            EtType::Dns => Err(missing("a domain")),
            EtType::Ask => Err(missing("a question")),
            EtType::Unknown => Err(EtError::InvalidRequest("cannot send UNKNOWN".to_string())),
        }
    }

    pub fn ty(&self) -> EtType {
        match self {
            Self::Tcp { .. } => EtType::Tcp,
            Self::Dns { .. } => EtType::Dns,
            Self::Location { .. } => EtType::Location,
            Self::Ask { .. } => EtType::Ask,
        }
    }

    /// Wire form of the request.
    pub fn to_line(&self) -> String {
        match self {
            Self::Tcp { host, port } => format!("{} {} {}", self.ty(), host, port),
            Self::Dns { domain } => format!("{} {}", self.ty(), domain),
            Self::Location { ip } => format!("{} {}", self.ty(), ip),
            Self::Ask { question } => format!("{} {}", self.ty(), question),
        }
    }
}

fn parse_port(raw: &str) -> Result<u16> {
    raw.parse()
        .map_err(|_| EtError::InvalidRequest(format!("invalid port {:?}", raw)))
}
