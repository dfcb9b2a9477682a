//! EagleTunnel Exit Handlers
//!
//! Concrete handlers for the four ET request types.
//!
//! ## Responsibilities
//!
//! 1. `TCP`: open the right leg to the destination (directly or via the next hop)
//! 2. `DNS`: resolve a name through hosts, cache, next hop or the system resolver
//! 3. `LOCATION`: report a location code for an address
//! 4. `ASK`: answer control queries such as `PING` and `VERSION`
//!
//! Every handler also implements the outbound `send` path, which chains to
//! the next hop and relays the same request there.

mod ask;
mod dns;
mod handler;
mod location;
mod request;
mod tcp;

pub use ask::{AskHandler, UNKNOWN_QUESTION_REPLY};
pub use dns::DnsHandler;
pub use handler::{build_registry, ExitConfig, ExitContext};
pub use location::LocationHandler;
pub use request::{EtRequest, REPLY_NOK, REPLY_OK};
pub use tcp::TcpHandler;
