//! Version handshake
//!
//! The client opens with `eagle_tunnel <version> simple`. The server checks
//! each of the three fields on its own and answers with one token per field,
//! `valid` or a diagnostic, joined by spaces.

use std::time::Duration;

use eagletunnel_core::{
    EtError, Result, Tunnel, Version, VersionError, COMPATIBLE_VERSION, PROTOCOL_MODE,
    PROTOCOL_TAG, PROTOCOL_VERSION,
};

use crate::io::{read_message, write_message, Side};

/// Per-field token for an accepted field.
const VALID: &str = "valid";

/// Per-field token for a wrong protocol tag or mode.
const INVALID: &str = "invalid";

/// The only reply a client accepts.
pub const VALID_HANDSHAKE_REPLY: &str = "valid valid valid";

/// Version-field diagnostic for a version below the server's floor.
pub const INCOMPATIBLE_VERSION_REPLY: &str = "incompatible et protocol version";

#[derive(Debug, Clone, PartialEq, Eq)]
enum VersionCheck {
    Accepted,
    Incompatible(Version),
    Unparsable(VersionError),
}

/// Server-side evaluation of an opening line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeVerdict {
    tag: String,
    mode: String,
    version: VersionCheck,
    floor: Version,
}

impl HandshakeVerdict {
    /// Check the three tokens of `line` against `floor`.
    ///
    /// A line without exactly three tokens is rejected outright.
    pub fn evaluate(line: &str, floor: Version) -> Result<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [tag, version, mode] = tokens.as_slice() else {
            return Err(EtError::MalformedHandshake(format!(
                "expected 3 tokens, got {}",
                tokens.len()
            )));
        };

        let version = match Version::parse(version) {
            Ok(v) if v.is_same_or_newer(&floor) => VersionCheck::Accepted,
            Ok(v) => VersionCheck::Incompatible(v),
            Err(e) => VersionCheck::Unparsable(e),
        };

        Ok(Self {
            tag: tag.to_string(),
            mode: mode.to_string(),
            version,
            floor,
        })
    }

    pub fn tag_ok(&self) -> bool {
        self.tag == PROTOCOL_TAG
    }

    pub fn version_ok(&self) -> bool {
        self.version == VersionCheck::Accepted
    }

    pub fn mode_ok(&self) -> bool {
        self.mode == PROTOCOL_MODE
    }

    /// All three fields accepted.
    pub fn is_valid(&self) -> bool {
        self.tag_ok() && self.version_ok() && self.mode_ok()
    }

    /// Wire reply, one token per field.
    pub fn reply(&self) -> String {
        let tag = if self.tag_ok() { VALID } else { INVALID };
        let version = match &self.version {
            VersionCheck::Accepted => VALID.to_string(),
            VersionCheck::Incompatible(_) => INCOMPATIBLE_VERSION_REPLY.to_string(),
            VersionCheck::Unparsable(e) => e.to_string(),
        };
        let mode = if self.mode_ok() { VALID } else { INVALID };
        format!("{} {} {}", tag, version, mode)
    }

    /// The first failing field as an error, or `Ok` when all passed.
    pub fn into_result(self) -> Result<()> {
        if !self.tag_ok() {
            return Err(EtError::MalformedHandshake(format!(
                "unexpected protocol tag {:?}",
                self.tag
            )));
        }
        match self.version {
            VersionCheck::Accepted => {}
            VersionCheck::Incompatible(got) => {
                return Err(EtError::IncompatibleVersion {
                    got,
                    floor: self.floor,
                })
            }
            VersionCheck::Unparsable(e) => return Err(e.into()),
        }
        if self.mode != PROTOCOL_MODE {
            return Err(EtError::MalformedHandshake(format!(
                "unsupported mode {:?}",
                self.mode
            )));
        }
        Ok(())
    }
}

/// Quote each field of a rejected reply: `"invalid" "valid" "valid"`.
///
/// The middle field is a version diagnostic that may contain spaces, so a
/// reply of three or more tokens is split at its first and last space.
fn quote_fields(reply: &str) -> String {
    let fields: Vec<&str> = match (reply.split_once(' '), reply.rsplit_once(' ')) {
        (Some((first, _)), Some((head, last))) if head.len() > first.len() => {
            vec![first, &head[first.len() + 1..], last]
        }
        _ => reply.split(' ').collect(),
    };
    fields
        .iter()
        .map(|field| format!("\"{}\"", field))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs the handshake on one leg, as server (left) or client (right).
#[derive(Debug, Clone)]
pub struct VersionNegotiator {
    advertised: Version,
    floor: Version,
    timeout: Option<Duration>,
}

impl Default for VersionNegotiator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl VersionNegotiator {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            advertised: PROTOCOL_VERSION,
            floor: COMPATIBLE_VERSION,
            timeout,
        }
    }

    /// Override the advertised and floor versions.
    pub fn with_versions(mut self, advertised: Version, floor: Version) -> Self {
        self.advertised = advertised;
        self.floor = floor;
        self
    }

    /// Opening line sent in the client role.
    pub fn client_line(&self) -> String {
        format!("{} {} {}", PROTOCOL_TAG, self.advertised, PROTOCOL_MODE)
    }

    /// Server role: answer the peer's opening `line` on the left leg.
    ///
    /// Success is the conjunction of the three field checks, never the
    /// length of what was written.
    pub async fn serve(&self, tunnel: &mut Tunnel, line: &str) -> Result<()> {
        let verdict = HandshakeVerdict::evaluate(line, self.floor)?;
        write_message(tunnel, Side::Left, &verdict.reply(), self.timeout).await?;
        verdict.into_result()
    }

    /// Client role: open the handshake on the right leg.
    pub async fn open(&self, tunnel: &mut Tunnel) -> Result<()> {
        write_message(tunnel, Side::Right, &self.client_line(), self.timeout).await?;
        let reply = read_message(tunnel, Side::Right, self.timeout).await?;
        if reply != VALID_HANDSHAKE_REPLY {
            return Err(EtError::HandshakeRejected(quote_fields(&reply)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eagletunnel_core::Leg;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    const KEY: u8 = 0x22;

    fn floor() -> Version {
        Version::new(1, 1)
    }

    #[test]
    fn test_valid_line() {
        for line in [
            "eagle_tunnel 1.1 simple",
            "eagle_tunnel 1.2 simple",
            "eagle_tunnel 2.0 simple",
        ] {
            let verdict = HandshakeVerdict::evaluate(line, floor()).unwrap();
            assert!(verdict.is_valid());
            assert_eq!(verdict.reply(), VALID_HANDSHAKE_REPLY);
            assert!(verdict.into_result().is_ok());
        }
    }

    #[test]
    fn test_single_field_violations() {
        let cases = [
            ("eagle_tunel 1.2 simple", 0),
            ("EAGLE_TUNNEL 1.2 simple", 0),
            ("eagle_tunnel 1.0 simple", 1),
            ("eagle_tunnel 0.9 simple", 1),
            ("eagle_tunnel 12 simple", 1),
            ("eagle_tunnel 1.x simple", 1),
            ("eagle_tunnel a.b simple", 1),
            ("eagle_tunnel 1.2 complex", 2),
            ("eagle_tunnel 1.2 valid", 2),
        ];
        for (line, field) in cases {
            let verdict = HandshakeVerdict::evaluate(line, floor()).unwrap();
            assert!(!verdict.is_valid(), "{line}");

            let reply = verdict.reply();
            assert_ne!(reply.len(), VALID_HANDSHAKE_REPLY.len(), "{line} -> {reply}");

            // Split on the known delimiters: a version diagnostic may itself
            // contain spaces, so check the outer tokens by position.
            let first = reply.split(' ').next().unwrap();
            let last = reply.rsplit(' ').next().unwrap();
            match field {
                0 => {
                    assert_eq!(first, "invalid");
                    assert!(reply.ends_with("valid valid"));
                }
                1 => {
                    assert_eq!(first, "valid");
                    assert_eq!(last, "valid");
                    assert!(!reply.starts_with(VALID_HANDSHAKE_REPLY));
                }
                _ => {
                    assert_eq!(last, "invalid");
                    assert!(reply.starts_with("valid valid "));
                }
            }
        }
    }

    #[test]
    fn test_incompatible_reply_text() {
        let verdict = HandshakeVerdict::evaluate("eagle_tunnel 1.0 simple", floor()).unwrap();
        assert_eq!(verdict.reply(), "valid incompatible et protocol version valid");
        assert!(matches!(
            verdict.into_result(),
            Err(EtError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn test_unparsable_version_maps_to_version_error() {
        let verdict = HandshakeVerdict::evaluate("eagle_tunnel abc simple", floor()).unwrap();
        assert!(matches!(verdict.into_result(), Err(EtError::Version(_))));
    }

    #[test]
    fn test_wrong_token_count() {
        for line in ["", "eagle_tunnel", "eagle_tunnel 1.2", "eagle_tunnel 1.2 simple extra"] {
            assert!(matches!(
                HandshakeVerdict::evaluate(line, floor()),
                Err(EtError::MalformedHandshake(_))
            ));
        }
    }

    #[test]
    fn test_quote_fields() {
        assert_eq!(
            quote_fields("invalid valid valid"),
            "\"invalid\" \"valid\" \"valid\""
        );
        assert_eq!(
            quote_fields("valid invalid version format: 12 invalid"),
            "\"valid\" \"invalid version format: 12\" \"invalid\""
        );
        assert_eq!(quote_fields("nope"), "\"nope\"");
        assert_eq!(quote_fields("a b"), "\"a\" \"b\"");
    }

    #[test]
    fn test_client_line() {
        assert_eq!(
            VersionNegotiator::default().client_line(),
            "eagle_tunnel 1.2 simple"
        );
    }

    #[tokio::test]
    async fn test_serve_writes_reply() {
        let (ours, mut peer) = duplex(1024);
        let mut tunnel = Tunnel::with_left(KEY, Leg::new(ours, None));

        VersionNegotiator::default()
            .serve(&mut tunnel, "eagle_tunnel 1.2 simple")
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], VALID_HANDSHAKE_REPLY.as_bytes());
    }

    #[tokio::test]
    async fn test_serve_rejects_old_client() {
        let (ours, mut peer) = duplex(1024);
        let mut tunnel = Tunnel::with_left(KEY, Leg::new(ours, None));

        let result = VersionNegotiator::default()
            .serve(&mut tunnel, "eagle_tunnel 1.0 simple")
            .await;
        assert!(matches!(result, Err(EtError::IncompatibleVersion { .. })));

        let mut buf = [0u8; 64];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"valid incompatible et protocol version valid");
    }

    #[tokio::test]
    async fn test_serve_malformed_writes_nothing() {
        let (ours, mut peer) = duplex(1024);
        let mut tunnel = Tunnel::with_left(KEY, Leg::new(ours, None));

        let result = VersionNegotiator::default()
            .serve(&mut tunnel, "eagle_tunnel 1.2")
            .await;
        assert!(matches!(result, Err(EtError::MalformedHandshake(_))));

        drop(tunnel);
        let mut rest = Vec::new();
        peer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_client_and_server_agree() {
        let (client_side, server_side) = duplex(1024);
        let mut client = Tunnel::new(KEY);
        client.set_right(Leg::new(client_side, None));
        let mut server = Tunnel::with_left(KEY, Leg::new(server_side, None));

        let server_task = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let n = server.read_left(&mut buf).await.unwrap();
            let line = String::from_utf8_lossy(&buf[..n]).into_owned();
            VersionNegotiator::default().serve(&mut server, &line).await
        });

        VersionNegotiator::default().open(&mut client).await.unwrap();
        server_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_client_quotes_rejection() {
        let (client_side, mut server) = duplex(1024);
        let mut client = Tunnel::new(KEY);
        client.set_right(Leg::new(client_side, None));

        let server_task = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let _ = server.read(&mut buf).await.unwrap();
            server
                .write_all(b"invalid incompatible et protocol version valid")
                .await
                .unwrap();
            server
        });

        let err = VersionNegotiator::default().open(&mut client).await.unwrap_err();
        let _server = server_task.await.unwrap();
        match err {
            EtError::HandshakeRejected(text) => assert_eq!(
                text,
                "\"invalid\" \"incompatible et protocol version\" \"valid\""
            ),
            other => panic!("unexpected error: {other}"),
        }
    }
}
