//! Two-legged tunnel
//!
//! A tunnel joins an inbound leg ("left", the peer that connected to us)
//! with an outbound leg ("right", the next hop or the destination). Each leg
//! can independently switch on the shared-key cipher once its handshake has
//! succeeded. The cipher is a byte-wise XOR, so the same operation encrypts
//! and decrypts.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use rand::RngCore;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::{EtError, Result};

/// Identifier of a tunnel, used for per-identity accounting.
pub type TunnelId = [u8; 16];

/// Buffer size for one relay read in [`Tunnel::flow`].
const FLOW_BUFFER_SIZE: usize = 16 * 1024;

/// Any byte stream a leg can sit on.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// XOR every byte with the shared key.
pub fn xor_in_place(data: &mut [u8], key: u8) {
    for byte in data.iter_mut() {
        *byte ^= key;
    }
}

/// One half of a tunnel.
pub struct Leg {
    stream: Box<dyn AsyncStream>,
    peer: Option<SocketAddr>,
    encrypted: bool,
}

impl Leg {
    pub fn new<S: AsyncStream + 'static>(stream: S, peer: Option<SocketAddr>) -> Self {
        Self {
            stream: Box::new(stream),
            peer,
            encrypted: false,
        }
    }

    pub fn from_tcp(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Self::new(stream, peer)
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    async fn read(&mut self, buf: &mut [u8], key: u8) -> Result<usize> {
        let n = self.stream.read(buf).await?;
        if n == 0 {
            return Err(EtError::ConnectionClosed);
        }
        if self.encrypted {
            xor_in_place(&mut buf[..n], key);
        }
        Ok(n)
    }

    async fn write(&mut self, data: &[u8], key: u8) -> Result<usize> {
        if self.encrypted {
            let mut sealed = data.to_vec();
            xor_in_place(&mut sealed, key);
            self.stream.write_all(&sealed).await?;
        } else {
            self.stream.write_all(data).await?;
        }
        self.stream.flush().await?;
        Ok(data.len())
    }

    async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}

impl fmt::Debug for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leg")
            .field("peer", &self.peer)
            .field("encrypted", &self.encrypted)
            .finish_non_exhaustive()
    }
}

/// Left and right legs plus the shared key.
#[derive(Debug)]
pub struct Tunnel {
    id: TunnelId,
    key: u8,
    left: Option<Leg>,
    right: Option<Leg>,
}

impl Tunnel {
    pub fn new(key: u8) -> Self {
        let mut id = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut id);
        Self {
            id,
            key,
            left: None,
            right: None,
        }
    }

    /// Tunnel whose left leg is an accepted inbound connection.
    pub fn with_left(key: u8, left: Leg) -> Self {
        let mut tunnel = Self::new(key);
        tunnel.left = Some(left);
        tunnel
    }

    pub fn id(&self) -> TunnelId {
        self.id
    }

    /// Short hex form of the id for log lines.
    pub fn short_id(&self) -> String {
        hex::encode(&self.id[..8])
    }

    /// Source address of the inbound peer.
    pub fn peer_ip(&self) -> Option<IpAddr> {
        self.left.as_ref().and_then(Leg::peer).map(|addr| addr.ip())
    }

    pub fn has_left(&self) -> bool {
        self.left.is_some()
    }

    pub fn has_right(&self) -> bool {
        self.right.is_some()
    }

    pub fn set_right(&mut self, leg: Leg) {
        self.right = Some(leg);
    }

    /// Detach the right leg, e.g. to graft a freshly chained hop onto
    /// another tunnel.
    pub fn take_right(&mut self) -> Option<Leg> {
        self.right.take()
    }

    pub fn enable_left_encryption(&mut self) -> Result<()> {
        self.left_mut()?.encrypted = true;
        Ok(())
    }

    pub fn enable_right_encryption(&mut self) -> Result<()> {
        self.right_mut()?.encrypted = true;
        Ok(())
    }

    pub fn is_left_encrypted(&self) -> bool {
        self.left.as_ref().is_some_and(Leg::is_encrypted)
    }

    pub fn is_right_encrypted(&self) -> bool {
        self.right.as_ref().is_some_and(Leg::is_encrypted)
    }

    pub async fn read_left(&mut self, buf: &mut [u8]) -> Result<usize> {
        let key = self.key;
        self.left_mut()?.read(buf, key).await
    }

    pub async fn read_right(&mut self, buf: &mut [u8]) -> Result<usize> {
        let key = self.key;
        self.right_mut()?.read(buf, key).await
    }

    /// Write one message on the left leg. Returns the bytes transmitted.
    pub async fn write_left(&mut self, data: &[u8]) -> Result<usize> {
        let key = self.key;
        self.left_mut()?.write(data, key).await
    }

    /// Write one message on the right leg. Returns the bytes transmitted.
    pub async fn write_right(&mut self, data: &[u8]) -> Result<usize> {
        let key = self.key;
        self.right_mut()?.write(data, key).await
    }

    /// Pump bytes between the legs until either side closes.
    ///
    /// Returns `(left_to_right, right_to_left)` byte counts.
    pub async fn flow(mut self) -> Result<(u64, u64)> {
        let left = self.left.take().ok_or(EtError::MissingLeg("left"))?;
        let right = self.right.take().ok_or(EtError::MissingLeg("right"))?;

        // XOR twice with the same key is the identity, so a byte only needs
        // re-keying when exactly one side is encrypted.
        let rekey = left.encrypted != right.encrypted;
        let key = self.key;

        let (mut left_rd, mut left_wr) = tokio::io::split(left.stream);
        let (mut right_rd, mut right_wr) = tokio::io::split(right.stream);

        let upstream = pump(&mut left_rd, &mut right_wr, rekey, key);
        let downstream = pump(&mut right_rd, &mut left_wr, rekey, key);

        let (up, down) = tokio::try_join!(upstream, downstream)?;
        Ok((up, down))
    }

    /// Shut down whichever legs are present.
    pub async fn close(&mut self) {
        if let Some(mut leg) = self.left.take() {
            leg.shutdown().await;
        }
        if let Some(mut leg) = self.right.take() {
            leg.shutdown().await;
        }
    }

    fn left_mut(&mut self) -> Result<&mut Leg> {
        self.left.as_mut().ok_or(EtError::MissingLeg("left"))
    }

    fn right_mut(&mut self) -> Result<&mut Leg> {
        self.right.as_mut().ok_or(EtError::MissingLeg("right"))
    }
}

async fn pump<R, W>(reader: &mut R, writer: &mut W, rekey: bool, key: u8) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; FLOW_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            let _ = writer.shutdown().await;
            return Ok(total);
        }
        if rekey {
            xor_in_place(&mut buf[..n], key);
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        total += n as u64;
    }
}
