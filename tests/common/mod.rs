//! Shared harness: nodes on loopback, an echo destination and an ET client.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use eagletunnel_core::{xor_in_place, Identity, Result, Tunnel, MESSAGE_BUFFER_SIZE};
use eagletunnel_daemon::{NodeConfig, NodeService};
use eagletunnel_relay::{EngineConfig, RelayChainer};

pub const KEY: u8 = 0x22;

pub struct TestNode {
    pub addr: SocketAddr,
    pub service: Arc<NodeService>,
    shutdown: CancellationToken,
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Start a node on an ephemeral loopback port.
pub async fn start_node(mut config: NodeConfig) -> TestNode {
    config.engine.encrypt_key = KEY;
    config.exit.encrypt_key = KEY;

    let service = Arc::new(NodeService::new(config));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();

    let (svc, token) = (service.clone(), shutdown.clone());
    tokio::spawn(async move { svc.serve(listener, token).await });

    TestNode {
        addr,
        service,
        shutdown,
    }
}

/// Destination that echoes every byte back.
pub async fn start_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Client chaining to `node` as `local`.
pub fn client(node: SocketAddr, local: Identity) -> RelayChainer {
    let config = EngineConfig {
        encrypt_key: KEY,
        relayer: Some(node.to_string()),
        local_identity: Arc::new(local),
        relay_connect_timeout: Duration::from_secs(2),
        handshake_timeout: Some(Duration::from_secs(5)),
        ..EngineConfig::default()
    };
    RelayChainer::from_config(&config)
}

/// Open a tunnel through `chainer`, send one request line and return the reply.
pub async fn request(chainer: &RelayChainer, line: &str) -> Result<(Tunnel, String)> {
    let mut tunnel = Tunnel::new(KEY);
    chainer.connect(&mut tunnel).await?;
    tunnel.write_right(line.as_bytes()).await?;

    let mut buf = vec![0u8; MESSAGE_BUFFER_SIZE];
    let n = tunnel.read_right(&mut buf).await?;
    let reply = String::from_utf8_lossy(&buf[..n]).into_owned();
    Ok((tunnel, reply))
}

/// Raw plaintext handshake on a fresh connection; returns the stream and reply.
pub async fn raw_handshake(node: SocketAddr, line: &str) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(node).await.unwrap();
    stream.write_all(line.as_bytes()).await.unwrap();

    let mut buf = [0u8; 256];
    let n = read_with_deadline(&mut stream, &mut buf).await;
    let reply = String::from_utf8_lossy(&buf[..n]).into_owned();
    (stream, reply)
}

/// Encrypt and send `line`, then read and decrypt one reply.
pub async fn raw_exchange(stream: &mut TcpStream, line: &str) -> String {
    let mut out = line.as_bytes().to_vec();
    xor_in_place(&mut out, KEY);
    stream.write_all(&out).await.unwrap();

    let mut buf = [0u8; 256];
    let n = read_with_deadline(stream, &mut buf).await;
    xor_in_place(&mut buf[..n], KEY);
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

/// Read once, failing the test if nothing arrives within five seconds.
pub async fn read_with_deadline(stream: &mut TcpStream, buf: &mut [u8]) -> usize {
    tokio::time::timeout(Duration::from_secs(5), stream.read(buf))
        .await
        .expect("read timed out")
        .unwrap()
}
