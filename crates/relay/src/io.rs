//! Single-message reads and writes on one leg, with an optional time limit

use std::future::Future;
use std::time::Duration;

use eagletunnel_core::{EtError, Result, Tunnel, MESSAGE_BUFFER_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

async fn within<T, F>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| EtError::Timeout)?,
        None => fut.await,
    }
}

/// Read one message of at most [`MESSAGE_BUFFER_SIZE`] bytes.
pub(crate) async fn read_raw(
    tunnel: &mut Tunnel,
    side: Side,
    limit: Option<Duration>,
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; MESSAGE_BUFFER_SIZE];
    let n = within(limit, async {
        match side {
            Side::Left => tunnel.read_left(&mut buf).await,
            Side::Right => tunnel.read_right(&mut buf).await,
        }
    })
    .await?;
    buf.truncate(n);
    Ok(buf)
}

pub(crate) async fn read_message(
    tunnel: &mut Tunnel,
    side: Side,
    limit: Option<Duration>,
) -> Result<String> {
    let raw = read_raw(tunnel, side, limit).await?;
    Ok(decode(&raw))
}

/// Message text with any trailing line terminator removed.
pub(crate) fn decode(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Write one message. Returns the bytes transmitted.
pub(crate) async fn write_message(
    tunnel: &mut Tunnel,
    side: Side,
    message: &str,
    limit: Option<Duration>,
) -> Result<usize> {
    within(limit, async {
        match side {
            Side::Left => tunnel.write_left(message.as_bytes()).await,
            Side::Right => tunnel.write_right(message.as_bytes()).await,
        }
    })
    .await
}
