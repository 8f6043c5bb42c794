// ABOUTME: Container log retrieval and the multiplexed log stream decoder.
// ABOUTME: Frames are an 8-byte header (big-endian length in bytes 4..8) plus payload.

use futures::StreamExt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::runtime::{LogLine, LogOps, LogOptions};
use crate::types::{ContainerId, DeploymentId};

use super::DeployError;

/// Size of a frame header.
pub const HEADER_LEN: usize = 8;

/// Lines returned by [`get_logs`] when none is configured.
pub const DEFAULT_TAIL: u64 = 100;

/// Default deadline for [`follow_logs`].
pub const DEFAULT_FOLLOW_TIMEOUT: Duration = Duration::from_secs(30);

/// Read one header. `Ok(None)` means the stream ended on a frame boundary.
async fn read_header<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> io::Result<Option<[u8; HEADER_LEN]>> {
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("truncated frame header ({} of {} bytes)", filled, HEADER_LEN),
            ));
        }
        filled += n;
    }
    Ok(Some(header))
}

/// Decode a multiplexed log stream into payload texts, in order.
///
/// The first four header bytes (stream origin) are ignored. A stream that ends
/// inside a header or payload is an `UnexpectedEof` error.
pub async fn demux_logs<R: AsyncRead + Unpin>(mut reader: R) -> io::Result<Vec<String>> {
    let mut out = Vec::new();

    while let Some(header) = read_header(&mut reader).await? {
        let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await.map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("truncated frame payload (expected {} bytes)", len),
                )
            } else {
                e
            }
        })?;
        out.push(String::from_utf8_lossy(&payload).into_owned());
    }

    Ok(out)
}

/// Last `tail` timestamped lines of both output streams of a deployment's container.
pub async fn get_logs<R: LogOps + ?Sized>(
    runtime: &R,
    id: &DeploymentId,
    tail: u64,
) -> Result<Vec<String>, DeployError> {
    let container = ContainerId::new(id.container_name());
    let raw = runtime.raw_logs(&container, &LogOptions::tail(tail)).await?;

    demux_logs(&raw[..]).await.map_err(|e| {
        DeployError::ContainerOpFailed(format!("malformed log stream for {}: {}", id, e))
    })
}

/// Stream a deployment's logs to `on_line` until the stream ends or `timeout` elapses.
///
/// Reaching the timeout is not an error. Returns the number of lines delivered.
pub async fn follow_logs<R, F>(
    runtime: &R,
    id: &DeploymentId,
    timeout: Duration,
    mut on_line: F,
) -> Result<usize, DeployError>
where
    R: LogOps + ?Sized,
    F: FnMut(LogLine) + Send,
{
    let container = ContainerId::new(id.container_name());
    let mut stream = runtime
        .container_logs(&container, &LogOptions::follow_all())
        .await?;

    let mut delivered = 0usize;
    let pump = async {
        while let Some(line) = stream.next().await {
            on_line(line?);
            delivered += 1;
        }
        Ok::<(), DeployError>(())
    };

    match tokio::time::timeout(timeout, pump).await {
        Ok(result) => result?,
        Err(_) => tracing::debug!("log follow for {} stopped after {:?}", id, timeout),
    }

    Ok(delivered)
}
