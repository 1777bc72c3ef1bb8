//! Length-prefixed framing for the request/response protocol: a `u32`
//! big-endian length followed by a bincode payload. The specific framing is
//! free per the interface contract; this is one sufficient choice, generic
//! over any `AsyncRead`/`AsyncWrite` so it serves QUIC streams, stdio pipes,
//! or an SSH child process's stdin/stdout alike.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TextSyncError;

/// Maximum frame payload accepted on read, guarding against a corrupt or
/// malicious length prefix driving an unbounded allocation.
const MAX_FRAME_BYTES: u32 = 256 * 1024 * 1024;

pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<(), TextSyncError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = crate::protocol::encode(msg)
        .map_err(|e| TextSyncError::Protocol(format!("encode failed: {e}")))?;
    let len = u32::try_from(bytes.len())
        .map_err(|_| TextSyncError::Protocol("message too large to frame".into()))?;
    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| TextSyncError::io("<transport>", e))?;
    writer
        .write_all(&bytes)
        .await
        .map_err(|e| TextSyncError::io("<transport>", e))?;
    writer
        .flush()
        .await
        .map_err(|e| TextSyncError::io("<transport>", e))?;
    Ok(())
}

/// Reads one frame. `Ok(None)` signals a clean stream close before any byte
/// of the next frame's length prefix arrived.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, TextSyncError>
where
    R: AsyncRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(TextSyncError::io("<transport>", e)),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(TextSyncError::Protocol(format!(
            "frame of {len} bytes exceeds {MAX_FRAME_BYTES}"
        )));
    }
    let mut buf = vec![0u8; len as usize];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|e| TextSyncError::io("<transport>", e))?;
    let msg = crate::protocol::decode(&buf)
        .map_err(|e| TextSyncError::Protocol(format!("decode failed: {e}")))?;
    Ok(Some(msg))
}
