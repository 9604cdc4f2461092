//! Framed request/response over a connected stream.
//!
//! One call writes one length-prefixed frame and reads back exactly one
//! length-prefixed frame.  The payloads are opaque here.

use std::io;
use std::time::Duration;

use mg_protocol::{decode_header, encode_frame, FrameError, FRAME_HEADER_LEN};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::types::ClientError;

/// Send `payload` and return the response payload.
///
/// `timeout` covers the whole exchange.  A response declaring more than
/// `max_frame_bytes` is rejected before any payload is read.
pub async fn send_request<S>(
    stream: &mut S,
    payload: &[u8],
    timeout: Duration,
    max_frame_bytes: usize,
) -> Result<Vec<u8>, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let frame = encode_frame(payload)?;
    match tokio::time::timeout(timeout, exchange(stream, &frame, max_frame_bytes)).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout(format!(
            "no response from gateway within {} ms",
            timeout.as_millis()
        ))),
    }
}

async fn exchange<S>(
    stream: &mut S,
    frame: &[u8],
    max_frame_bytes: usize,
) -> Result<Vec<u8>, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    // write_all loops over partial writes.
    stream.write_all(frame).await.map_err(communication_error)?;
    stream.flush().await.map_err(communication_error)?;

    let mut header = [0u8; FRAME_HEADER_LEN];
    let got = read_accumulating(stream, &mut header).await?;
    if got < FRAME_HEADER_LEN {
        return Err(FrameError::Truncated {
            expected: FRAME_HEADER_LEN,
            actual: got,
        }
        .into());
    }

    let len = decode_header(header);
    if len > max_frame_bytes {
        return Err(FrameError::TooLarge {
            len,
            max: max_frame_bytes,
        }
        .into());
    }

    let mut payload = vec![0u8; len];
    let got = read_accumulating(stream, &mut payload).await?;
    if got < len {
        return Err(FrameError::Truncated {
            expected: len,
            actual: got,
        }
        .into());
    }
    tracing::trace!(request_bytes = frame.len(), response_bytes = len, "frame exchanged");
    Ok(payload)
}

/// Fill `buf`, stopping early only if the peer closes.  Returns bytes read.
async fn read_accumulating<S>(stream: &mut S, buf: &mut [u8]) -> Result<usize, ClientError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(communication_error(e)),
        }
    }
    Ok(filled)
}

fn communication_error(e: io::Error) -> ClientError {
    match e.kind() {
        io::ErrorKind::TimedOut => ClientError::Timeout(e.to_string()),
        _ => ClientError::MalformedResponse(format!("communication error: {e}")),
    }
}
