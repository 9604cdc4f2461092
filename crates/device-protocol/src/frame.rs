//! Length-prefixed framing shared by both directions of the protocol.

/// Size of the big-endian `u32` length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// Default cap on an inbound payload (16 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes were available than the frame requires.
    #[error("expected {expected} bytes, got {actual} bytes")]
    Truncated { expected: usize, actual: usize },
    /// Payload length does not fit the prefix or exceeds the configured cap.
    #[error("frame payload of {len} bytes exceeds limit of {max} bytes")]
    TooLarge { len: usize, max: usize },
}

/// Prefix `payload` with its length, ready for a single write.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;
    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Declared payload length from a length prefix.
pub fn decode_header(header: [u8; FRAME_HEADER_LEN]) -> usize {
    u32::from_be_bytes(header) as usize
}

/// Split one complete frame off the front of `buf`.
///
/// Returns the payload and whatever follows it.
pub fn decode_frame(buf: &[u8]) -> Result<(&[u8], &[u8]), FrameError> {
    if buf.len() < FRAME_HEADER_LEN {
        return Err(FrameError::Truncated {
            expected: FRAME_HEADER_LEN,
            actual: buf.len(),
        });
    }
    let (header, body) = buf.split_at(FRAME_HEADER_LEN);
    let mut prefix = [0u8; FRAME_HEADER_LEN];
    prefix.copy_from_slice(header);
    let len = decode_header(prefix);
    if body.len() < len {
        return Err(FrameError::Truncated {
            expected: len,
            actual: body.len(),
        });
    }
    Ok(body.split_at(len))
}
