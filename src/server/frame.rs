//! Wire framing for lobby connections.
//!
//! After the raw handshake every message is a frame:
//!
//! ```text
//! +-------------------+------------------------------+
//! | length (4 bytes)  |   gzip-compressed payload    |
//! | u32 big-endian    |   (length bytes)             |
//! +-------------------+------------------------------+
//! ```
//!
//! The handshake itself is unframed: the client sends four zero bytes and
//! the server answers with the big-endian `u32` [`HANDSHAKE_ACK`].

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Number of bytes in the raw client handshake.
pub const HANDSHAKE_LEN: usize = 4;

/// Value the server answers the raw handshake with.
pub const HANDSHAKE_ACK: u32 = 42;

/// Errors that can occur while reading or writing frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Socket failure or premature end of stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The length prefix exceeds the configured maximum.
    #[error("frame size {size} exceeds maximum {max}")]
    TooLarge { size: usize, max: u32 },

    /// The payload was not valid gzip data.
    #[error("payload decompression failed: {0}")]
    Decompress(io::Error),

    /// The payload inflates past the configured maximum.
    #[error("decompressed payload exceeds maximum {max}")]
    Inflated { max: u32 },
}

impl FrameError {
    /// Whether the stream can no longer be trusted after this error.
    ///
    /// A bad payload leaves the stream positioned at the next frame, so only
    /// transport and size errors are fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FrameError::Decompress(_))
    }
}

/// Gzip-compress a payload.
pub fn compress(payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload)?;
    encoder.finish()
}

/// Decompress a gzip payload, producing at most `max_size` bytes.
pub fn decompress(data: &[u8], max_size: u32) -> Result<Vec<u8>, FrameError> {
    let limit = u64::from(max_size);
    let mut decoder = GzDecoder::new(data).take(limit + 1);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(FrameError::Decompress)?;
    if out.len() as u64 > limit {
        return Err(FrameError::Inflated { max: max_size });
    }
    Ok(out)
}

/// Build the wire bytes of one frame: length prefix followed by the
/// compressed payload.
pub fn encode_frame(payload: &[u8], max_frame_size: u32) -> Result<Vec<u8>, FrameError> {
    let compressed = compress(payload)?;
    let len = compressed.len();
    let prefix = u32::try_from(len)
        .ok()
        .filter(|&n| n <= max_frame_size)
        .ok_or(FrameError::TooLarge {
            size: len,
            max: max_frame_size,
        })?;

    let mut frame = Vec::with_capacity(4 + len);
    frame.extend_from_slice(&prefix.to_be_bytes());
    frame.extend_from_slice(&compressed);
    Ok(frame)
}

/// Read one frame and return its decompressed payload.
///
/// `max_frame_size` bounds both the declared length and the decompressed
/// payload. Waits until the whole declared length has arrived; a stream that ends
/// first yields an `UnexpectedEof` I/O error, never a short payload.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_size: u32,
) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);

    if len > max_frame_size {
        return Err(FrameError::TooLarge {
            size: len as usize,
            max: max_frame_size,
        });
    }

    let mut compressed = vec![0u8; len as usize];
    reader.read_exact(&mut compressed).await?;

    decompress(&compressed, max_frame_size)
}

/// Compress and write one frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
    max_frame_size: u32,
) -> Result<(), FrameError> {
    let frame = encode_frame(payload, max_frame_size)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the raw four-byte client handshake.
pub async fn read_handshake<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> io::Result<[u8; HANDSHAKE_LEN]> {
    let mut buf = [0u8; HANDSHAKE_LEN];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write the raw handshake acknowledgement.
pub async fn write_handshake_ack<W: AsyncWrite + Unpin>(writer: &mut W) -> io::Result<()> {
    writer.write_all(&HANDSHAKE_ACK.to_be_bytes()).await?;
    writer.flush().await
}
