//! Chunked, length-prefixed message framing.
//!
//! Every actor in Lobbyforge (lobby, datastore, player and developer tools,
//! match servers) exchanges whole messages over a plain byte stream. One
//! message is split into chunks, each prefixed by its length, and closed by
//! an empty chunk:
//!
//! ```text
//! ┌──────────┬──────────────┬──────────┬──────────────┬──────────┐
//! │ len (BE) │ chunk bytes  │ len (BE) │ chunk bytes  │ 00000000 │
//! │ 4 bytes  │ len bytes    │ 4 bytes  │ len bytes    │ end mark │
//! └──────────┴──────────────┴──────────┴──────────────┴──────────┘
//! ```
//!
//! The layer is payload-agnostic: it moves bytes. Turning those bytes into
//! JSON is the protocol crate's job.
//!
//! # Disconnects
//!
//! A stream that ends (or is reset) in the middle of a message is not an
//! error here. [`read_message`] returns `Ok(None)` and callers treat that as
//! "the peer went away", exactly like a clean EOF between messages.

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Default upper bound for a single chunk (64 KiB).
pub const MAX_CHUNK_LEN: usize = 65536;

/// Size of the big-endian length header in front of every chunk.
const HEADER_LEN: usize = 4;

/// Encodes `payload` into chunks of at most `max_chunk` bytes plus the
/// terminating zero-length marker.
///
/// An empty payload encodes as the marker alone.
pub fn encode_message(payload: &[u8], max_chunk: usize) -> Vec<u8> {
    let chunk_len = max_chunk.clamp(1, u32::MAX as usize);
    let chunk_count = payload.len().div_ceil(chunk_len);
    let mut out =
        Vec::with_capacity(payload.len() + (chunk_count + 1) * HEADER_LEN);

    for piece in payload.chunks(chunk_len) {
        // `chunk_len` is clamped to u32, so the cast cannot truncate.
        out.extend_from_slice(&(piece.len() as u32).to_be_bytes());
        out.extend_from_slice(piece);
    }
    out.extend_from_slice(&0u32.to_be_bytes());
    out
}

/// Writes one framed message and flushes the writer.
pub async fn write_message<W>(
    writer: &mut W,
    payload: &[u8],
    max_chunk: usize,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_message(payload, max_chunk);
    writer
        .write_all(&bytes)
        .await
        .map_err(TransportError::SendFailed)?;
    writer.flush().await.map_err(TransportError::SendFailed)
}

/// Reads one framed message and returns the reassembled payload.
///
/// Returns `Ok(None)` if the stream closes at any point before the end
/// marker. Fails with [`TransportError::OversizedChunk`] if a header
/// declares more than `max_chunk` bytes.
pub async fn read_message<R>(
    reader: &mut R,
    max_chunk: usize,
) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut payload = Vec::new();

    loop {
        let mut header = [0u8; HEADER_LEN];
        if !read_exact_or_closed(reader, &mut header).await? {
            return Ok(None);
        }

        let len = u32::from_be_bytes(header) as usize;
        if len == 0 {
            return Ok(Some(payload));
        }
        if len > max_chunk {
            return Err(TransportError::OversizedChunk {
                len,
                max: max_chunk,
            });
        }

        let start = payload.len();
        payload.resize(start + len, 0);
        if !read_exact_or_closed(reader, &mut payload[start..]).await? {
            return Ok(None);
        }
    }
}

/// Fills `buf` completely, retrying partial reads.
///
/// Returns `Ok(false)` if the peer disconnected before `buf` was full.
async fn read_exact_or_closed<R>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<bool, TransportError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(true),
        Err(e) if is_disconnect(e.kind()) => Ok(false),
        Err(e) => Err(TransportError::ReceiveFailed(e)),
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- encode_message ---------------------------------------------------

    #[test]
    fn test_encode_single_chunk_layout() {
        let bytes = encode_message(b"abc", MAX_CHUNK_LEN);
        assert_eq!(bytes, vec![0, 0, 0, 3, b'a', b'b', b'c', 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_empty_payload_is_just_the_marker() {
        assert_eq!(encode_message(b"", MAX_CHUNK_LEN), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_splits_at_chunk_bound() {
        // 5 bytes with a 2-byte bound → 2 + 2 + 1, then the marker.
        let bytes = encode_message(b"hello", 2);
        assert_eq!(
            bytes,
            vec![
                0, 0, 0, 2, b'h', b'e', //
                0, 0, 0, 2, b'l', b'l', //
                0, 0, 0, 1, b'o', //
                0, 0, 0, 0,
            ]
        );
    }

    // -- read_message -----------------------------------------------------

    #[tokio::test]
    async fn test_read_reassembles_multi_chunk_message() {
        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let bytes = encode_message(&payload, 64);

        let mut reader = bytes.as_slice();
        let decoded = read_message(&mut reader, 64).await.unwrap();

        assert_eq!(decoded, Some(payload));
    }

    #[tokio::test]
    async fn test_read_consecutive_messages_from_one_stream() {
        let mut bytes = encode_message(b"first", MAX_CHUNK_LEN);
        bytes.extend(encode_message(b"second", MAX_CHUNK_LEN));

        let mut reader = bytes.as_slice();
        let first = read_message(&mut reader, MAX_CHUNK_LEN).await.unwrap();
        let second = read_message(&mut reader, MAX_CHUNK_LEN).await.unwrap();
        let third = read_message(&mut reader, MAX_CHUNK_LEN).await.unwrap();

        assert_eq!(first.as_deref(), Some(&b"first"[..]));
        assert_eq!(second.as_deref(), Some(&b"second"[..]));
        assert_eq!(third, None, "drained stream means no message");
    }

    #[tokio::test]
    async fn test_read_empty_stream_returns_none() {
        let mut reader: &[u8] = &[];
        let result = read_message(&mut reader, MAX_CHUNK_LEN).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_read_truncated_header_returns_none() {
        let mut reader: &[u8] = &[0, 0];
        let result = read_message(&mut reader, MAX_CHUNK_LEN).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_read_truncated_chunk_returns_none() {
        // Header promises 10 bytes, only 3 arrive before EOF.
        let mut reader: &[u8] = &[0, 0, 0, 10, 1, 2, 3];
        let result = read_message(&mut reader, MAX_CHUNK_LEN).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_read_missing_end_marker_returns_none() {
        let mut bytes = encode_message(b"abc", MAX_CHUNK_LEN);
        bytes.truncate(bytes.len() - 4);

        let mut reader = bytes.as_slice();
        let result = read_message(&mut reader, MAX_CHUNK_LEN).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_read_rejects_oversized_chunk() {
        let len = (MAX_CHUNK_LEN as u32 + 1).to_be_bytes();
        let mut reader: &[u8] = &len;

        let result = read_message(&mut reader, MAX_CHUNK_LEN).await;

        assert!(
            matches!(
                result,
                Err(TransportError::OversizedChunk { len, max })
                    if len == MAX_CHUNK_LEN + 1 && max == MAX_CHUNK_LEN
            ),
            "expected OversizedChunk, got {result:?}"
        );
    }

    #[tokio::test]
    async fn test_read_across_partial_reads() {
        // A tiny duplex buffer forces the reader to see the message in
        // many small pieces.
        let (mut client, mut server) = tokio::io::duplex(7);
        let payload = vec![42u8; 300];
        let expected = payload.clone();

        let writer = tokio::spawn(async move {
            write_message(&mut client, &payload, 50).await.unwrap();
        });

        let decoded = read_message(&mut server, 50).await.unwrap();
        writer.await.unwrap();

        assert_eq!(decoded, Some(expected));
    }

    #[tokio::test]
    async fn test_read_after_writer_dropped_returns_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let result = read_message(&mut server, MAX_CHUNK_LEN).await.unwrap();
        assert!(result.is_none());
    }
}
