//! Push byte streams through a reassembler over an in-memory duplex.

use std::sync::Arc;

use coredump_recv::{
    reassembler::{Reassembler, SessionError, SessionOutcome},
    sink::MemorySink,
};
use tokio::io::{AsyncWriteExt, duplex};

const DUPLEX_CAPACITY: usize = 64 * 1024;

/// Write `wire` in pieces of `chunk` bytes to a reassembler backed by
/// `sink`, close the stream and return the session result.
///
/// Every piece is a separate write, so the reassembler sees read boundaries
/// at (or within) each piece.
pub async fn drive_chunked(
    sink: &MemorySink,
    wire: &[u8],
    chunk: usize,
) -> Result<SessionOutcome, SessionError> {
    let pieces: Vec<Vec<u8>> = wire.chunks(chunk.max(1)).map(<[u8]>::to_vec).collect();
    drive_pieces(sink, pieces).await
}

/// Write `wire` split at each offset in `cuts`, then close the stream.
///
/// Offsets outside the buffer or out of order are ignored.
pub async fn drive_split_at(
    sink: &MemorySink,
    wire: &[u8],
    cuts: &[usize],
) -> Result<SessionOutcome, SessionError> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        if cut > start && cut < wire.len() {
            pieces.push(wire[start..cut].to_vec());
            start = cut;
        }
    }
    pieces.push(wire[start..].to_vec());
    drive_pieces(sink, pieces).await
}

async fn drive_pieces(
    sink: &MemorySink,
    pieces: Vec<Vec<u8>>,
) -> Result<SessionOutcome, SessionError> {
    let (mut client, server) = duplex(DUPLEX_CAPACITY);
    let session = tokio::spawn(Reassembler::new(Arc::new(sink.clone())).run(server));

    for piece in pieces {
        // The session may end early (end frame or error) and drop its half.
        if client.write_all(&piece).await.is_err() {
            break;
        }
        tokio::task::yield_now().await;
    }
    drop(client);

    match session.await {
        Ok(result) => result,
        Err(join) => std::panic::resume_unwind(join.into_panic()),
    }
}
