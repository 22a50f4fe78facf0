//! Content-Length framing for the language-server wire.
//!
//! Every message travels as `Content-Length: <n>\r\n\r\n` followed by exactly
//! `n` bytes of JSON body. The read side recovers frame boundaries from a
//! buffered stream and tolerates isolated garbage: header lines it cannot
//! parse are skipped and undecodable bodies are dropped, because the peer
//! process is not under this system's control. Only stream EOF or a read
//! error ends the inbound side for good.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::lsp::types::JsonRpcResponse;

/// Upper bound on a frame body to prevent memory exhaustion from a
/// corrupt or hostile length header.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Outcome of one framing step on the inbound stream.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A well-framed, decodable message.
    Message(JsonRpcResponse),
    /// A line or frame that carried no message; keep reading.
    Skipped,
    /// The stream is finished and no further frames will arrive.
    Closed,
}

/// Write one framed message. The caller must hold the stream exclusively
/// for the duration of the call so header and body bytes never interleave
/// with another writer's frame.
pub async fn write_message<W>(writer: &mut W, body: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(body.as_bytes()).await?;
    writer.flush().await
}

/// Advance the inbound stream by one framing step.
///
/// Reads a single header line; on a valid `Content-Length` header, consumes
/// the blank separator line and exactly that many body bytes, then decodes.
pub async fn read_message<R>(reader: &mut R) -> ReadOutcome
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => return ReadOutcome::Closed,
        Ok(_) => {}
        Err(e) => {
            warn!("failed to read frame header: {e}");
            return ReadOutcome::Closed;
        }
    }

    let Some(length) = parse_content_length(line.trim()) else {
        // Other headers, separator lines, or garbage between frames.
        return ReadOutcome::Skipped;
    };

    if length > MAX_BODY_BYTES {
        warn!("skipping frame with implausible length {length}");
        return ReadOutcome::Skipped;
    }

    // Blank line separating headers from the body.
    line.clear();
    match reader.read_line(&mut line).await {
        Ok(0) => return ReadOutcome::Closed,
        Ok(_) => {}
        Err(e) => {
            warn!("failed to read frame separator: {e}");
            return ReadOutcome::Closed;
        }
    }

    let mut body = vec![0u8; length];
    if let Err(e) = reader.read_exact(&mut body).await {
        warn!("failed to read frame body: {e}");
        return ReadOutcome::Closed;
    }

    match serde_json::from_slice::<JsonRpcResponse>(&body) {
        Ok(message) => ReadOutcome::Message(message),
        Err(e) => {
            warn!("dropping undecodable frame body: {e}");
            ReadOutcome::Skipped
        }
    }
}

fn parse_content_length(line: &str) -> Option<usize> {
    line.strip_prefix("Content-Length:")
        .and_then(|rest| rest.trim().parse::<usize>().ok())
}
