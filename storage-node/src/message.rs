use std::io;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Longest line accepted from a peer, terminator included.
pub const MAX_FRAME_LEN: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Get,
    Set { data: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Data { data: Vec<String> },
    Ok,
    Error { message: String },
}

/// A line that was framed correctly but did not decode into `T`.
///
/// Kept apart from transport failures so a server can answer with an error
/// response and keep the connection open.
#[derive(Debug)]
pub enum Frame<T> {
    Message(T),
    Malformed(serde_json::Error),
}

pub async fn read_message<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(Frame::Message(message)) => Ok(Some(message)),
        Some(Frame::Malformed(err)) => Err(to_io_error(err)),
        None => Ok(None),
    }
}

/// Reads the next non-blank line. A line longer than [`MAX_FRAME_LEN`] is
/// an `InvalidData` error.
pub async fn read_frame<R, T>(reader: &mut R) -> io::Result<Option<Frame<T>>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    read_frame_limited(reader, MAX_FRAME_LEN).await
}

async fn read_frame_limited<R, T>(reader: &mut R, limit: u64) -> io::Result<Option<Frame<T>>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    // One JSON object per line so the node can be driven with netcat.
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = (&mut *reader).take(limit).read_line(&mut line).await?;
        if bytes == 0 {
            return Ok(None);
        }
        if bytes as u64 == limit && !line.ends_with('\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame exceeds {limit} bytes"),
            ));
        }

        let trimmed = line.trim_end_matches(LINE_ENDINGS);
        if trimmed.trim().is_empty() {
            continue;
        }

        let frame = match serde_json::from_str(trimmed) {
            Ok(message) => Frame::Message(message),
            Err(err) => Frame::Malformed(err),
        };
        return Ok(Some(frame));
    }
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut encoded = serde_json::to_vec(message).map_err(to_io_error)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

fn to_io_error(err: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}
