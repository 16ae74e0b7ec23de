//! Length-prefixed message framing.
//!
//! Frames are a 4-byte big-endian length followed by a MessagePack
//! message body. Both sides enforce [`MAX_MESSAGE_SIZE`] so a bad
//! length prefix cannot provoke a huge allocation.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use sync_types::{Message, MAX_MESSAGE_SIZE};

use crate::error::Result;

/// Writes one length-prefixed frame.
pub(crate) async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("frame too large: {} > {}", payload.len(), MAX_MESSAGE_SIZE),
        ));
    }
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame.
pub(crate) async fn read_frame<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame too large: {len} > {MAX_MESSAGE_SIZE}"),
        ));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Encodes a message and writes it as one frame.
pub(crate) async fn write_message<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = message.to_bytes()?;
    write_frame(writer, &bytes).await?;
    Ok(())
}

/// Reads one frame and decodes it as a message.
pub(crate) async fn read_message<R>(reader: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let bytes = read_frame(reader).await?;
    Ok(Message::from_bytes(&bytes)?)
}

/// Short message name for log lines.
pub(crate) fn message_name(message: &Message) -> &'static str {
    match message {
        Message::Hello(_) => "hello",
        Message::Welcome(_) => "welcome",
        Message::GetEvents(_) => "get-events",
        Message::EventBatch(_) => "event-batch",
        Message::PutEvents(_) => "put-events",
        Message::PutAck(_) => "put-ack",
        Message::Bye(_) => "bye",
    }
}
