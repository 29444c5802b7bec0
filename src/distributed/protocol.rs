//! Master/worker protocol
//!
//! Messages are serialized with MessagePack (rmp-serde). Big integers travel
//! through num-bigint's serde support, so weights and coefficients of any
//! size survive the trip.
//!
//! # Protocol Version
//!
//! Current version: 1
//!
//! # Message Flow
//!
//! ```text
//! Master                            Worker
//!   |                                 |
//!   |-- CHALLENGE(version, nonce) --->|
//!   |<-- AUTHENTICATE(node, digest) --|
//!   |-- WELCOME(dims, total) -------->|    or ERROR, connection closed
//!   |                                 |
//!   |<-------- PULL ------------------|
//!   |-- WORK(item) ------------------>|    or QUEUE_EMPTY, worker stops
//!   |<-- RESULT(index, value) --------|
//!   |-- RESULT_ACK ------------------>|
//!   |            ...                  |
//! ```
//!
//! `digest` is HMAC-SHA256 of the nonce keyed with the shared authkey, so the
//! key itself never crosses the wire.
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack message]
//! ```

use crate::coordinator::WorkItem;
use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use num_bigint::BigInt;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

type HmacSha256 = Hmac<Sha256>;

/// Protocol version
///
/// Master and workers must have matching protocol versions.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest frame either side accepts
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Largest frame the master accepts before a peer has authenticated
pub const MAX_HANDSHAKE_FRAME_BYTES: usize = 4 * 1024;

/// Length of the authentication nonce
pub const NONCE_BYTES: usize = 32;

/// Protocol message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Master → Worker, first message on every connection
    Challenge(ChallengeMessage),

    /// Worker → Master, answer to the challenge
    Authenticate(AuthenticateMessage),

    /// Master → Worker, sent once the worker is authenticated
    Welcome(WelcomeMessage),

    /// Worker → Master, request the next pending item
    Pull,

    /// Master → Worker, the item is now leased to this connection
    Work(WorkItem),

    /// Master → Worker, nothing left to hand out
    QueueEmpty,

    /// Worker → Master, weighted result for a leased item
    Result(ResultMessage),

    /// Master → Worker, result recorded
    ResultAck,

    /// Either direction. The sender closes the connection afterwards.
    Error(ErrorMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeMessage {
    pub protocol_version: u32,
    pub nonce: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateMessage {
    pub protocol_version: u32,
    /// Hostname plus a per-process suffix
    pub node_id: String,
    pub digest: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeMessage {
    /// Factor dimensions; the worker rebuilds the partition matrix from them
    pub dims: Vec<usize>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub index: usize,
    /// `coefficient × count`
    pub value: BigInt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub node_id: String,
    pub error: String,
}

impl Message {
    /// Short name for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Challenge(_) => "CHALLENGE",
            Message::Authenticate(_) => "AUTHENTICATE",
            Message::Welcome(_) => "WELCOME",
            Message::Pull => "PULL",
            Message::Work(_) => "WORK",
            Message::QueueEmpty => "QUEUE_EMPTY",
            Message::Result(_) => "RESULT",
            Message::ResultAck => "RESULT_ACK",
            Message::Error(_) => "ERROR",
        }
    }
}

/// Fresh random nonce for a challenge
pub fn generate_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; NONCE_BYTES];
    rand::thread_rng().fill(nonce.as_mut_slice());
    nonce
}

/// HMAC-SHA256 of `nonce` keyed with `authkey`
pub fn compute_digest(authkey: &[u8], nonce: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(authkey).expect("HMAC can take key of any size");
    mac.update(nonce);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time check of a worker's answer
pub fn verify_digest(authkey: &[u8], nonce: &[u8], digest: &[u8]) -> bool {
    match HmacSha256::new_from_slice(authkey) {
        Ok(mut mac) => {
            mac.update(nonce);
            mac.verify_slice(digest).is_ok()
        }
        Err(_) => false,
    }
}

/// Serialize a message to bytes
///
/// Prepends a 4-byte length field for framing.
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>> {
    let msg_bytes = rmp_serde::to_vec(msg).context("Failed to serialize message")?;

    if msg_bytes.len() > MAX_FRAME_BYTES {
        anyhow::bail!("Message too large: {} bytes (max {})", msg_bytes.len(), MAX_FRAME_BYTES);
    }

    let msg_len = msg_bytes.len() as u32;
    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

/// Deserialize a message from bytes
///
/// Returns (message, bytes_consumed) where bytes_consumed includes the length prefix.
pub fn deserialize_message(buf: &[u8]) -> Result<(Message, usize)> {
    if buf.len() < 4 {
        anyhow::bail!("Buffer too small for message length (need 4 bytes, got {})", buf.len());
    }

    let msg_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

    if buf.len() < 4 + msg_len {
        anyhow::bail!("Incomplete message (need {} bytes, got {})", 4 + msg_len, buf.len());
    }

    let msg = rmp_serde::from_slice(&buf[4..4 + msg_len]).context("Failed to deserialize message")?;

    Ok((msg, 4 + msg_len))
}

/// The peer closed the connection between frames
#[derive(Debug, thiserror::Error)]
#[error("Connection closed by peer")]
pub struct ConnectionClosed;

/// Read a complete message from a stream
pub async fn read_message<R>(stream: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    read_message_limited(stream, MAX_FRAME_BYTES).await
}

/// Read a complete message, rejecting frames longer than `max_bytes`
/// before allocating for them
pub async fn read_message_limited<R>(stream: &mut R, max_bytes: usize) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let first = stream
        .read(&mut len_buf[..1])
        .await
        .context("Failed to read message length")?;
    if first == 0 {
        return Err(ConnectionClosed.into());
    }
    stream
        .read_exact(&mut len_buf[1..])
        .await
        .context("Failed to read message length")?;

    let msg_len = u32::from_le_bytes(len_buf) as usize;

    if msg_len > max_bytes {
        anyhow::bail!("Message too large: {} bytes (max {})", msg_len, max_bytes);
    }

    let mut msg_buf = vec![0u8; msg_len];
    stream
        .read_exact(&mut msg_buf)
        .await
        .context("Failed to read message body")?;

    let msg = rmp_serde::from_slice(&msg_buf).context("Failed to deserialize message")?;

    Ok(msg)
}

/// Write a message to a stream and flush it
pub async fn write_message<W>(stream: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let framed = serialize_message(msg)?;

    stream.write_all(&framed).await.context("Failed to write message")?;
    stream.flush().await.context("Failed to flush stream")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weight::Weight;

    fn roundtrip(msg: &Message) -> Message {
        let bytes = serialize_message(msg).unwrap();
        let (deserialized, consumed) = deserialize_message(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        deserialized
    }

    #[test]
    fn test_serialize_deserialize_work() {
        let huge: BigInt = "-200000000000000000000".parse().unwrap();
        let weight: Weight = vec![huge.clone(), BigInt::from(0), -huge.clone()].into();
        let msg = Message::Work(WorkItem {
            index: 3,
            total: 8,
            coefficient: BigInt::from(-1),
            weight: weight.clone(),
        });

        match roundtrip(&msg) {
            Message::Work(item) => {
                assert_eq!(item.index, 3);
                assert_eq!(item.total, 8);
                assert_eq!(item.coefficient, BigInt::from(-1));
                assert_eq!(item.weight, weight);
            }
            other => panic!("Wrong message type: {}", other.kind()),
        }
    }

    #[test]
    fn test_serialize_deserialize_result() {
        let value: BigInt = "123456789012345678901234567890".parse().unwrap();
        let msg = Message::Result(ResultMessage { index: 7, value });
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn test_serialize_deserialize_unit_variants() {
        for msg in [Message::Pull, Message::QueueEmpty, Message::ResultAck] {
            assert_eq!(roundtrip(&msg), msg);
        }
    }

    #[test]
    fn test_serialize_deserialize_error() {
        let msg = Message::Error(ErrorMessage {
            node_id: "node-1".to_string(),
            error: "authentication failed".to_string(),
        });

        match roundtrip(&msg) {
            Message::Error(err) => {
                assert_eq!(err.node_id, "node-1");
                assert_eq!(err.error, "authentication failed");
            }
            other => panic!("Wrong message type: {}", other.kind()),
        }
    }

    #[test]
    fn test_protocol_version() {
        assert_eq!(PROTOCOL_VERSION, 1);
    }

    #[test]
    fn test_message_framing() {
        let msg = Message::Pull;
        let bytes = serialize_message(&msg).unwrap();

        assert!(bytes.len() >= 4);
        let msg_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(bytes.len(), 4 + msg_len);
    }

    #[test]
    fn test_incomplete_buffer() {
        let bytes = serialize_message(&Message::Welcome(WelcomeMessage {
            dims: vec![2, 2, 2],
            total: 8,
        }))
        .unwrap();
        assert!(deserialize_message(&bytes[..2]).is_err());
        assert!(deserialize_message(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_digest() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), NONCE_BYTES);

        let digest = compute_digest(b"secret", &nonce);
        assert!(verify_digest(b"secret", &nonce, &digest));
        assert!(!verify_digest(b"wrong", &nonce, &digest));
        assert!(!verify_digest(b"secret", &generate_nonce(), &digest));
        assert!(!verify_digest(b"secret", &nonce, &digest[..16]));
    }

    #[tokio::test]
    async fn test_stream_roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let msg = Message::Challenge(ChallengeMessage {
            protocol_version: PROTOCOL_VERSION,
            nonce: generate_nonce(),
        });
        write_message(&mut client, &msg).await.unwrap();
        write_message(&mut client, &Message::Pull).await.unwrap();

        assert_eq!(read_message(&mut server).await.unwrap(), msg);
        assert_eq!(read_message(&mut server).await.unwrap(), Message::Pull);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        use tokio::io::AsyncWriteExt;

        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&u32::MAX.to_le_bytes()).await.unwrap();

        let err = read_message(&mut server).await.unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn test_close_between_frames() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_message(&mut client, &Message::Pull).await.unwrap();
        drop(client);

        assert_eq!(read_message(&mut server).await.unwrap(), Message::Pull);
        let err = read_message(&mut server).await.unwrap_err();
        assert!(err.is::<ConnectionClosed>());
    }

    #[tokio::test]
    async fn test_close_mid_frame() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(&100u32.to_le_bytes()).await.unwrap();
        client.write_all(&[0x92, 0x01]).await.unwrap();
        drop(client);

        let err = read_message(&mut server).await.unwrap_err();
        assert!(!err.is::<ConnectionClosed>());
        assert!(err.to_string().contains("body"));
    }

    #[tokio::test]
    async fn test_limited_read() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let auth = Message::Authenticate(AuthenticateMessage {
            protocol_version: PROTOCOL_VERSION,
            node_id: "host-1".to_string(),
            digest: compute_digest(b"secret", &generate_nonce()),
        });
        write_message(&mut client, &auth).await.unwrap();
        assert_eq!(
            read_message_limited(&mut server, MAX_HANDSHAKE_FRAME_BYTES).await.unwrap(),
            auth
        );

        let big = Message::Welcome(WelcomeMessage {
            dims: vec![2; 64],
            total: 1,
        });
        write_message(&mut client, &big).await.unwrap();
        let err = read_message_limited(&mut server, 16).await.unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
