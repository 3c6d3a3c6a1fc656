//! Source RCON packet framing
//!
//! ```text
//! [size: i32 LE][id: i32 LE][type: i32 LE][body ... \0][\0]
//! ```
//!
//! `size` covers everything after itself. Type code 2 means EXEC_COMMAND
//! when sent by the client and AUTH_RESPONSE when sent by the server, so
//! decoding needs to know which side produced the bytes.

use crate::error::RconError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// id + type + two terminating nulls
pub const MIN_PACKET_SIZE: i32 = 10;
/// Valve documents 4096, some mods send more
pub const MAX_PACKET_SIZE: i32 = 8192;

/// Request id the server puts in AUTH_RESPONSE when the password is wrong
pub const AUTH_FAILED_ID: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Auth,
    AuthResponse,
    ExecCommand,
    ResponseValue,
}

/// Which end of the connection wrote the packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Client,
    Server,
}

impl PacketType {
    pub fn code(self) -> i32 {
        match self {
            PacketType::Auth => 3,
            PacketType::AuthResponse => 2,
            PacketType::ExecCommand => 2,
            PacketType::ResponseValue => 0,
        }
    }

    pub fn from_code(code: i32, origin: Origin) -> Result<Self, RconError> {
        match (origin, code) {
            (Origin::Client, 3) => Ok(PacketType::Auth),
            (Origin::Client, 2) => Ok(PacketType::ExecCommand),
            (Origin::Server, 2) => Ok(PacketType::AuthResponse),
            (Origin::Server, 0) => Ok(PacketType::ResponseValue),
            _ => Err(RconError::Protocol(format!(
                "unexpected packet type {code} from {origin:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: PacketType,
    pub body: Vec<u8>,
}

impl Packet {
    pub fn new(id: i32, kind: PacketType, body: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let body = self.body.as_slice();
        let size = (body.len() + MIN_PACKET_SIZE as usize) as i32;

        let mut out = Vec::with_capacity(4 + size as usize);
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&self.kind.code().to_le_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(&[0, 0]);
        out
    }

    /// Decodes the payload that follows the size prefix
    pub fn from_payload(payload: &[u8], origin: Origin) -> Result<Self, RconError> {
        if payload.len() < MIN_PACKET_SIZE as usize {
            return Err(RconError::Protocol(format!(
                "packet too short: {} bytes",
                payload.len()
            )));
        }

        let id = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let code = i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
        let kind = PacketType::from_code(code, origin)?;

        // Body runs up to the first null, the trailing terminators are dropped.
        let raw = &payload[8..];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());

        Ok(Self {
            id,
            kind,
            body: raw[..end].to_vec(),
        })
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub async fn read_from<R>(reader: &mut R, origin: Origin) -> Result<Self, RconError>
    where
        R: AsyncRead + Unpin,
    {
        let mut size_bytes = [0u8; 4];
        read_exact(reader, &mut size_bytes).await?;
        let size = i32::from_le_bytes(size_bytes);

        if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&size) {
            return Err(RconError::Protocol(format!("packet size {size} out of range")));
        }

        let mut payload = vec![0u8; size as usize];
        read_exact(reader, &mut payload).await?;
        Self::from_payload(&payload, origin)
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), RconError>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.to_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

async fn read_exact<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), RconError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(RconError::ConnectionClosed),
        Err(e) => Err(e.into()),
    }
}
