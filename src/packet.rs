//! Wire framing for rcon packets.
//!
//! ```text
//! | size: i32 | id: i32 | type: i32 | body ... | 0x00 0x00 |
//! ```
//!
//! All integers are little endian. `size` counts everything after itself.
use crate::error::RconError;

/// Bytes in front of the body: size, id and type.
pub const HEADER_SIZE: usize = 12;

/// Trailing body terminator plus empty-string padding.
pub const TERMINATOR: [u8; 2] = [0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    // SERVERDATA_AUTH
    Auth,
    // SERVERDATA_EXECCOMMAND, also SERVERDATA_AUTH_RESPONSE on the way back
    Exec,
    // SERVERDATA_RESPONSE_VALUE
    Response,
}

impl PacketType {
    pub fn value(&self) -> i32 {
        match self {
            PacketType::Auth => 3,
            PacketType::Exec => 2,
            PacketType::Response => 0,
        }
    }

    pub fn to_le_bytes(&self) -> [u8; 4] {
        self.value().to_le_bytes()
    }
}

impl TryFrom<i32> for PacketType {
    type Error = RconError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(PacketType::Auth),
            2 => Ok(PacketType::Exec),
            0 => Ok(PacketType::Response),
            other => Err(RconError::UnknownPacketType(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    id: i32,
    packet_type: PacketType,
    body: String,
}

impl Packet {
    pub const BASE_PACKAGE_SIZE: i32 = 10;

    pub fn new(id: i32, packet_type: PacketType, body: &str) -> Self {
        Packet {
            id,
            packet_type,
            body: body.to_owned(),
        }
    }

    /// Parse one complete frame. Trailing bytes past the declared size are
    /// ignored.
    pub fn unpack(incoming: &[u8]) -> Result<Self, RconError> {
        let size = read_i32(incoming, 0)?;
        let id = read_i32(incoming, 4)?;
        let packet_type = PacketType::try_from(read_i32(incoming, 8)?)?;

        // the size has to at least cover id, type and terminator
        let end = usize::try_from(size)
            .ok()
            .filter(|size| *size >= Self::BASE_PACKAGE_SIZE as usize)
            .map(|size| size + 4);
        let frame = end.and_then(|end| incoming.get(..end)).unwrap_or_default();
        let body = frame
            .get(HEADER_SIZE..)
            .and_then(|rest| rest.strip_suffix(&TERMINATOR))
            .ok_or(RconError::TruncatedPacket {
                declared: size,
                received: incoming.len(),
            })?;

        Ok(Packet {
            id,
            packet_type,
            body: std::str::from_utf8(body)?.to_owned(),
        })
    }

    // Since the only one of these values that can change in length is the body,
    // an easy way to calculate the size of a packet is to find the byte-length
    // of the packet body, then add 10 to it.
    pub fn size(&self) -> i32 {
        self.body.len() as i32 + Self::BASE_PACKAGE_SIZE
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn body(&self) -> &str {
        self.body.as_ref()
    }

    pub fn pack(&self) -> Vec<u8> {
        // Size, ID, Type, Body, Terminator
        let mut payload = Vec::<u8>::with_capacity(self.body.len() + 14);
        payload.extend_from_slice(&self.size().to_le_bytes());
        payload.extend_from_slice(&self.id().to_le_bytes());
        payload.extend_from_slice(&self.packet_type().to_le_bytes());
        payload.extend_from_slice(self.body().as_bytes());
        // null terminate the body (C++ interop 🤢), then null terminate the entire package
        payload.extend_from_slice(&TERMINATOR);
        payload
    }
}

/// The body slice of one raw inbound chunk: everything from byte 12 onwards.
///
/// A chunk is whatever a single socket read returned, so this may be a whole
/// packet, part of one, or several glued together. Chunks shorter than the
/// header contribute nothing.
pub fn body_fragment(chunk: &[u8]) -> &[u8] {
    chunk.get(HEADER_SIZE..).unwrap_or_default()
}

/// Bytes needed at the start of a packet before its request id can be read.
pub const ID_END: usize = 8;

/// Request id of the packet at the start of `chunk`.
pub fn response_id(chunk: &[u8]) -> Result<i32, RconError> {
    read_i32(chunk, 4)
}

fn read_i32(bytes: &[u8], offset: usize) -> Result<i32, RconError> {
    let raw: [u8; 4] = bytes
        .get(offset..offset + 4)
        .unwrap_or_default()
        .try_into()?;
    Ok(i32::from_le_bytes(raw))
}
