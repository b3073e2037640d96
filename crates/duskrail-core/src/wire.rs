//! Wire format — packet header and the ten frame variants.
//!
//! Everything here is big-endian, fixed-width, and laid out exactly as
//! specified. There is no unsafe code in this module; fields are encoded
//! and decoded field-by-field rather than cast from a packed struct, since
//! the wire format is explicitly big-endian and struct-casting would tie
//! correctness to host endianness.

use static_assertions::const_assert_eq;

/// Width of the packet header in bytes.
pub const HEADER_LEN: usize = 26;

/// Width of a Data frame's pre-encryption canonical form.
pub const DATA_FRAME_LEN: usize = 1070;

/// Chunk payload width inside a Data frame.
pub const CHUNK_LEN: usize = 1024;

const_assert_eq!(HEADER_LEN, 4 + 1 + 16 + 4 + 1);
const_assert_eq!(DATA_FRAME_LEN, 4 + 4 + 4 + 32 + 2 + CHUNK_LEN);

// ── Type ──────────────────────────────────────────────────────────────────────

/// Frame type tag. `None` (0x00) is a no-op sentinel, never produced by an
/// encoder but tolerated on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Type {
    None = 0x00,
    Init = 0x01,
    InitAck = 0x02,
    Session = 0x03,
    SessAck = 0x04,
    Data = 0x05,
    DataAck = 0x06,
    Ping = 0x07,
    Pong = 0x08,
    Shutdown = 0x09,
    ShutAck = 0x0a,
}

impl TryFrom<u8> for Type {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Type::None),
            0x01 => Ok(Type::Init),
            0x02 => Ok(Type::InitAck),
            0x03 => Ok(Type::Session),
            0x04 => Ok(Type::SessAck),
            0x05 => Ok(Type::Data),
            0x06 => Ok(Type::DataAck),
            0x07 => Ok(Type::Ping),
            0x08 => Ok(Type::Pong),
            0x09 => Ok(Type::Shutdown),
            0x0a => Ok(Type::ShutAck),
            other => Err(WireError::UnknownType(other)),
        }
    }
}

impl From<Type> for u8 {
    fn from(t: Type) -> u8 {
        t as u8
    }
}

// ── Packet header ─────────────────────────────────────────────────────────────

/// The 26-byte header that precedes every frame body on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub typ: Type,
    pub connection_id: [u8; 16],
    pub sequence: u32,
    pub channel: u8,
}

impl PacketHeader {
    /// Encode the header (with a placeholder checksum) followed by `frame`,
    /// then compute CRC32-IEEE over bytes `[4..]` and write it into `[0..4]`.
    pub fn encode_packet(&self, frame: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + frame.len());
        out.extend_from_slice(&[0u8; 4]); // checksum placeholder
        out.push(u8::from(self.typ));
        out.extend_from_slice(&self.connection_id);
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.push(self.channel);
        out.extend_from_slice(frame);

        let checksum = crc32fast::hash(&out[4..]);
        out[0..4].copy_from_slice(&checksum.to_be_bytes());
        out
    }
}

/// Verify the stored checksum against bytes `[4..]`. Does not parse fields.
pub fn check_packet(bytes: &[u8]) -> Result<(), WireError> {
    if bytes.len() < HEADER_LEN {
        return Err(WireError::ShortPacket(bytes.len()));
    }
    let stored = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
    let computed = crc32fast::hash(&bytes[4..]);
    if stored != computed {
        return Err(WireError::ChecksumMismatch);
    }
    Ok(())
}

/// Parse the header out of `bytes`, verifying the checksum first.
///
/// A checksum mismatch is a decode error, not a tolerated condition: the
/// caller MUST drop the packet silently rather than act on its fields.
pub fn decode_header(bytes: &[u8]) -> Result<PacketHeader, WireError> {
    check_packet(bytes)?;

    let typ = Type::try_from(bytes[4])?;
    let mut connection_id = [0u8; 16];
    connection_id.copy_from_slice(&bytes[5..21]);
    let sequence = u32::from_be_bytes(bytes[21..25].try_into().unwrap());
    let channel = bytes[25];

    Ok(PacketHeader {
        typ,
        connection_id,
        sequence,
        channel,
    })
}

// ── Frames ────────────────────────────────────────────────────────────────────

/// The ten frame bodies, tagged by `Type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Init {
        stream_id: u32,
        version: u32,
    },
    InitAck {
        stream_id: u32,
        token: [u8; 16],
    },
    Session {
        stream_id: u32,
        token: [u8; 16],
        peer_public_key: [u8; 64],
    },
    SessAck {
        stream_id: u32,
        local_public_key: [u8; 64],
    },
    Data {
        stream_id: u32,
        offset: u32,
        total_length: u32,
        hash: [u8; 32],
        chunk_size: u16,
        chunk: [u8; CHUNK_LEN],
    },
    DataAck {
        stream_id: u32,
        offset: u32,
    },
    Ping {
        stream_id: u32,
    },
    Pong {
        stream_id: u32,
    },
    Shutdown {
        stream_id: u32,
    },
    ShutAck {
        stream_id: u32,
    },
}

impl Frame {
    /// Build a Data frame, right-padding the chunk to [`CHUNK_LEN`] bytes
    /// with cryptographically random bytes when shorter.
    pub fn data(stream_id: u32, offset: u32, total_length: u32, hash: [u8; 32], chunk: &[u8]) -> Self {
        debug_assert!(chunk.len() <= CHUNK_LEN);
        let mut buf = [0u8; CHUNK_LEN];
        buf[..chunk.len()].copy_from_slice(chunk);
        if chunk.len() < CHUNK_LEN {
            rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut buf[chunk.len()..]);
        }
        Frame::Data {
            stream_id,
            offset,
            total_length,
            hash,
            chunk_size: chunk.len() as u16,
            chunk: buf,
        }
    }

    pub fn frame_type(&self) -> Type {
        match self {
            Frame::Init { .. } => Type::Init,
            Frame::InitAck { .. } => Type::InitAck,
            Frame::Session { .. } => Type::Session,
            Frame::SessAck { .. } => Type::SessAck,
            Frame::Data { .. } => Type::Data,
            Frame::DataAck { .. } => Type::DataAck,
            Frame::Ping { .. } => Type::Ping,
            Frame::Pong { .. } => Type::Pong,
            Frame::Shutdown { .. } => Type::Shutdown,
            Frame::ShutAck { .. } => Type::ShutAck,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Frame::Init { stream_id, version } => {
                let mut out = Vec::with_capacity(8);
                out.extend_from_slice(&stream_id.to_be_bytes());
                out.extend_from_slice(&version.to_be_bytes());
                out
            }
            Frame::InitAck { stream_id, token } => {
                let mut out = Vec::with_capacity(20);
                out.extend_from_slice(&stream_id.to_be_bytes());
                out.extend_from_slice(token);
                out
            }
            Frame::Session {
                stream_id,
                token,
                peer_public_key,
            } => {
                let mut out = Vec::with_capacity(84);
                out.extend_from_slice(&stream_id.to_be_bytes());
                out.extend_from_slice(token);
                out.extend_from_slice(peer_public_key);
                out
            }
            Frame::SessAck {
                stream_id,
                local_public_key,
            } => {
                let mut out = Vec::with_capacity(68);
                out.extend_from_slice(&stream_id.to_be_bytes());
                out.extend_from_slice(local_public_key);
                out
            }
            Frame::Data {
                stream_id,
                offset,
                total_length,
                hash,
                chunk_size,
                chunk,
            } => {
                let mut out = Vec::with_capacity(DATA_FRAME_LEN);
                out.extend_from_slice(&stream_id.to_be_bytes());
                out.extend_from_slice(&offset.to_be_bytes());
                out.extend_from_slice(&total_length.to_be_bytes());
                out.extend_from_slice(hash);
                out.extend_from_slice(&chunk_size.to_be_bytes());
                out.extend_from_slice(chunk);
                out
            }
            Frame::DataAck { stream_id, offset } => {
                let mut out = Vec::with_capacity(8);
                out.extend_from_slice(&stream_id.to_be_bytes());
                out.extend_from_slice(&offset.to_be_bytes());
                out
            }
            Frame::Ping { stream_id }
            | Frame::Pong { stream_id }
            | Frame::Shutdown { stream_id }
            | Frame::ShutAck { stream_id } => stream_id.to_be_bytes().to_vec(),
        }
    }
}

/// Decode a frame body given its wire `Type`. `Type::None` always yields
/// `Ok(None)` — a no-op, never an error.
pub fn decode_frame(typ: Type, body: &[u8]) -> Result<Option<Frame>, WireError> {
    fn u32_at(b: &[u8], o: usize) -> u32 {
        u32::from_be_bytes(b[o..o + 4].try_into().unwrap())
    }
    fn u16_at(b: &[u8], o: usize) -> u16 {
        u16::from_be_bytes(b[o..o + 2].try_into().unwrap())
    }
    fn arr<const N: usize>(b: &[u8], o: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&b[o..o + N]);
        out
    }

    let want = match typ {
        Type::None => return Ok(None),
        Type::Init => 8,
        Type::InitAck => 20,
        Type::Session => 84,
        Type::SessAck => 68,
        Type::Data => DATA_FRAME_LEN,
        Type::DataAck => 8,
        Type::Ping | Type::Pong | Type::Shutdown | Type::ShutAck => 4,
    };
    if body.len() != want {
        return Err(WireError::ShortFrame {
            typ: typ as u8,
            expected: want,
            got: body.len(),
        });
    }

    let frame = match typ {
        Type::None => unreachable!(),
        Type::Init => Frame::Init {
            stream_id: u32_at(body, 0),
            version: u32_at(body, 4),
        },
        Type::InitAck => Frame::InitAck {
            stream_id: u32_at(body, 0),
            token: arr(body, 4),
        },
        Type::Session => Frame::Session {
            stream_id: u32_at(body, 0),
            token: arr(body, 4),
            peer_public_key: arr(body, 20),
        },
        Type::SessAck => Frame::SessAck {
            stream_id: u32_at(body, 0),
            local_public_key: arr(body, 4),
        },
        Type::Data => Frame::Data {
            stream_id: u32_at(body, 0),
            offset: u32_at(body, 4),
            total_length: u32_at(body, 8),
            hash: arr(body, 12),
            chunk_size: u16_at(body, 44),
            chunk: arr(body, 46),
        },
        Type::DataAck => Frame::DataAck {
            stream_id: u32_at(body, 0),
            offset: u32_at(body, 4),
        },
        Type::Ping => Frame::Ping {
            stream_id: u32_at(body, 0),
        },
        Type::Pong => Frame::Pong {
            stream_id: u32_at(body, 0),
        },
        Type::Shutdown => Frame::Shutdown {
            stream_id: u32_at(body, 0),
        },
        Type::ShutAck => Frame::ShutAck {
            stream_id: u32_at(body, 0),
        },
    };
    Ok(Some(frame))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("packet too short: {0} bytes")]
    ShortPacket(usize),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("unknown frame type byte: 0x{0:02x}")]
    UnknownType(u8),

    #[error("frame type 0x{typ:02x} expected {expected} bytes, got {got}")]
    ShortFrame {
        typ: u8,
        expected: usize,
        got: usize,
    },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
