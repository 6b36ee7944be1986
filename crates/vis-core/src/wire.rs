//! Packet wire format.
//!
//! Every packet starts with a 6-byte big-endian index. Data packets carry a
//! block of the file after it; the header packet carries the stream header
//! body and is recognised by the all-ones sentinel index.
//!
//! All integers on the wire are big-endian. Changing any size or offset here
//! is a protocol version bump.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U16, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::digest::{content_hash, ContentHash};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Width of the packet index prefix in bytes.
pub const PACKET_INDEX_SIZE: usize = 6;

/// Index reserved for the header packet. Largest value a 6-byte index holds.
pub const HEADER_PACKET_INDEX: u64 = 0xFFFF_FFFF_FFFF;

/// The only protocol version this receiver understands.
pub const PROTOCOL_VERSION: u16 = 2;

/// Size of the header packet: sentinel index plus header body.
pub const HEADER_PACKET_SIZE: usize = 50;

// ── Header Packet ─────────────────────────────────────────────────────────────

/// On-wire layout of the header packet.
///
/// Wire size: 50 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
struct HeaderPacket {
    /// Always `HEADER_PACKET_INDEX`.
    index: [u8; 6],
    version: U16<BigEndian>,
    file_size: U64<BigEndian>,
    /// Bytes per data packet, index included.
    packet_size: U16<BigEndian>,
    content_hash: [u8; 32],
}

assert_eq_size!(HeaderPacket, [u8; HEADER_PACKET_SIZE]);

struct Field {
    name: &'static str,
    end: usize,
}

const INDEX_FIELD: Field = Field { name: "packet index", end: 6 };
const VERSION_FIELD: Field = Field { name: "version", end: 8 };
const BODY_FIELDS: [Field; 3] = [
    Field { name: "file size", end: 16 },
    Field { name: "packet size", end: 18 },
    Field { name: "content hash", end: 50 },
];

fn require(bytes: &[u8], field: &Field) -> Result<(), WireError> {
    if bytes.len() < field.end {
        return Err(WireError::Truncated {
            field: field.name,
            needed: field.end,
            available: bytes.len(),
        });
    }
    Ok(())
}

// ── Stream Header ─────────────────────────────────────────────────────────────

/// Transfer parameters announced once, before any data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub version: u16,
    pub file_size: u64,
    pub packet_size: u16,
    pub content_hash: ContentHash,
}

impl StreamHeader {
    /// Header describing `content` split into packets of `packet_size` bytes.
    pub fn new(content: &[u8], packet_size: u16) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            file_size: content.len() as u64,
            packet_size,
            content_hash: content_hash(content),
        }
    }

    /// Parse a header packet. All-or-nothing: fields are validated in wire
    /// order and no partially read header is ever returned.
    pub fn parse(bytes: &[u8]) -> Result<Self, WireError> {
        require(bytes, &INDEX_FIELD)?;
        let index = packet_index(bytes)?;
        if index != HEADER_PACKET_INDEX {
            return Err(WireError::NotHeader(index));
        }

        require(bytes, &VERSION_FIELD)?;
        let version = u16::from_be_bytes([bytes[6], bytes[7]]);
        if version != PROTOCOL_VERSION {
            return Err(WireError::UnknownVersion(version));
        }

        for field in &BODY_FIELDS {
            require(bytes, field)?;
        }

        let wire = HeaderPacket::read_from_prefix(bytes).ok_or(WireError::Truncated {
            field: "header",
            needed: HEADER_PACKET_SIZE,
            available: bytes.len(),
        })?;

        Ok(Self {
            version,
            file_size: wire.file_size.get(),
            packet_size: wire.packet_size.get(),
            content_hash: wire.content_hash,
        })
    }

    /// Encode as a complete header packet, sentinel index included.
    pub fn to_packet(&self) -> Vec<u8> {
        let wire = HeaderPacket {
            index: encode_index_unchecked(HEADER_PACKET_INDEX),
            version: U16::new(self.version),
            file_size: U64::new(self.file_size),
            packet_size: U16::new(self.packet_size),
            content_hash: self.content_hash,
        };
        wire.as_bytes().to_vec()
    }

    /// Payload bytes per data packet. Zero for a degenerate packet size.
    pub fn block_size(&self) -> u64 {
        u64::from(self.packet_size).saturating_sub(PACKET_INDEX_SIZE as u64)
    }

    /// Number of data packets in the stream.
    pub fn packet_count(&self) -> u64 {
        match self.block_size() {
            0 => 0,
            block_size => self.file_size.div_ceil(block_size),
        }
    }

    /// Byte offset in the output where packet `index` is written.
    pub fn block_offset(&self, index: u64) -> u64 {
        index * self.block_size()
    }

    /// Size the packet with `index` must have on the wire.
    ///
    /// Every packet is `packet_size` long except the last, which only carries
    /// what remains of the file.
    pub fn expected_packet_size(&self, index: u64) -> u64 {
        if index + 1 == self.packet_count() {
            self.file_size - self.block_offset(index) + PACKET_INDEX_SIZE as u64
        } else {
            u64::from(self.packet_size)
        }
    }
}

// ── Packet Index ──────────────────────────────────────────────────────────────

/// Read the big-endian index prefix of a packet.
pub fn packet_index(packet: &[u8]) -> Result<u64, WireError> {
    require(packet, &INDEX_FIELD)?;
    Ok(packet[..PACKET_INDEX_SIZE]
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Encode an index as 6 big-endian bytes.
pub fn encode_index(index: u64) -> Result<[u8; PACKET_INDEX_SIZE], WireError> {
    if index > HEADER_PACKET_INDEX {
        return Err(WireError::IndexOverflow(index));
    }
    Ok(encode_index_unchecked(index))
}

fn encode_index_unchecked(index: u64) -> [u8; PACKET_INDEX_SIZE] {
    let mut out = [0u8; PACKET_INDEX_SIZE];
    out.copy_from_slice(&index.to_be_bytes()[2..]);
    out
}

/// Build a data packet: index followed by `block`.
pub fn make_packet(index: u64, block: &[u8], packet_size: u16) -> Result<Vec<u8>, WireError> {
    let block_size = usize::from(packet_size).saturating_sub(PACKET_INDEX_SIZE);
    if block.len() > block_size {
        return Err(WireError::BlockTooLarge {
            len: block.len(),
            block_size,
        });
    }
    let mut packet = Vec::with_capacity(PACKET_INDEX_SIZE + block.len());
    packet.extend_from_slice(&encode_index(index)?);
    packet.extend_from_slice(block);
    Ok(packet)
}

/// Split a packet into the three per-channel layers it is transmitted as.
///
/// Layer `c` starts with index bytes `[2c, 2c + 2)` and carries the `c`-th
/// third of the payload. Inverse of `ddm::combine_channels`.
pub fn split_layers(packet: &[u8]) -> Result<[Vec<u8>; 3], WireError> {
    require(packet, &INDEX_FIELD)?;
    let (index, payload) = packet.split_at(PACKET_INDEX_SIZE);
    let share = payload.len().div_ceil(3).max(1);
    let mut parts = payload.chunks(share);

    Ok(std::array::from_fn(|c| {
        let mut layer = index[c * 2..c * 2 + 2].to_vec();
        if let Some(part) = parts.next() {
            layer.extend_from_slice(part);
        }
        layer
    }))
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("end of data reached reading {field}: need {needed} bytes, got {available}")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("packet index is {0} (should be {})", HEADER_PACKET_INDEX)]
    NotHeader(u64),

    #[error("unknown protocol version: {0}")]
    UnknownVersion(u16),

    #[error("index {0} is too big to fit into 6 bytes")]
    IndexOverflow(u64),

    #[error("block size {len} is too large to fit into a packet with block size {block_size}")]
    BlockTooLarge { len: usize, block_size: usize },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
