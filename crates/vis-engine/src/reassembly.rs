//! Packet reassembly state machine.
//!
//! Packets must arrive in index order. Anything at or below the last applied
//! index is a duplicate and is skipped; anything beyond the next expected
//! index is a gap, and since the channel is one-way, a gap is fatal.

use vis_core::digest::ContentHash;
use vis_core::wire::{packet_index, HEADER_PACKET_INDEX, PACKET_INDEX_SIZE};
use vis_core::StreamHeader;

use crate::error::TransferError;
use crate::memfile::{MemFile, StoreError};

/// Offset-addressed destination for reassembled blocks.
pub trait BlockSink {
    fn write_block(&mut self, offset: u64, block: &[u8]) -> Result<(), StoreError>;
    fn digest(&self) -> ContentHash;
}

impl BlockSink for MemFile {
    fn write_block(&mut self, offset: u64, block: &[u8]) -> Result<(), StoreError> {
        self.write_at(offset, block)
    }

    fn digest(&self) -> ContentHash {
        MemFile::digest(self)
    }
}

/// Interpret the first decodable packet of a stream. It must be the header.
pub fn accept_header(packet: &[u8]) -> Result<StreamHeader, TransferError> {
    let index = packet_index(packet)?;
    if index != HEADER_PACKET_INDEX {
        return Err(TransferError::DataBeforeHeader(index));
    }
    Ok(StreamHeader::parse(packet)?)
}

/// Reject headers whose packets could not carry the announced file.
pub fn validate_geometry(header: &StreamHeader) -> Result<(), TransferError> {
    let usable = header.block_size() > 0 && header.packet_count() <= HEADER_PACKET_INDEX;
    if !usable {
        return Err(TransferError::InvalidGeometry {
            packet_size: header.packet_size,
            file_size: header.file_size,
        });
    }
    Ok(())
}

/// What became of one accepted packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    /// Already applied, or a repeat of the header. State unchanged.
    Duplicate(u64),
    /// Written; more packets follow.
    Written(u64),
    /// The last packet was written.
    Completed(u64),
}

pub struct Reassembler<S> {
    header: StreamHeader,
    packet_count: u64,
    next_index: u64,
    complete: bool,
    sink: S,
}

impl<S: BlockSink> Reassembler<S> {
    pub fn new(header: StreamHeader, sink: S) -> Result<Self, TransferError> {
        validate_geometry(&header)?;
        let packet_count = header.packet_count();
        Ok(Self {
            header,
            packet_count,
            next_index: 0,
            complete: packet_count == 0,
            sink,
        })
    }

    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    /// Index of the packet the stream is waiting for.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Packets written so far.
    pub fn packets_written(&self) -> u64 {
        if self.complete {
            self.packet_count
        } else {
            self.next_index
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Classify `packet` against the next expected index and apply it.
    pub fn accept(&mut self, packet: &[u8]) -> Result<Accepted, TransferError> {
        let index = packet_index(packet)?;
        let next = self.next_index;

        let applied = index < next || (self.complete && index == next);
        if index == HEADER_PACKET_INDEX || applied {
            tracing::debug!(index, "packet already decoded");
            return Ok(Accepted::Duplicate(index));
        }
        if index > next {
            return Err(TransferError::Gap {
                expected: next,
                found: index,
            });
        }

        let expected = self.header.expected_packet_size(index);
        let actual = packet.len() as u64;
        if actual != expected {
            return Err(TransferError::SizeMismatch {
                index,
                expected,
                actual,
            });
        }

        self.sink
            .write_block(self.header.block_offset(index), &packet[PACKET_INDEX_SIZE..])?;

        if index + 1 == self.packet_count {
            self.complete = true;
            tracing::debug!(index, "last packet written");
            Ok(Accepted::Completed(index))
        } else {
            self.next_index += 1;
            tracing::trace!(index, "packet written");
            Ok(Accepted::Written(index))
        }
    }

    /// Compare the written content against the header digest.
    pub fn verify(&self) -> Result<ContentHash, TransferError> {
        if !self.complete {
            return Err(TransferError::MissingPacket(self.next_index));
        }
        let actual = self.sink.digest();
        if actual != self.header.content_hash {
            return Err(TransferError::HashMismatch {
                expected: hex::encode(self.header.content_hash),
                actual: hex::encode(actual),
            });
        }
        Ok(actual)
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
