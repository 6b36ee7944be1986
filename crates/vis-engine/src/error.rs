//! Transfer error taxonomy.
//!
//! Per-frame decode failures never reach this type; they are absorbed by the
//! transfer loop. Everything here ends the transfer.

use std::path::PathBuf;

use vis_core::WireError;

use crate::memfile::StoreError;

/// Broad class of a fatal transfer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed header.
    Parse,
    /// Packets arrived in an order or shape the protocol forbids.
    Protocol,
    /// Everything arrived, but the content digest disagrees.
    Corruption,
    /// Frames ran out first.
    EndOfStream,
    /// Filesystem, frame source, or invocation problems.
    Environment,
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("failed to parse header: {0}")]
    Parse(#[from] WireError),

    #[error("failed to find a header: found packet {0}")]
    DataBeforeHeader(u64),

    #[error("unusable stream geometry: packet size {packet_size}, file size {file_size}")]
    InvalidGeometry { packet_size: u16, file_size: u64 },

    #[error("failed to find packet {expected}: found packet {found} instead")]
    Gap { expected: u64, found: u64 },

    #[error("packet {index} corrupted: size is {actual} instead of expected {expected}")]
    SizeMismatch { index: u64, expected: u64, actual: u64 },

    #[error("file corrupted, hash is incorrect: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("failed to find a header: reached end of file")]
    HeaderNotFound,

    #[error("failed to find packet {0}: reached end of file")]
    MissingPacket(u64),

    #[error("frame source failed: {0}")]
    Source(String),

    #[error("output {} already exists", .0.display())]
    OutputExists(PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::Parse(_) => ErrorKind::Parse,
            TransferError::DataBeforeHeader(_)
            | TransferError::InvalidGeometry { .. }
            | TransferError::Gap { .. }
            | TransferError::SizeMismatch { .. } => ErrorKind::Protocol,
            TransferError::HashMismatch { .. } => ErrorKind::Corruption,
            TransferError::HeaderNotFound | TransferError::MissingPacket(_) => {
                ErrorKind::EndOfStream
            }
            TransferError::Source(_) | TransferError::OutputExists(_) | TransferError::Store(_) => {
                ErrorKind::Environment
            }
        }
    }
}
