//! Receive engine: frame pipeline, reassembly and the verified output store.

pub mod error;
pub mod memfile;
pub mod pipeline;
pub mod queue;
pub mod reassembly;
pub mod transfer;

pub use error::{ErrorKind, TransferError};
pub use memfile::{MemFile, StoreError};
pub use pipeline::{FramePipeline, FrameSource};
pub use queue::BoundedQueue;
pub use reassembly::{Accepted, BlockSink, Reassembler};
pub use transfer::{receive, Phase, Progress, TransferOptions, TransferSummary};
