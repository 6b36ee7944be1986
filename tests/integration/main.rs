//! vis-transfer integration test harness.
//!
//! Every test drives a complete `receive` over a synthetic frame source.
//! Each channel of a synthetic frame carries its symbol as raw pixels (see
//! `infra::encode_plane`), so no video or barcode library is involved and
//! the protocol engine is exercised end to end.
//!
//!   cargo test --test integration
//!
//! Each test works in its own temporary directory and removes it.

pub use std::fs;
pub use std::path::{Path, PathBuf};

pub use vis_core::wire::{make_packet, split_layers, HEADER_PACKET_INDEX};
pub use vis_core::{Frame, StreamHeader};
pub use vis_engine::{receive, ErrorKind, Phase, Progress, TransferError, TransferOptions};

pub use infra::*;

mod infra;
mod transfers;
