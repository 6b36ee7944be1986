//! The receive routine: frames in, verified file out.
//!
//! ```text
//! FramePipeline ─► combine_channels ─► accept_header / Reassembler ─► MemFile ─► verify ─► commit
//! ```
//!
//! Two guards cover every exit path. The [`FramePipeline`] stops and joins
//! its producer when dropped, and an uncommitted [`MemFile`] deletes its
//! temporary file when dropped. Only a hash-verified file is ever renamed
//! to the output path.

use std::ffi::OsString;
use std::path::PathBuf;

use vis_core::ddm::combine_channels;
use vis_core::digest::ContentHash;
use vis_core::{Frame, StreamHeader, SymbolDecoder};

use crate::error::TransferError;
use crate::memfile::MemFile;
use crate::pipeline::{FramePipeline, FrameSource};
use crate::reassembly::{accept_header, validate_geometry, Accepted, Reassembler};

pub const DEFAULT_TEMP_SUFFIX: &str = ".vis-transfer-incomplete";

#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Final location of the received file.
    pub output: PathBuf,
    /// Replace `output` if it already exists.
    pub overwrite: bool,
    /// Appended to `output` to name the file written during the transfer.
    pub temp_suffix: String,
    /// Frames decoded ahead of the consumer.
    pub queue_capacity: usize,
}

impl TransferOptions {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            overwrite: false,
            temp_suffix: DEFAULT_TEMP_SUFFIX.to_string(),
            queue_capacity: 1,
        }
    }

    pub fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.output.as_os_str());
        name.push(&self.temp_suffix);
        PathBuf::from(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    SeekingHeader,
    Receiving,
    Complete,
}

/// Snapshot handed to the progress observer after every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub phase: Phase,
    /// Frames read so far.
    pub frame: u64,
    pub frame_count: Option<u64>,
    /// Data packets written so far.
    pub packet: u64,
    /// Zero until the header is known.
    pub packet_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub header: StreamHeader,
    pub frames_read: u64,
    pub frames_undecodable: u64,
    pub duplicates: u64,
    pub packets: u64,
    pub bytes: u64,
    pub digest: ContentHash,
    pub output: PathBuf,
}

#[derive(Default)]
struct Counters {
    frames_read: u64,
    frames_undecodable: u64,
    duplicates: u64,
}

/// Receive one file from the frames of `source`.
///
/// `observer` is called after every frame read and once more on success.
pub fn receive<S, D>(
    source: S,
    decoder: &D,
    options: &TransferOptions,
    mut observer: impl FnMut(&Progress),
) -> Result<TransferSummary, TransferError>
where
    S: FrameSource,
    D: SymbolDecoder + ?Sized,
{
    if !options.overwrite && options.output.exists() {
        return Err(TransferError::OutputExists(options.output.clone()));
    }

    let mut pipeline = FramePipeline::spawn(source, options.queue_capacity)?;
    let frame_count = pipeline.frame_count();
    let mut counters = Counters::default();

    // ── Seeking header ──

    let header = loop {
        let Some(frame) = pipeline.next_frame()? else {
            return Err(TransferError::HeaderNotFound);
        };
        counters.frames_read += 1;
        tracing::trace!(frame = counters.frames_read, buffered = pipeline.buffered(), "frame received");
        observer(&Progress {
            phase: Phase::SeekingHeader,
            frame: counters.frames_read,
            frame_count,
            packet: 0,
            packet_count: 0,
        });

        match decode_frame(&frame, decoder, counters.frames_read) {
            Some(packet) => break accept_header(&packet)?,
            None => counters.frames_undecodable += 1,
        }
    };

    validate_geometry(&header)?;
    tracing::info!(
        file_size = header.file_size,
        packet_size = header.packet_size,
        packet_count = header.packet_count(),
        hash = %hex::encode(header.content_hash),
        "found header"
    );

    // ── Receiving ──

    let temp_path = options.temp_path();
    let store = MemFile::create(&temp_path, header.file_size)?;
    let mut reassembler = Reassembler::new(header, store)?;

    while !reassembler.is_complete() {
        let Some(frame) = pipeline.next_frame()? else {
            return Err(TransferError::MissingPacket(reassembler.next_index()));
        };
        counters.frames_read += 1;
        tracing::trace!(frame = counters.frames_read, buffered = pipeline.buffered(), "frame received");
        observer(&Progress {
            phase: Phase::Receiving,
            frame: counters.frames_read,
            frame_count,
            packet: reassembler.packets_written(),
            packet_count: reassembler.packet_count(),
        });

        let Some(packet) = decode_frame(&frame, decoder, counters.frames_read) else {
            counters.frames_undecodable += 1;
            continue;
        };
        if let Accepted::Duplicate(_) = reassembler.accept(&packet)? {
            counters.duplicates += 1;
        }
    }

    // Remaining frames are of no interest; stop decoding before hashing.
    drop(pipeline);

    // ── Complete ──

    let digest = reassembler.verify()?;
    let packets = reassembler.packet_count();
    reassembler.into_sink().commit(&options.output)?;

    observer(&Progress {
        phase: Phase::Complete,
        frame: counters.frames_read,
        frame_count,
        packet: packets,
        packet_count: packets,
    });
    tracing::info!(
        path = %options.output.display(),
        frames = counters.frames_read,
        undecodable = counters.frames_undecodable,
        duplicates = counters.duplicates,
        "transfer complete"
    );

    Ok(TransferSummary {
        header,
        frames_read: counters.frames_read,
        frames_undecodable: counters.frames_undecodable,
        duplicates: counters.duplicates,
        packets,
        bytes: header.file_size,
        digest,
        output: options.output.clone(),
    })
}

/// Decode one frame into a packet. Failures are logged and absorbed.
fn decode_frame<D>(frame: &Frame, decoder: &D, frame_number: u64) -> Option<Vec<u8>>
where
    D: SymbolDecoder + ?Sized,
{
    match combine_channels(frame, decoder) {
        Ok(packet) => {
            tracing::trace!(frame = frame_number, contents = %hex::encode(&packet), "decoded packet");
            Some(packet)
        }
        Err(e) => {
            tracing::debug!(
                frame = frame_number,
                channel = e.channel.index(),
                error = %e.error,
                "failed to decode frame"
            );
            None
        }
    }
}
