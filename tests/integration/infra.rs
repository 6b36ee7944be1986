use crate::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use vis_core::ddm::{ChannelView, DecodeResult};
use vis_engine::FrameSource;

// ── Synthetic frames ─────────────────────────────────────────────────────────

pub const FRAME_WIDTH: u32 = 32;
pub const FRAME_HEIGHT: u32 = 32;

/// Lay a symbol out as a channel plane: 2-byte big-endian length, then the
/// symbol bytes, then zeros. A zero length means "nothing printed here".
pub fn encode_plane(symbol: &[u8]) -> Vec<u8> {
    let mut plane = vec![0u8; (FRAME_WIDTH * FRAME_HEIGHT) as usize];
    assert!(symbol.len() + 2 <= plane.len(), "symbol too large for test frame");
    plane[..2].copy_from_slice(&(symbol.len() as u16).to_be_bytes());
    plane[2..2 + symbol.len()].copy_from_slice(symbol);
    plane
}

/// Inverse of `encode_plane`, used as the frame decoder.
pub fn plane_decoder(view: &ChannelView<'_>) -> DecodeResult {
    let plane = view.to_luma();
    let len = usize::from(u16::from_be_bytes([plane[0], plane[1]]));
    if len == 0 {
        return Ok(Vec::new());
    }
    Ok(vec![plane[2..2 + len].to_vec()])
}

/// Interleave three planes into a packed RGB frame.
pub fn frame_from_planes(planes: [Vec<u8>; 3]) -> Frame {
    let pixels = (FRAME_WIDTH * FRAME_HEIGHT) as usize;
    let mut data = Vec::with_capacity(pixels * 3);
    for i in 0..pixels {
        data.extend(planes.iter().map(|plane| plane[i]));
    }
    Frame::new(FRAME_WIDTH, FRAME_HEIGHT, FRAME_WIDTH as usize * 3, data).unwrap()
}

/// One frame carrying `packet`, split across the three channels.
pub fn packet_frame(packet: &[u8]) -> Frame {
    let layers = split_layers(packet).unwrap();
    frame_from_planes(layers.map(|layer| encode_plane(&layer)))
}

/// A frame with nothing readable on it.
pub fn blank_frame() -> Frame {
    frame_from_planes([encode_plane(&[]), encode_plane(&[]), encode_plane(&[])])
}

// ── Sender ───────────────────────────────────────────────────────────────────

/// Everything the sender would print for `content`.
pub struct Broadcast {
    pub header: StreamHeader,
    pub packets: Vec<Vec<u8>>,
}

impl Broadcast {
    pub fn new(content: &[u8], packet_size: u16) -> Self {
        let header = StreamHeader::new(content, packet_size);
        let block_size = usize::from(packet_size) - 6;
        let packets = content
            .chunks(block_size)
            .enumerate()
            .map(|(i, block)| make_packet(i as u64, block, packet_size).unwrap())
            .collect();
        Self { header, packets }
    }

    pub fn header_frame(&self) -> Frame {
        packet_frame(&self.header.to_packet())
    }

    pub fn data_frame(&self, index: usize) -> Frame {
        packet_frame(&self.packets[index])
    }

    /// Header, then every packet, with no losses.
    pub fn clean_frames(&self) -> Vec<Frame> {
        let mut frames = vec![self.header_frame()];
        frames.extend((0..self.packets.len()).map(|i| self.data_frame(i)));
        frames
    }
}

/// Deterministic pseudo-random content.
pub fn test_content(len: usize) -> Vec<u8> {
    let mut state = 0x2545_f491_u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

// ── Frame sources ────────────────────────────────────────────────────────────

/// Plays a fixed list of frames, then ends.
pub struct ScriptedSource {
    frames: VecDeque<Frame>,
    frame_count: Option<u64>,
    fail_at_end: Option<String>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frame_count: Some(frames.len() as u64),
            frames: frames.into(),
            fail_at_end: None,
        }
    }

    /// Report a read error instead of a clean end of stream.
    pub fn failing_with(mut self, reason: &str) -> Self {
        self.fail_at_end = Some(reason.to_string());
        self
    }
}

impl FrameSource for ScriptedSource {
    fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }

    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        match self.frames.pop_front() {
            Some(frame) => Ok(Some(frame)),
            None => match &self.fail_at_end {
                Some(reason) => anyhow::bail!("{reason}"),
                None => Ok(None),
            },
        }
    }
}

// ── Workspace ────────────────────────────────────────────────────────────────

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// A fresh directory under the system temp dir, removed on drop.
pub struct TestDir {
    pub path: PathBuf,
}

impl TestDir {
    pub fn new(name: &str) -> Self {
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "vis-integration-{name}-{}-{id}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Number of entries left in the directory.
    pub fn entries(&self) -> usize {
        fs::read_dir(&self.path).unwrap().count()
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Run `receive` over `frames` with default options and the plane decoder.
pub fn receive_frames(
    frames: Vec<Frame>,
    output: &Path,
) -> Result<vis_engine::TransferSummary, TransferError> {
    receive(
        ScriptedSource::new(frames),
        &plane_decoder,
        &TransferOptions::new(output),
        |_| {},
    )
}
