//! Dense data matrix (DDM) reconstruction.
//!
//! A frame carries one packet spread over its three colour channels. Each
//! channel holds an independent symbol whose first two bytes are a slice of
//! the 6-byte packet index; the rest is that channel's share of the payload.
//! The index is only known once all three channels decode.

use std::fmt;

use crate::wire::PACKET_INDEX_SIZE;

// ── Frames ────────────────────────────────────────────────────────────────────

/// Colour channels in the order they are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Channel {
    Red = 0,
    Green = 1,
    Blue = 2,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// A decoded video frame in packed 8-bit RGB.
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    /// Bytes per row. At least `width * 3`; decoders may pad rows.
    stride: usize,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, stride: usize, data: Vec<u8>) -> Result<Self, FrameError> {
        let row = width as usize * 3;
        if stride < row {
            return Err(FrameError::StrideTooSmall { stride, row });
        }
        let needed = match height {
            0 => 0,
            h => stride * (h as usize - 1) + row,
        };
        if data.len() < needed {
            return Err(FrameError::ShortBuffer {
                needed,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Borrow one colour channel as a single-channel image. No pixels are copied.
    pub fn channel(&self, channel: Channel) -> ChannelView<'_> {
        ChannelView {
            data: self.data.get(channel.index()..).unwrap_or(&[]),
            width: self.width,
            height: self.height,
            row_stride: self.stride,
            pixel_stride: 3,
        }
    }
}

/// Single-channel, 8-bit image view over borrowed memory.
#[derive(Debug, Clone, Copy)]
pub struct ChannelView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    row_stride: usize,
    pixel_stride: usize,
}

impl<'a> ChannelView<'a> {
    /// View over a tightly packed single-channel plane.
    pub fn from_plane(data: &'a [u8], width: u32, height: u32) -> Result<Self, FrameError> {
        let needed = width as usize * height as usize;
        if data.len() < needed {
            return Err(FrameError::ShortBuffer {
                needed,
                len: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            row_stride: width as usize,
            pixel_stride: 1,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sample at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.row_stride + x as usize * self.pixel_stride]
    }

    /// Iterate the samples of row `y`.
    pub fn row(&self, y: u32) -> impl Iterator<Item = u8> + '_ {
        let start = y as usize * self.row_stride;
        self.data[start..]
            .iter()
            .step_by(self.pixel_stride)
            .take(self.width as usize)
            .copied()
    }

    /// Copy into a tightly packed plane, row-major.
    pub fn to_luma(&self) -> Vec<u8> {
        if self.pixel_stride == 1 && self.row_stride == self.width as usize {
            return self.data[..self.width as usize * self.height as usize].to_vec();
        }
        let mut plane = Vec::with_capacity(self.width as usize * self.height as usize);
        for y in 0..self.height {
            plane.extend(self.row(y));
        }
        plane
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Outcome of a symbol decode on one channel: zero or more byte sequences.
pub type DecodeResult = Result<Vec<Vec<u8>>, DecodeError>;

/// Anything that can find symbols in a single-channel image.
pub trait SymbolDecoder {
    fn decode(&self, view: &ChannelView<'_>) -> DecodeResult;
}

impl<F> SymbolDecoder for F
where
    F: Fn(&ChannelView<'_>) -> DecodeResult,
{
    fn decode(&self, view: &ChannelView<'_>) -> DecodeResult {
        self(view)
    }
}

/// Ordered fallback over decode strategies.
///
/// Strategies run left to right; the first one that finds exactly one
/// symbol wins. Finding several counts as a failed read and falls through
/// to the next strategy. Partial results are never merged.
#[derive(Default)]
pub struct DecoderChain<'a> {
    strategies: Vec<Box<dyn SymbolDecoder + 'a>>,
}

impl<'a> DecoderChain<'a> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    pub fn then(mut self, decoder: impl SymbolDecoder + 'a) -> Self {
        self.strategies.push(Box::new(decoder));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl SymbolDecoder for DecoderChain<'_> {
    fn decode(&self, view: &ChannelView<'_>) -> DecodeResult {
        let mut last = DecodeError::NoSymbol;
        for strategy in &self.strategies {
            match strategy.decode(view) {
                Ok(symbols) => match symbols.len() {
                    0 => last = DecodeError::NoSymbol,
                    1 => return Ok(symbols),
                    n => last = DecodeError::Ambiguous(n),
                },
                Err(e) => last = e,
            }
        }
        Err(last)
    }
}

/// Rebuild one packet from the three channels of `frame`.
///
/// Channel `c` contributes index bytes `[2c, 2c + 2)`; payload tails are
/// appended in channel order. The first failing channel aborts the frame.
pub fn combine_channels<D>(frame: &Frame, decoder: &D) -> Result<Vec<u8>, ChannelError>
where
    D: SymbolDecoder + ?Sized,
{
    let mut packet = vec![0u8; PACKET_INDEX_SIZE];

    for channel in Channel::ALL {
        let fail = |error| ChannelError { channel, error };

        let mut symbols = decoder.decode(&frame.channel(channel)).map_err(fail)?;
        let symbol = match symbols.len() {
            0 => return Err(fail(DecodeError::NoSymbol)),
            1 => symbols.swap_remove(0),
            n => return Err(fail(DecodeError::Ambiguous(n))),
        };
        if symbol.len() < 2 {
            return Err(fail(DecodeError::SymbolTooShort(symbol.len())));
        }

        let at = channel.index() * 2;
        packet[at..at + 2].copy_from_slice(&symbol[..2]);
        packet.extend_from_slice(&symbol[2..]);
    }

    tracing::trace!(len = packet.len(), "frame combined into packet");
    Ok(packet)
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why a single channel produced no usable symbol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("no symbol detected")]
    NoSymbol,

    #[error("more than one symbol detected ({0})")]
    Ambiguous(usize),

    #[error("symbol of {0} bytes is too short to carry an index")]
    SymbolTooShort(usize),

    #[error("{0}")]
    Reader(String),
}

/// A per-frame decode failure, tagged with the channel that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to decode frame at layer {channel}: {error}")]
pub struct ChannelError {
    pub channel: Channel,
    pub error: DecodeError,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("row stride {stride} is smaller than a row of {row} bytes")]
    StrideTooSmall { stride: usize, row: usize },

    #[error("frame buffer holds {len} bytes, {needed} needed")]
    ShortBuffer { needed: usize, len: usize },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
