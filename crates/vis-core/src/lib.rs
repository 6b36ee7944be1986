//! vis-core — packet wire format, channel combination, digest and config.
//! The engine and the receiver binary depend on this crate.

pub mod config;
pub mod ddm;
pub mod digest;
pub mod wire;

pub use ddm::{Channel, ChannelView, DecodeError, DecoderChain, Frame, SymbolDecoder};
pub use wire::{StreamHeader, WireError};
