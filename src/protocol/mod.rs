//! Client-facing wire protocol

pub mod frames;

pub use frames::{FrameError, INBOUND_TYPES, InboundFrame, OutboundFrame, parse_inbound, verdict};
