//! Audio I/O modules
//!
//! Decoding with Symphonia and segment re-encoding through an external encoder.

pub mod decoder;
pub mod encoder;

pub use decoder::{
    decode_with_limit, decode_with_timeout, AudioDecoder, DecodeLimiter, DecodedAudio, SymphoniaDecoder,
};
pub use encoder::{build_filter_graph, FfmpegEncoder, KeepSegment, SegmentEncoder};
