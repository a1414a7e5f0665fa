//! Capture decoding: from a multi-row capture to the bytes of one transmission

mod pipeline;

pub use pipeline::{
    DecodePipeline, DecodedFrame, LineCode, PipelineConfig, PipelineStats, SyncPattern,
    UnknownLineCode,
};
