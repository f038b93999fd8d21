pub mod dedup;
pub mod error;
pub mod frame;
pub mod hash;
pub mod pipeline;
pub mod resize;
pub mod sampler;

pub use dedup::{DedupConfig, DuplicateMatch, SimilarityDetector};
pub use error::{ConfigError, DecodeError, PipelineError, SinkError};
pub use frame::{encode_jpeg, FrameRecord};
pub use hash::{Fingerprint, FrameHasher, HashAlgorithm, DEFAULT_HASH_SIZE, MAX_HASH_SIZE};
pub use pipeline::{
    storage_key, FramePipeline, PipelineConfig, VideoStats, DEFAULT_JPEG_QUALITY,
};
pub use resize::ResizeSpec;
pub use sampler::{FrameSampler, SamplePlan};
