use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Rejected configuration, reported before any video is opened.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("sampling options --{0} and --{1} are mutually exclusive")]
    SampleConflict(&'static str, &'static str),
    #[error("keep-every step must be at least 1")]
    ZeroStep,
    #[error("uniform sample count must be at least 1")]
    ZeroCount,
    #[error("sample interval must be a positive number of seconds, got {0}")]
    BadInterval(f64),
    #[error("uniform sampling needs the total frame count up front")]
    MissingTotalCount,
    #[error("shorter-side scaling and explicit dimensions are mutually exclusive")]
    ResizeConflict,
    #[error("explicit resize needs both height and width")]
    PartialExplicitResize,
    #[error("resize dimensions must be at least 1 pixel")]
    ZeroDimension,
    #[error("duplicate threshold must be in (0, 1], got {0}")]
    BadThreshold(f64),
    #[error("hash size must be between 1 and {max}, got {0}", max = super::hash::MAX_HASH_SIZE)]
    BadHashSize(u32),
    #[error("the wavelet hash needs a power-of-two hash size, got {0}")]
    WaveletHashSize(u32),
    #[error("JPEG quality must be between 1 and 100, got {0}")]
    BadQuality(u8),
}

/// Failure while turning a video file into a frame sequence.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status} on {path}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        status: ExitStatus,
        path: PathBuf,
        stderr: String,
    },
    #[error("ffprobe output was not valid JSON: {0}")]
    Probe(#[from] serde_json::Error),
    #[error("no usable frame rate reported for {0}")]
    UnknownFrameRate(PathBuf),
    #[error("frame image could not be decoded: {0}")]
    BadFrameImage(#[from] image::ImageError),
    #[error("frame {got} arrived after frame {prev}, indices must be strictly increasing")]
    OutOfOrder { prev: u64, got: u64 },
}

/// Failure while persisting an accepted frame.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("key already stored: {0}")]
    KeyExists(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Anything that can stop a per-video run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("decoding {video}: {source}")]
    Decode {
        video: String,
        #[source]
        source: DecodeError,
    },
    #[error("re-encoding frame {index} of {video}: {source}")]
    Encode {
        video: String,
        index: u64,
        #[source]
        source: image::ImageError,
    },
    #[error("storing {key}: {source}")]
    Sink {
        key: String,
        #[source]
        source: SinkError,
    },
}
