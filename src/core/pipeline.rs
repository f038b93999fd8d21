use log::{debug, info};

use crate::core::dedup::{DedupConfig, SimilarityDetector};
use crate::core::error::{ConfigError, DecodeError, PipelineError};
use crate::core::frame::encode_jpeg;
use crate::core::resize::ResizeSpec;
use crate::core::sampler::{FrameSampler, SamplePlan};
use crate::decode::FrameStream;
use crate::sink::FrameSink;

/// Default JPEG quality for re-encoded frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Everything a run needs to know, validated up front.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub sample: SamplePlan,
    pub resize: ResizeSpec,
    pub dedup: Option<DedupConfig>,
    /// JPEG quality used when frames are re-encoded after a resize.
    pub quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample: SamplePlan::KeepEvery(1),
            resize: ResizeSpec::None,
            dedup: None,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sample.validate()?;
        self.resize.validate()?;
        if let Some(dedup) = &self.dedup {
            dedup.validate()?;
        }
        if self.quality == 0 || self.quality > 100 {
            return Err(ConfigError::BadQuality(self.quality));
        }
        Ok(())
    }
}

/// Per-video outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoStats {
    /// Frames the decoder delivered.
    pub frames_seen: u64,
    /// Frames the sampling policy admitted.
    pub sampled: u64,
    /// Admitted frames dropped as duplicates.
    pub duplicates: u64,
    /// Frames that reached the sink.
    pub stored: u64,
}

impl VideoStats {
    /// Share of admitted frames dropped as duplicates, in percent.
    pub fn duplicate_percent(&self) -> f64 {
        if self.sampled == 0 {
            return 0.0;
        }
        self.duplicates as f64 * 100.0 / self.sampled as f64
    }
}

/// Storage key of one kept frame.
pub fn storage_key(video_id: &str, frame_index: u64) -> String {
    format!("{}/{}", video_id, frame_index)
}

/// Orchestrates sampling, resizing and duplicate removal for whole
/// videos, pushing every kept frame into a sink.
#[derive(Debug)]
pub struct FramePipeline {
    config: PipelineConfig,
}

impl FramePipeline {
    /// Validates the configuration before anything gets decoded.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs one video through the pipeline. All per-video state lives
    /// inside this call, so one pipeline can serve many videos, also in
    /// parallel.
    pub fn run(
        &self,
        video_id: &str,
        stream: &mut dyn FrameStream,
        sink: &dyn FrameSink,
    ) -> Result<VideoStats, PipelineError> {
        let decode_err = |source: DecodeError| PipelineError::Decode {
            video: video_id.to_string(),
            source,
        };

        // uniform sampling needs the frame count before the first frame
        let total = if self.config.sample.needs_total() {
            Some(stream.total_frames().map_err(decode_err)?)
        } else {
            None
        };
        let mut sampler = FrameSampler::new(&self.config.sample, total)?;
        let mut detector = self.config.dedup.as_ref().map(SimilarityDetector::new);

        let mut stats = VideoStats::default();
        let mut last_index = 0u64;

        while let Some(frame) = stream.next_frame().map_err(decode_err)? {
            if frame.index <= last_index {
                return Err(decode_err(DecodeError::OutOfOrder {
                    prev: last_index,
                    got: frame.index,
                }));
            }
            last_index = frame.index;
            stats.frames_seen += 1;

            if !sampler.admit(frame.index, frame.timestamp) {
                continue;
            }
            stats.sampled += 1;

            let target = self.config.resize.resolve(frame.width, frame.height);
            let resized = match target {
                Some((width, height)) => {
                    let raster = frame.resize_pixels(width, height);
                    let bytes =
                        encode_jpeg(&raster, self.config.quality).map_err(|source| {
                            PipelineError::Encode {
                                video: video_id.to_string(),
                                index: frame.index,
                                source,
                            }
                        })?;
                    Some((raster, bytes))
                }
                None => None,
            };

            if let Some(detector) = detector.as_mut() {
                let fingerprint = match &resized {
                    Some((raster, _)) => detector.fingerprint(
                        frame.index,
                        raster.width(),
                        raster.height(),
                        raster.as_raw(),
                    ),
                    None => detector.fingerprint(
                        frame.index,
                        frame.width,
                        frame.height,
                        &frame.pixels,
                    ),
                };
                if let Some(hit) = detector.check(&fingerprint) {
                    debug!(
                        "{}: frame {} duplicates frame {} (similarity {:.4})",
                        video_id, frame.index, hit.of_index, hit.similarity
                    );
                    stats.duplicates += 1;
                    continue;
                }
                detector.record(fingerprint);
            }

            let key = storage_key(video_id, frame.index);
            let bytes = match resized {
                Some((_, bytes)) => bytes,
                None => frame.encoded,
            };
            sink.put(&key, &bytes)
                .map_err(|source| PipelineError::Sink { key, source })?;
            stats.stored += 1;
        }

        info!(
            "{}: {} frames seen, {} sampled, {} duplicates dropped, {} stored",
            video_id, stats.frames_seen, stats.sampled, stats.duplicates, stats.stored
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::frame::FrameRecord;
    use crate::core::hash::HashAlgorithm;
    use crate::decode::MemoryStream;
    use crate::sink::MemorySink;

    fn flat_rgba(width: u32, height: u32, fill: u8) -> Vec<u8> {
        let mut rgba = vec![fill; (width * height * 4) as usize];
        for px in rgba.chunks_exact_mut(4) {
            px[3] = 255;
        }
        rgba
    }

    fn checker_rgba(width: u32, height: u32, block: u32) -> Vec<u8> {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = if (x / block + y / block) % 2 == 0 { 230 } else { 25 };
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
        }
        rgba
    }

    fn flat_frame(index: u64, millis: u64, fill: u8) -> FrameRecord {
        FrameRecord::new(
            index,
            Duration::from_millis(millis),
            32,
            24,
            flat_rgba(32, 24, fill),
            vec![0xAB, fill, index as u8],
        )
    }

    fn run_pipeline(
        config: PipelineConfig,
        frames: Vec<FrameRecord>,
    ) -> (VideoStats, MemorySink) {
        let pipeline = FramePipeline::new(config).unwrap();
        let mut stream = MemoryStream::new(frames);
        let sink = MemorySink::new();
        let stats = pipeline.run("video", &mut stream, &sink).unwrap();
        (stats, sink)
    }

    #[test]
    fn test_keep_every_other_frame_end_to_end() {
        let frames: Vec<FrameRecord> =
            (1..=10).map(|i| flat_frame(i, i * 100, i as u8)).collect();
        let config = PipelineConfig {
            sample: SamplePlan::KeepEvery(2),
            ..Default::default()
        };

        let (stats, sink) = run_pipeline(config, frames);

        assert_eq!(
            sink.keys(),
            vec!["video/1", "video/3", "video/5", "video/7", "video/9"]
        );
        assert_eq!(
            stats,
            VideoStats {
                frames_seen: 10,
                sampled: 5,
                duplicates: 0,
                stored: 5,
            }
        );
        // stored bytes are exactly what the decoder produced
        for (key, bytes) in sink.entries() {
            let index: u8 = key.rsplit('/').next().unwrap().parse().unwrap();
            assert_eq!(bytes, vec![0xAB, index, index]);
        }
    }

    #[test]
    fn test_uniform_sampling_consults_total() {
        let frames: Vec<FrameRecord> =
            (1..=10).map(|i| flat_frame(i, i * 100, i as u8)).collect();
        let config = PipelineConfig {
            sample: SamplePlan::UniformCount(4),
            ..Default::default()
        };

        let (stats, sink) = run_pipeline(config, frames);

        assert_eq!(
            sink.keys(),
            vec!["video/1", "video/4", "video/7", "video/10"]
        );
        assert_eq!(stats.sampled, 4);
        assert_eq!(stats.stored, 4);
    }

    #[test]
    fn test_interval_sampling_follows_timestamps() {
        let stamps = [0u64, 400, 900, 1100, 2000];
        let frames: Vec<FrameRecord> = stamps
            .iter()
            .enumerate()
            .map(|(i, &ms)| flat_frame(i as u64 + 1, ms, i as u8))
            .collect();
        let config = PipelineConfig {
            sample: SamplePlan::IntervalSecs(1.0),
            ..Default::default()
        };

        let (stats, sink) = run_pipeline(config, frames);

        assert_eq!(sink.keys(), vec!["video/1", "video/4", "video/5"]);
        assert_eq!(stats.sampled, 3);
    }

    #[test]
    fn test_duplicate_frames_are_dropped() {
        let width = 64;
        let height = 48;
        let mut frames = Vec::new();
        frames.push(FrameRecord::new(
            1,
            Duration::from_millis(0),
            width,
            height,
            flat_rgba(width, height, 180),
            vec![1],
        ));
        // same content again
        frames.push(FrameRecord::new(
            2,
            Duration::from_millis(40),
            width,
            height,
            flat_rgba(width, height, 180),
            vec![2],
        ));
        // visibly different scene
        frames.push(FrameRecord::new(
            3,
            Duration::from_millis(80),
            width,
            height,
            checker_rgba(width, height, 8),
            vec![3],
        ));
        let config = PipelineConfig {
            dedup: Some(DedupConfig::with_threshold(0.98).unwrap()),
            ..Default::default()
        };

        let (stats, sink) = run_pipeline(config, frames);

        assert_eq!(sink.keys(), vec!["video/1", "video/3"]);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.stored, 2);
    }

    #[test]
    fn test_dedup_disabled_keeps_identical_frames() {
        let frames = vec![flat_frame(1, 0, 50), flat_frame(2, 40, 50)];

        let (stats, sink) = run_pipeline(PipelineConfig::default(), frames);

        assert_eq!(sink.keys(), vec!["video/1", "video/2"]);
        assert_eq!(stats.duplicates, 0);
    }

    #[test]
    fn test_resize_reencodes_frames() {
        let frames = vec![flat_frame(1, 0, 90)];
        let config = PipelineConfig {
            resize: ResizeSpec::Exact {
                width: 24,
                height: 18,
            },
            ..Default::default()
        };

        let (stats, sink) = run_pipeline(config, frames);

        assert_eq!(stats.stored, 1);
        let entries = sink.entries();
        let (_, bytes) = &entries[0];
        assert_ne!(bytes, &vec![0xAB, 90, 1]);
        let decoded = image::load_from_memory(bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (24, 18));
    }

    #[test]
    fn test_dedup_hashes_resized_raster() {
        // two flat frames at different decode sizes still collide after
        // the resize normalizes them
        let frames = vec![
            FrameRecord::new(
                1,
                Duration::from_millis(0),
                64,
                48,
                flat_rgba(64, 48, 200),
                vec![1],
            ),
            FrameRecord::new(
                2,
                Duration::from_millis(40),
                32,
                24,
                flat_rgba(32, 24, 200),
                vec![2],
            ),
        ];
        let config = PipelineConfig {
            resize: ResizeSpec::Exact {
                width: 32,
                height: 32,
            },
            dedup: Some(
                DedupConfig::new(0.98, 8, HashAlgorithm::Average).unwrap(),
            ),
            ..Default::default()
        };

        let (stats, sink) = run_pipeline(config, frames);

        assert_eq!(stats.duplicates, 1);
        assert_eq!(sink.keys(), vec!["video/1"]);
    }

    #[test]
    fn test_out_of_order_stream_fails() {
        let frames = vec![flat_frame(3, 0, 10), flat_frame(2, 40, 20)];
        let pipeline = FramePipeline::new(PipelineConfig::default()).unwrap();
        let mut stream = MemoryStream::new(frames);
        let sink = MemorySink::new();

        let err = pipeline.run("video", &mut stream, &sink).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Decode {
                source: DecodeError::OutOfOrder { prev: 3, got: 2 },
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let config = PipelineConfig {
            sample: SamplePlan::KeepEvery(0),
            ..Default::default()
        };
        assert_eq!(
            FramePipeline::new(config).unwrap_err(),
            ConfigError::ZeroStep
        );

        let config = PipelineConfig {
            quality: 0,
            ..Default::default()
        };
        assert_eq!(
            FramePipeline::new(config).unwrap_err(),
            ConfigError::BadQuality(0)
        );
    }

    #[test]
    fn test_rerun_is_deterministic() {
        let frames: Vec<FrameRecord> =
            (1..=6).map(|i| flat_frame(i, i * 100, i as u8)).collect();
        let config = PipelineConfig {
            sample: SamplePlan::KeepEvery(3),
            ..Default::default()
        };

        let (_, first) = run_pipeline(config.clone(), frames.clone());
        let (_, second) = run_pipeline(config, frames);

        assert_eq!(first.entries(), second.entries());
    }

    #[test]
    fn test_reusing_a_sink_collides_on_keys() {
        let pipeline = FramePipeline::new(PipelineConfig::default()).unwrap();
        let sink = MemorySink::new();

        let mut stream = MemoryStream::new(vec![flat_frame(1, 0, 5)]);
        pipeline.run("video", &mut stream, &sink).unwrap();

        let mut stream = MemoryStream::new(vec![flat_frame(1, 0, 5)]);
        let err = pipeline.run("video", &mut stream, &sink).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Sink {
                source: crate::core::error::SinkError::KeyExists(_),
                ..
            }
        ));
    }

    #[test]
    fn test_parallel_videos_share_one_sink() {
        let config = PipelineConfig {
            sample: SamplePlan::KeepEvery(2),
            dedup: Some(DedupConfig::with_threshold(0.98).unwrap()),
            ..Default::default()
        };
        let pipeline = FramePipeline::new(config).unwrap();
        let sink = MemorySink::new();

        std::thread::scope(|scope| {
            for (id, fill) in [("vid-a", 30u8), ("vid-b", 90), ("vid-c", 150), ("vid-d", 210)] {
                let pipeline = &pipeline;
                let sink = &sink;
                scope.spawn(move || {
                    let frames: Vec<FrameRecord> =
                        (1..=6).map(|i| flat_frame(i, i * 100, fill)).collect();
                    let mut stream = MemoryStream::new(frames);
                    let stats = pipeline.run(id, &mut stream, sink).unwrap();
                    // within one video every flat frame after the first collides
                    assert_eq!(stats.sampled, 3);
                    assert_eq!(stats.duplicates, 2);
                    assert_eq!(stats.stored, 1);
                });
            }
        });

        // the detectors are per run, so the first frame of every video
        // survives even though all four hash alike
        let mut keys = sink.keys();
        keys.sort();
        assert_eq!(keys, vec!["vid-a/1", "vid-b/1", "vid-c/1", "vid-d/1"]);
    }

    #[test]
    fn test_duplicate_percent() {
        let stats = VideoStats {
            frames_seen: 20,
            sampled: 10,
            duplicates: 3,
            stored: 7,
        };
        assert!((stats.duplicate_percent() - 30.0).abs() < 1e-9);
        assert_eq!(VideoStats::default().duplicate_percent(), 0.0);
    }

    #[test]
    fn test_storage_key_shape() {
        assert_eq!(storage_key("clip", 17), "clip/17");
        assert_eq!(storage_key("clip", 1), "clip/1");
    }
}
