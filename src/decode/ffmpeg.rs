use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;
use tempfile::TempDir;

use super::FrameStream;
use crate::core::error::DecodeError;
use crate::core::frame::FrameRecord;

/// File pattern ffmpeg writes into the scratch directory, 1-based.
const DUMP_PATTERN: &str = "%08d.jpg";

/// Decodes videos by dumping every frame to a scratch directory with
/// ffmpeg, then streaming the dumped images back in order.
#[derive(Debug, Clone, Default)]
pub struct FfmpegDecoder {
    tmp_root: Option<PathBuf>,
}

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self { tmp_root: None }
    }

    /// Puts scratch directories under the given root instead of the
    /// system temp dir.
    pub fn with_tmp_root(root: impl Into<PathBuf>) -> Self {
        Self {
            tmp_root: Some(root.into()),
        }
    }

    pub fn open(&self, video: &Path) -> Result<FfmpegStream, DecodeError> {
        let frame_rate = probe_frame_rate(video)?;

        let scratch = match &self.tmp_root {
            Some(root) => {
                fs::create_dir_all(root)?;
                tempfile::Builder::new()
                    .prefix("vidsieve-")
                    .tempdir_in(root)?
            }
            None => tempfile::Builder::new().prefix("vidsieve-").tempdir()?,
        };

        debug!(
            "dumping {} into {}",
            video.display(),
            scratch.path().display()
        );
        let output = Command::new("ffmpeg")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(video)
            .arg("-qscale:v")
            .arg("2")
            .arg(scratch.path().join(DUMP_PATTERN))
            .output()
            .map_err(|source| DecodeError::Spawn {
                tool: "ffmpeg",
                source,
            })?;
        if !output.status.success() {
            return Err(DecodeError::ToolFailed {
                tool: "ffmpeg",
                status: output.status,
                path: video.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let entries = indexed_frames(scratch.path())?;
        if entries.is_empty() {
            warn!("{}: ffmpeg produced no frames", video.display());
        }
        Ok(FfmpegStream {
            entries,
            pos: 0,
            frame_rate,
            _scratch: scratch,
        })
    }
}

/// Streams the frames ffmpeg dumped for one video. The scratch
/// directory lives exactly as long as the stream.
pub struct FfmpegStream {
    entries: Vec<(u64, PathBuf)>,
    pos: usize,
    frame_rate: f64,
    _scratch: TempDir,
}

impl FfmpegStream {
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }
}

impl FrameStream for FfmpegStream {
    fn total_frames(&mut self) -> Result<u64, DecodeError> {
        Ok(self.entries.len() as u64)
    }

    fn next_frame(&mut self) -> Result<Option<FrameRecord>, DecodeError> {
        let (index, path) = match self.entries.get(self.pos) {
            Some((index, path)) => (*index, path.clone()),
            None => return Ok(None),
        };
        self.pos += 1;

        let encoded = fs::read(&path)?;
        let rgba = image::load_from_memory(&encoded)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        let timestamp = Duration::from_secs_f64((index - 1) as f64 / self.frame_rate);

        Ok(Some(FrameRecord::new(
            index,
            timestamp,
            width,
            height,
            rgba.into_raw(),
            encoded,
        )))
    }
}

/// Dumped frame files keyed by their 1-based number, in order.
fn indexed_frames(dir: &Path) -> Result<Vec<(u64, PathBuf)>, DecodeError> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem,
            None => continue,
        };
        let index = match stem.parse::<u64>() {
            Ok(index) if index > 0 => index,
            _ => continue,
        };
        frames.push((index, path));
    }
    frames.sort_unstable_by_key(|(index, _)| *index);
    Ok(frames)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    r_frame_rate: Option<String>,
}

/// Frame rate of the video as reported by ffprobe.
fn probe_frame_rate(video: &Path) -> Result<f64, DecodeError> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("quiet")
        .arg("-show_entries")
        .arg("stream=r_frame_rate")
        .arg("-print_format")
        .arg("json")
        .arg(video)
        .output()
        .map_err(|source| DecodeError::Spawn {
            tool: "ffprobe",
            source,
        })?;
    if !output.status.success() {
        return Err(DecodeError::ToolFailed {
            tool: "ffprobe",
            status: output.status,
            path: video.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    match parse_frame_rate(&output.stdout)? {
        Some(rate) => Ok(rate),
        None => Err(DecodeError::UnknownFrameRate(video.to_path_buf())),
    }
}

/// Last usable `r_frame_rate` fraction in the probe report, if any.
fn parse_frame_rate(json: &[u8]) -> Result<Option<f64>, serde_json::Error> {
    let probe: ProbeOutput = serde_json::from_slice(json)?;
    let mut rate = None;
    for stream in &probe.streams {
        let raw = match &stream.r_frame_rate {
            Some(raw) => raw,
            None => continue,
        };
        if let Some(parsed) = parse_fraction(raw) {
            if parsed > 0.0 {
                rate = Some(parsed);
            }
        }
    }
    Ok(rate)
}

fn parse_fraction(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::encode_jpeg;
    use image::RgbaImage;

    #[test]
    fn test_parse_fraction() {
        assert_eq!(parse_fraction("30/1"), Some(30.0));
        assert!((parse_fraction("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_fraction("0/0"), None);
        assert_eq!(parse_fraction("1/0"), None);
        assert_eq!(parse_fraction("nonsense"), None);
    }

    #[test]
    fn test_parse_frame_rate_takes_last_usable_stream() {
        let json = br#"{"streams": [{"r_frame_rate": "0/1"}, {"r_frame_rate": "25/1"}]}"#;
        assert_eq!(parse_frame_rate(json).unwrap(), Some(25.0));
    }

    #[test]
    fn test_parse_frame_rate_handles_missing_entries() {
        assert_eq!(parse_frame_rate(br#"{"streams": [{}]}"#).unwrap(), None);
        assert_eq!(parse_frame_rate(br#"{}"#).unwrap(), None);
    }

    #[test]
    fn test_parse_frame_rate_rejects_bad_json() {
        assert!(parse_frame_rate(b"not json").is_err());
    }

    #[test]
    fn test_indexed_frames_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "00000003.jpg",
            "00000001.jpg",
            "00000002.jpg",
            "notes.txt",
            "00000000.jpg",
        ] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let frames = indexed_frames(dir.path()).unwrap();
        let indices: Vec<u64> = frames.iter().map(|(index, _)| *index).collect();

        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_stream_reads_dumped_frames() {
        let dir = tempfile::tempdir().unwrap();
        for (index, fill) in [(1u64, 40u8), (2, 200)] {
            let img = RgbaImage::from_pixel(16, 12, image::Rgba([fill, fill, fill, 255]));
            let bytes = encode_jpeg(&img, 90).unwrap();
            fs::write(dir.path().join(format!("{:08}.jpg", index)), bytes).unwrap();
        }
        let mut stream = FfmpegStream {
            entries: indexed_frames(dir.path()).unwrap(),
            pos: 0,
            frame_rate: 2.0,
            _scratch: dir,
        };

        assert_eq!(stream.frame_rate(), 2.0);
        assert_eq!(stream.total_frames().unwrap(), 2);

        let first = stream.next_frame().unwrap().unwrap();
        assert_eq!(first.index, 1);
        assert_eq!((first.width, first.height), (16, 12));
        assert_eq!(first.timestamp, Duration::ZERO);
        assert_eq!(first.pixels.len(), 16 * 12 * 4);

        let second = stream.next_frame().unwrap().unwrap();
        assert_eq!(second.index, 2);
        // frame 2 at 2 fps sits half a second in
        assert_eq!(second.timestamp, Duration::from_millis(500));

        assert!(stream.next_frame().unwrap().is_none());
    }
}
