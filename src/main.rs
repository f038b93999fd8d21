use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::ProgressBar;
use log::info;
use rayon::prelude::*;

use vidsieve::core::{
    DedupConfig, FramePipeline, HashAlgorithm, PipelineConfig, ResizeSpec, SamplePlan, VideoStats,
    DEFAULT_HASH_SIZE, DEFAULT_JPEG_QUALITY,
};
use vidsieve::decode::FfmpegDecoder;
use vidsieve::discover::{discover_videos, video_id};
use vidsieve::sink::{DirSink, FrameSink, KvSink};

#[derive(Parser)]
#[command(
    name = "vidsieve",
    about = "Sample, resize and de-duplicate video frames into a storage sink"
)]
struct Args {
    /// Video file or directory of videos
    video_path: PathBuf,

    /// Output directory (dir sink) or database file (kv sink)
    #[arg(short, long)]
    out: PathBuf,

    /// Storage backend
    #[arg(long, value_enum, default_value_t = SinkKind::Dir)]
    sink: SinkKind,

    /// Scale the shorter side to this many pixels, keeping aspect ratio
    #[arg(short = 's', long)]
    short: Option<u32>,

    /// Exact output height, requires --width
    #[arg(short = 'H', long)]
    height: Option<u32>,

    /// Exact output width, requires --height
    #[arg(short = 'W', long)]
    width: Option<u32>,

    /// Keep every k-th frame, starting with the first
    #[arg(short = 'k', long)]
    skip: Option<u64>,

    /// Spread this many frames uniformly across each video
    #[arg(short = 'n', long)]
    num_frames: Option<u64>,

    /// Keep at most one frame per this many seconds
    #[arg(short = 'r', long)]
    interval: Option<f64>,

    /// Drop frames at or above this similarity to an already kept frame, (0, 1]
    #[arg(short = 'd', long)]
    dedup_threshold: Option<f64>,

    /// Edge length of the fingerprint square
    #[arg(long, default_value_t = DEFAULT_HASH_SIZE)]
    hash_size: u32,

    /// Fingerprint algorithm used for dedup
    #[arg(long, value_enum, default_value_t = HashAlg::Average)]
    hash_alg: HashAlg,

    /// JPEG quality for re-encoded frames
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    quality: u8,

    /// Scratch space for decoded frames instead of the system temp dir
    #[arg(long)]
    tmp_dir: Option<PathBuf>,

    /// Videos processed in parallel, 0 means one per CPU core
    #[arg(short = 'j', long, default_value_t = 1)]
    jobs: usize,

    /// Delete an existing output path before writing
    #[arg(long)]
    overwrite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    /// One JPEG file per frame under the output directory
    Dir,
    /// Single embedded key-value database file
    Kv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HashAlg {
    Average,
    Perceptual,
    Difference,
    Wavelet,
}

impl From<HashAlg> for HashAlgorithm {
    fn from(alg: HashAlg) -> Self {
        match alg {
            HashAlg::Average => HashAlgorithm::Average,
            HashAlg::Perceptual => HashAlgorithm::Perceptual,
            HashAlg::Difference => HashAlgorithm::Difference,
            HashAlg::Wavelet => HashAlgorithm::Wavelet,
        }
    }
}

fn build_config(args: &Args) -> Result<PipelineConfig> {
    let sample = SamplePlan::from_options(args.skip, args.num_frames, args.interval)?;
    let resize = ResizeSpec::from_options(args.short, args.height, args.width)?;
    let dedup = args
        .dedup_threshold
        .map(|threshold| DedupConfig::new(threshold, args.hash_size, args.hash_alg.into()))
        .transpose()?;
    Ok(PipelineConfig {
        sample,
        resize,
        dedup,
        quality: args.quality,
    })
}

fn summary_line(id: &str, stats: &VideoStats, dedup: bool) -> String {
    if dedup {
        format!(
            "{}: stored {} of {} sampled frames, {} duplicates ({:.1}%)",
            id,
            stats.stored,
            stats.sampled,
            stats.duplicates,
            stats.duplicate_percent()
        )
    } else {
        format!(
            "{}: stored {} of {} decoded frames",
            id, stats.stored, stats.frames_seen
        )
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let pipeline = FramePipeline::new(build_config(&args)?)?;

    let videos = discover_videos(&args.video_path)
        .with_context(|| format!("scanning {}", args.video_path.display()))?;
    if videos.is_empty() {
        bail!("no videos found under {}", args.video_path.display());
    }
    info!("processing {} video(s)", videos.len());

    if args.overwrite && args.out.exists() {
        if args.out.is_dir() {
            fs::remove_dir_all(&args.out)
        } else {
            fs::remove_file(&args.out)
        }
        .with_context(|| format!("clearing {}", args.out.display()))?;
    }

    let sink: Box<dyn FrameSink> = match args.sink {
        SinkKind::Dir => Box::new(DirSink::create(&args.out)?),
        SinkKind::Kv => Box::new(KvSink::create(&args.out)?),
    };
    let decoder = match &args.tmp_dir {
        Some(root) => FfmpegDecoder::with_tmp_root(root),
        None => FfmpegDecoder::new(),
    };

    let started = Instant::now();
    let bar = ProgressBar::new(videos.len() as u64);

    let process = |video: &PathBuf| -> Result<VideoStats> {
        let id = video_id(video);
        let mut stream = decoder
            .open(video)
            .with_context(|| format!("decoding {}", video.display()))?;
        let stats = pipeline
            .run(&id, &mut stream, sink.as_ref())
            .with_context(|| format!("processing {}", video.display()))?;
        bar.println(summary_line(&id, &stats, args.dedup_threshold.is_some()));
        bar.inc(1);
        Ok(stats)
    };

    let jobs = if args.jobs == 0 {
        num_cpus::get()
    } else {
        args.jobs
    };
    let results: Result<Vec<VideoStats>> = if jobs <= 1 || videos.len() <= 1 {
        videos.iter().map(process).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.min(videos.len()))
            .build()
            .context("building the worker pool")?;
        pool.install(|| videos.par_iter().map(process).collect())
    };
    bar.finish_and_clear();
    let results = results?;

    let stored: u64 = results.iter().map(|s| s.stored).sum();
    let duplicates: u64 = results.iter().map(|s| s.duplicates).sum();
    println!(
        "{} video(s), {} frame(s) stored, {} duplicate(s) dropped in {:.1}s",
        results.len(),
        stored,
        duplicates,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
