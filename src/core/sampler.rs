use std::time::Duration;

use crate::core::error::ConfigError;

/// Which frames of a video are worth keeping, decided before decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplePlan {
    /// Keep frames whose 1-based index satisfies `(index - 1) % k == 0`.
    KeepEvery(u64),
    /// Keep this many frames spread evenly across the whole video.
    UniformCount(u64),
    /// Keep the first frame in each slot of this many seconds along the
    /// timeline.
    IntervalSecs(f64),
}

impl SamplePlan {
    /// Builds the plan from the optional CLI knobs. The three modes are
    /// mutually exclusive; no knob means every frame is kept.
    pub fn from_options(
        keep_every: Option<u64>,
        uniform_count: Option<u64>,
        interval_secs: Option<f64>,
    ) -> Result<Self, ConfigError> {
        let plan = match (keep_every, uniform_count, interval_secs) {
            (None, None, None) => SamplePlan::KeepEvery(1),
            (Some(step), None, None) => SamplePlan::KeepEvery(step),
            (None, Some(count), None) => SamplePlan::UniformCount(count),
            (None, None, Some(secs)) => SamplePlan::IntervalSecs(secs),
            (Some(_), Some(_), _) => {
                return Err(ConfigError::SampleConflict("skip", "num-frames"))
            }
            (Some(_), _, Some(_)) => {
                return Err(ConfigError::SampleConflict("skip", "interval"))
            }
            (_, Some(_), Some(_)) => {
                return Err(ConfigError::SampleConflict("num-frames", "interval"))
            }
        };
        plan.validate()?;
        Ok(plan)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            SamplePlan::KeepEvery(0) => Err(ConfigError::ZeroStep),
            SamplePlan::UniformCount(0) => Err(ConfigError::ZeroCount),
            SamplePlan::IntervalSecs(secs) if !(secs > 0.0 && secs.is_finite()) => {
                Err(ConfigError::BadInterval(secs))
            }
            _ => Ok(()),
        }
    }

    /// Uniform sampling has to know the frame count before the first
    /// admission decision.
    pub fn needs_total(&self) -> bool {
        matches!(self, SamplePlan::UniformCount(_))
    }
}

/// Per-video admission gate. Feed it every decoded frame in order and it
/// answers keep or drop.
#[derive(Debug)]
pub struct FrameSampler {
    mode: Mode,
}

#[derive(Debug)]
enum Mode {
    KeepEvery {
        step: u64,
    },
    Uniform {
        targets: Vec<u64>,
        next: usize,
    },
    Interval {
        secs: f64,
        /// Timestamp mark the next admitted frame has to reach.
        next_due: Option<f64>,
    },
}

impl FrameSampler {
    pub fn new(plan: &SamplePlan, total_frames: Option<u64>) -> Result<Self, ConfigError> {
        plan.validate()?;
        let mode = match *plan {
            SamplePlan::KeepEvery(step) => Mode::KeepEvery { step },
            SamplePlan::UniformCount(count) => {
                let total = total_frames.ok_or(ConfigError::MissingTotalCount)?;
                if total <= count {
                    // fewer frames than requested: keep them all
                    Mode::KeepEvery { step: 1 }
                } else {
                    Mode::Uniform {
                        targets: uniform_targets(total, count),
                        next: 0,
                    }
                }
            }
            SamplePlan::IntervalSecs(secs) => Mode::Interval {
                secs,
                next_due: None,
            },
        };
        Ok(Self { mode })
    }

    /// Decides whether the frame stays in the run. Indices start at 1
    /// and must arrive in increasing order with non-decreasing
    /// timestamps.
    pub fn admit(&mut self, index: u64, timestamp: Duration) -> bool {
        match &mut self.mode {
            Mode::KeepEvery { step } => index.saturating_sub(1) % *step == 0,
            Mode::Uniform { targets, next } => {
                if *next < targets.len() && index >= targets[*next] {
                    while *next < targets.len() && targets[*next] <= index {
                        *next += 1;
                    }
                    true
                } else {
                    false
                }
            }
            Mode::Interval { secs, next_due } => {
                let at = timestamp.as_secs_f64();
                match next_due {
                    Some(due) if at < *due => false,
                    _ => {
                        *next_due = Some((at / *secs).floor() * *secs + *secs);
                        true
                    }
                }
            }
        }
    }
}

/// 1-based target indices for `count` frames spread evenly over `total`,
/// collapsing rounding collisions.
fn uniform_targets(total: u64, count: u64) -> Vec<u64> {
    if count == 1 {
        return vec![1];
    }
    let mut targets = Vec::with_capacity(count as usize);
    for i in 0..count {
        let offset = (i as f64 * (total - 1) as f64 / (count - 1) as f64).round() as u64;
        let target = 1 + offset;
        if targets.last() != Some(&target) {
            targets.push(target);
        }
    }
    targets
}
