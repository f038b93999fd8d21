use crate::core::error::ConfigError;

/// How stored frames are scaled, decided once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeSpec {
    /// Store frames at their decoded size.
    None,
    /// Scale so the shorter axis lands exactly here, keeping aspect ratio.
    ShorterSide(u32),
    /// Scale to exactly this size regardless of the input shape.
    Exact { width: u32, height: u32 },
}

impl ResizeSpec {
    /// Builds the spec from the optional CLI knobs, rejecting conflicting
    /// or incomplete combinations.
    pub fn from_options(
        shorter_side: Option<u32>,
        height: Option<u32>,
        width: Option<u32>,
    ) -> Result<Self, ConfigError> {
        match (shorter_side, height, width) {
            (None, None, None) => Ok(ResizeSpec::None),
            (Some(side), None, None) => {
                if side == 0 {
                    return Err(ConfigError::ZeroDimension);
                }
                Ok(ResizeSpec::ShorterSide(side))
            }
            (None, Some(height), Some(width)) => {
                if height == 0 || width == 0 {
                    return Err(ConfigError::ZeroDimension);
                }
                Ok(ResizeSpec::Exact { width, height })
            }
            (None, Some(_), None) | (None, None, Some(_)) => {
                Err(ConfigError::PartialExplicitResize)
            }
            (Some(_), _, _) => Err(ConfigError::ResizeConflict),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            ResizeSpec::ShorterSide(side) if side == 0 => Err(ConfigError::ZeroDimension),
            ResizeSpec::Exact { width, height } if width == 0 || height == 0 => {
                Err(ConfigError::ZeroDimension)
            }
            _ => Ok(()),
        }
    }

    /// Target dimensions for a frame of the given size, or `None` when
    /// the frame is stored as decoded.
    pub fn resolve(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        match *self {
            ResizeSpec::None => None,
            ResizeSpec::ShorterSide(side) => {
                let scale = side as f64 / width.min(height) as f64;
                let target_w = (width as f64 * scale).round() as u32;
                let target_h = (height as f64 * scale).round() as u32;
                Some((target_w, target_h))
            }
            ResizeSpec::Exact { width, height } => Some((width, height)),
        }
    }
}
