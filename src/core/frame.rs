use std::io::Cursor;
use std::time::Duration;

use image::{ImageBuffer, ImageOutputFormat, RgbImage, Rgba, RgbaImage};

/// One decoded frame handed to the pipeline.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    /// Position in the original frame sequence, starting at 1.
    pub index: u64,
    /// Presentation time measured from the start of the video.
    pub timestamp: Duration,
    pub width: u32,
    pub height: u32,
    /// RGBA raster, row-major.
    pub pixels: Vec<u8>,
    /// Compressed bytes as produced by the decoder; stored verbatim when
    /// no resize applies.
    pub encoded: Vec<u8>,
}

impl FrameRecord {
    pub fn new(
        index: u64,
        timestamp: Duration,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        encoded: Vec<u8>,
    ) -> Self {
        Self {
            index,
            timestamp,
            width,
            height,
            pixels,
            encoded,
        }
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    /// Raster resampled to the target dimensions. Aspect ratio is the
    /// caller's business.
    pub fn resize_pixels(&self, target_width: u32, target_height: u32) -> RgbaImage {
        let img = raster_view(self.width, self.height, &self.pixels);
        image::imageops::resize(
            &img,
            target_width,
            target_height,
            image::imageops::FilterType::Triangle,
        )
    }
}

/// Borrowing view over an RGBA raster, so resizing and hashing do not
/// have to copy the frame first.
pub(crate) fn raster_view(width: u32, height: u32, rgba: &[u8]) -> ImageBuffer<Rgba<u8>, &[u8]> {
    ImageBuffer::from_raw(width, height, rgba).expect("raster does not match its dimensions")
}

/// JPEG-encode an RGBA raster, dropping the alpha channel.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let (width, height) = image.dimensions();
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for chunk in image.as_raw().chunks_exact(4) {
        rgb.push(chunk[0]);
        rgb.push(chunk[1]);
        rgb.push(chunk[2]);
    }
    let rgb = RgbImage::from_raw(width, height, rgb).expect("RGB buffer sized from dimensions");
    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageOutputFormat::Jpeg(quality))?;
    Ok(out.into_inner())
}
