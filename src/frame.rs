use image::RgbaImage;

use crate::error::{ConvertError, ConvertResult};

/// One decoded raster frame: straight-alpha RGBA8, tightly packed.
///
/// Frames are owned by whichever pipeline stage is currently processing them;
/// they are cloned, never shared, when a stage needs to keep its input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> ConvertResult<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(ConvertError::validation(format!(
                "frame buffer size {} does not match {}x{} rgba",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Fully transparent canvas of the given size.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        }
    }

    pub fn from_rgba_image(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }

    pub fn to_rgba_image(&self) -> ConvertResult<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            ConvertError::validation("frame buffer does not match its declared dimensions")
        })
    }
}

/// Exact rational frame rate. `num/den` frames per second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fps {
    pub num: u32,
    pub den: u32,
}

impl Fps {
    pub fn new(num: u32, den: u32) -> ConvertResult<Self> {
        if den == 0 {
            return Err(ConvertError::validation("fps denominator must be non-zero"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in milliseconds.
    pub fn frame_delay_ms(self) -> f64 {
        1000.0 * f64::from(self.den) / f64::from(self.num)
    }
}

/// Round half away from zero, matching decimal ROUND_HALF_UP for the
/// non-negative values used throughout the search and resampler.
pub(crate) fn round_half_up(value: f64) -> i64 {
    value.round() as i64
}
