use std::path::PathBuf;

use crate::{
    error::{ConvertError, ConvertResult},
    formats::ContainerFormat,
};

/// Interpolation kernel used when scaling frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScaleFilter {
    Nearest,
    Bilinear,
    Bicubic,
    #[default]
    Lanczos,
}

impl ScaleFilter {
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Bilinear => image::imageops::FilterType::Triangle,
            Self::Bicubic => image::imageops::FilterType::CatmullRom,
            Self::Lanczos => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Palette quantization strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QuantizeMethod {
    /// Perceptual quantizer with quality-driven dithering, retried with
    /// relaxed quality caps before giving up.
    #[default]
    Adaptive,
    /// Deterministic octree quantizer, single attempt.
    Octree,
    /// Leave frames unquantized even when a color target is set.
    None,
}

/// The full set of knobs for one conversion. This is the only configuration
/// surface of the pipeline; everything else is derived.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompressionOptions {
    /// Byte budget for still outputs. `None` = unlimited.
    pub size_max_img: Option<usize>,
    /// Byte budget for animated outputs. `None` = unlimited.
    pub size_max_vid: Option<usize>,

    /// Allowed target containers for still outputs, in preference order.
    pub format_img: Vec<ContainerFormat>,
    /// Allowed target containers for animated outputs, in preference order.
    pub format_vid: Vec<ContainerFormat>,

    /// Treat still inputs as animated for target-format selection (platforms
    /// that only accept video stickers).
    pub fake_vid: bool,

    pub res_w_min: Option<u32>,
    pub res_w_max: Option<u32>,
    pub res_h_min: Option<u32>,
    pub res_h_max: Option<u32>,
    pub res_power: f64,

    /// Quality bounds in [0, 100].
    pub quality_min: Option<u32>,
    pub quality_max: Option<u32>,
    pub quality_power: f64,

    pub fps_min: Option<u32>,
    pub fps_max: Option<u32>,
    pub fps_power: f64,

    /// Palette size bounds; values above 256 disable quantization.
    pub color_min: Option<u32>,
    pub color_max: Option<u32>,
    pub color_power: f64,

    /// Output duration bounds in milliseconds.
    pub duration_min: Option<u64>,
    pub duration_max: Option<u64>,

    /// Number of ladder steps; the ladder has `steps + 1` rows.
    pub steps: usize,

    pub scale_filter: ScaleFilter,
    pub quantize_method: QuantizeMethod,

    /// Scratch directory override. `None` = system temp.
    pub cache_dir: Option<PathBuf>,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            size_max_img: None,
            size_max_vid: None,
            format_img: vec![ContainerFormat::Png],
            format_vid: vec![ContainerFormat::Apng],
            fake_vid: false,
            res_w_min: None,
            res_w_max: None,
            res_h_min: None,
            res_h_max: None,
            res_power: 1.0,
            quality_min: None,
            quality_max: None,
            quality_power: 1.0,
            fps_min: None,
            fps_max: None,
            fps_power: 1.0,
            color_min: None,
            color_max: None,
            color_power: 1.0,
            duration_min: None,
            duration_max: None,
            steps: 1,
            scale_filter: ScaleFilter::default(),
            quantize_method: QuantizeMethod::default(),
            cache_dir: None,
        }
    }
}

impl CompressionOptions {
    pub fn validate(&self) -> ConvertResult<()> {
        if self.steps < 1 {
            return Err(ConvertError::validation("steps must be >= 1"));
        }
        for (name, min, max) in [
            ("res_w", self.res_w_min, self.res_w_max),
            ("res_h", self.res_h_min, self.res_h_max),
            ("quality", self.quality_min, self.quality_max),
            ("fps", self.fps_min, self.fps_max),
            ("color", self.color_min, self.color_max),
        ] {
            if let (Some(lo), Some(hi)) = (min, max) {
                if lo > hi {
                    return Err(ConvertError::validation(format!(
                        "{name}_min {lo} exceeds {name}_max {hi}"
                    )));
                }
            }
        }
        if let Some(q) = self.quality_max {
            if q > 100 {
                return Err(ConvertError::validation("quality_max must be <= 100"));
            }
        }
        if let (Some(lo), Some(hi)) = (self.duration_min, self.duration_max) {
            if lo > hi {
                return Err(ConvertError::validation(format!(
                    "duration_min {lo} exceeds duration_max {hi}"
                )));
            }
        }
        for (name, power) in [
            ("res_power", self.res_power),
            ("quality_power", self.quality_power),
            ("fps_power", self.fps_power),
            ("color_power", self.color_power),
        ] {
            if power <= -1.0 {
                return Err(ConvertError::validation(format!(
                    "{name} must be greater than -1"
                )));
            }
        }
        if self.format_img.is_empty() && self.format_vid.is_empty() {
            return Err(ConvertError::validation(
                "at least one target format must be configured",
            ));
        }
        Ok(())
    }

    /// Every allowed target format, still and animated combined.
    pub fn allowed_formats(&self) -> Vec<ContainerFormat> {
        let mut all = self.format_img.clone();
        for f in &self.format_vid {
            if !all.contains(f) {
                all.push(*f);
            }
        }
        all
    }
}
