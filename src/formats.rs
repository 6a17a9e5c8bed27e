use std::path::Path;

/// Closed set of container formats the pipeline understands. Every format is
/// bound to exactly one decode strategy (via [`ContainerFamily`]) and one
/// encode strategy (in `encode`); adding a format means adding a variant here
/// plus the two strategy arms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Png,
    Apng,
    Webp,
    Gif,
    Jpg,
    Svg,
    Lottie,
    Tgs,
    Webm,
    Mp4,
    Mkv,
}

/// Decode dispatch family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerFamily {
    /// Vector documents rasterised in-process: SVG through usvg/resvg,
    /// lottie/tgs through rlottie.
    Vector,
    /// Single- or multi-frame raster images decoded in-process.
    Raster,
    /// Anything demuxed and decoded through ffmpeg.
    Video,
}

impl ContainerFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::from_suffix(ext)
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let suffix = suffix.trim_start_matches('.');
        match suffix.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "apng" => Some(Self::Apng),
            "webp" => Some(Self::Webp),
            "gif" => Some(Self::Gif),
            "jpg" | "jpeg" => Some(Self::Jpg),
            "svg" => Some(Self::Svg),
            "lottie" | "json" => Some(Self::Lottie),
            "tgs" => Some(Self::Tgs),
            "webm" => Some(Self::Webm),
            "mp4" => Some(Self::Mp4),
            "mkv" => Some(Self::Mkv),
            _ => None,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Apng => "apng",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Jpg => "jpg",
            Self::Svg => "svg",
            Self::Lottie => "lottie",
            Self::Tgs => "tgs",
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
        }
    }

    pub fn family(self) -> ContainerFamily {
        match self {
            Self::Svg | Self::Lottie | Self::Tgs => ContainerFamily::Vector,
            Self::Png | Self::Apng | Self::Webp | Self::Gif | Self::Jpg => ContainerFamily::Raster,
            Self::Webm | Self::Mp4 | Self::Mkv => ContainerFamily::Video,
        }
    }

    /// Whether the container can hold more than one frame at all.
    pub fn supports_animation(self) -> bool {
        !matches!(self, Self::Jpg | Self::Svg)
    }

    /// Denominator of the container's per-frame delay field, if delays are
    /// stored as integer ticks. GIF stores hundredths of a second; webp and
    /// (a)png store milliseconds. Video containers use arbitrary time bases
    /// and get a plain integer frame rate instead.
    pub fn delay_time_base(self) -> Option<u32> {
        match self {
            Self::Gif => Some(100),
            Self::Webp | Self::Apng | Self::Png => Some(1000),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn suffix_round_trip() {
        for fmt in [
            ContainerFormat::Png,
            ContainerFormat::Apng,
            ContainerFormat::Webp,
            ContainerFormat::Gif,
            ContainerFormat::Jpg,
            ContainerFormat::Svg,
            ContainerFormat::Lottie,
            ContainerFormat::Tgs,
            ContainerFormat::Webm,
            ContainerFormat::Mp4,
            ContainerFormat::Mkv,
        ] {
            assert_eq!(ContainerFormat::from_suffix(fmt.suffix()), Some(fmt));
        }
        assert_eq!(ContainerFormat::from_suffix(".JPEG"), Some(ContainerFormat::Jpg));
        assert_eq!(ContainerFormat::from_suffix("json"), Some(ContainerFormat::Lottie));
        assert_eq!(ContainerFormat::from_suffix("tiff"), None);
    }

    #[test]
    fn from_path_uses_extension() {
        let p = PathBuf::from("dir/sticker.WebP");
        assert_eq!(ContainerFormat::from_path(&p), Some(ContainerFormat::Webp));
        assert_eq!(ContainerFormat::from_path(&PathBuf::from("noext")), None);
    }

    #[test]
    fn families_are_exhaustive() {
        assert_eq!(ContainerFormat::Svg.family(), ContainerFamily::Vector);
        assert_eq!(ContainerFormat::Tgs.family(), ContainerFamily::Vector);
        assert_eq!(ContainerFormat::Gif.family(), ContainerFamily::Raster);
        assert_eq!(ContainerFormat::Webm.family(), ContainerFamily::Video);
    }

    #[test]
    fn delay_time_bases() {
        assert_eq!(ContainerFormat::Gif.delay_time_base(), Some(100));
        assert_eq!(ContainerFormat::Apng.delay_time_base(), Some(1000));
        assert_eq!(ContainerFormat::Webm.delay_time_base(), None);
    }
}
