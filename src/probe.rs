use std::{io::Cursor, path::Path, process::Command};

use image::{AnimationDecoder, ImageDecoder};

use crate::{
    error::{ConvertError, ConvertResult},
    formats::{ContainerFamily, ContainerFormat},
};

/// Facts about the source media, probed once per conversion and immutable
/// afterwards. The whole search reuses one descriptor.
#[derive(Clone, Debug)]
pub struct SourceDescriptor {
    pub format: ContainerFormat,
    pub width: u32,
    pub height: u32,
    /// Declared frame count. 1 for stills and svg documents.
    pub frames: usize,
    /// Native frame rate; 0 for stills.
    pub fps: f64,
    /// Total duration in milliseconds; 0 for stills.
    pub duration_ms: f64,
    /// Source pixel format as reported by ffprobe, video family only.
    pub pix_fmt: Option<String>,
    /// Source codec name as reported by ffprobe, video family only.
    pub codec: Option<String>,
}

impl SourceDescriptor {
    pub fn is_animated(&self) -> bool {
        self.frames > 1 && self.fps > 0.0
    }
}

/// Probe `bytes` according to the container family. Video inputs must already
/// be materialized at `video_path` so ffprobe can seek in them.
pub fn probe(
    format: ContainerFormat,
    bytes: &[u8],
    video_path: Option<&Path>,
) -> ConvertResult<SourceDescriptor> {
    match format.family() {
        ContainerFamily::Vector => match format {
            ContainerFormat::Svg => probe_svg(format, bytes),
            _ => crate::lottie::probe(format, bytes),
        },
        ContainerFamily::Raster => probe_raster(format, bytes),
        ContainerFamily::Video => {
            let path = video_path.ok_or_else(|| {
                ConvertError::probe("video input was not materialized before probing")
            })?;
            probe_video(format, path)
        }
    }
}

fn probe_svg(format: ContainerFormat, bytes: &[u8]) -> ConvertResult<SourceDescriptor> {
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opts)
        .map_err(|e| ConvertError::probe(format!("parse svg: {e}")))?;
    let size = tree.size().to_int_size();
    Ok(SourceDescriptor {
        format,
        width: size.width(),
        height: size.height(),
        frames: 1,
        fps: 0.0,
        duration_ms: 0.0,
        pix_fmt: None,
        codec: None,
    })
}

fn probe_raster(format: ContainerFormat, bytes: &[u8]) -> ConvertResult<SourceDescriptor> {
    // For animated inputs the declared frames are walked once to learn the
    // count and total delay; the buffers are dropped. The actual decode for
    // the pipeline happens separately, exactly once.
    let (width, height, timings) = match format {
        ContainerFormat::Gif => {
            let dec = image::codecs::gif::GifDecoder::new(Cursor::new(bytes))
                .map_err(|e| ConvertError::probe(format!("probe gif: {e}")))?;
            let (w, h) = dec.dimensions();
            (w, h, Some(frame_timings(dec)?))
        }
        ContainerFormat::Webp => {
            let dec = image::codecs::webp::WebPDecoder::new(Cursor::new(bytes))
                .map_err(|e| ConvertError::probe(format!("probe webp: {e}")))?;
            let (w, h) = dec.dimensions();
            if dec.has_animation() {
                (w, h, Some(frame_timings(dec)?))
            } else {
                (w, h, None)
            }
        }
        ContainerFormat::Png | ContainerFormat::Apng => {
            let dec = image::codecs::png::PngDecoder::new(Cursor::new(bytes))
                .map_err(|e| ConvertError::probe(format!("probe png: {e}")))?;
            let (w, h) = dec.dimensions();
            if dec
                .is_apng()
                .map_err(|e| ConvertError::probe(format!("probe apng: {e}")))?
            {
                let apng = dec
                    .apng()
                    .map_err(|e| ConvertError::probe(format!("probe apng: {e}")))?;
                (w, h, Some(frame_timings(apng)?))
            } else {
                (w, h, None)
            }
        }
        _ => {
            let img = image::load_from_memory(bytes)
                .map_err(|e| ConvertError::probe(format!("probe image: {e}")))?;
            (img.width(), img.height(), None)
        }
    };

    let (frames, duration_ms) = match timings {
        Some((count, total_ms)) => (count.max(1), total_ms),
        None => (1, 0.0),
    };
    let fps = if duration_ms > 0.0 && frames > 1 {
        frames as f64 * 1000.0 / duration_ms
    } else {
        0.0
    };

    Ok(SourceDescriptor {
        format,
        width,
        height,
        frames,
        fps,
        duration_ms,
        pix_fmt: None,
        codec: None,
    })
}

fn frame_timings<'a, D: AnimationDecoder<'a>>(decoder: D) -> ConvertResult<(usize, f64)> {
    let mut count = 0usize;
    let mut total_ms = 0.0f64;
    for frame in decoder.into_frames() {
        let frame = frame.map_err(|e| ConvertError::probe(format!("walk frames: {e}")))?;
        let (num, den) = frame.delay().numer_denom_ms();
        count += 1;
        total_ms += f64::from(num) / f64::from(den.max(1));
    }
    Ok((count, total_ms))
}

fn probe_video(format: ContainerFormat, path: &Path) -> ConvertResult<SourceDescriptor> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        codec_name: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
        nb_frames: Option<String>,
        pix_fmt: Option<String>,
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| ConvertError::probe(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(ConvertError::probe(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| ConvertError::probe(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ConvertError::probe("no video stream found"))?;

    let width = video
        .width
        .ok_or_else(|| ConvertError::probe("missing video width from ffprobe"))?;
    let height = video
        .height
        .ok_or_else(|| ConvertError::probe("missing video height from ffprobe"))?;

    let (fps_num, fps_den) = parse_ratio(video.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| ConvertError::probe("invalid video r_frame_rate"))?;
    let fps = if fps_den == 0 {
        0.0
    } else {
        f64::from(fps_num) / f64::from(fps_den)
    };

    let duration_sec = video
        .duration
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| {
            parsed
                .format
                .as_ref()
                .and_then(|f| f.duration.as_deref())
                .and_then(|s| s.parse::<f64>().ok())
        })
        .unwrap_or(0.0);
    let duration_ms = duration_sec * 1000.0;

    let frames = video
        .nb_frames
        .as_deref()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or_else(|| (fps * duration_sec).round() as usize)
        .max(1);

    Ok(SourceDescriptor {
        format,
        width,
        height,
        frames,
        fps,
        duration_ms,
        pix_fmt: video.pix_fmt.clone(),
        codec: video.codec_name.clone(),
    })
}

fn parse_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    Some((a, b))
}
