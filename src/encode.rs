//! Serialization of a prepared frame sequence into the target container.
//! Raster containers are written in-process; video containers and animated
//! webp go through a system ffmpeg process.

pub mod apng;
pub mod ffmpeg;

use std::io::Cursor;

use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;

use crate::{
    error::{ConvertError, ConvertResult},
    formats::ContainerFormat,
    frame::{round_half_up, Fps, Frame},
    scratch::Scratch,
};

/// Everything one encode attempt needs besides the frames themselves.
#[derive(Clone, Debug)]
pub struct EncodeParams {
    pub format: ContainerFormat,
    pub fps: Fps,
    /// 0..=100, 100 best. Ignored by lossless containers.
    pub quality: u32,
}

/// Encode `frames` into a finished file in memory. Frames must already be
/// resized, resampled, and palette-reduced; this stage only serializes.
pub fn encode_frames(
    frames: &[Frame],
    params: &EncodeParams,
    scratch: &mut Scratch,
) -> ConvertResult<Vec<u8>> {
    let first = frames
        .first()
        .ok_or_else(|| ConvertError::encode("cannot encode zero frames"))?;
    if frames.len() > 1 && !params.format.supports_animation() {
        return Err(ConvertError::encode(format!(
            "format '{}' cannot hold {} frames",
            params.format.suffix(),
            frames.len()
        )));
    }

    match params.format {
        ContainerFormat::Png | ContainerFormat::Apng => encode_png(frames, params),
        ContainerFormat::Gif => encode_gif(frames, params),
        ContainerFormat::Jpg => encode_jpg(first, params),
        ContainerFormat::Webp | ContainerFormat::Webm | ContainerFormat::Mp4
        | ContainerFormat::Mkv => {
            let out_path = scratch.unique_path(params.format.suffix());
            ffmpeg::encode_via_ffmpeg(frames, params.format, params.fps, params.quality, &out_path)
        }
        ContainerFormat::Svg | ContainerFormat::Lottie | ContainerFormat::Tgs => Err(
            ConvertError::encode(format!("{} is an input-only format", params.format.suffix())),
        ),
    }
}

/// PNG and APNG share a path: assemble with the `png` crate, then run the
/// result through oxipng. Lower quality raises the optimization level.
fn encode_png(frames: &[Frame], params: &EncodeParams) -> ConvertResult<Vec<u8>> {
    let first = &frames[0];
    let mut assembler = apng::ApngAssembler::create(first.width, first.height, params.fps)?;
    for frame in frames {
        assembler.add_frame(frame)?;
    }
    let raw = assembler.assemble()?;
    optimize_png(&raw, params.quality)
}

fn optimize_png(bytes: &[u8], quality: u32) -> ConvertResult<Vec<u8>> {
    let level = match quality {
        0..=30 => 6,
        31..=70 => 4,
        _ => 2,
    };
    let opts = oxipng::Options::from_preset(level);
    oxipng::optimize_from_memory(bytes, &opts)
        .map_err(|e| ConvertError::encode(format!("oxipng: {e}")))
}

fn encode_gif(frames: &[Frame], params: &EncodeParams) -> ConvertResult<Vec<u8>> {
    let delay_ms = round_half_up(params.fps.frame_delay_ms()).max(10) as u32;
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        if frames.len() > 1 {
            encoder
                .set_repeat(Repeat::Infinite)
                .map_err(|e| ConvertError::encode(format!("gif loop: {e}")))?;
        }
        for frame in frames {
            let image_frame = image::Frame::from_parts(
                frame.to_rgba_image()?,
                0,
                0,
                image::Delay::from_numer_denom_ms(delay_ms, 1),
            );
            encoder
                .encode_frame(image_frame)
                .map_err(|e| ConvertError::encode(format!("gif frame: {e}")))?;
        }
    }
    Ok(out)
}

fn encode_jpg(frame: &Frame, params: &EncodeParams) -> ConvertResult<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(
        Cursor::new(&mut out),
        params.quality.clamp(1, 100) as u8,
    );
    // Jpeg cannot carry alpha; flatten onto white first.
    let img = image::DynamicImage::ImageRgba8(flatten_white(frame)?).to_rgb8();
    img.write_with_encoder(encoder)
        .map_err(|e| ConvertError::encode(format!("jpeg: {e}")))?;
    Ok(out)
}

fn flatten_white(frame: &Frame) -> ConvertResult<image::RgbaImage> {
    let mut flat = frame.clone();
    for px in flat.data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        let inv = 255 - a;
        for c in px.iter_mut().take(3) {
            *c = ((*c as u16 * a + 255 * inv + 127) / 255) as u8;
        }
        px[3] = 255;
    }
    flat.to_rgba_image()
}
