use std::{io::Cursor, path::Path, process::Command};

use image::AnimationDecoder;

use crate::{
    error::{ConvertError, ConvertResult},
    formats::{ContainerFamily, ContainerFormat},
    frame::Frame,
    probe::SourceDescriptor,
    yuv,
};

/// Decode the input into its full ordered frame sequence. Called exactly once
/// per conversion; the frames are reused across all search iterations.
///
/// Any decode error is fatal for this input and surfaces to the caller.
pub fn decode_frames(
    desc: &SourceDescriptor,
    bytes: &[u8],
    video_path: Option<&Path>,
) -> ConvertResult<Vec<Frame>> {
    let frames = match desc.format.family() {
        ContainerFamily::Vector => match desc.format {
            ContainerFormat::Svg => decode_svg(desc, bytes)?,
            _ => crate::lottie::decode_frames(desc, bytes)?,
        },
        ContainerFamily::Raster => decode_raster(desc.format, bytes)?,
        ContainerFamily::Video => {
            let path = video_path.ok_or_else(|| {
                ConvertError::decode("video input was not materialized before decoding")
            })?;
            decode_video(desc, path)?
        }
    };
    if frames.is_empty() {
        return Err(ConvertError::decode("input decoded to zero frames"));
    }
    tracing::debug!(frames = frames.len(), "decoded input");
    Ok(frames)
}

fn decode_svg(desc: &SourceDescriptor, bytes: &[u8]) -> ConvertResult<Vec<Frame>> {
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opts)
        .map_err(|e| ConvertError::decode(format!("parse svg: {e}")))?;
    Ok(vec![render_svg_frame(&tree, desc.width, desc.height)?])
}

fn render_svg_frame(tree: &usvg::Tree, width: u32, height: u32) -> ConvertResult<Frame> {
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| ConvertError::decode("svg has zero-sized canvas"))?;
    resvg::render(
        tree,
        resvg::tiny_skia::Transform::identity(),
        &mut pixmap.as_mut(),
    );

    // tiny-skia keeps premultiplied pixels; the pipeline works in straight alpha.
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for px in pixmap.pixels() {
        let c = px.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Frame::new(width, height, data)
}

fn decode_raster(format: ContainerFormat, bytes: &[u8]) -> ConvertResult<Vec<Frame>> {
    match format {
        ContainerFormat::Gif => {
            let dec = image::codecs::gif::GifDecoder::new(Cursor::new(bytes))
                .map_err(|e| ConvertError::decode(format!("decode gif: {e}")))?;
            collect_animation(dec)
        }
        ContainerFormat::Webp => {
            let dec = image::codecs::webp::WebPDecoder::new(Cursor::new(bytes))
                .map_err(|e| ConvertError::decode(format!("decode webp: {e}")))?;
            if dec.has_animation() {
                collect_animation(dec)
            } else {
                decode_still(bytes)
            }
        }
        ContainerFormat::Png | ContainerFormat::Apng => {
            let dec = image::codecs::png::PngDecoder::new(Cursor::new(bytes))
                .map_err(|e| ConvertError::decode(format!("decode png: {e}")))?;
            if dec
                .is_apng()
                .map_err(|e| ConvertError::decode(format!("decode apng: {e}")))?
            {
                let apng = dec
                    .apng()
                    .map_err(|e| ConvertError::decode(format!("decode apng: {e}")))?;
                collect_animation(apng)
            } else {
                decode_still(bytes)
            }
        }
        _ => decode_still(bytes),
    }
}

fn decode_still(bytes: &[u8]) -> ConvertResult<Vec<Frame>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ConvertError::decode(format!("decode image: {e}")))?;
    Ok(vec![Frame::from_rgba_image(img.to_rgba8())])
}

fn collect_animation<'a, D: AnimationDecoder<'a>>(decoder: D) -> ConvertResult<Vec<Frame>> {
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| ConvertError::decode(format!("decode animation frames: {e}")))?;
    Ok(frames
        .into_iter()
        .map(|f| Frame::from_rgba_image(f.into_buffer()))
        .collect())
}

/// Pixel layouts ffmpeg is asked to emit, chosen per source format.
enum VideoLayout {
    /// Opaque 4:2:0 expanded straight to packed rgb24; alpha filled with 255.
    Rgb,
    /// Anything already carrying (or possibly carrying) alpha: raw yuva420p
    /// planes, converted manually (see `yuv`). Dimensions are cropped to even
    /// so the 2x2 chroma subsampling stays exact.
    YuvaPlanar,
    /// Everything else: let ffmpeg produce packed rgba.
    Rgba,
}

fn video_layout(desc: &SourceDescriptor) -> VideoLayout {
    let codec = desc.codec.as_deref().unwrap_or("");
    let pix_fmt = desc.pix_fmt.as_deref().unwrap_or("");
    // vp8/vp9 may carry alpha that only the libvpx decoders expose; route
    // them through the planar path unconditionally.
    if codec == "vp8" || codec == "vp9" || pix_fmt.starts_with("yuva") {
        VideoLayout::YuvaPlanar
    } else if pix_fmt == "yuv420p" {
        VideoLayout::Rgb
    } else {
        VideoLayout::Rgba
    }
}

fn decoder_override(desc: &SourceDescriptor) -> Option<&'static str> {
    match desc.codec.as_deref() {
        Some("vp8") => Some("libvpx"),
        Some("vp9") => Some("libvpx-vp9"),
        _ => None,
    }
}

fn decode_video(desc: &SourceDescriptor, path: &Path) -> ConvertResult<Vec<Frame>> {
    let layout = video_layout(desc);

    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-v", "error"]);
    if let Some(decoder) = decoder_override(desc) {
        cmd.args(["-c:v", decoder]);
    }
    cmd.arg("-i").arg(path);

    let (width, height) = (desc.width as usize, desc.height as usize);
    let (pix_fmt, frame_len, out_w, out_h) = match layout {
        VideoLayout::Rgb => ("rgb24", width * height * 3, width, height),
        VideoLayout::Rgba => ("rgba", width * height * 4, width, height),
        VideoLayout::YuvaPlanar => {
            // Truncate odd dimensions by one pixel up front.
            let (w, h) = (width & !1, height & !1);
            cmd.args(["-vf", "crop=trunc(iw/2)*2:trunc(ih/2)*2"]);
            ("yuva420p", yuv::yuva420_frame_len(w, h), w, h)
        }
    };

    let out = cmd
        .args(["-f", "rawvideo", "-pix_fmt", pix_fmt, "pipe:1"])
        .output()
        .map_err(|e| ConvertError::decode(format!("failed to run ffmpeg for decode: {e}")))?;
    if !out.status.success() {
        return Err(ConvertError::decode(format!(
            "ffmpeg decode failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    if frame_len == 0 || out.stdout.len() % frame_len != 0 {
        return Err(ConvertError::decode(format!(
            "decoded stream has invalid size: got {} bytes, expected multiples of {frame_len}",
            out.stdout.len()
        )));
    }

    let mut frames = Vec::with_capacity(out.stdout.len() / frame_len);
    for chunk in out.stdout.chunks_exact(frame_len) {
        let frame = match layout {
            VideoLayout::Rgb => rgb_to_rgba(chunk, out_w as u32, out_h as u32)?,
            VideoLayout::Rgba => Frame::new(out_w as u32, out_h as u32, chunk.to_vec())?,
            VideoLayout::YuvaPlanar => yuv::yuva420_frame_to_rgba(chunk, out_w, out_h)?,
        };
        frames.push(frame);
    }
    Ok(frames)
}

fn rgb_to_rgba(rgb: &[u8], width: u32, height: u32) -> ConvertResult<Frame> {
    let mut data = Vec::with_capacity(rgb.len() / 3 * 4);
    for px in rgb.chunks_exact(3) {
        data.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
    Frame::new(width, height, data)
}
