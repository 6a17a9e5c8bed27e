//! Palette reduction ahead of encoding. The adaptive path wraps libimagequant
//! with a quality-relaxation retry loop; the octree path is a deterministic
//! single-pass fallback that never fails.

mod octree;

use crate::{
    error::{ConvertError, ConvertResult},
    frame::Frame,
    options::QuantizeMethod,
};

/// Reduce a frame sequence to at most `colors` palette entries, in place.
///
/// Multi-frame sequences are quantized through a filmstrip: all frames are
/// stacked vertically into one tall image so the whole animation shares a
/// single palette, then split back apart. `quality` (0..=100) only affects
/// the adaptive method; lower values allow coarser palettes and apply
/// stronger dithering.
pub fn quantize_frames(
    frames: &mut [Frame],
    method: QuantizeMethod,
    colors: u32,
    quality: u32,
    quality_min: u32,
    quality_max: u32,
) -> ConvertResult<()> {
    if colors == 0 || colors > 256 {
        return Err(ConvertError::validation(format!(
            "palette size must be in 1..=256, got {colors}"
        )));
    }
    if matches!(method, QuantizeMethod::None) || frames.is_empty() {
        return Ok(());
    }

    let mut strip = filmstrip(frames)?;
    match method {
        QuantizeMethod::Octree => octree::quantize_frame(&mut strip, colors),
        QuantizeMethod::Adaptive => {
            adaptive_quantize(&mut strip, colors, quality, quality_min, quality_max)?;
        }
        QuantizeMethod::None => unreachable!(),
    }
    split_filmstrip(&strip, frames);
    Ok(())
}

/// Stack same-sized frames vertically. Buffers are tightly packed, so the
/// strip is a plain concatenation of the frame buffers.
fn filmstrip(frames: &[Frame]) -> ConvertResult<Frame> {
    let (width, height) = (frames[0].width, frames[0].height);
    if frames.iter().any(|f| f.width != width || f.height != height) {
        return Err(ConvertError::validation(
            "cannot quantize frames of differing sizes",
        ));
    }
    let mut data = Vec::with_capacity(frames.len() * frames[0].data.len());
    for frame in frames {
        data.extend_from_slice(&frame.data);
    }
    Frame::new(width, height * frames.len() as u32, data)
}

fn split_filmstrip(strip: &Frame, frames: &mut [Frame]) {
    let chunk = frames[0].data.len();
    for (frame, data) in frames.iter_mut().zip(strip.data.chunks_exact(chunk)) {
        frame.data.copy_from_slice(data);
    }
}

/// Quantize one frame with libimagequant, relaxing the requested quality in
/// steps of 5 when the library reports it cannot be met. If even quality 100
/// max fails the frame is left untouched.
fn adaptive_quantize(
    frame: &mut Frame,
    colors: u32,
    quality: u32,
    quality_min: u32,
    quality_max: u32,
) -> ConvertResult<()> {
    let span = quality_max.saturating_sub(quality_min).max(1);
    let dither = 1.0 - (quality.saturating_sub(quality_min) as f32 / span as f32);
    let dither = dither.clamp(0.0, 1.0);

    let pixels: Vec<imagequant::RGBA> = frame
        .data
        .chunks_exact(4)
        .map(|px| imagequant::RGBA::new(px[0], px[1], px[2], px[3]))
        .collect();

    let mut max_q = quality.min(100) as u8;
    loop {
        // The floor stays fixed while the ceiling relaxes; a floor the
        // quantizer cannot reach surfaces as QualityTooLow below.
        let min_q = quality_min.min(u32::from(max_q)) as u8;
        let mut attr = imagequant::new();
        attr.set_max_colors(colors)
            .map_err(|e| ConvertError::encode(format!("quantizer setup: {e}")))?;
        attr.set_quality(min_q, max_q)
            .map_err(|e| ConvertError::encode(format!("quantizer setup: {e}")))?;

        let mut img = attr
            .new_image(
                pixels.as_slice(),
                frame.width as usize,
                frame.height as usize,
                0.0,
            )
            .map_err(|e| ConvertError::encode(format!("quantizer image: {e}")))?;

        let mut result = match attr.quantize(&mut img) {
            Ok(r) => r,
            Err(imagequant::Error::QualityTooLow) => {
                if max_q >= 100 {
                    tracing::debug!("quantization unattainable, keeping frame as is");
                    return Ok(());
                }
                max_q = max_q.saturating_add(5).min(100);
                continue;
            }
            Err(e) => return Err(ConvertError::encode(format!("quantize: {e}"))),
        };

        result
            .set_dithering_level(dither)
            .map_err(|e| ConvertError::encode(format!("quantize: {e}")))?;
        let (palette, indices) = result
            .remapped(&mut img)
            .map_err(|e| ConvertError::encode(format!("remap: {e}")))?;

        for (px, &idx) in frame.data.chunks_exact_mut(4).zip(indices.iter()) {
            let c = palette[idx as usize];
            px.copy_from_slice(&[c.r, c.g, c.b, c.a]);
        }
        return Ok(());
    }
}
