//! Lottie vector animations, plain (`.lottie`/`.json`) or gzip-wrapped
//! Telegram stickers (`.tgs`). Rasterised frame by frame through rlottie,
//! which needs the system librlottie the way video needs ffmpeg on PATH.

use std::{
    hash::{DefaultHasher, Hash, Hasher},
    io::Read,
};

use flate2::read::GzDecoder;

use crate::{
    error::{ConvertError, ConvertResult},
    formats::ContainerFormat,
    frame::Frame,
    probe::SourceDescriptor,
};

fn load(format: ContainerFormat, bytes: &[u8]) -> Result<rlottie::Animation, String> {
    let json = if format == ContainerFormat::Tgs {
        let mut buf = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut buf)
            .map_err(|e| format!("gunzip tgs: {e}"))?;
        buf
    } else {
        bytes.to_vec()
    };

    // rlottie caches animations by key; derive one from the content so two
    // different inputs never alias.
    let mut hasher = DefaultHasher::new();
    json.hash(&mut hasher);
    let key = format!("mem-{:016x}", hasher.finish());

    rlottie::Animation::from_data(json, key, ".").ok_or_else(|| "parse lottie json".into())
}

pub fn probe(format: ContainerFormat, bytes: &[u8]) -> ConvertResult<SourceDescriptor> {
    let animation =
        load(format, bytes).map_err(|e| ConvertError::probe(format!("probe lottie: {e}")))?;
    let size = animation.size();
    let frames = animation.totalframe().max(1);
    let fps = animation.framerate();
    let duration_ms = if fps > 0.0 {
        frames as f64 * 1000.0 / fps
    } else {
        0.0
    };
    Ok(SourceDescriptor {
        format,
        width: size.width as u32,
        height: size.height as u32,
        frames,
        fps,
        duration_ms,
        pix_fmt: None,
        codec: None,
    })
}

/// Render every frame at the animation's native size.
pub fn decode_frames(desc: &SourceDescriptor, bytes: &[u8]) -> ConvertResult<Vec<Frame>> {
    let mut animation =
        load(desc.format, bytes).map_err(|e| ConvertError::decode(format!("decode lottie: {e}")))?;
    let size = animation.size();
    let mut surface = rlottie::Surface::new(size);

    let mut frames = Vec::with_capacity(desc.frames);
    for index in 0..desc.frames {
        animation.render(index, &mut surface);
        // rlottie emits premultiplied BGRA; the pipeline works in straight alpha.
        let mut data = Vec::with_capacity(surface.data().len() * 4);
        for px in surface.data() {
            data.extend_from_slice(&[
                unmultiply(px.r, px.a),
                unmultiply(px.g, px.a),
                unmultiply(px.b, px.a),
                px.a,
            ]);
        }
        frames.push(Frame::new(size.width as u32, size.height as u32, data)?);
    }
    Ok(frames)
}

fn unmultiply(channel: u8, alpha: u8) -> u8 {
    if alpha == 0 {
        0
    } else {
        ((u16::from(channel) * 255 + u16::from(alpha) / 2) / u16::from(alpha)).min(255) as u8
    }
}
