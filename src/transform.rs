//! Frame-domain transforms applied between decode and encode: temporal
//! resampling, aspect-preserving resize onto a transparent canvas, and the
//! delay-grid fps correction containers impose.

use image::imageops;

use crate::{
    error::{ConvertError, ConvertResult},
    formats::ContainerFormat,
    frame::{round_half_up, Fps, Frame},
    options::ScaleFilter,
};

/// Temporally resample `frames` from `source_fps` to `target_fps`, optionally
/// clamping the output duration to `[duration_min_ms, duration_max_ms]`.
///
/// A fractional accumulator advances by `fps_ratio * speed_ratio` per output
/// frame and is advanced before each selection, so an identity resample of N
/// frames yields N-1 frames starting at source index 1. Too-short clips pad
/// by repeating the last source frame, too-long clips stop at the maximum
/// frame count. Always produces at least one frame.
pub fn resample_frames(
    frames: &[Frame],
    source_fps: f64,
    target_fps: f64,
    duration_min_ms: Option<u64>,
    duration_max_ms: Option<u64>,
) -> ConvertResult<Vec<Frame>> {
    if frames.is_empty() {
        return Err(ConvertError::validation("cannot resample zero frames"));
    }
    if source_fps <= 0.0 || target_fps <= 0.0 {
        return Err(ConvertError::validation(format!(
            "fps must be positive (source {source_fps}, target {target_fps})"
        )));
    }

    let fps_ratio = source_fps / target_fps;
    let source_duration_ms = frames.len() as f64 * 1000.0 / source_fps;
    let speed_ratio = if duration_min_ms.is_some_and(|ms| source_duration_ms < ms as f64) {
        source_duration_ms / duration_min_ms.unwrap_or(1) as f64
    } else if duration_max_ms.is_some_and(|ms| source_duration_ms > ms as f64) {
        source_duration_ms / duration_max_ms.unwrap_or(1) as f64
    } else {
        1.0
    };
    let increment = fps_ratio * speed_ratio;

    let min_out = duration_min_ms.map(|ms| (target_fps * ms as f64 / 1000.0).ceil() as usize);
    let max_out = duration_max_ms.map(|ms| (target_fps * ms as f64 / 1000.0).floor() as usize);

    let mut out = Vec::new();
    let mut cursor = 0.0f64;
    loop {
        cursor += increment;
        let idx = round_half_up(cursor) as usize;
        if idx >= frames.len() || max_out.is_some_and(|m| out.len() >= m) {
            break;
        }
        out.push(frames[idx].clone());
    }
    // Pad with the last source frame up to the minimum frame count. At low
    // frame rates tight duration bounds can cross; the minimum wins.
    let last = &frames[frames.len() - 1];
    while out.is_empty() || min_out.is_some_and(|m| out.len() < m) {
        out.push(last.clone());
    }
    Ok(out)
}

/// Resize each frame to fit inside `width` x `height` preserving aspect ratio,
/// pasted centered onto a transparent canvas of exactly that size.
pub fn resize_frames(
    frames: &[Frame],
    width: u32,
    height: u32,
    filter: ScaleFilter,
) -> ConvertResult<Vec<Frame>> {
    if width == 0 || height == 0 {
        return Err(ConvertError::validation("target resolution must be nonzero"));
    }
    frames
        .iter()
        .map(|f| resize_frame(f, width, height, filter))
        .collect()
}

fn resize_frame(
    frame: &Frame,
    width: u32,
    height: u32,
    filter: ScaleFilter,
) -> ConvertResult<Frame> {
    if frame.width == width && frame.height == height {
        return Ok(frame.clone());
    }

    let scale = (width as f64 / frame.width as f64).min(height as f64 / frame.height as f64);
    let scaled_w = ((frame.width as f64 * scale).round() as u32).max(1);
    let scaled_h = ((frame.height as f64 * scale).round() as u32).max(1);

    let src = frame.to_rgba_image()?;
    let scaled = imageops::resize(&src, scaled_w, scaled_h, filter.to_image_filter());

    let mut canvas = Frame::transparent(width, height).to_rgba_image()?;
    let x = (width - scaled_w) / 2;
    let y = (height - scaled_h) / 2;
    imageops::replace(&mut canvas, &scaled, x as i64, y as i64);
    Ok(Frame::from_rgba_image(canvas))
}

/// Snap `fps` onto the target container's integer delay grid.
///
/// GIF stores delays in centiseconds and webp/apng in milliseconds, so most
/// rates are not representable exactly. The snapped rate is `base / delay`
/// for the rounded integer delay; if that falls outside `[fps_min, fps_max]`
/// the delay is nudged one tick toward compliance. Video containers carry
/// rational timestamps and only round to an integer rate.
pub fn fix_fps(
    fps: f64,
    format: ContainerFormat,
    fps_min: Option<f64>,
    fps_max: Option<f64>,
) -> ConvertResult<Fps> {
    if fps <= 0.0 {
        return Err(ConvertError::validation(format!(
            "fps must be positive, got {fps}"
        )));
    }

    let Some(base) = format.delay_time_base() else {
        let rounded = round_half_up(fps).max(1) as u32;
        return Fps::new(rounded, 1);
    };

    let mut delay = round_half_up(base as f64 / fps).max(1) as u32;
    let actual = base as f64 / delay as f64;
    if let Some(max) = fps_max {
        if actual > max {
            delay += 1;
        }
    }
    if let Some(min) = fps_min {
        if actual < min && delay > 1 {
            delay -= 1;
        }
    }
    Fps::new(base, delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(v: u8) -> Frame {
        Frame::new(2, 2, vec![v; 16]).unwrap()
    }

    fn sequence(n: usize) -> Vec<Frame> {
        (0..n).map(|i| solid(i as u8)).collect()
    }

    fn first_bytes(frames: &[Frame]) -> Vec<u8> {
        frames.iter().map(|f| f.data[0]).collect()
    }

    #[test]
    fn identity_resample_advances_past_the_first_frame() {
        // The accumulator advances before selecting, so frame 0 is skipped
        // and N source frames yield N-1 output frames.
        let frames = sequence(5);
        let out = resample_frames(&frames, 10.0, 10.0, None, None).unwrap();
        assert_eq!(first_bytes(&out), vec![1, 2, 3, 4]);
    }

    #[test]
    fn halving_fps_selects_every_second_frame() {
        let frames = sequence(6);
        let out = resample_frames(&frames, 20.0, 10.0, None, None).unwrap();
        assert_eq!(first_bytes(&out), vec![2, 4]);
    }

    #[test]
    fn doubling_fps_duplicates_frames() {
        let frames = sequence(3);
        let out = resample_frames(&frames, 10.0, 20.0, None, None).unwrap();
        // Accumulator 0.5, 1.0, 1.5, 2.0, then 2.5 rounds to the end.
        assert_eq!(first_bytes(&out), vec![1, 1, 2, 2]);
    }

    #[test]
    fn never_yields_zero_frames() {
        let frames = sequence(1);
        let out = resample_frames(&frames, 100.0, 1.0, None, None).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(first_bytes(&out), vec![0]);
    }

    #[test]
    fn max_duration_speeds_up_and_caps_the_frame_count() {
        // 20 frames at 10fps = 2s against a 1s cap: the accumulator advances
        // twice as fast and stops under floor(10 * 1000 / 1000) = 10 frames.
        let frames = sequence(20);
        let out = resample_frames(&frames, 10.0, 10.0, None, Some(1000)).unwrap();
        assert_eq!(first_bytes(&out), vec![2, 4, 6, 8, 10, 12, 14, 16, 18]);
    }

    #[test]
    fn min_duration_pads_with_the_last_frame() {
        // 2 frames at 10fps = 0.2s against a 1s floor: the slowed accumulator
        // stretches the clip, then the last frame repeats up to
        // ceil(10 * 1000 / 1000) = 10 frames.
        let frames = sequence(2);
        let out = resample_frames(&frames, 10.0, 10.0, Some(1000), None).unwrap();
        assert_eq!(first_bytes(&out), vec![0, 0, 1, 1, 1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn crossed_duration_bounds_favor_the_minimum() {
        // At 10fps the bounds [150ms, 190ms] ask for >=2 but <=1 frames;
        // padding runs after the cap, so the minimum wins.
        let frames = sequence(5);
        let out = resample_frames(&frames, 10.0, 10.0, Some(150), Some(190)).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn resize_letterboxes_on_transparent_canvas() {
        // 4x2 source into a 4x4 box: scaled content stays 4x2, centered
        // vertically with transparent rows above and below.
        let src = Frame::new(4, 2, vec![255; 32]).unwrap();
        let out = resize_frames(&[src], 4, 4, ScaleFilter::Nearest).unwrap();
        let f = &out[0];
        assert_eq!((f.width, f.height), (4, 4));
        assert_eq!(f.data[3], 0, "top row transparent");
        assert_eq!(f.data[(4 + 0) * 4 + 3], 255, "second row opaque");
        assert_eq!(f.data[(3 * 4 + 0) * 4 + 3], 0, "bottom row transparent");
    }

    #[test]
    fn resize_noop_when_already_at_target() {
        let src = Frame::new(4, 4, (0..64).collect()).unwrap();
        let out = resize_frames(&[src.clone()], 4, 4, ScaleFilter::Lanczos).unwrap();
        assert_eq!(out[0].data, src.data);
    }

    #[test]
    fn gif_fps_snaps_to_centisecond_grid() {
        // 30fps on a 100-tick base rounds delay to 3 => 33.33fps.
        let fps = fix_fps(30.0, ContainerFormat::Gif, None, None).unwrap();
        assert_eq!((fps.num, fps.den), (100, 3));
    }

    #[test]
    fn apng_fps_snaps_to_millisecond_grid() {
        let fps = fix_fps(24.0, ContainerFormat::Apng, None, None).unwrap();
        assert_eq!((fps.num, fps.den), (1000, 42));
    }

    #[test]
    fn snapped_fps_nudges_back_under_max() {
        // delay 3 gives 33.33fps which exceeds the 30fps cap; nudge to 4.
        let fps = fix_fps(30.0, ContainerFormat::Gif, None, Some(30.0)).unwrap();
        assert_eq!((fps.num, fps.den), (100, 4));
    }

    #[test]
    fn video_fps_rounds_to_integer() {
        let fps = fix_fps(29.7, ContainerFormat::Webm, None, None).unwrap();
        assert_eq!((fps.num, fps.den), (30, 1));
    }
}
