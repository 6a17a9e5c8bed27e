use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::{
    error::{ConvertError, ConvertResult},
    formats::ContainerFormat,
    frame::{Fps, Frame},
};

/// Quality is 0..=100 with 100 best; vpx crf runs 0..=63 with 0 best.
const VPX_MAX_CRF: u32 = 63;

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[derive(Clone, Debug)]
pub struct FfmpegTarget {
    pub format: ContainerFormat,
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub quality: u32,
    pub out_path: PathBuf,
}

impl FfmpegTarget {
    fn validate(&self) -> ConvertResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ConvertError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.quality > 100 {
            return Err(ConvertError::validation(format!(
                "quality must be in 0..=100, got {}",
                self.quality
            )));
        }
        if self.format == ContainerFormat::Mp4
            && (!self.width.is_multiple_of(2) || !self.height.is_multiple_of(2))
        {
            // yuv420p requires even dimensions.
            return Err(ConvertError::validation(
                "mp4 output requires even width/height",
            ));
        }
        Ok(())
    }

    /// Codec arguments placed after the rawvideo input flags.
    fn codec_args(&self) -> ConvertResult<Vec<String>> {
        let crf = VPX_MAX_CRF - self.quality * VPX_MAX_CRF / 100;
        let args: Vec<&str> = match self.format {
            ContainerFormat::Webm | ContainerFormat::Mkv => {
                return Ok(vec![
                    "-c:v".into(),
                    "libvpx-vp9".into(),
                    "-pix_fmt".into(),
                    "yuva420p".into(),
                    "-crf".into(),
                    crf.to_string(),
                    "-b:v".into(),
                    "0".into(),
                ]);
            }
            ContainerFormat::Mp4 => vec![
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ],
            ContainerFormat::Webp => {
                return Ok(vec![
                    "-c:v".into(),
                    "libwebp".into(),
                    "-quality".into(),
                    self.quality.to_string(),
                    "-lossless".into(),
                    "0".into(),
                    "-loop".into(),
                    "0".into(),
                    "-pix_fmt".into(),
                    "yuva420p".into(),
                    "-f".into(),
                    "webp".into(),
                ]);
            }
            other => {
                return Err(ConvertError::encode(format!(
                    "format '{}' is not encoded through ffmpeg",
                    other.suffix()
                )));
            }
        };
        Ok(args.into_iter().map(String::from).collect())
    }
}

/// Streaming encoder piping raw rgba frames into a system ffmpeg process.
/// The system binary is used instead of native FFmpeg bindings so no dev
/// headers or libs are needed at build time.
pub struct FfmpegEncoder {
    target: FfmpegTarget,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl FfmpegEncoder {
    pub fn new(target: FfmpegTarget) -> ConvertResult<Self> {
        target.validate()?;

        if !is_ffmpeg_on_path() {
            return Err(ConvertError::encode(
                "ffmpeg is required for video encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", target.width, target.height),
            "-r",
            &format!("{}/{}", target.fps.num, target.fps.den),
            "-i",
            "pipe:0",
            "-an",
        ]);
        cmd.args(target.codec_args()?);
        cmd.arg(&target.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            ConvertError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ConvertError::encode("failed to open ffmpeg stdin (unexpected)"))?;

        Ok(Self {
            target,
            child,
            stdin: Some(stdin),
        })
    }

    pub fn encode_frame(&mut self, frame: &Frame) -> ConvertResult<()> {
        if frame.width != self.target.width || frame.height != self.target.height {
            return Err(ConvertError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.target.width, self.target.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ConvertError::encode("ffmpeg encoder is already finalized"));
        };

        stdin.write_all(&frame.data).map_err(|e| {
            ConvertError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    /// Close stdin, wait for ffmpeg, and read the finished file back.
    pub fn finish(mut self) -> ConvertResult<Vec<u8>> {
        drop(self.stdin.take());

        let output = self
            .child
            .wait_with_output()
            .map_err(|e| ConvertError::encode(format!("failed to wait for ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        std::fs::read(&self.target.out_path)
            .map_err(|e| ConvertError::encode(format!("read encoded output back: {e}")))
    }
}

/// Encode `frames` through ffmpeg into `out_path` and return the bytes.
pub fn encode_via_ffmpeg(
    frames: &[Frame],
    format: ContainerFormat,
    fps: Fps,
    quality: u32,
    out_path: &Path,
) -> ConvertResult<Vec<u8>> {
    let first = frames
        .first()
        .ok_or_else(|| ConvertError::encode("cannot encode zero frames"))?;
    let mut encoder = FfmpegEncoder::new(FfmpegTarget {
        format,
        width: first.width,
        height: first.height,
        fps,
        quality,
        out_path: out_path.to_path_buf(),
    })?;
    for frame in frames {
        encoder.encode_frame(frame)?;
    }
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(format: ContainerFormat, width: u32, height: u32, quality: u32) -> FfmpegTarget {
        FfmpegTarget {
            format,
            width,
            height,
            fps: Fps::new(30, 1).unwrap(),
            quality,
            out_path: PathBuf::from("out.bin"),
        }
    }

    #[test]
    fn validation_catches_bad_values() {
        assert!(target(ContainerFormat::Webm, 0, 10, 50).validate().is_err());
        assert!(target(ContainerFormat::Mp4, 11, 10, 50).validate().is_err());
        assert!(target(ContainerFormat::Webm, 10, 10, 101).validate().is_err());
        assert!(target(ContainerFormat::Webm, 10, 10, 50).validate().is_ok());
    }

    #[test]
    fn vpx_crf_maps_quality_range() {
        let args = target(ContainerFormat::Webm, 10, 10, 100).codec_args().unwrap();
        let crf = args.iter().position(|a| a == "-crf").unwrap() + 1;
        assert_eq!(args[crf], "0");

        let args = target(ContainerFormat::Webm, 10, 10, 0).codec_args().unwrap();
        let crf = args.iter().position(|a| a == "-crf").unwrap() + 1;
        assert_eq!(args[crf], "63");
    }

    #[test]
    fn still_formats_are_rejected() {
        assert!(target(ContainerFormat::Png, 10, 10, 50).codec_args().is_err());
    }
}
