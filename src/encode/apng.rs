use crate::{
    error::{ConvertError, ConvertResult},
    frame::{Fps, Frame},
};

/// Incremental APNG builder. Frames are pushed one at a time and serialized
/// on `assemble`; `reset` clears the accumulated frames so the assembler can
/// be reused across search iterations without reallocating.
pub struct ApngAssembler {
    width: u32,
    height: u32,
    fps: Fps,
    frames: Vec<Frame>,
}

impl ApngAssembler {
    pub fn create(width: u32, height: u32, fps: Fps) -> ConvertResult<Self> {
        if width == 0 || height == 0 {
            return Err(ConvertError::validation(
                "apng width/height must be non-zero",
            ));
        }
        Ok(Self {
            width,
            height,
            fps,
            frames: Vec::new(),
        })
    }

    pub fn add_frame(&mut self, frame: &Frame) -> ConvertResult<()> {
        if frame.width != self.width || frame.height != self.height {
            return Err(ConvertError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    pub fn reset(&mut self) {
        self.frames.clear();
    }

    /// Serialize the accumulated frames. A single frame yields a plain PNG;
    /// more than one yields an APNG looping forever with a uniform per-frame
    /// delay in milliseconds.
    pub fn assemble(&self) -> ConvertResult<Vec<u8>> {
        if self.frames.is_empty() {
            return Err(ConvertError::encode("cannot assemble apng with no frames"));
        }

        let delay_ms = crate::frame::round_half_up(self.fps.frame_delay_ms()).max(1) as u16;

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            if self.frames.len() > 1 {
                encoder
                    .set_animated(self.frames.len() as u32, 0)
                    .map_err(|e| ConvertError::encode(format!("apng header: {e}")))?;
                encoder
                    .set_frame_delay(delay_ms, 1000)
                    .map_err(|e| ConvertError::encode(format!("apng delay: {e}")))?;
            }
            let mut writer = encoder
                .write_header()
                .map_err(|e| ConvertError::encode(format!("apng header: {e}")))?;
            for frame in &self.frames {
                writer
                    .write_image_data(&frame.data)
                    .map_err(|e| ConvertError::encode(format!("apng frame: {e}")))?;
            }
            writer
                .finish()
                .map_err(|e| ConvertError::encode(format!("apng finish: {e}")))?;
        }
        Ok(out)
    }
}
