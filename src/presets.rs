//! Named option bundles for the sticker platforms this tool is most often
//! pointed at. Each preset is a complete [`CompressionOptions`]; callers can
//! still override individual fields afterwards.

use crate::{
    formats::ContainerFormat,
    options::{CompressionOptions, QuantizeMethod, ScaleFilter},
};

const KIB: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Telegram sticker: 512px canvas, webm video stickers capped at 256 KiB
    /// and 3 seconds.
    TelegramSticker,
    /// Telegram custom emoji: 100px canvas, 64 KiB video cap.
    TelegramEmoji,
    /// Signal sticker: 512px canvas, 300 KiB, apng animations.
    Signal,
    /// WhatsApp sticker: 512px webp, 100 KiB still / 500 KiB animated.
    Whatsapp,
}

impl Preset {
    pub fn options(self) -> CompressionOptions {
        let base = CompressionOptions {
            res_w_min: Some(256),
            res_h_min: Some(256),
            quality_min: Some(10),
            quality_max: Some(95),
            fps_min: Some(1),
            fps_max: Some(30),
            color_min: Some(32),
            color_max: Some(256),
            fps_power: 0.5,
            steps: 16,
            scale_filter: ScaleFilter::Lanczos,
            quantize_method: QuantizeMethod::Adaptive,
            ..CompressionOptions::default()
        };

        match self {
            Preset::TelegramSticker => CompressionOptions {
                size_max_img: Some(512 * KIB),
                size_max_vid: Some(256 * KIB),
                format_img: vec![ContainerFormat::Png, ContainerFormat::Webp],
                format_vid: vec![ContainerFormat::Webm],
                res_w_max: Some(512),
                res_h_max: Some(512),
                duration_max: Some(3000),
                ..base
            },
            Preset::TelegramEmoji => CompressionOptions {
                size_max_img: Some(128 * KIB),
                size_max_vid: Some(64 * KIB),
                format_img: vec![ContainerFormat::Png, ContainerFormat::Webp],
                format_vid: vec![ContainerFormat::Webm],
                res_w_min: Some(100),
                res_h_min: Some(100),
                res_w_max: Some(100),
                res_h_max: Some(100),
                duration_max: Some(3000),
                ..base
            },
            Preset::Signal => CompressionOptions {
                size_max_img: Some(300 * KIB),
                size_max_vid: Some(300 * KIB),
                format_img: vec![ContainerFormat::Png, ContainerFormat::Webp],
                format_vid: vec![ContainerFormat::Apng],
                res_w_max: Some(512),
                res_h_max: Some(512),
                ..base
            },
            Preset::Whatsapp => CompressionOptions {
                size_max_img: Some(100 * KIB),
                size_max_vid: Some(500 * KIB),
                format_img: vec![ContainerFormat::Webp],
                format_vid: vec![ContainerFormat::Webp],
                res_w_min: Some(512),
                res_h_min: Some(512),
                res_w_max: Some(512),
                res_h_max: Some(512),
                ..base
            },
        }
    }
}
