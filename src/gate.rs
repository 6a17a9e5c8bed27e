use crate::{options::CompressionOptions, probe::SourceDescriptor};

/// True when the input already satisfies every constraint and can be passed
/// through byte-identical, skipping decode and search entirely. The format
/// predicate accepts the input's container matching *any* allowed target
/// format, still or animated, not just the one resolved for this call.
///
/// Static inputs trivially satisfy the fps and duration constraints.
pub fn check_compatible(
    desc: &SourceDescriptor,
    size: usize,
    options: &CompressionOptions,
) -> bool {
    if !options.allowed_formats().contains(&desc.format) {
        return false;
    }

    let budget = if desc.is_animated() {
        options.size_max_vid
    } else {
        options.size_max_img
    };
    if let Some(budget) = budget {
        if size > budget {
            return false;
        }
    }

    if !within(desc.width, options.res_w_min, options.res_w_max)
        || !within(desc.height, options.res_h_min, options.res_h_max)
    {
        return false;
    }

    if desc.is_animated() {
        if let Some(min) = options.fps_min {
            if desc.fps < min as f64 {
                return false;
            }
        }
        if let Some(max) = options.fps_max {
            if desc.fps > max as f64 {
                return false;
            }
        }
        if let Some(min) = options.duration_min {
            if desc.duration_ms < min as f64 {
                return false;
            }
        }
        if let Some(max) = options.duration_max {
            if desc.duration_ms > max as f64 {
                return false;
            }
        }
    }

    true
}

fn within(value: u32, min: Option<u32>, max: Option<u32>) -> bool {
    min.is_none_or(|m| value >= m) && max.is_none_or(|m| value <= m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::ContainerFormat;

    fn still_png(width: u32, height: u32) -> SourceDescriptor {
        SourceDescriptor {
            format: ContainerFormat::Png,
            width,
            height,
            frames: 1,
            fps: 0.0,
            duration_ms: 0.0,
            pix_fmt: None,
            codec: None,
        }
    }

    fn animated_gif(fps: f64, duration_ms: f64) -> SourceDescriptor {
        SourceDescriptor {
            format: ContainerFormat::Gif,
            width: 100,
            height: 100,
            frames: 10,
            fps,
            duration_ms,
            pix_fmt: None,
            codec: None,
        }
    }

    fn options() -> CompressionOptions {
        CompressionOptions {
            size_max_img: Some(1000),
            size_max_vid: Some(2000),
            format_img: vec![ContainerFormat::Png],
            format_vid: vec![ContainerFormat::Gif],
            res_w_min: Some(50),
            res_w_max: Some(512),
            res_h_min: Some(50),
            res_h_max: Some(512),
            fps_min: Some(5),
            fps_max: Some(30),
            duration_min: Some(100),
            duration_max: Some(3000),
            ..CompressionOptions::default()
        }
    }

    #[test]
    fn matching_still_within_all_bounds_passes() {
        let desc = still_png(100, 100);
        assert!(check_compatible(&desc, 500, &options()));
    }

    #[test]
    fn disallowed_format_fails() {
        let mut desc = still_png(100, 100);
        desc.format = ContainerFormat::Jpg;
        assert!(!check_compatible(&desc, 500, &options()));
    }

    #[test]
    fn any_allowed_format_passes_not_just_the_resolved_target() {
        // A webp input is compatible as soon as webp appears anywhere in the
        // allowed set, even when it is not the preferred still format.
        let mut desc = still_png(100, 100);
        desc.format = ContainerFormat::Webp;
        let opts = CompressionOptions {
            format_img: vec![ContainerFormat::Png, ContainerFormat::Webp],
            ..options()
        };
        assert!(check_compatible(&desc, 500, &opts));
        assert!(!check_compatible(&desc, 500, &options()));
    }

    #[test]
    fn oversized_bytes_fail_against_the_right_budget() {
        let still = still_png(100, 100);
        assert!(!check_compatible(&still, 1500, &options()));

        // An animated input of the same byte size passes: the video budget
        // is larger.
        let anim = animated_gif(10.0, 1000.0);
        assert!(check_compatible(&anim, 1500, &options()));
    }

    #[test]
    fn resolution_out_of_range_fails() {
        assert!(!check_compatible(&still_png(600, 100), 500, &options()));
        assert!(!check_compatible(&still_png(100, 20), 500, &options()));
    }

    #[test]
    fn animated_checks_fps_and_duration() {
        assert!(check_compatible(&animated_gif(10.0, 1000.0), 500, &options()));
        assert!(!check_compatible(&animated_gif(60.0, 1000.0), 500, &options()));
        assert!(!check_compatible(&animated_gif(10.0, 5000.0), 500, &options()));
    }

    #[test]
    fn static_input_ignores_fps_and_duration_bounds() {
        // fps 0 and duration 0 sit below the configured minimums but a still
        // image is exempt from both checks.
        let desc = still_png(100, 100);
        assert!(check_compatible(&desc, 500, &options()));
    }

    #[test]
    fn no_bounds_means_everything_passes() {
        let desc = animated_gif(60.0, 60000.0);
        let opts = CompressionOptions {
            format_vid: vec![ContainerFormat::Gif],
            ..CompressionOptions::default()
        };
        assert!(check_compatible(&desc, usize::MAX, &opts));
    }
}
