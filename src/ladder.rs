use crate::{frame::round_half_up, options::CompressionOptions};

/// One row of the fidelity ladder. `None` means the dimension is
/// unconstrained and gets resolved from the source's native value later.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepParams {
    pub res_w: Option<u32>,
    pub res_h: Option<u32>,
    pub quality: Option<u32>,
    pub fps: Option<u32>,
    pub colors: Option<u32>,
}

/// Value of one dimension at ladder position `step`, where `step == steps` is
/// the configured max and `step == 0` the configured min.
///
/// `power` shapes the curve: 1 is linear, smaller pushes the drop toward the
/// low-fidelity end (the dimension is held near max for longer). `even` bumps
/// odd results up by one; codecs that subsample chroma need even dimensions.
pub fn step_value(
    max: Option<u32>,
    min: Option<u32>,
    step: usize,
    steps: usize,
    power: f64,
    even: bool,
) -> Option<u32> {
    let (max, min) = (max?, min?);

    let factor = if step > 0 {
        (step as f64 / steps as f64).powf(power)
    } else {
        0.0
    };

    let v = round_half_up(f64::from(max - min) * factor + f64::from(min)) as u32;
    if even && v % 2 == 1 {
        Some(v + 1)
    } else {
        Some(v)
    }
}

/// Build the full ladder: `steps + 1` rows, row 0 at maximum fidelity and row
/// `steps` at minimum fidelity. Total over all valid options.
pub fn build_ladder(opts: &CompressionOptions) -> Vec<StepParams> {
    let steps = opts.steps;
    (0..=steps)
        .rev()
        .map(|step| StepParams {
            res_w: step_value(opts.res_w_max, opts.res_w_min, step, steps, opts.res_power, true),
            res_h: step_value(opts.res_h_max, opts.res_h_min, step, steps, opts.res_power, true),
            quality: step_value(
                opts.quality_max,
                opts.quality_min,
                step,
                steps,
                opts.quality_power,
                false,
            ),
            fps: step_value(opts.fps_max, opts.fps_min, step, steps, opts.fps_power, false),
            colors: step_value(
                opts.color_max,
                opts.color_min,
                step,
                steps,
                opts.color_power,
                false,
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_midpoint_and_endpoints() {
        assert_eq!(step_value(Some(100), Some(0), 5, 10, 1.0, false), Some(50));
        assert_eq!(step_value(Some(100), Some(0), 0, 10, 1.0, false), Some(0));
        assert_eq!(step_value(Some(100), Some(0), 10, 10, 1.0, false), Some(100));
    }

    #[test]
    fn even_flag_bumps_odd_results() {
        // 100 * 0.55 = 55, bumped to 56.
        assert_eq!(step_value(Some(100), Some(0), 11, 20, 1.0, true), Some(56));
        assert_eq!(step_value(Some(100), Some(0), 11, 20, 1.0, false), Some(55));
    }

    #[test]
    fn missing_bound_means_unconstrained() {
        assert_eq!(step_value(None, Some(0), 5, 10, 1.0, false), None);
        assert_eq!(step_value(Some(100), None, 5, 10, 1.0, false), None);
    }

    #[test]
    fn low_power_holds_value_high_longer() {
        let linear = step_value(Some(100), Some(0), 3, 10, 1.0, false).unwrap();
        let gentle = step_value(Some(100), Some(0), 3, 10, 0.3, false).unwrap();
        assert!(gentle > linear);
    }

    #[test]
    fn ladder_shape_and_endpoints() {
        let opts = CompressionOptions {
            steps: 8,
            res_w_min: Some(256),
            res_w_max: Some(512),
            res_h_min: Some(256),
            res_h_max: Some(512),
            quality_min: Some(10),
            quality_max: Some(95),
            fps_min: Some(5),
            fps_max: Some(30),
            ..Default::default()
        };
        let ladder = build_ladder(&opts);
        assert_eq!(ladder.len(), 9);

        let top = ladder.first().unwrap();
        assert_eq!(top.res_w, Some(512));
        assert_eq!(top.quality, Some(95));
        assert_eq!(top.fps, Some(30));

        let bottom = ladder.last().unwrap();
        assert_eq!(bottom.res_w, Some(256));
        assert_eq!(bottom.quality, Some(10));
        assert_eq!(bottom.fps, Some(5));

        // Color bounds were not configured, so every row leaves them out.
        assert!(ladder.iter().all(|p| p.colors.is_none()));
    }
}
