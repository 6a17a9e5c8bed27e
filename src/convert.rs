//! Conversion entry point and the bounded bisection over the fidelity
//! ladder. One call converts one input end-to-end; there is no shared state
//! between concurrent conversions.

use std::{
    borrow::Cow,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    decode, encode,
    error::{ConvertError, ConvertResult},
    formats::{ContainerFamily, ContainerFormat},
    frame::{round_half_up, Fps, Frame},
    gate, ladder,
    options::CompressionOptions,
    probe::{self, SourceDescriptor},
    quant, report::Reporter,
    scratch::Scratch,
    transform,
};

/// What to convert: a file on disk, or bytes not yet materialized (downloaded
/// content) with a logical name carrying the extension.
#[derive(Clone, Debug)]
pub enum Input {
    Path(PathBuf),
    Bytes { name: String, data: Vec<u8> },
}

impl Input {
    pub fn name(&self) -> String {
        match self {
            Self::Path(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string()),
            Self::Bytes { name, .. } => name.clone(),
        }
    }

    fn format(&self) -> ConvertResult<ContainerFormat> {
        let name = self.name();
        ContainerFormat::from_path(Path::new(&name)).ok_or_else(|| {
            ConvertError::validation(format!("unsupported input format: '{name}'"))
        })
    }

    fn read(&self) -> ConvertResult<Cow<'_, [u8]>> {
        match self {
            Self::Path(p) => fs::read(p)
                .map(Cow::Owned)
                .map_err(|e| ConvertError::decode(format!("read '{}': {e}", p.display()))),
            Self::Bytes { data, .. } => Ok(Cow::Borrowed(data)),
        }
    }
}

/// Where the finished bytes ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputPayload {
    /// Output stem was "none": result measured and discarded.
    Discarded,
    /// Output stem was "bytes": result returned in memory.
    Bytes(Vec<u8>),
    /// Result written to this path.
    File(PathBuf),
}

/// The sole externally observable outcome of a conversion.
#[derive(Clone, Debug)]
pub struct ConversionResult {
    pub success: bool,
    pub input_name: String,
    pub output: OutputPayload,
    /// Final byte size; for failures, the smallest size achieved.
    pub size: usize,
    /// Ladder index of the returned candidate, when one exists.
    pub step: Option<usize>,
}

/// Closed-interval bisection state over ladder indices.
/// `0 <= lower <= current <= upper <= steps`; index 0 is maximum fidelity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SearchState {
    pub lower: usize,
    pub current: usize,
    pub upper: usize,
}

pub(crate) enum SearchOutcome {
    Success {
        bytes: Vec<u8>,
        size: usize,
        step: usize,
    },
    Infeasible {
        smallest: usize,
    },
}

/// Drive the bisection. `encode` produces the candidate for the state's
/// `current` index; `measured` observes every (state, size, compliant)
/// triple, in order.
///
/// With no budget a single pass at index 0 runs and always succeeds. With a
/// budget, the kept candidate is the largest compliant size seen, the closest
/// approach to the budget from below. The size surface is not strictly
/// monotonic in the step index, so bisection may miss a better compliant
/// point outside the explored path; the greedy keep rule is the only
/// corrective and is preserved as is.
pub(crate) fn run_search<E, M>(
    steps: usize,
    budget: Option<usize>,
    mut encode: E,
    mut measured: M,
) -> ConvertResult<SearchOutcome>
where
    E: FnMut(&SearchState) -> ConvertResult<Vec<u8>>,
    M: FnMut(&SearchState, usize, bool),
{
    let mut lower = 0usize;
    let mut upper = steps;
    let mut current = match budget {
        None => 0,
        Some(_) => midpoint(lower, upper),
    };

    let mut best: Option<(Vec<u8>, usize, usize)> = None;
    let mut smallest = usize::MAX;

    loop {
        let state = SearchState {
            lower,
            current,
            upper,
        };
        let bytes = encode(&state)?;
        let size = bytes.len();
        smallest = smallest.min(size);

        let compliant = budget.is_none_or(|b| size <= b);
        measured(&state, size, compliant);

        if compliant && best.as_ref().is_none_or(|(_, s, _)| size >= *s) {
            best = Some((bytes, size, current));
        }

        if let Some(b) = budget {
            if upper - lower > 1 {
                if size <= b {
                    upper = current;
                } else {
                    lower = current;
                }
                current = midpoint(lower, upper);
                continue;
            }
        }
        break;
    }

    Ok(match best {
        Some((bytes, size, step)) => SearchOutcome::Success { bytes, size, step },
        None => SearchOutcome::Infeasible { smallest },
    })
}

fn midpoint(lower: usize, upper: usize) -> usize {
    round_half_up((lower + upper) as f64 / 2.0) as usize
}

/// Convert `input` into `out_path`'s format under `options`, reporting
/// progress through `reporter`.
///
/// The output path's stem is special-cased: `"none"` discards the result
/// after measuring it, `"bytes"` returns it in the result payload instead of
/// writing a file. When the path's suffix is not an allowed target format,
/// the first allowed video format is used for animated sources (or when
/// `fake_vid` is set) and the first allowed image format otherwise.
pub fn convert(
    input: &Input,
    out_path: &Path,
    options: &CompressionOptions,
    reporter: &dyn Reporter,
) -> ConvertResult<ConversionResult> {
    options.validate()?;

    let in_name = input.name();
    let in_format = input.format()?;
    let bytes = input.read()?;

    let mut scratch = Scratch::new(options.cache_dir.as_deref())?;

    // ffprobe and ffmpeg need a seekable file for the video family.
    let video_path = match (in_format.family(), input) {
        (ContainerFamily::Video, Input::Path(p)) => Some(p.clone()),
        (ContainerFamily::Video, Input::Bytes { .. }) => {
            Some(scratch.materialize(&bytes, in_format.suffix())?)
        }
        _ => None,
    };

    let desc = probe::probe(in_format, &bytes, video_path.as_deref())?;
    let target = resolve_target(out_path, &desc, options);
    let out_name = out_path
        .with_extension(target.suffix())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    reporter.message(&format!("[I] Start compressing {in_name} -> {out_name}"));

    if gate::check_compatible(&desc, bytes.len(), options) {
        // The copy keeps the input's own container, which may differ from
        // the resolved target when another allowed format matched.
        let copy_name = out_path
            .with_extension(desc.format.suffix())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        reporter.message(&format!(
            "[S] Compatible file found, skip compress and just copy {in_name} -> {copy_name}"
        ));
        let size = bytes.len();
        let output = deliver(out_path, desc.format, bytes.into_owned())?;
        reporter.bar_advance();
        return Ok(ConversionResult {
            success: true,
            input_name: in_name,
            output,
            size,
            step: None,
        });
    }

    let frames_raw = decode::decode_frames(&desc, &bytes, video_path.as_deref())?;
    drop(bytes);

    let budget = if desc.is_animated() {
        options.size_max_vid
    } else {
        options.size_max_img
    };
    let steps_list = ladder::build_ladder(options);

    let outcome = run_search(
        options.steps,
        budget,
        |state| {
            let params = &steps_list[state.current];
            reporter.message(&format!(
                "[C] Compressing {in_name} -> {out_name} res={}x{} quality={} fps={} color={} (step {}-{}-{})",
                opt_str(params.res_w),
                opt_str(params.res_h),
                opt_str(params.quality),
                opt_str(params.fps),
                opt_str(params.colors),
                state.lower,
                state.current,
                state.upper,
            ));
            encode_candidate(&frames_raw, &desc, params, target, options, &mut scratch)
        },
        |state, size, compliant| {
            if let Some(budget) = budget {
                if state.upper - state.lower > 1 {
                    let sign = if compliant { '<' } else { '>' };
                    reporter.message(&format!(
                        "[{sign}] Compressed {in_name} -> {out_name} but size {size} {sign} limit {budget}, recompressing"
                    ));
                }
            }
        },
    )?;

    reporter.bar_advance();
    match outcome {
        SearchOutcome::Success { bytes, size, step } => {
            reporter.message(&format!(
                "[S] Compressed {in_name} -> {out_name} size {size} (step {step})"
            ));
            let output = deliver(out_path, target, bytes)?;
            Ok(ConversionResult {
                success: true,
                input_name: in_name,
                output,
                size,
                step: Some(step),
            })
        }
        SearchOutcome::Infeasible { smallest } => {
            reporter.message(&format!(
                "[F] Failed Compression {in_name} -> {out_name}, smallest size {smallest} exceeds limit {}",
                budget.unwrap_or(0)
            ));
            Ok(ConversionResult {
                success: false,
                input_name: in_name,
                output: OutputPayload::Discarded,
                size: smallest,
                step: None,
            })
        }
    }
}

/// One transform-and-encode pass at a single ladder row.
fn encode_candidate(
    frames_raw: &[Frame],
    desc: &SourceDescriptor,
    params: &ladder::StepParams,
    target: ContainerFormat,
    options: &CompressionOptions,
    scratch: &mut Scratch,
) -> ConvertResult<Vec<u8>> {
    let mut fps = Fps::new(1, 1)?;
    let mut frames: Vec<Frame>;

    // Without a row fps (no fps bounds configured) the output is a still,
    // even for an animated source.
    let animated = desc.is_animated()
        && target.supports_animation()
        && frames_raw.len() > 1
        && params.fps.is_some();
    if animated {
        let fps_target = params
            .fps
            .map(|f| (f as f64).min(desc.fps))
            .unwrap_or(desc.fps);
        fps = transform::fix_fps(
            fps_target,
            target,
            options.fps_min.map(f64::from),
            options.fps_max.map(f64::from),
        )?;
        frames = transform::resample_frames(
            frames_raw,
            desc.fps,
            fps.as_f64(),
            options.duration_min,
            options.duration_max,
        )?;
    } else {
        frames = vec![frames_raw[0].clone()];
    }

    let res_w = params.res_w.unwrap_or(desc.width);
    let res_h = params.res_h.unwrap_or(desc.height);
    frames = transform::resize_frames(&frames, res_w, res_h, options.scale_filter)?;

    let quality = params
        .quality
        .or(options.quality_max)
        .unwrap_or(95);

    if let Some(colors) = params.colors.filter(|&c| c <= 256) {
        if uses_palette(target) {
            quant::quantize_frames(
                &mut frames,
                options.quantize_method,
                colors,
                quality,
                options.quality_min.unwrap_or(0),
                options.quality_max.unwrap_or(100),
            )?;
        }
    }

    encode::encode_frames(
        &frames,
        &encode::EncodeParams {
            format: target,
            fps,
            quality,
        },
        scratch,
    )
}

fn uses_palette(format: ContainerFormat) -> bool {
    matches!(
        format,
        ContainerFormat::Png | ContainerFormat::Apng | ContainerFormat::Gif | ContainerFormat::Webp
    )
}

fn resolve_target(
    out_path: &Path,
    desc: &SourceDescriptor,
    options: &CompressionOptions,
) -> ContainerFormat {
    let allowed = options.allowed_formats();
    if let Some(requested) = ContainerFormat::from_path(out_path) {
        if allowed.contains(&requested) {
            return requested;
        }
    }
    let want_video = desc.is_animated() || options.fake_vid;
    let list = if want_video {
        &options.format_vid
    } else {
        &options.format_img
    };
    list.first().copied().unwrap_or(ContainerFormat::Png)
}

fn deliver(
    out_path: &Path,
    target: ContainerFormat,
    bytes: Vec<u8>,
) -> ConvertResult<OutputPayload> {
    let stem = out_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.as_str() {
        "none" => Ok(OutputPayload::Discarded),
        "bytes" => Ok(OutputPayload::Bytes(bytes)),
        _ => {
            let path = out_path.with_extension(target.suffix());
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|e| {
                        ConvertError::encode(format!(
                            "create output directory '{}': {e}",
                            parent.display()
                        ))
                    })?;
                }
            }
            fs::write(&path, &bytes)
                .map_err(|e| ConvertError::encode(format!("write '{}': {e}", path.display())))?;
            Ok(OutputPayload::File(path))
        }
    }
}

fn opt_str(v: Option<u32>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(n: usize) -> Vec<u8> {
        vec![0u8; n]
    }

    #[test]
    fn no_budget_runs_one_pass_at_max_fidelity() {
        let mut probed = Vec::new();
        let outcome = run_search(
            10,
            None,
            |state| {
                probed.push(state.current);
                Ok(payload(123))
            },
            |_, _, _| {},
        )
        .unwrap();
        assert_eq!(probed, vec![0]);
        match outcome {
            SearchOutcome::Success { size, step, .. } => {
                assert_eq!(size, 123);
                assert_eq!(step, 0);
            }
            SearchOutcome::Infeasible { .. } => panic!("must succeed without budget"),
        }
    }

    #[test]
    fn bisection_follows_scenario_with_mixed_sizes() {
        // steps=10, budget 500000. Index 5 encodes oversized, the next probe
        // (index 8) fits, and the search keeps narrowing between them.
        let mut probed = Vec::new();
        let outcome = run_search(
            10,
            Some(500_000),
            |state| {
                probed.push(state.current);
                Ok(match state.current {
                    5 => payload(600_000),
                    8 => payload(300_000),
                    6 | 7 => payload(520_000),
                    _ => payload(100_000),
                })
            },
            |_, _, _| {},
        )
        .unwrap();

        assert_eq!(probed[0], 5);
        assert_eq!(probed[1], 8);
        // After lower=5, upper=8 the midpoint is 7 (half rounds up).
        assert_eq!(probed[2], 7);
        match outcome {
            SearchOutcome::Success { size, step, .. } => {
                assert_eq!(size, 300_000);
                assert_eq!(step, 8);
            }
            SearchOutcome::Infeasible { .. } => panic!("a compliant point exists"),
        }
    }

    #[test]
    fn success_size_never_exceeds_budget() {
        let budget = 1000;
        let outcome = run_search(
            7,
            Some(budget),
            |state| Ok(payload(5000 - state.current * 600)),
            |_, _, _| {},
        )
        .unwrap();
        if let SearchOutcome::Success { size, .. } = outcome {
            assert!(size <= budget);
        }
    }

    #[test]
    fn iteration_count_is_logarithmic() {
        for steps in [1usize, 2, 5, 10, 31, 100] {
            let mut count = 0usize;
            let _ = run_search(
                steps,
                Some(10),
                |state| {
                    count += 1;
                    // Worst case: every probe oversized, narrowing one way.
                    Ok(payload(100 + state.current))
                },
                |_, _, _| {},
            )
            .unwrap();
            let bound = ((steps + 1) as f64).log2().ceil() as usize + 1;
            assert!(
                count <= bound,
                "steps={steps}: {count} probes > bound {bound}"
            );
        }
    }

    #[test]
    fn infeasible_reports_smallest_size_seen() {
        let outcome = run_search(
            4,
            Some(10),
            |state| Ok(payload(100 - state.current)),
            |_, _, _| {},
        )
        .unwrap();
        match outcome {
            SearchOutcome::Infeasible { smallest } => assert_eq!(smallest, 96),
            SearchOutcome::Success { .. } => panic!("nothing fits a budget of 10"),
        }
    }

    #[test]
    fn greedy_rule_keeps_largest_compliant_candidate() {
        // Index 2 fits at 800 and the later probe at index 1 also fits but
        // is smaller; the earlier, closer-to-budget candidate is kept.
        let outcome = run_search(
            4,
            Some(1000),
            |state| {
                Ok(match state.current {
                    2 => payload(800),
                    1 => payload(600),
                    _ => payload(2000),
                })
            },
            |_, _, _| {},
        )
        .unwrap();
        match outcome {
            SearchOutcome::Success { size, step, .. } => {
                assert_eq!(size, 800);
                assert_eq!(step, 2);
            }
            SearchOutcome::Infeasible { .. } => panic!("index 2 fits"),
        }
    }

    #[test]
    fn target_resolution_prefers_requested_allowed_suffix() {
        let desc = SourceDescriptor {
            format: ContainerFormat::Png,
            width: 10,
            height: 10,
            frames: 1,
            fps: 0.0,
            duration_ms: 0.0,
            pix_fmt: None,
            codec: None,
        };
        let mut opts = CompressionOptions {
            format_img: vec![ContainerFormat::Png, ContainerFormat::Webp],
            format_vid: vec![ContainerFormat::Webm],
            ..CompressionOptions::default()
        };

        let webp = resolve_target(Path::new("out.webp"), &desc, &opts);
        assert_eq!(webp, ContainerFormat::Webp);

        // Disallowed suffix falls back to the image list for a still input.
        let fallback = resolve_target(Path::new("out.gif"), &desc, &opts);
        assert_eq!(fallback, ContainerFormat::Png);

        // fake_vid forces the video list even for stills.
        opts.fake_vid = true;
        let faked = resolve_target(Path::new("out.gif"), &desc, &opts);
        assert_eq!(faked, ContainerFormat::Webm);
    }

    #[test]
    fn special_stems_suppress_file_output() {
        let discarded = deliver(Path::new("none.png"), ContainerFormat::Png, vec![1]).unwrap();
        assert_eq!(discarded, OutputPayload::Discarded);

        let bytes = deliver(Path::new("bytes.png"), ContainerFormat::Png, vec![1, 2]).unwrap();
        assert_eq!(bytes, OutputPayload::Bytes(vec![1, 2]));
    }
}
