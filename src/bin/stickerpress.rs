use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stickerpress::{convert, CompressionOptions, Input, LogReporter, Preset};

#[derive(Parser, Debug)]
#[command(name = "stickerpress", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a single file.
    Convert(ConvertArgs),
    /// Convert every supported file under a directory.
    Batch(BatchArgs),
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Input media file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output path. Use stem "none" to discard or "bytes" to measure only;
    /// the suffix may be rewritten to an allowed target format.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    opts: OptionArgs,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Directory scanned recursively for supported inputs.
    #[arg(long = "in-dir")]
    in_dir: PathBuf,

    /// Directory receiving one output per input, named after the input stem.
    #[arg(long = "out-dir")]
    out_dir: PathBuf,

    /// Number of parallel conversion workers.
    #[arg(long, default_value_t = 4)]
    jobs: usize,

    #[command(flatten)]
    opts: OptionArgs,
}

#[derive(Parser, Debug)]
struct OptionArgs {
    /// Platform preset to start from.
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Compression options JSON file; takes precedence over --preset.
    #[arg(long = "options")]
    options_path: Option<PathBuf>,
}

impl OptionArgs {
    fn resolve(&self) -> anyhow::Result<CompressionOptions> {
        let opts = if let Some(path) = &self.options_path {
            let f = File::open(path)
                .with_context(|| format!("open options '{}'", path.display()))?;
            serde_json::from_reader(BufReader::new(f))
                .with_context(|| "parse options JSON")?
        } else if let Some(preset) = self.preset {
            preset.options()
        } else {
            CompressionOptions::default()
        };
        opts.validate()?;
        Ok(opts)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Convert(args) => cmd_convert(args),
        Command::Batch(args) => cmd_batch(args),
    }
}

fn cmd_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let opts = args.opts.resolve()?;
    let result = convert(
        &Input::Path(args.in_path),
        &args.out,
        &opts,
        &LogReporter,
    )?;
    if !result.success {
        anyhow::bail!(
            "conversion of '{}' failed: smallest size {} exceeds the budget",
            result.input_name,
            result.size
        );
    }
    Ok(())
}

struct Task {
    in_path: PathBuf,
    out_path: PathBuf,
}

fn cmd_batch(args: BatchArgs) -> anyhow::Result<()> {
    let opts = args.opts.resolve()?;
    let jobs = args.jobs.max(1);

    let mut inputs = Vec::new();
    collect_inputs(&args.in_dir, &mut inputs)
        .with_context(|| format!("scan '{}'", args.in_dir.display()))?;
    inputs.sort();
    if inputs.is_empty() {
        anyhow::bail!("no supported inputs under '{}'", args.in_dir.display());
    }

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create '{}'", args.out_dir.display()))?;

    let (tx, rx) = mpsc::channel::<Option<Task>>();
    for in_path in inputs {
        let stem = in_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "out".into());
        // The suffix here is a placeholder; the conversion rewrites it to
        // the resolved target format.
        let out_path = args.out_dir.join(format!("{stem}.png"));
        tx.send(Some(Task { in_path, out_path }))?;
    }
    // End sentinel: each worker re-emits it so every sibling sees it too.
    tx.send(None)?;

    let rx = Arc::new(Mutex::new(rx));
    let (done, failed) = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(jobs);
        for _ in 0..jobs {
            let rx = Arc::clone(&rx);
            let tx = tx.clone();
            let opts = &opts;
            handles.push(scope.spawn(move || worker(rx, tx, opts)));
        }
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or((0, 0)))
            .fold((0usize, 0usize), |(d, f), (wd, wf)| (d + wd, f + wf))
    });

    tracing::info!(done, failed, "batch finished");
    if failed > 0 {
        anyhow::bail!("{failed} of {} conversions failed", done + failed);
    }
    Ok(())
}

/// Pull tasks until the end sentinel appears, then pass it on and stop.
/// A failing file is reported and counted; it never aborts siblings.
fn worker(
    rx: Arc<Mutex<mpsc::Receiver<Option<Task>>>>,
    tx: mpsc::Sender<Option<Task>>,
    opts: &CompressionOptions,
) -> (usize, usize) {
    let mut done = 0usize;
    let mut failed = 0usize;
    loop {
        let msg = {
            let guard = match rx.lock() {
                Ok(g) => g,
                Err(_) => break,
            };
            guard.recv()
        };
        match msg {
            Ok(Some(task)) => {
                match convert(&Input::Path(task.in_path.clone()), &task.out_path, opts, &LogReporter) {
                    Ok(result) if result.success => done += 1,
                    Ok(result) => {
                        tracing::warn!(
                            input = %result.input_name,
                            size = result.size,
                            "no compliant result under the size budget"
                        );
                        failed += 1;
                    }
                    Err(e) => {
                        tracing::error!(
                            input = %task.in_path.display(),
                            error = %e,
                            "conversion failed"
                        );
                        failed += 1;
                    }
                }
            }
            Ok(None) => {
                let _ = tx.send(None);
                break;
            }
            Err(_) => break,
        }
    }
    (done, failed)
}

fn collect_inputs(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_inputs(&path, out)?;
        } else if stickerpress::ContainerFormat::from_path(&path).is_some() {
            out.push(path);
        }
    }
    Ok(())
}
