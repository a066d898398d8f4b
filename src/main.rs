use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parallel_convolve::config::config::FilterConfig;
use parallel_convolve::error::classify;
use parallel_convolve::{
    ErrorSeverity, FilterError, HasRecoverySuggestion, HasSeverity, KernelName, StrategyMode, io,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Apply 3x3 convolution filters to plain-text PGM/PPM images:
/// - sequential: one pass in raster order
/// - quadrant: four threads, one per image quadrant
/// - fan-out: blur, laplace and sharpen at the same time
/// - distributed: row bands over N workers gathered by a coordinator
#[derive(Parser, Debug)]
#[command(name = "pconv")]
#[command(about = "Parallel 3x3 convolution over PGM/PPM images")]
#[command(long_about = "Apply blur, laplace (edge detection) or sharpen kernels to plain-text
PGM (P2) and PPM (P3) images using one of four execution strategies.
Every strategy produces the same output for the same input and kernel.")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Print the run report as JSON
    #[arg(long, global = true, help = "Print the run report as JSON instead of text")]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show format, dimensions and a corner sample, and write `copy_<name>`
    Info {
        #[arg(required = true, help = "Images to inspect")]
        files: Vec<PathBuf>,
    },
    /// Single-threaded reference pass
    Sequential(FilterArgs),
    /// Four worker threads over fixed quadrants
    Quadrant(FilterArgs),
    /// All three kernels concurrently; writes `_blur`, `_laplace` and `_sharpen` outputs
    FanOut(FilterArgs),
    /// Row bands over N workers, gathered and saved by rank 0
    Distributed(FilterArgs),
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    #[arg(help = "Input image (P2/P3, or any format the image crate decodes)")]
    input: String,

    #[arg(help = "Output path (default: input name with the kernel suffix)")]
    output: Option<String>,

    #[arg(short, long, value_enum, help = "Kernel to apply: blur, laplace, sharpen")]
    kernel: Option<KernelName>,

    #[arg(short, long, help = "Distributed worker count, coordinator included")]
    workers: Option<usize>,

    #[arg(long, help = "Write the distributed metrics report next to the output")]
    metrics: bool,

    #[arg(long, help = "Explicit metrics report path (implies --metrics)")]
    metrics_path: Option<String>,

    #[arg(long, help = "Coordinator receive timeout in milliseconds")]
    timeout_ms: Option<u64>,

    #[arg(long, help = "Barrier wait timeout in milliseconds")]
    sync_timeout_ms: Option<u64>,

    #[arg(long, help = "Log row progress (sequential and fan-out)")]
    progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let (mode, filter) = match args.command {
        Command::Info { files } => return inspect(&files),
        Command::Sequential(filter) => (StrategyMode::Sequential, filter),
        Command::Quadrant(filter) => (StrategyMode::Quadrant, filter),
        Command::FanOut(filter) => (StrategyMode::FanOut, filter),
        Command::Distributed(filter) => (StrategyMode::Distributed, filter),
    };

    let config = build_config(mode, filter, args.json);
    config.validate().map_err(anyhow::Error::msg)?;
    let options = config.to_filter_options();

    match parallel_convolve::run(options).await {
        Ok(report) => {
            if config.json {
                println!("{}", serde_json::to_string_pretty(&report.to_json())?);
            } else {
                print!("{}", report.render());
            }
            Ok(())
        }
        Err(error) => exit_with(error),
    }
}

fn build_config(mode: StrategyMode, filter: FilterArgs, json: bool) -> FilterConfig {
    // Fan-out uses the output as a base name; default it to the input so the
    // three results land next to it.
    let output = filter.output.unwrap_or_else(|| match (mode, filter.kernel) {
        (StrategyMode::FanOut, _) | (_, None) => filter.input.clone(),
        (_, Some(kernel)) => io::suffixed_path(Path::new(&filter.input), kernel.suffix())
            .to_string_lossy()
            .into_owned(),
    });

    let mut config = FilterConfig::new(filter.input, output, mode, filter.kernel);
    config.apply_env_overrides();

    if let Some(workers) = filter.workers {
        config.workers = workers;
    }
    if let Some(timeout) = filter.timeout_ms {
        config.comm_timeout_ms = timeout;
    }
    if let Some(timeout) = filter.sync_timeout_ms {
        config.sync_timeout_ms = timeout;
    }
    config.metrics = filter.metrics;
    config.metrics_path = filter.metrics_path;
    config.progress |= filter.progress;
    config.json = json;
    config
}

/// Raster inspector: describe each file and write a plain copy of it.
fn inspect(files: &[PathBuf]) -> Result<()> {
    for path in files {
        let grid = io::load_grid(path).with_context(|| format!("Failed to inspect {}", path.display()))?;

        println!("{}", path.display());
        println!("─────────────────────");
        print!("{}", io::describe(&grid));

        if io::extension_matches(path, grid.kind()) == Some(false) {
            warn!(
                path = %path.display(),
                kind = %grid.kind(),
                "File extension does not match the image type"
            );
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.pnm".to_string());
        let copy = PathBuf::from(format!("copy_{}", name));
        io::save_grid(&io::clone_grid(&grid), &copy)
            .with_context(|| format!("Failed to write {}", copy.display()))?;
        println!("Copy written to {}", copy.display());
        println!();
    }
    Ok(())
}

fn exit_with(error: FilterError) -> ! {
    let label = match error.severity() {
        ErrorSeverity::Critical => "Fatal error",
        ErrorSeverity::Error => "Error",
    };
    match &error.context().operation {
        Some(operation) => eprintln!("{} in {}: {}", label, operation, error),
        None => eprintln!("{}: {}", label, error),
    }
    if let Some(suggestion) = error.recovery_suggestion() {
        eprintln!("Hint: {}", suggestion);
    } else if classify::is_worker_failure(&error) {
        eprintln!("Hint: no output was written; rerun with RUST_LOG=debug to see each worker");
    }
    std::process::exit(classify::exit_code(&error));
}
