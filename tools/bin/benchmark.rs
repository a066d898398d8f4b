use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use parallel_convolve::config::env::default_workers;
use parallel_convolve::strategy::all_strategies;
use parallel_convolve::{FilterStrategy, GridKind, KernelName, PixelGrid, apply_sequential};

/// Benchmark comparing the four strategies on a synthetic colour image.
///
/// Every strategy goes through the same `FilterStrategy` seam and its output
/// is checked against the sequential pass before the timing is reported.
#[tokio::main]
async fn main() -> Result<()> {
    println!("Parallel Convolution Benchmark");
    println!("═══════════════════════════════════");

    let width = 1024;
    let height = 768;
    let workers = default_workers();
    let rounds = 3;

    println!(
        "Benchmarking: {}x{} colour image, {} distributed workers, {} rounds per kernel",
        width, height, workers, rounds
    );
    println!();

    let grid = Arc::new(synthetic_grid(width, height)?);

    for kernel in KernelName::ALL {
        let reference = apply_sequential(&grid, kernel)?;

        println!("Kernel: {}", kernel);
        println!("───────────");

        let mut baseline = None;
        for strategy in all_strategies(workers) {
            let mut total = Duration::ZERO;
            for _ in 0..rounds {
                let start = Instant::now();
                let output = strategy.apply(Arc::clone(&grid), kernel).await?;
                total += start.elapsed();
                if output != reference {
                    bail!("{} output differs from sequential for {}", strategy.name(), kernel);
                }
            }

            let per_round = total / rounds;
            let baseline = *baseline.get_or_insert(per_round);
            println!(
                "{:<12} {:>9.2} ms per run   {:>5.2}x vs sequential",
                strategy.name(),
                per_round.as_secs_f64() * 1000.0,
                baseline.as_secs_f64() / per_round.as_secs_f64().max(f64::EPSILON)
            );
        }
        println!();
    }

    println!("All strategies matched the sequential output.");
    Ok(())
}

/// Smooth gradients with a repeating checker so every kernel has edges to find.
fn synthetic_grid(width: u32, height: u32) -> Result<PixelGrid> {
    let mut samples = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            let checker = if (x / 16 + y / 16) % 2 == 0 { 40 } else { 0 };
            samples.push(((x * 255 / width.max(1)) as u16).saturating_add(checker).min(255));
            samples.push(((y * 255 / height.max(1)) as u16).saturating_add(checker).min(255));
            samples.push((((x + y) % 256) as u16).saturating_sub(checker));
        }
    }
    Ok(PixelGrid::from_samples(GridKind::Triple, width, height, 255, samples)?)
}
