//! # Distributed Row Bands
//!
//! A message-passing model of a multi-process row-partitioned filter, run as
//! one tokio task per rank inside a single process. Ranks share nothing but a
//! [`Communicator`]: a barrier and, for every non-coordinator rank, a bounded
//! channel to rank 0.
//!
//! ## Protocol
//!
//! 1. Every rank loads the complete input through its [`GridSource`].
//! 2. Rank `i` of `N` owns rows `[i * (h / N), (i + 1) * (h / N))`; the last
//!    rank also takes the remainder.
//! 3. Barrier, then each rank convolves its band into a local buffer.
//! 4. Barrier, then the combination phase: workers send their rows, the
//!    coordinator seeds the final grid with its own band and receives every
//!    other band in rank order, writing each row at its absolute position.
//! 5. Only the coordinator persists the result, then the metrics report. If
//!    the report cannot be written the saved result is removed again.
//!
//! ## Failure
//!
//! Barrier waits are bounded by the synchronization timeout and every receive
//! by the communication timeout. A timeout, a closed channel or a malformed
//! row is a fatal `Communication` error. Nothing is retried, and if any rank
//! fails the whole run fails, even when the coordinator itself succeeded.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use conv_kernel::{ConvolutionOp, KernelName, PixelGrid, Region, Sample, row_band};
use futures_util::future::join_all;
use tokio::sync::{Barrier, mpsc};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::core::performance_analysis::DistributedMetrics;
use crate::error::{FilterError, FilterResult};
use crate::io::{clone_grid, load_grid, save_grid};

use super::FilterStrategy;

/// Rank of the coordinator.
pub const COORDINATOR: usize = 0;

/// Tuning for one distributed run.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributedOptions {
    /// Number of ranks, coordinator included.
    pub workers: usize,
    /// Bound on each coordinator receive.
    pub comm_timeout: Duration,
    /// Bound on each barrier wait.
    pub sync_timeout: Duration,
    /// Rows buffered per worker channel.
    pub channel_capacity: usize,
    /// Where the coordinator saves the result, if anywhere.
    pub output: Option<PathBuf>,
    /// Where the coordinator writes the metrics report, if anywhere.
    pub metrics_path: Option<PathBuf>,
}

impl Default for DistributedOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            comm_timeout: Duration::from_secs(5),
            sync_timeout: Duration::from_secs(60),
            channel_capacity: 64,
            output: None,
            metrics_path: None,
        }
    }
}

/// One filtered row, sent from a worker to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandRow {
    pub rank: usize,
    pub y: u32,
    pub samples: Vec<Sample>,
}

/// How a rank obtains its own copy of the input.
#[async_trait]
pub trait GridSource: Send + Sync {
    async fn load(&self, rank: usize) -> FilterResult<PixelGrid>;

    /// Label used in logs and the metrics report.
    fn describe(&self) -> String;
}

/// Hands every rank a deep copy of an in-memory grid.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    grid: Arc<PixelGrid>,
}

impl InMemorySource {
    pub fn new(grid: Arc<PixelGrid>) -> Self {
        Self { grid }
    }
}

#[async_trait]
impl GridSource for InMemorySource {
    async fn load(&self, _rank: usize) -> FilterResult<PixelGrid> {
        Ok(clone_grid(&self.grid))
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

/// Re-reads the input file once per rank.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl GridSource for FileSource {
    async fn load(&self, rank: usize) -> FilterResult<PixelGrid> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || load_grid(path))
            .await
            .map_err(|e| FilterError::worker_join(format!("rank {} loader", rank), e.to_string()))?
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A rank's view of the world.
#[derive(Debug)]
pub struct Communicator {
    rank: usize,
    size: usize,
    barrier: Arc<Barrier>,
    sync_timeout: Duration,
    to_coordinator: Option<mpsc::Sender<BandRow>>,
}

impl Communicator {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR
    }

    /// Wait until every rank reaches the same barrier.
    pub async fn barrier(&self, label: &str) -> FilterResult<()> {
        timeout(self.sync_timeout, self.barrier.wait())
            .await
            .map_err(|_| {
                FilterError::communication(
                    Some(self.rank),
                    format!(
                        "barrier '{}' timed out after {}ms",
                        label,
                        self.sync_timeout.as_millis()
                    ),
                )
                .with_recovery_suggestion("Another rank failed or is slower than the sync timeout")
            })?;
        debug!(rank = self.rank, label, "Passed barrier");
        Ok(())
    }

    /// Send one row to the coordinator. Blocks while the channel is full.
    pub async fn send_row(&self, y: u32, samples: Vec<Sample>) -> FilterResult<()> {
        let sender = self.to_coordinator.as_ref().ok_or_else(|| {
            FilterError::communication(Some(self.rank), "coordinator has no outbound channel")
        })?;
        sender
            .send(BandRow {
                rank: self.rank,
                y,
                samples,
            })
            .await
            .map_err(|_| FilterError::communication(Some(COORDINATOR), "coordinator hung up"))
    }
}

/// Coordinator-side receivers, one per worker, in rank order.
#[derive(Debug)]
pub struct Gather {
    receivers: Vec<(usize, mpsc::Receiver<BandRow>)>,
    comm_timeout: Duration,
}

impl Gather {
    /// Receive `band` from `rank` into `target`, validating every row.
    async fn receive_band(
        &mut self,
        index: usize,
        band: Region,
        target: &mut PixelGrid,
    ) -> FilterResult<()> {
        let comm_timeout = self.comm_timeout;
        let (rank, receiver) = &mut self.receivers[index];
        let rank = *rank;
        let row_len = target.row_len();

        for expected_y in band.start_y..band.end_y {
            let row = match timeout(comm_timeout, receiver.recv()).await {
                Err(_) => {
                    return Err(FilterError::communication(
                        Some(rank),
                        format!(
                            "receive of row {} timed out after {}ms",
                            expected_y,
                            comm_timeout.as_millis()
                        ),
                    ));
                }
                Ok(None) => {
                    return Err(FilterError::communication(
                        Some(rank),
                        format!("channel closed before row {}", expected_y),
                    ));
                }
                Ok(Some(row)) => row,
            };
            if row.rank != rank || row.y != expected_y || row.samples.len() != row_len {
                return Err(FilterError::communication(
                    Some(rank),
                    format!(
                        "unexpected row from rank {} (y {}, {} samples), expected y {} with {} samples",
                        row.rank,
                        row.y,
                        row.samples.len(),
                        expected_y,
                        row_len
                    ),
                ));
            }
            target.set_row(row.y, &row.samples)?;
        }
        Ok(())
    }
}

/// Build communicators for `size` ranks plus the coordinator's gather side.
pub fn create_world(
    size: usize,
    options: &DistributedOptions,
) -> FilterResult<(Vec<Communicator>, Gather)> {
    if size == 0 {
        return Err(FilterError::validation("workers", "must be at least 1", "0"));
    }
    let barrier = Arc::new(Barrier::new(size));
    let mut communicators = Vec::with_capacity(size);
    let mut receivers = Vec::with_capacity(size.saturating_sub(1));

    for rank in 0..size {
        let to_coordinator = if rank == COORDINATOR {
            None
        } else {
            let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
            receivers.push((rank, rx));
            Some(tx)
        };
        communicators.push(Communicator {
            rank,
            size,
            barrier: Arc::clone(&barrier),
            sync_timeout: options.sync_timeout,
            to_coordinator,
        });
    }

    Ok((
        communicators,
        Gather {
            receivers,
            comm_timeout: options.comm_timeout,
        },
    ))
}

/// Result of a completed run, as seen by the coordinator.
#[derive(Debug, Clone)]
pub struct DistributedOutcome {
    pub grid: PixelGrid,
    pub metrics: DistributedMetrics,
}

enum RankOutcome {
    Coordinator(Box<DistributedOutcome>),
    Worker,
}

fn compute_band(grid: &PixelGrid, kernel: KernelName, band: Region) -> Vec<Vec<Sample>> {
    let op = ConvolutionOp::new(grid, kernel.kernel());
    (band.start_y..band.end_y)
        .map(|y| {
            let mut row = Vec::with_capacity(grid.row_len());
            op.fill_row(y, &mut row);
            row
        })
        .collect()
}

async fn run_rank(
    comm: Communicator,
    source: Arc<dyn GridSource>,
    kernel: KernelName,
    gather: Option<Gather>,
    options: Arc<DistributedOptions>,
) -> FilterResult<RankOutcome> {
    let rank = comm.rank();
    let started = Instant::now();
    let grid = Arc::new(source.load(rank).await?);
    let band = row_band(grid.width(), grid.height(), comm.size(), rank)?;
    debug!(rank, %band, "Rank loaded input");

    comm.barrier("pre-compute").await?;

    let compute_started = Instant::now();
    let rows = {
        let grid = Arc::clone(&grid);
        tokio::task::spawn_blocking(move || compute_band(&grid, kernel, band))
            .await
            .map_err(|e| FilterError::worker_join(format!("rank {}", rank), e.to_string()))?
    };
    let computation = compute_started.elapsed();
    debug!(
        rank,
        rows = rows.len(),
        elapsed_ms = computation.as_secs_f64() * 1000.0,
        "Band computed"
    );

    comm.barrier("post-compute").await?;

    let Some(mut gather) = gather else {
        for (y, samples) in (band.start_y..band.end_y).zip(rows) {
            comm.send_row(y, samples).await?;
        }
        debug!(rank, "Band sent");
        return Ok(RankOutcome::Worker);
    };

    let mut result = clone_grid(&grid);
    for (y, samples) in (band.start_y..band.end_y).zip(&rows) {
        result.set_row(y, samples)?;
    }
    for index in 0..gather.receivers.len() {
        let worker = gather.receivers[index].0;
        let worker_band = row_band(grid.width(), grid.height(), comm.size(), worker)?;
        gather.receive_band(index, worker_band, &mut result).await?;
        debug!(rank = worker, %worker_band, "Band received");
    }

    if let Some(path) = &options.output {
        save_grid(&result, path)?;
    }
    let total = started.elapsed();

    let metrics = DistributedMetrics {
        filter: kernel,
        input: source.describe(),
        output: options
            .output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string()),
        workers: comm.size(),
        width: grid.width(),
        height: grid.height(),
        total,
        computation,
    };

    if let Some(path) = &options.metrics_path {
        if let Err(error) = metrics.write_report(path) {
            if let Some(output) = &options.output {
                let _ = std::fs::remove_file(output);
            }
            return Err(error);
        }
        info!(path = %path.display(), "Metrics report written");
    }

    Ok(RankOutcome::Coordinator(Box::new(DistributedOutcome {
        grid: result,
        metrics,
    })))
}

/// Row-band strategy over `options.workers` ranks.
#[derive(Debug, Clone, Default)]
pub struct DistributedRowStrategy {
    options: DistributedOptions,
}

impl DistributedRowStrategy {
    pub fn new(options: DistributedOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DistributedOptions {
        &self.options
    }

    /// Launch every rank and wait for all of them.
    pub async fn run(
        &self,
        source: Arc<dyn GridSource>,
        kernel: KernelName,
    ) -> FilterResult<DistributedOutcome> {
        let size = self.options.workers;
        let (communicators, gather) = create_world(size, &self.options)?;
        let options = Arc::new(self.options.clone());
        info!(workers = size, kernel = %kernel, input = %source.describe(), "Starting distributed run");

        let mut gather = Some(gather);
        let handles: Vec<_> = communicators
            .into_iter()
            .map(|comm| {
                let gather = if comm.is_coordinator() { gather.take() } else { None };
                tokio::spawn(run_rank(
                    comm,
                    Arc::clone(&source),
                    kernel,
                    gather,
                    Arc::clone(&options),
                ))
            })
            .collect();

        let mut outcome = None;
        let mut failures = Vec::new();
        for (rank, joined) in join_all(handles).await.into_iter().enumerate() {
            let result = joined.map_err(|e| {
                FilterError::worker_join(format!("rank {}", rank), e.to_string())
            });
            match result.and_then(|r| r) {
                Ok(RankOutcome::Coordinator(done)) => outcome = Some(*done),
                Ok(RankOutcome::Worker) => {}
                Err(error) => {
                    warn!(rank, error = %error, "Rank failed");
                    failures.push((rank, error));
                }
            }
        }

        if let Some(error) = root_cause(failures) {
            return Err(error);
        }
        outcome.ok_or_else(|| {
            FilterError::communication(Some(COORDINATOR), "coordinator produced no result")
        })
    }
}

/// Prefer the lowest-ranked failure that is not just a knock-on communication
/// error, since those usually follow another rank's real failure.
fn root_cause(mut failures: Vec<(usize, FilterError)>) -> Option<FilterError> {
    failures.sort_by_key(|(rank, error)| {
        (matches!(error, FilterError::Communication { .. }), *rank)
    });
    failures.into_iter().next().map(|(_, error)| error)
}

#[async_trait]
impl FilterStrategy for DistributedRowStrategy {
    fn name(&self) -> &'static str {
        "distributed"
    }

    async fn apply(&self, input: Arc<PixelGrid>, kernel: KernelName) -> FilterResult<PixelGrid> {
        let source: Arc<dyn GridSource> = Arc::new(InMemorySource::new(input));
        Ok(self.run(source, kernel).await?.grid)
    }
}
