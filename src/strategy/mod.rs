//! # Execution Strategies
//!
//! Four ways to run the same convolution. For a fixed input and kernel they
//! all produce the same output grid, sample for sample.
//!
//! | Strategy | Partition | Concurrency | Join |
//! |----------|-----------|-------------|------|
//! | [`sequential`] | none | none | n/a |
//! | [`quadrant`] | 4 fixed quadrants | scoped OS threads | wait for all 4 |
//! | [`fan_out`] | 3 kernels over one input | blocking tasks | wait for all 3 |
//! | [`distributed`] | N row bands | one task per rank | barriers, then gather |

pub mod distributed;
pub mod fan_out;
pub mod quadrant;
pub mod sequential;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use clap::ValueEnum;
use conv_kernel::{KernelName, PixelGrid};

use crate::error::FilterResult;

pub use distributed::{DistributedOptions, DistributedRowStrategy};
pub use fan_out::FanOutStrategy;
pub use quadrant::QuadrantThreadStrategy;
pub use sequential::SequentialStrategy;

/// Strategy selector used by the CLI and configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum StrategyMode {
    Sequential,
    Quadrant,
    FanOut,
    Distributed,
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyMode::Sequential => "sequential",
            StrategyMode::Quadrant => "quadrant",
            StrategyMode::FanOut => "fan-out",
            StrategyMode::Distributed => "distributed",
        })
    }
}

/// Common seam over the four strategies: one input, one kernel, one output.
///
/// Strategy-specific statistics are available from each module's own entry
/// points; this trait only exposes the result grid.
#[async_trait]
pub trait FilterStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, input: Arc<PixelGrid>, kernel: KernelName) -> FilterResult<PixelGrid>;
}

/// One boxed instance of every strategy, in table order.
pub fn all_strategies(workers: usize) -> Vec<Box<dyn FilterStrategy>> {
    vec![
        Box::new(SequentialStrategy),
        Box::new(QuadrantThreadStrategy),
        Box::new(FanOutStrategy),
        Box::new(DistributedRowStrategy::new(DistributedOptions {
            workers,
            ..DistributedOptions::default()
        })),
    ]
}
