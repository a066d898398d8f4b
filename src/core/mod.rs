//! # Core Infrastructure Module
//!
//! Statistics, reports and progress plumbing shared by the execution strategies.

pub mod performance_analysis;
pub mod progress;
