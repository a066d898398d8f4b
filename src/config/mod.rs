//! # Configuration Module
//!
//! Run configuration built by the `pconv` CLI, plus the environment-variable
//! overrides applied on top of it.

pub mod config;
pub mod env;
