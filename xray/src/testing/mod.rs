//! Testing utilities for code that records executions and generates reasoning.
//!
//! This module provides:
//! - Scripted and canned reasoning generators
//! - Fixtures for steps, executions and seeded storage

mod fixtures;
mod mocks;

pub use fixtures::{sample_execution, sample_step, seeded_storage, unique_execution_id};
pub use mocks::{FailingGenerator, MockGenerator, SlowGenerator, StaticGenerator};
