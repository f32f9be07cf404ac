//! The pipeline driver and run tracking.
//!
//! This module provides:
//! - Run identity (one UUID per pipeline run)
//! - The sequential driver over the ordered stage list
//! - A registry of in-flight runs for enumeration and cancellation

mod driver;
mod runs;

pub use driver::{DeployPipeline, RunReport};
pub use runs::{ActiveRuns, RunId, RunSnapshot};
