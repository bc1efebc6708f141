//! Batch processing: many records through one shared pipeline, with
//! progress events and a run summary.

pub mod runner;
pub mod types;

pub use runner::{run_batch, run_batch_concurrent};
pub use types::*;
