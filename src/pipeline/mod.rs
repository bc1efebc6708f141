pub mod normalize;
pub mod rules;
pub mod llm;
pub mod categorize;
pub mod resolve;
pub mod synthesize;
pub mod orchestrator; // Per-record stage sequencing, retries, degradations
pub mod batch;


pub use orchestrator::RecordPipeline;

use thiserror::Error;

use crate::config::ConfigError;
use llm::LlmError;

/// Construction failures. Processing a record never fails.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid brand or material code list: {0}")]
    Lexicon(#[from] regex::Error),

    #[error("Cannot set up LLM client: {0}")]
    Llm(#[from] LlmError),
}
