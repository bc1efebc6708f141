use std::time::Duration;

use super::LlmError;

/// Text-completion capability the pipeline depends on (allows mocking).
/// Implementations make exactly one attempt per call; retries are the
/// orchestrator's decision.
pub trait LlmClient: Send + Sync {
    fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, LlmError>;
}
