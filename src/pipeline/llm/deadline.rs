use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::types::LlmClient;
use super::LlmError;

/// Run one completion with a hard deadline. The client gets the timeout
/// too, but a client that ignores it still cannot hold the record past
/// `timeout`: the call runs on its own thread and is abandoned when the
/// deadline passes. A panicking client reports as unavailable.
pub fn complete_within(
    client: &Arc<dyn LlmClient>,
    prompt: &str,
    timeout: Duration,
) -> Result<String, LlmError> {
    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(client);
    let prompt = prompt.to_string();

    let spawned = thread::Builder::new()
        .name("llm-call".into())
        .spawn(move || {
            let result = worker.complete(&prompt, timeout);
            // Receiver is gone when the deadline already passed
            let _ = tx.send(result);
        });
    if let Err(e) = spawned {
        return Err(LlmError::Unavailable(format!("cannot start LLM call: {e}")));
    }

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(LlmError::Timeout(timeout.as_millis() as u64)),
        Err(RecvTimeoutError::Disconnected) => {
            Err(LlmError::Unavailable("LLM client aborted".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::ollama::{FailingLlmClient, MockLlmClient, SlowLlmClient};
    use std::time::Instant;

    struct PanickingClient;

    impl LlmClient for PanickingClient {
        fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, LlmError> {
            panic!("backend exploded");
        }
    }

    #[test]
    fn passes_through_fast_responses() {
        let client: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new("{}"));
        let out = complete_within(&client, "p", Duration::from_secs(5)).unwrap();
        assert_eq!(out, "{}");
    }

    #[test]
    fn passes_through_client_errors() {
        let client: Arc<dyn LlmClient> = Arc::new(FailingLlmClient::new(LlmError::EmptyResponse));
        let err = complete_within(&client, "p", Duration::from_secs(5)).unwrap_err();
        assert_eq!(err, LlmError::EmptyResponse);
    }

    #[test]
    fn abandons_slow_clients_at_the_deadline() {
        let client: Arc<dyn LlmClient> =
            Arc::new(SlowLlmClient::new(Duration::from_secs(5), "{}"));
        let started = Instant::now();
        let err = complete_within(&client, "p", Duration::from_millis(50)).unwrap_err();
        assert_eq!(err, LlmError::Timeout(50));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn panics_become_unavailable() {
        let client: Arc<dyn LlmClient> = Arc::new(PanickingClient);
        let err = complete_within(&client, "p", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(_)));
    }
}
