//! Batch runner.
//!
//! Records are independent, so the only shared state is the pipeline
//! itself. The concurrent runner caps in-flight records (and therefore
//! in-flight LLM calls) with a semaphore and restores input order before
//! returning.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::types::*;
use crate::models::{ProcessedRecord, RawRecord};
use crate::pipeline::orchestrator::RecordPipeline;

/// Process `records` one after another on the calling thread.
pub fn run_batch(
    pipeline: &RecordPipeline,
    records: &[RawRecord],
    mut on_event: impl FnMut(&BatchStatusEvent),
) -> BatchOutput {
    let start = Instant::now();
    let total = records.len() as u32;
    let mut summary = BatchSummary::new(new_batch_id(), total);
    on_event(&BatchStatusEvent::Started {
        batch_id: summary.batch_id.clone(),
        record_count: total,
    });

    let mut out = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let processed = pipeline.process(record);
        summary.record(&processed);
        on_event(&BatchStatusEvent::Progress {
            completed: i as u32 + 1,
            total,
            row_id: record.row_id,
        });
        out.push(processed);
    }

    finish(summary, out, start, &mut on_event)
}

/// Process `records` with at most `batch.max_in_flight` in progress at
/// once. Output order matches input order regardless of completion order.
pub async fn run_batch_concurrent(
    pipeline: Arc<RecordPipeline>,
    records: Vec<RawRecord>,
    mut on_event: impl FnMut(&BatchStatusEvent) + Send,
) -> BatchOutput {
    let start = Instant::now();
    let total = records.len() as u32;
    let mut summary = BatchSummary::new(new_batch_id(), total);
    on_event(&BatchStatusEvent::Started {
        batch_id: summary.batch_id.clone(),
        record_count: total,
    });

    let semaphore = Arc::new(Semaphore::new(pipeline.config().batch.max_in_flight.max(1)));
    let mut tasks = JoinSet::new();
    for (index, record) in records.iter().cloned().enumerate() {
        let pipeline = Arc::clone(&pipeline);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (index, pipeline.aborted_record(&record));
            };
            let worker = Arc::clone(&pipeline);
            let input = record.clone();
            match tokio::task::spawn_blocking(move || worker.process(&input)).await {
                Ok(processed) => (index, processed),
                Err(e) => {
                    tracing::error!(row = ?record.row_id, error = %e, "Record processing aborted");
                    (index, pipeline.aborted_record(&record))
                }
            }
        });
    }

    let mut slots: Vec<Option<ProcessedRecord>> = vec![None; records.len()];
    let mut completed = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, processed)) => {
                completed += 1;
                on_event(&BatchStatusEvent::Progress {
                    completed,
                    total,
                    row_id: processed.row_id,
                });
                slots[index] = Some(processed);
            }
            Err(e) => {
                tracing::error!(error = %e, "Batch task failed");
            }
        }
    }

    let out = assemble(&pipeline, &records, slots);
    for processed in &out {
        summary.record(processed);
    }
    finish(summary, out, start, &mut on_event)
}

/// Input-ordered records; slots whose task never reported back get a
/// minimal aborted record.
fn assemble(
    pipeline: &RecordPipeline,
    records: &[RawRecord],
    slots: Vec<Option<ProcessedRecord>>,
) -> Vec<ProcessedRecord> {
    records
        .iter()
        .zip(slots)
        .map(|(record, slot)| slot.unwrap_or_else(|| pipeline.aborted_record(record)))
        .collect()
}

fn finish(
    mut summary: BatchSummary,
    records: Vec<ProcessedRecord>,
    start: Instant,
    on_event: &mut impl FnMut(&BatchStatusEvent),
) -> BatchOutput {
    summary.duration_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        batch_id = %summary.batch_id,
        total = summary.total,
        llm_calls = summary.llm_calls,
        llm_failures = summary.llm_failure_count(),
        retries = summary.retries,
        fallback = summary.fallback_records,
        degraded = summary.degraded_records,
        duration_ms = summary.duration_ms,
        "Batch complete"
    );
    on_event(&BatchStatusEvent::Completed {
        batch_id: summary.batch_id.clone(),
        degraded: summary.degraded_records,
        fallback: summary.fallback_records,
        duration_ms: summary.duration_ms,
    });
    BatchOutput { records, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::models::{Degradation, LlmOutcome};
    use crate::pipeline::llm::{FailingLlmClient, LlmClient, LlmError, MockLlmClient};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const ROWS: &[&str] = &[
        "WELLENDICHTRING // 105X130X12 BA SL/VITON",
        "",
        "Siemens Schütz | Spulensp. 230V, 50HZ/AC | Leistung 45,0 KW/400V",
        "Kugellager 6204 2RS",
        "O-Ring 20x3 NBR 70",
    ];

    fn records() -> Vec<RawRecord> {
        ROWS.iter()
            .enumerate()
            .map(|(i, text)| RawRecord::new(i as u64 + 1, *text))
            .collect()
    }

    fn config(max_in_flight: usize) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.batch.max_in_flight = max_in_flight;
        config.llm.retry_backoff_ms = 1;
        config
    }

    /// Sleeps per call and remembers the highest number of overlapping calls.
    struct CountingClient {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl LlmClient for CountingClient {
        fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, LlmError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(40));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(r#"{"unit_of_measure": "ST"}"#.into())
        }
    }

    #[test]
    fn sequential_batch_keeps_order_and_counts() {
        let pipeline = RecordPipeline::new(config(1), None).unwrap();
        let mut events = Vec::new();
        let output = run_batch(&pipeline, &records(), |e| events.push(e.clone()));

        let rows: Vec<_> = output.records.iter().map(|r| r.row_id).collect();
        assert_eq!(rows, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
        assert_eq!(output.summary.total, 5);
        assert_eq!(output.summary.degraded_records, 1);
        assert_eq!(output.summary.llm_calls, 0);

        assert!(matches!(events.first(), Some(BatchStatusEvent::Started { record_count: 5, .. })));
        assert!(matches!(events.last(), Some(BatchStatusEvent::Completed { degraded: 1, .. })));
        assert_eq!(events.len(), 7);
    }

    #[tokio::test]
    async fn concurrent_batch_matches_sequential() {
        let pipeline = Arc::new(RecordPipeline::new(config(3), None).unwrap());
        let sequential = run_batch(&pipeline, &records(), |_| {});
        let concurrent = run_batch_concurrent(Arc::clone(&pipeline), records(), |_| {}).await;

        assert_eq!(sequential.records, concurrent.records);
        assert_eq!(
            sequential.summary.degraded_records,
            concurrent.summary.degraded_records
        );
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let client = Arc::new(CountingClient {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let pipeline = Arc::new(
            RecordPipeline::new(config(2), Some(client.clone() as Arc<dyn LlmClient>)).unwrap(),
        );
        let many: Vec<RawRecord> = (0..8)
            .map(|i| RawRecord::new(i, format!("Kugellager 62{i:02} 2RS")))
            .collect();

        let output = run_batch_concurrent(pipeline, many, |_| {}).await;

        assert!(client.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(output.summary.llm_calls, 8);
        let rows: Vec<_> = output.records.iter().filter_map(|r| r.row_id).collect();
        assert_eq!(rows, (0..8u64).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn failures_are_counted_not_fatal() {
        let client = FailingLlmClient::new(LlmError::Timeout(1000));
        let pipeline = Arc::new(RecordPipeline::new(config(4), Some(Arc::new(client))).unwrap());
        let output = run_batch_concurrent(pipeline, records(), |_| {}).await;

        assert_eq!(output.records.len(), 5);
        // Four non-empty records, three attempts each
        assert_eq!(output.summary.llm_calls, 12);
        assert_eq!(output.summary.retries, 8);
        assert_eq!(output.summary.fallback_records, 4);
        assert_eq!(
            output.summary.llm_failures.get(&Degradation::LlmTimeout),
            Some(&4)
        );
        assert_eq!(
            output.records[0].record.categorization.get("Werkstoff").map(String::as_str),
            Some("VITON")
        );
    }

    #[tokio::test]
    async fn progress_events_cover_every_record() {
        let pipeline = Arc::new(
            RecordPipeline::new(
                config(2),
                Some(Arc::new(MockLlmClient::new(r#"{"product_name": "Teil"}"#))),
            )
            .unwrap(),
        );
        let mut progress = Vec::new();
        let output = run_batch_concurrent(pipeline, records(), |e| {
            if let BatchStatusEvent::Progress { completed, .. } = e {
                progress.push(*completed);
            }
        })
        .await;

        assert_eq!(progress, vec![1, 2, 3, 4, 5]);
        assert_eq!(output.summary.llm_succeeded, 4);
        assert_eq!(output.records[1].llm, LlmOutcome::Skipped);
    }

    #[test]
    fn missing_slots_become_aborted_records() {
        let pipeline = RecordPipeline::new(config(1), None).unwrap();
        let input = records();
        let mut slots: Vec<Option<ProcessedRecord>> =
            input.iter().map(|r| Some(pipeline.process(r))).collect();
        slots[3] = None;

        let out = assemble(&pipeline, &input, slots);
        assert_eq!(out.len(), 5);
        assert_eq!(out[3].row_id, Some(4));
        assert_eq!(out[3].degradations, vec![Degradation::Aborted]);
        assert_eq!(out[3].record.product_name, "Kugellager");
    }
}
