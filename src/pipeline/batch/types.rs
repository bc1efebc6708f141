use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Degradation, LlmOutcome, ProcessedRecord};

pub fn new_batch_id() -> String {
    Uuid::new_v4().to_string()
}

// ═══════════════════════════════════════════
// Batch Summary
// ═══════════════════════════════════════════

/// Counters for one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub started_at: DateTime<Utc>,
    pub total: u32,
    /// Every model call, retries included.
    pub llm_calls: u32,
    pub llm_succeeded: u32,
    /// Records whose LLM stage failed, by failure kind.
    pub llm_failures: BTreeMap<Degradation, u32>,
    pub retries: u32,
    /// Records where rule output had to stand in for a failed LLM call.
    pub fallback_records: u32,
    pub rule_misses: u32,
    /// Records with empty input, a schema mismatch or aborted processing.
    pub degraded_records: u32,
    pub duration_ms: u64,
}

impl BatchSummary {
    pub fn new(batch_id: String, total: u32) -> Self {
        Self {
            batch_id,
            started_at: Utc::now(),
            total,
            llm_calls: 0,
            llm_succeeded: 0,
            llm_failures: BTreeMap::new(),
            retries: 0,
            fallback_records: 0,
            rule_misses: 0,
            degraded_records: 0,
            duration_ms: 0,
        }
    }

    pub fn record(&mut self, processed: &ProcessedRecord) {
        let attempts = processed.llm.attempts();
        self.llm_calls += attempts;
        self.retries += attempts.saturating_sub(1);
        if matches!(processed.llm, LlmOutcome::Succeeded { .. }) {
            self.llm_succeeded += 1;
        }
        for d in processed.degradations.iter().filter(|d| d.is_llm_failure()) {
            *self.llm_failures.entry(*d).or_insert(0) += 1;
        }
        if processed.used_fallback() {
            self.fallback_records += 1;
        }
        if processed.degradations.contains(&Degradation::RuleExtractionMiss) {
            self.rule_misses += 1;
        }
        if processed.is_degraded() {
            self.degraded_records += 1;
        }
    }

    pub fn llm_failure_count(&self) -> u32 {
        self.llm_failures.values().sum()
    }
}

/// Records in input order plus the run's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    pub records: Vec<ProcessedRecord>,
    pub summary: BatchSummary,
}

// ═══════════════════════════════════════════
// Batch Status Events
// ═══════════════════════════════════════════

/// Progress notifications for a caller-supplied callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BatchStatusEvent {
    Started {
        batch_id: String,
        record_count: u32,
    },
    Progress {
        completed: u32,
        total: u32,
        row_id: Option<u64>,
    },
    Completed {
        batch_id: String,
        degraded: u32,
        fallback: u32,
        duration_ms: u64,
    },
}
