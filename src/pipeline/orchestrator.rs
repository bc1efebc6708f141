//! Record Pipeline Orchestrator.
//!
//! normalize → rules → (LLM, gated and retried) → resolve → categorize →
//! synthesize. `process` is total: every input yields a record, and every
//! recoverable failure is recorded as a degradation instead of an error.

use std::sync::Arc;
use std::time::Instant;

use super::categorize::CategorizationMapper;
use super::llm::{
    build_prompt, complete_within, parse_llm_response, LlmClient, LlmError, OllamaClient,
};
use super::normalize::{normalize, NormalizedText};
use super::resolve::FallbackResolver;
use super::rules::RuleExtractor;
use super::synthesize::synthesize_short_description;
use super::PipelineError;
use crate::config::{LlmMode, PipelineConfig};
use crate::models::{
    CandidateField, Categorization, CharacteristicKind, Degradation, ExtractionCandidate,
    FieldOrigin, FieldProvenance, LlmOutcome, MaterialType, ProcessedRecord, RawRecord,
    StructuredRecord, UNKNOWN_SENTINEL,
};

/// Result of the LLM stage for one record.
struct LlmStage {
    candidates: Option<Vec<ExtractionCandidate>>,
    outcome: LlmOutcome,
    failure: Option<LlmError>,
}

impl LlmStage {
    fn skipped() -> Self {
        Self {
            candidates: None,
            outcome: LlmOutcome::Skipped,
            failure: None,
        }
    }
}

/// Processes one record at a time. Cheap to share behind an `Arc`; holds
/// no per-record state.
pub struct RecordPipeline {
    config: Arc<PipelineConfig>,
    extractor: RuleExtractor,
    mapper: CategorizationMapper,
    resolver: FallbackResolver,
    llm: Option<Arc<dyn LlmClient>>,
}

impl RecordPipeline {
    /// `llm` is `None` for rules-only operation.
    pub fn new(
        config: PipelineConfig,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let extractor = RuleExtractor::from_config(&config)?;
        let mapper = CategorizationMapper::new(Arc::new(config.schema.clone()));
        let resolver = FallbackResolver::new(&config.default_unit_of_measure);
        Ok(Self {
            config: Arc::new(config),
            extractor,
            mapper,
            resolver,
            llm,
        })
    }

    /// Production wiring: an Ollama client from `config.llm`, unless the
    /// LLM is switched off.
    pub fn with_ollama(config: PipelineConfig) -> Result<Self, PipelineError> {
        let llm: Option<Arc<dyn LlmClient>> = match config.llm.mode {
            LlmMode::Never => None,
            _ => {
                let client = OllamaClient::from_settings(&config.llm)?;
                tracing::info!(model = client.model(), "LLM extraction enabled");
                Some(Arc::new(client))
            }
        };
        Self::new(config, llm)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// Convenience for a single unnumbered cell.
    pub fn process_text(&self, text: &str) -> ProcessedRecord {
        self.process(&RawRecord::unnumbered(text))
    }

    pub fn process(&self, record: &RawRecord) -> ProcessedRecord {
        let span = tracing::info_span!("process_record", row = ?record.row_id);
        let _enter = span.enter();
        let start = Instant::now();

        let text = normalize(&record.text);
        if text.is_empty() {
            tracing::debug!("Record is empty after normalization");
            return self.unknown_record(record, Degradation::NormalizationDegenerate);
        }

        let mut degradations = Vec::new();
        let rule = self.extractor.extract(&text);
        if is_rule_miss(&rule) {
            degradations.push(Degradation::RuleExtractionMiss);
        }

        // Preliminary pass on the rule guess; shown to the model as hints
        let preliminary = self
            .extractor
            .classify_material_type(&text)
            .map(|t| self.mapper.map(t, &rule))
            .unwrap_or_default();

        let llm = match &self.llm {
            Some(client) if self.should_call_llm(&rule) => {
                self.run_llm(client, &text, &rule, &preliminary)
            }
            _ => LlmStage::skipped(),
        };
        if let Some(err) = &llm.failure {
            degradations.push(err.degradation());
        }

        let classify = |value: &str| self.extractor.classify_characteristic(value);
        let mut resolved = self
            .resolver
            .resolve(&text, &rule, llm.candidates.as_deref(), &classify);

        if resolved.material_type != MaterialType::Unknown
            && !self.mapper.schema().has_schema(resolved.material_type)
        {
            tracing::warn!(
                material_type = %resolved.material_type,
                "No categorization schema for material type"
            );
            degradations.push(Degradation::SchemaMismatch);
            resolved.material_type = MaterialType::Unknown;
            resolved.provenance.material_type = FieldOrigin::Default;
        }

        let mut all = rule;
        all.extend(llm.candidates.unwrap_or_default());
        let categorization = self.mapper.map(resolved.material_type, &all);

        let short_description = synthesize_short_description(
            &resolved.product_name,
            &resolved.characteristics,
            &categorization,
            self.config.short_description_max_len,
        );

        tracing::debug!(
            material_type = %resolved.material_type,
            characteristics = resolved.characteristics.len(),
            categorization = categorization.len(),
            llm_attempts = llm.outcome.attempts(),
            degradations = degradations.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Record processed"
        );

        ProcessedRecord {
            row_id: record.row_id,
            original_text: record.text.clone(),
            cleaned_text: text.cleaned(),
            record: StructuredRecord {
                product_name: resolved.product_name.clone(),
                characteristics: resolved.characteristic_values(),
                material_type: resolved.material_type,
                unit_of_measure: resolved.unit_of_measure,
                categorization,
                short_description,
            },
            provenance: resolved.provenance,
            llm: llm.outcome,
            degradations,
        }
    }

    /// Stand-in record for a cell whose processing could not finish.
    /// Uses nothing but the raw text and configured defaults.
    pub fn aborted_record(&self, record: &RawRecord) -> ProcessedRecord {
        self.unknown_record(record, Degradation::Aborted)
    }

    fn unknown_record(&self, record: &RawRecord, degradation: Degradation) -> ProcessedRecord {
        let product_name = record
            .text
            .split_whitespace()
            .next()
            .filter(|_| degradation != Degradation::NormalizationDegenerate)
            .unwrap_or(UNKNOWN_SENTINEL)
            .to_string();
        let short_description = synthesize_short_description(
            &product_name,
            &[],
            &Categorization::new(),
            self.config.short_description_max_len,
        );
        ProcessedRecord {
            row_id: record.row_id,
            original_text: record.text.clone(),
            cleaned_text: String::new(),
            record: StructuredRecord {
                product_name,
                characteristics: Vec::new(),
                material_type: MaterialType::Unknown,
                unit_of_measure: self.config.default_unit_of_measure.clone(),
                categorization: Categorization::new(),
                short_description,
            },
            provenance: FieldProvenance {
                product_name: FieldOrigin::Default,
                characteristics: FieldOrigin::Default,
                material_type: FieldOrigin::Default,
                unit_of_measure: FieldOrigin::Default,
            },
            llm: LlmOutcome::Skipped,
            degradations: vec![degradation],
        }
    }

    fn should_call_llm(&self, rule: &[ExtractionCandidate]) -> bool {
        match self.config.llm.mode {
            LlmMode::Always => true,
            LlmMode::Never => false,
            LlmMode::WhenSparse => is_sparse(rule),
        }
    }

    /// Call the model with bounded retries. A non-retryable error ends the
    /// loop early.
    fn run_llm(
        &self,
        client: &Arc<dyn LlmClient>,
        text: &NormalizedText,
        rule: &[ExtractionCandidate],
        preliminary: &Categorization,
    ) -> LlmStage {
        let settings = &self.config.llm;
        let prompt = build_prompt(
            &self.config.prompt_template,
            text,
            rule,
            preliminary,
            &self.config.schema,
            self.config.short_description_max_len,
        );

        let max_attempts = settings.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = complete_within(client, &prompt, settings.timeout())
                .and_then(|raw| parse_llm_response(&raw));

            match result {
                Ok(extraction) => {
                    if let Some(label) = &extraction.short_description {
                        tracing::trace!(
                            label = %label,
                            "Model label ignored; label is synthesized"
                        );
                    }
                    return LlmStage {
                        candidates: Some(extraction.into_candidates()),
                        outcome: LlmOutcome::Succeeded { attempts: attempt },
                        failure: None,
                    };
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        kind = e.kind(),
                        error = %e,
                        "LLM call failed, retrying"
                    );
                    std::thread::sleep(settings.backoff(attempt));
                }
                Err(e) => {
                    tracing::warn!(
                        attempts = attempt,
                        kind = e.kind(),
                        error = %e,
                        "LLM extraction failed, falling back to rules"
                    );
                    return LlmStage {
                        candidates: None,
                        outcome: LlmOutcome::Failed { attempts: attempt },
                        failure: Some(e),
                    };
                }
            }
        }
    }
}

/// No pattern matcher fired: nothing but the product-name heuristics.
fn is_rule_miss(rule: &[ExtractionCandidate]) -> bool {
    !rule.iter().any(|c| {
        c.field == CandidateField::UnitOfMeasure
            || matches!(c.characteristic_kind(), Some(k) if k != CharacteristicKind::Other)
    })
}

/// Rules found no characteristics, or only a one-word product name.
fn is_sparse(rule: &[ExtractionCandidate]) -> bool {
    let has_characteristics = rule.iter().any(|c| c.characteristic_kind().is_some());
    let one_word_name = rule
        .iter()
        .find(|c| c.field == CandidateField::ProductName)
        .map_or(true, |c| c.value.split_whitespace().count() <= 1);
    !has_characteristics || one_word_name
}
