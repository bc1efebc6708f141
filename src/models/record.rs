use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::{CandidateSource, CharacteristicKind, MaterialType};

/// Product name and short description of a record with no usable input.
pub const UNKNOWN_SENTINEL: &str = "UNKNOWN";

/// One free-text cell as read from the source sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Source row number, carried through so parallel output can be
    /// restored to input order.
    pub row_id: Option<u64>,
    pub text: String,
}

impl RawRecord {
    pub fn new(row_id: u64, text: impl Into<String>) -> Self {
        Self {
            row_id: Some(row_id),
            text: text.into(),
        }
    }

    pub fn unnumbered(text: impl Into<String>) -> Self {
        Self {
            row_id: None,
            text: text.into(),
        }
    }
}

/// Attribute name → value, keys drawn from the schema of the record's
/// material type. Never holds empty values.
pub type Categorization = BTreeMap<String, String>;

/// A resolved characteristic with the pattern kind it was classified as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristic {
    pub value: String,
    pub kind: CharacteristicKind,
}

/// The normalized material master record for one input row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecord {
    pub product_name: String,
    /// Detection order, no duplicates.
    pub characteristics: Vec<String>,
    pub material_type: MaterialType,
    pub unit_of_measure: String,
    pub categorization: Categorization,
    pub short_description: String,
}

impl StructuredRecord {
    /// Categorization as flat `(key, value)` pairs for tabular writers.
    pub fn categorization_pairs(&self) -> Vec<(String, String)> {
        self.categorization
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Where a resolved field came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOrigin {
    Llm,
    Rule,
    /// Sentinel or configured default.
    Default,
}

impl From<CandidateSource> for FieldOrigin {
    fn from(source: CandidateSource) -> Self {
        match source {
            CandidateSource::Llm => Self::Llm,
            CandidateSource::Rule => Self::Rule,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub product_name: FieldOrigin,
    pub characteristics: FieldOrigin,
    pub material_type: FieldOrigin,
    pub unit_of_measure: FieldOrigin,
}

/// Recoverable conditions met while processing one record. None of them
/// stops the record; they are counted in the batch summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    NormalizationDegenerate,
    RuleExtractionMiss,
    LlmUnavailable,
    LlmTimeout,
    LlmMalformedResponse,
    SchemaMismatch,
    /// Processing stopped unexpectedly; a minimal record stands in.
    Aborted,
}

impl Degradation {
    pub fn is_llm_failure(&self) -> bool {
        matches!(
            self,
            Self::LlmUnavailable | Self::LlmTimeout | Self::LlmMalformedResponse
        )
    }
}

/// What happened to the inference call for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmOutcome {
    /// Gated off by configuration, or nothing to send.
    Skipped,
    Succeeded { attempts: u32 },
    Failed { attempts: u32 },
}

impl LlmOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Skipped => 0,
            Self::Succeeded { attempts } | Self::Failed { attempts } => *attempts,
        }
    }
}

/// Pipeline output envelope: the record plus what it took to build it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub row_id: Option<u64>,
    pub original_text: String,
    pub cleaned_text: String,
    pub record: StructuredRecord,
    pub provenance: FieldProvenance,
    pub llm: LlmOutcome,
    pub degradations: Vec<Degradation>,
}

impl ProcessedRecord {
    /// True when the LLM was attempted and failed, so rule output or
    /// sentinels had to stand in.
    pub fn used_fallback(&self) -> bool {
        matches!(self.llm, LlmOutcome::Failed { .. })
    }

    pub fn is_degraded(&self) -> bool {
        self.degradations.iter().any(|d| {
            matches!(
                d,
                Degradation::NormalizationDegenerate
                    | Degradation::SchemaMismatch
                    | Degradation::Aborted
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StructuredRecord {
        let mut categorization = Categorization::new();
        categorization.insert("Werkstoff".into(), "VITON".into());
        categorization.insert("Höhe".into(), "12".into());
        StructuredRecord {
            product_name: "WELLENDICHTRING".into(),
            characteristics: vec!["105X130X12".into()],
            material_type: MaterialType::Seal,
            unit_of_measure: "ST".into(),
            categorization,
            short_description: "WELLENDICHTRING 105X130X12".into(),
        }
    }

    #[test]
    fn categorization_pairs_are_sorted_by_key() {
        let pairs = sample().categorization_pairs();
        assert_eq!(pairs[0].0, "Höhe");
        assert_eq!(pairs[1], ("Werkstoff".to_string(), "VITON".to_string()));
    }

    #[test]
    fn record_serializes_material_type_snake_case() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"material_type\":\"seal\""));
    }

    #[test]
    fn llm_failures_are_classified() {
        assert!(Degradation::LlmTimeout.is_llm_failure());
        assert!(!Degradation::SchemaMismatch.is_llm_failure());
    }

    #[test]
    fn outcome_attempts() {
        assert_eq!(LlmOutcome::Skipped.attempts(), 0);
        assert_eq!(LlmOutcome::Failed { attempts: 3 }.attempts(), 3);
    }

    #[test]
    fn raw_record_constructors() {
        assert_eq!(RawRecord::new(7, "x").row_id, Some(7));
        assert_eq!(RawRecord::unnumbered("x").row_id, None);
    }
}
