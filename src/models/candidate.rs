use serde::{Deserialize, Serialize};

use super::enums::{CandidateSource, CharacteristicKind, Slot};

/// Which output field a candidate competes for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum CandidateField {
    ProductName,
    Characteristic { kind: CharacteristicKind },
    MaterialType,
    UnitOfMeasure,
    /// One categorization entry. Rule candidates carry a typed slot;
    /// LLM candidates carry the attribute key exactly as the model wrote it.
    Categorization { slot: Option<Slot>, key: String },
}

/// A candidate value for one field, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionCandidate {
    pub field: CandidateField,
    pub value: String,
    pub source: CandidateSource,
    /// Heuristic score in 0.0..=1.0.
    pub confidence: f32,
}

impl ExtractionCandidate {
    pub fn rule(field: CandidateField, value: impl Into<String>, confidence: f32) -> Self {
        Self {
            field,
            value: value.into(),
            source: CandidateSource::Rule,
            confidence,
        }
    }

    pub fn llm(field: CandidateField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            source: CandidateSource::Llm,
            confidence: LLM_CANDIDATE_CONFIDENCE,
        }
    }

    pub fn slot(slot: Slot, value: impl Into<String>, confidence: f32) -> Self {
        Self::rule(
            CandidateField::Categorization {
                slot: Some(slot),
                key: slot.as_str().to_string(),
            },
            value,
            confidence,
        )
    }

    pub fn characteristic_kind(&self) -> Option<CharacteristicKind> {
        match self.field {
            CandidateField::Characteristic { kind } => Some(kind),
            _ => None,
        }
    }

    pub fn is_categorization(&self) -> bool {
        matches!(self.field, CandidateField::Categorization { .. })
    }
}

/// Flat score given to every well-formed LLM value. The resolver prefers
/// LLM output by source, not by score; the score only matters for reporting.
pub const LLM_CANDIDATE_CONFIDENCE: f32 = 0.8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_constructor_uses_slot_name_as_key() {
        let c = ExtractionCandidate::slot(Slot::Material, "VITON", 0.85);
        assert_eq!(
            c.field,
            CandidateField::Categorization {
                slot: Some(Slot::Material),
                key: "material".into()
            }
        );
        assert_eq!(c.source, CandidateSource::Rule);
        assert!(c.is_categorization());
    }

    #[test]
    fn llm_constructor_tags_source() {
        let c = ExtractionCandidate::llm(CandidateField::ProductName, "Siemens Schütz");
        assert_eq!(c.source, CandidateSource::Llm);
        assert!((c.confidence - LLM_CANDIDATE_CONFIDENCE).abs() < f32::EPSILON);
    }

    #[test]
    fn characteristic_kind_only_for_characteristics() {
        let c = ExtractionCandidate::rule(
            CandidateField::Characteristic {
                kind: CharacteristicKind::Dimension,
            },
            "105X130X12",
            0.9,
        );
        assert_eq!(c.characteristic_kind(), Some(CharacteristicKind::Dimension));
        let p = ExtractionCandidate::rule(CandidateField::ProductName, "RING", 0.6);
        assert_eq!(p.characteristic_kind(), None);
    }
}
