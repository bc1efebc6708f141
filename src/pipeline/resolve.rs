//! Fallback Resolver.
//!
//! Per field: a well-formed LLM value wins, then the best rule candidate,
//! then a sentinel or configured default. Total over every input
//! combination, including a failed or skipped LLM call.

use std::collections::HashSet;
use std::str::FromStr;

use crate::models::{
    CandidateField, CandidateSource, Characteristic, CharacteristicKind, ExtractionCandidate,
    FieldOrigin, FieldProvenance, MaterialType, UNKNOWN_SENTINEL,
};
use crate::pipeline::normalize::NormalizedText;
use crate::pipeline::rules::lexicon::canonical_unit;

/// One value per record field, plus where each came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFields {
    pub product_name: String,
    pub characteristics: Vec<Characteristic>,
    pub material_type: MaterialType,
    pub unit_of_measure: String,
    pub provenance: FieldProvenance,
}

impl ResolvedFields {
    pub fn characteristic_values(&self) -> Vec<String> {
        self.characteristics.iter().map(|c| c.value.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct FallbackResolver {
    default_unit: String,
}

impl FallbackResolver {
    pub fn new(default_unit: &str) -> Self {
        Self {
            default_unit: default_unit.to_string(),
        }
    }

    /// `llm` is `None` when the call was skipped or failed. `classify`
    /// assigns a pattern kind to LLM characteristics, which arrive
    /// unclassified.
    pub fn resolve(
        &self,
        text: &NormalizedText,
        rule: &[ExtractionCandidate],
        llm: Option<&[ExtractionCandidate]>,
        classify: &dyn Fn(&str) -> CharacteristicKind,
    ) -> ResolvedFields {
        let llm = llm.unwrap_or(&[]);

        let (product_name, product_origin) = self.product_name(text, rule, llm);
        let (material_type, type_origin) = resolve_material_type(rule, llm);
        let (unit_of_measure, unit_origin) = self.unit_of_measure(rule, llm);
        let (characteristics, char_origin) = resolve_characteristics(rule, llm, classify);

        ResolvedFields {
            product_name,
            characteristics,
            material_type,
            unit_of_measure,
            provenance: FieldProvenance {
                product_name: product_origin,
                characteristics: char_origin,
                material_type: type_origin,
                unit_of_measure: unit_origin,
            },
        }
    }

    fn product_name(
        &self,
        text: &NormalizedText,
        rule: &[ExtractionCandidate],
        llm: &[ExtractionCandidate],
    ) -> (String, FieldOrigin) {
        if let Some(c) = first_value(llm, &CandidateField::ProductName) {
            return (c.value.trim().to_string(), FieldOrigin::Llm);
        }
        if let Some(c) = best_value(rule, &CandidateField::ProductName) {
            return (c.value.trim().to_string(), FieldOrigin::Rule);
        }
        let name = text.first_token().unwrap_or(UNKNOWN_SENTINEL);
        (name.to_string(), FieldOrigin::Default)
    }

    fn unit_of_measure(
        &self,
        rule: &[ExtractionCandidate],
        llm: &[ExtractionCandidate],
    ) -> (String, FieldOrigin) {
        let llm_unit = llm
            .iter()
            .filter(|c| c.field == CandidateField::UnitOfMeasure)
            .find_map(|c| canonical_unit(&c.value));
        if let Some(unit) = llm_unit {
            return (unit.to_string(), FieldOrigin::Llm);
        }
        if let Some(c) = best_value(rule, &CandidateField::UnitOfMeasure) {
            return (c.value.clone(), FieldOrigin::Rule);
        }
        (self.default_unit.clone(), FieldOrigin::Default)
    }
}

fn resolve_material_type(
    rule: &[ExtractionCandidate],
    llm: &[ExtractionCandidate],
) -> (MaterialType, FieldOrigin) {
    let llm_type = llm
        .iter()
        .filter(|c| c.field == CandidateField::MaterialType)
        .find_map(|c| MaterialType::from_label(&c.value));
    if let Some(t) = llm_type {
        return (t, FieldOrigin::Llm);
    }
    let rule_type = best_value(rule, &CandidateField::MaterialType)
        .and_then(|c| MaterialType::from_str(&c.value).ok())
        .filter(|t| *t != MaterialType::Unknown);
    match rule_type {
        Some(t) => (t, FieldOrigin::Rule),
        None => (MaterialType::Unknown, FieldOrigin::Default),
    }
}

fn resolve_characteristics(
    rule: &[ExtractionCandidate],
    llm: &[ExtractionCandidate],
    classify: &dyn Fn(&str) -> CharacteristicKind,
) -> (Vec<Characteristic>, FieldOrigin) {
    let from_llm = dedup(
        llm.iter()
            .filter(|c| c.characteristic_kind().is_some())
            .map(|c| (c.value.as_str(), classify(&c.value))),
    );
    if !from_llm.is_empty() {
        return (from_llm, FieldOrigin::Llm);
    }

    let from_rules = dedup(
        rule.iter()
            .filter_map(|c| c.characteristic_kind().map(|k| (c.value.as_str(), k))),
    );
    if from_rules.is_empty() {
        (from_rules, FieldOrigin::Default)
    } else {
        (from_rules, FieldOrigin::Rule)
    }
}

/// First occurrence wins; order is detection order.
fn dedup<'a>(values: impl Iterator<Item = (&'a str, CharacteristicKind)>) -> Vec<Characteristic> {
    let mut seen = HashSet::new();
    values
        .filter_map(|(value, kind)| {
            let value = value.trim();
            if value.is_empty() || !seen.insert(value.to_string()) {
                return None;
            }
            Some(Characteristic {
                value: value.to_string(),
                kind,
            })
        })
        .collect()
}

fn non_blank<'a>(
    candidates: &'a [ExtractionCandidate],
    field: &'a CandidateField,
) -> impl Iterator<Item = &'a ExtractionCandidate> + 'a {
    candidates
        .iter()
        .filter(move |c| &c.field == field && !c.value.trim().is_empty())
}

fn first_value<'a>(
    candidates: &'a [ExtractionCandidate],
    field: &'a CandidateField,
) -> Option<&'a ExtractionCandidate> {
    non_blank(candidates, field).find(|c| c.source == CandidateSource::Llm)
}

/// Highest confidence; the earliest candidate wins ties.
fn best_value<'a>(
    candidates: &'a [ExtractionCandidate],
    field: &'a CandidateField,
) -> Option<&'a ExtractionCandidate> {
    non_blank(candidates, field).fold(None, |best: Option<&ExtractionCandidate>, c| match best {
        Some(b) if b.confidence >= c.confidence => Some(b),
        _ => Some(c),
    })
}
