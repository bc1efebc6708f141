use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::LlmError;
use crate::models::{CandidateField, CharacteristicKind, ExtractionCandidate};

/// Fields the model returned, unvalidated. Blank values are already gone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmExtraction {
    pub product_name: Option<String>,
    pub characteristics: Vec<String>,
    pub material_type: Option<String>,
    pub unit_of_measure: Option<String>,
    pub categorization: Vec<(String, String)>,
    /// Parsed for logging only; the label is always synthesized.
    pub short_description: Option<String>,
}

impl LlmExtraction {
    fn is_empty(&self) -> bool {
        self.product_name.is_none()
            && self.characteristics.is_empty()
            && self.material_type.is_none()
            && self.unit_of_measure.is_none()
            && self.categorization.is_empty()
    }

    /// `llm` candidates for every returned field. Characteristics are not
    /// classified yet; the resolver runs them through the rule patterns.
    pub fn into_candidates(self) -> Vec<ExtractionCandidate> {
        let mut out = Vec::new();
        if let Some(name) = self.product_name {
            out.push(ExtractionCandidate::llm(CandidateField::ProductName, name));
        }
        for value in self.characteristics {
            out.push(ExtractionCandidate::llm(
                CandidateField::Characteristic {
                    kind: CharacteristicKind::Other,
                },
                value,
            ));
        }
        if let Some(t) = self.material_type {
            out.push(ExtractionCandidate::llm(CandidateField::MaterialType, t));
        }
        if let Some(unit) = self.unit_of_measure {
            out.push(ExtractionCandidate::llm(CandidateField::UnitOfMeasure, unit));
        }
        for (key, value) in self.categorization {
            out.push(ExtractionCandidate::llm(
                CandidateField::Categorization { slot: None, key },
                value,
            ));
        }
        out
    }
}

/// Strip model artifacts: `<unusedN>thought` prefixes, stray `<unusedN>`
/// tokens and markdown code fences.
pub fn sanitize_llm_output(raw: &str) -> String {
    static THOUGHT_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)<unused\d+>thought\n.*?<unused\d+>").expect("valid regex")
    });
    static UNUSED_TOKEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<unused\d+>").expect("valid regex"));

    let mut text = THOUGHT_BLOCK_RE.replace_all(raw, "").to_string();
    // Unterminated thinking: everything up to the thought marker goes
    if let Some(idx) = text.find("<unused") {
        if let Some(thought_offset) = text[idx..].find("thought\n") {
            text = text[idx + thought_offset + "thought\n".len()..].to_string();
        }
    }
    text = UNUSED_TOKEN_RE.replace_all(&text, "").to_string();
    text.replace("```json", "").replace("```", "").trim().to_string()
}

#[derive(Deserialize)]
struct RawExtraction {
    #[serde(default)]
    product_name: Option<Value>,
    #[serde(default)]
    characteristics: Option<Value>,
    #[serde(default)]
    material_type: Option<Value>,
    #[serde(default)]
    unit_of_measure: Option<Value>,
    #[serde(default)]
    categorization: Option<Value>,
    #[serde(default)]
    short_description: Option<Value>,
}

/// Parse a model response into the record's field shape. Anything that is
/// not a JSON object with at least one usable field fails the whole call.
pub fn parse_llm_response(raw: &str) -> Result<LlmExtraction, LlmError> {
    let text = sanitize_llm_output(raw);
    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(LlmError::MalformedResponse("No JSON object found".into()));
    };
    if end < start {
        return Err(LlmError::MalformedResponse("No JSON object found".into()));
    }

    let raw: RawExtraction = serde_json::from_str(&text[start..=end])
        .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

    let extraction = LlmExtraction {
        product_name: raw
            .product_name
            .as_ref()
            .and_then(scalar)
            .map(|name| strip_for_prefix(&name))
            .filter(|name| !name.is_empty()),
        characteristics: raw.characteristics.as_ref().map(list).unwrap_or_default(),
        material_type: raw.material_type.as_ref().and_then(scalar),
        unit_of_measure: raw.unit_of_measure.as_ref().and_then(scalar),
        categorization: raw.categorization.as_ref().map(pairs).unwrap_or_default(),
        short_description: raw.short_description.as_ref().and_then(scalar),
    };

    if extraction.is_empty() {
        return Err(LlmError::MalformedResponse(
            "No recognized fields in response".into(),
        ));
    }
    Ok(extraction)
}

/// Strings and numbers become trimmed text; blanks, nulls and nested
/// values count as absent.
fn scalar(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// A list of scalars, or one scalar standing in for a single-item list.
fn list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar).collect(),
        other => scalar(other).into_iter().collect(),
    }
}

fn pairs(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| {
                let key = k.trim();
                if key.is_empty() {
                    return None;
                }
                scalar(v).map(|v| (key.to_string(), v))
            })
            .collect(),
        _ => vec![],
    }
}

fn strip_for_prefix(name: &str) -> String {
    let lower = name.to_lowercase();
    for prefix in ["für ", "fuer "] {
        if lower.starts_with(prefix) {
            return name[prefix.len()..].trim().to_string();
        }
    }
    name.to_string()
}
