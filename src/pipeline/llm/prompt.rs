use crate::models::{CandidateField, Categorization, ExtractionCandidate, MaterialType};
use crate::pipeline::categorize::CategorizationSchema;
use crate::pipeline::normalize::NormalizedText;

/// Default extraction prompt. Placeholders: `{text}`, `{rule_hints}`,
/// `{material_types}`, `{schema_hints}`, `{max_len}`.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"Extract product information from this German material description.
Answer with one JSON object and nothing else:
{
  "product_name": "main product name",
  "characteristics": ["key specs"],
  "material_type": "one of: {material_types}",
  "unit_of_measure": "ST",
  "categorization": {},
  "short_description": "concise description under {max_len} chars"
}

Description: {text}

Already recognized by pattern rules (correct them if they are wrong):
{rule_hints}

Categorization keys per material type (use only these keys):
{schema_hints}

Rules:
1. For items starting with "für", name the item itself, not the "für".
2. Preserve part numbers and specifications exactly as written.
3. For technical components, include type, size and material.
4. Leave out categorization keys you cannot fill.

Example:
Input: "Siemens Schütz | Spulensp. 230V, 50HZ/AC | Leistung 45,0 KW/400V"
Output: {"product_name": "Siemens Schütz", "characteristics": ["230V, 50HZ/AC", "45,0 KW/400V"], "material_type": "electrical", "unit_of_measure": "ST", "categorization": {"Spannung (V)": "230", "Leistung (kW)": "45,0"}, "short_description": "Siemens Schütz 230V 45KW"}
"#;

/// Fill the template for one record. Deterministic: the same text, hints
/// and schema always yield the same prompt.
pub fn build_prompt(
    template: &str,
    text: &NormalizedText,
    rule_candidates: &[ExtractionCandidate],
    preliminary: &Categorization,
    schema: &CategorizationSchema,
    max_len: usize,
) -> String {
    let material_types = MaterialType::known()
        .iter()
        .map(|t| t.as_str())
        .chain(std::iter::once(MaterialType::Unknown.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    let values = [
        ("material_types", material_types),
        ("max_len", max_len.to_string()),
        ("schema_hints", schema_hints(schema)),
        ("rule_hints", rule_hints(rule_candidates, preliminary)),
        ("text", text.cleaned()),
    ];
    fill(template, &values)
}

/// Substitute `{name}` placeholders in one pass over the template.
/// Substituted values are never scanned again, so record text that looks
/// like a placeholder stays literal. Unknown names and lone braces are
/// copied through.
fn fill(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Rule findings as a bullet list. Slot values are shown the way the
/// schema names them, from the preliminary categorization.
fn rule_hints(candidates: &[ExtractionCandidate], preliminary: &Categorization) -> String {
    let mut lines: Vec<String> = candidates
        .iter()
        .filter_map(|c| {
            let label = match &c.field {
                CandidateField::ProductName => "product_name".to_string(),
                CandidateField::MaterialType => "material_type".to_string(),
                CandidateField::UnitOfMeasure => "unit_of_measure".to_string(),
                CandidateField::Characteristic { kind } => format!("characteristic ({kind})"),
                CandidateField::Categorization { .. } => return None,
            };
            Some(format!("- {label}: {}", c.value))
        })
        .collect();
    lines.extend(
        preliminary
            .iter()
            .map(|(key, value)| format!("- categorization \"{key}\": {value}")),
    );

    if lines.is_empty() {
        "- (none)".to_string()
    } else {
        lines.join("\n")
    }
}

fn schema_hints(schema: &CategorizationSchema) -> String {
    schema
        .material_types()
        .map(|t| format!("- {t}: {}", schema.attribute_names(t).join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}
