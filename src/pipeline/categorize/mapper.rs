use std::sync::Arc;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::schema::{CategorizationSchema, SchemaAttribute};
use crate::models::{
    CandidateField, CandidateSource, Categorization, ExtractionCandidate, MaterialType, Slot,
};

/// Fills a material type's schema attributes from extraction candidates.
#[derive(Debug, Clone)]
pub struct CategorizationMapper {
    schema: Arc<CategorizationSchema>,
}

impl CategorizationMapper {
    pub fn new(schema: Arc<CategorizationSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &CategorizationSchema {
        &self.schema
    }

    /// Categorization for `material_type`. Keys are always schema attribute
    /// names and values are never blank. Rule candidates fill typed slots,
    /// highest confidence first; LLM entries whose key names an attribute
    /// then override. Types without a schema map to an empty categorization.
    pub fn map(
        &self,
        material_type: MaterialType,
        candidates: &[ExtractionCandidate],
    ) -> Categorization {
        let mut out = Categorization::new();
        let attributes = self.schema.attributes(material_type);
        if attributes.is_empty() {
            return out;
        }

        let mut rule: Vec<&ExtractionCandidate> = candidates
            .iter()
            .filter(|c| c.source == CandidateSource::Rule && c.is_categorization())
            .collect();
        // Stable: detection order survives among equal scores
        rule.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        for candidate in rule {
            let CandidateField::Categorization { slot: Some(slot), .. } = &candidate.field else {
                continue;
            };
            for (slot, value) in expand_slot(material_type, *slot, &candidate.value, attributes) {
                let Some(attribute) = attributes.iter().find(|a| a.slot == Some(slot)) else {
                    continue;
                };
                if !out.contains_key(&attribute.name) {
                    insert_non_blank(&mut out, &attribute.name, &value);
                }
            }
        }

        for candidate in candidates
            .iter()
            .filter(|c| c.source == CandidateSource::Llm)
        {
            let CandidateField::Categorization { slot, key } = &candidate.field else {
                continue;
            };
            let attribute = match slot {
                Some(slot) => attributes.iter().find(|a| a.slot == Some(*slot)),
                None => match_attribute(key, attributes),
            };
            match attribute {
                Some(attribute) => insert_non_blank(&mut out, &attribute.name, &candidate.value),
                None => tracing::debug!(
                    key = %key,
                    material_type = %material_type,
                    "Dropping categorization key outside schema"
                ),
            }
        }

        out
    }
}

fn insert_non_blank(out: &mut Categorization, key: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        out.insert(key.to_string(), value.to_string());
    }
}

/// A dimension code fills the diameter slots of ring-like types when the
/// schema asks for them; anywhere else it stays one size value.
fn expand_slot(
    material_type: MaterialType,
    slot: Slot,
    value: &str,
    attributes: &[SchemaAttribute],
) -> Vec<(Slot, String)> {
    let wants_diameters = attributes
        .iter()
        .any(|a| a.slot == Some(Slot::InnerDiameter) || a.slot == Some(Slot::OuterDiameter));
    if slot != Slot::Size || !material_type.is_annular() || !wants_diameters {
        return vec![(slot, value.to_string())];
    }

    let parts: Vec<&str> = value
        .trim_start_matches('Ø')
        .split(['X', 'x'])
        .map(str::trim)
        .collect();
    match parts.as_slice() {
        [inner, outer, height] => vec![
            (Slot::InnerDiameter, inner.to_string()),
            (Slot::OuterDiameter, outer.to_string()),
            (Slot::Height, height.to_string()),
        ],
        [inner, outer] => vec![
            (Slot::InnerDiameter, inner.to_string()),
            (Slot::OuterDiameter, outer.to_string()),
        ],
        _ => vec![(slot, value.to_string())],
    }
}

/// Match a free-form key against attribute names, then slot aliases,
/// ignoring case, diacritics and trailing colons.
fn match_attribute<'a>(
    key: &str,
    attributes: &'a [SchemaAttribute],
) -> Option<&'a SchemaAttribute> {
    let key = fold_key(key);
    if key.is_empty() {
        return None;
    }
    attributes
        .iter()
        .find(|a| fold_key(&a.name) == key)
        .or_else(|| {
            attributes.iter().find(|a| {
                a.slot
                    .is_some_and(|s| s.aliases().iter().any(|alias| fold_key(alias) == key))
            })
        })
}

pub(crate) fn fold_key(key: &str) -> String {
    key.trim()
        .trim_end_matches(':')
        .trim()
        .to_lowercase()
        .replace('ß', "ss")
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> CategorizationMapper {
        CategorizationMapper::new(Arc::new(CategorizationSchema::default()))
    }

    fn llm_entry(key: &str, value: &str) -> ExtractionCandidate {
        ExtractionCandidate::llm(
            CandidateField::Categorization {
                slot: None,
                key: key.to_string(),
            },
            value,
        )
    }

    #[test]
    fn triple_expands_for_seals() {
        let cands = vec![
            ExtractionCandidate::slot(Slot::Size, "105X130X12", 0.9),
            ExtractionCandidate::slot(Slot::Material, "VITON", 0.85),
        ];
        let cat = mapper().map(MaterialType::Seal, &cands);
        assert_eq!(cat["Innendurchmesser"], "105");
        assert_eq!(cat["Außendurchmesser"], "130");
        assert_eq!(cat["Höhe"], "12");
        assert_eq!(cat["Werkstoff"], "VITON");
    }

    #[test]
    fn pair_stays_a_size_for_fasteners() {
        let cands = vec![ExtractionCandidate::slot(Slot::Size, "20X3", 0.9)];
        let cat = mapper().map(MaterialType::Fastener, &cands);
        assert_eq!(cat.get("Größe").map(String::as_str), Some("20X3"));
        assert!(!cat.contains_key("Innendurchmesser"));
    }

    #[test]
    fn pair_maps_to_diameters_for_rings() {
        let cands = vec![ExtractionCandidate::slot(Slot::Size, "20X2,5", 0.9)];
        let cat = mapper().map(MaterialType::Ring, &cands);
        assert_eq!(cat["Innendurchmesser"], "20");
        assert_eq!(cat["Außendurchmesser"], "2,5");
        assert!(!cat.contains_key("Höhe"));
    }

    #[test]
    fn unknown_type_maps_to_nothing() {
        let cands = vec![ExtractionCandidate::slot(Slot::Material, "VITON", 0.85)];
        assert!(mapper().map(MaterialType::Unknown, &cands).is_empty());
    }

    #[test]
    fn slots_outside_schema_are_dropped() {
        let cands = vec![ExtractionCandidate::slot(Slot::Voltage, "230", 0.8)];
        assert!(mapper().map(MaterialType::Seal, &cands).is_empty());
    }

    #[test]
    fn higher_confidence_rule_wins() {
        let cands = vec![
            ExtractionCandidate::slot(Slot::TypeDesignation, "Kugellager", 0.5),
            ExtractionCandidate::slot(Slot::TypeDesignation, "6204-2RS", 0.75),
        ];
        let cat = mapper().map(MaterialType::Bearing, &cands);
        assert_eq!(cat["Typ"], "6204-2RS");
    }

    #[test]
    fn llm_overrides_rule_for_same_attribute() {
        let cands = vec![
            ExtractionCandidate::slot(Slot::Material, "NBR", 0.85),
            llm_entry("werkstoff", "FKM"),
        ];
        let cat = mapper().map(MaterialType::Seal, &cands);
        assert_eq!(cat["Werkstoff"], "FKM");
    }

    #[test]
    fn llm_keys_match_loosely() {
        let cands = vec![
            llm_entry("AUSSENDURCHMESSER", "130"),
            llm_entry("inner", "105"),
            llm_entry("Hoehe:", "12"),
            llm_entry("Material", "Viton"),
        ];
        let cat = mapper().map(MaterialType::Seal, &cands);
        assert_eq!(cat["Außendurchmesser"], "130");
        assert_eq!(cat["Innendurchmesser"], "105");
        assert_eq!(cat["Höhe"], "12");
        assert_eq!(cat["Werkstoff"], "Viton");
    }

    #[test]
    fn invented_llm_keys_are_dropped() {
        let cands = vec![
            llm_entry("Maschinen-Nr.", "4711"),
            llm_entry("Zeichnung-Nr.", "Z-12"),
        ];
        let cat = mapper().map(MaterialType::Ring, &cands);
        assert!(cat.is_empty());
    }

    #[test]
    fn blank_values_never_appear() {
        let cands = vec![
            ExtractionCandidate::slot(Slot::Material, "  ", 0.85),
            llm_entry("DIN/ISO", ""),
        ];
        assert!(mapper().map(MaterialType::Seal, &cands).is_empty());
    }

    #[test]
    fn keys_stay_inside_schema() {
        let schema = CategorizationSchema::default();
        let cands = vec![
            ExtractionCandidate::slot(Slot::Size, "105X130X12", 0.9),
            ExtractionCandidate::slot(Slot::Voltage, "400", 0.8),
            llm_entry("Farbe", "schwarz"),
        ];
        for t in MaterialType::known() {
            let cat = mapper().map(*t, &cands);
            assert!(cat.keys().all(|k| schema.contains_key(*t, k)));
        }
    }

    #[test]
    fn folds_keys() {
        assert_eq!(fold_key(" Außendurchmesser: "), "aussendurchmesser");
        assert_eq!(fold_key("Größe"), "grosse");
    }
}
