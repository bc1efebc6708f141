use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{MaterialType, Slot};

/// One expected attribute of a material type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaAttribute {
    /// Key as written to the output sheet.
    pub name: String,
    /// Typed slot rule matches fill. Attributes without a slot can only be
    /// filled by the LLM.
    #[serde(default)]
    pub slot: Option<Slot>,
}

impl SchemaAttribute {
    pub fn new(name: &str, slot: Slot) -> Self {
        Self {
            name: name.to_string(),
            slot: Some(slot),
        }
    }
}

/// material_type → ordered attribute list. Loaded once, shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorizationSchema {
    types: BTreeMap<MaterialType, Vec<SchemaAttribute>>,
}

impl CategorizationSchema {
    pub fn new(types: BTreeMap<MaterialType, Vec<SchemaAttribute>>) -> Self {
        Self { types }
    }

    /// Attributes for a material type; empty when the type has no schema.
    pub fn attributes(&self, material_type: MaterialType) -> &[SchemaAttribute] {
        self.types
            .get(&material_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_schema(&self, material_type: MaterialType) -> bool {
        !self.attributes(material_type).is_empty()
    }

    pub fn contains_key(&self, material_type: MaterialType, key: &str) -> bool {
        self.attributes(material_type).iter().any(|a| a.name == key)
    }

    pub fn attribute_names(&self, material_type: MaterialType) -> Vec<&str> {
        self.attributes(material_type)
            .iter()
            .map(|a| a.name.as_str())
            .collect()
    }

    pub fn material_types(&self) -> impl Iterator<Item = MaterialType> + '_ {
        self.types.keys().copied()
    }

    /// Reject schemas the mapper cannot honour: an entry for `unknown`,
    /// blank names, or a name listed twice for one type.
    pub fn validate(&self) -> Result<(), String> {
        if self.types.contains_key(&MaterialType::Unknown) {
            return Err("schema must not define attributes for 'unknown'".into());
        }
        for (material_type, attributes) in &self.types {
            let mut seen = HashSet::new();
            for attribute in attributes {
                if attribute.name.trim().is_empty() {
                    return Err(format!("blank attribute name for '{material_type}'"));
                }
                if !seen.insert(attribute.name.as_str()) {
                    return Err(format!(
                        "attribute '{}' listed twice for '{material_type}'",
                        attribute.name
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for CategorizationSchema {
    fn default() -> Self {
        use Slot::*;

        let a = SchemaAttribute::new;
        let annular = |height: &str, with_brand: bool| {
            let mut attrs = vec![
                a("Typ", TypeDesignation),
                a("Innendurchmesser", InnerDiameter),
                a("Außendurchmesser", OuterDiameter),
                a(height, Height),
                a("Werkstoff", Material),
                a("DIN/ISO", Standard),
            ];
            if with_brand {
                attrs.push(a("Hersteller", Manufacturer));
            }
            attrs
        };

        let mut types = BTreeMap::new();
        types.insert(MaterialType::Seal, annular("Höhe", true));
        types.insert(MaterialType::Ring, annular("Höhe", false));
        types.insert(
            MaterialType::Bearing,
            vec![
                a("Typ", TypeDesignation),
                a("Innendurchmesser", InnerDiameter),
                a("Außendurchmesser", OuterDiameter),
                a("Breite", Height),
                a("Hersteller", Manufacturer),
                a("Bezeichnung", PartNumber),
            ],
        );
        types.insert(
            MaterialType::Valve,
            vec![
                a("Typ", TypeDesignation),
                a("Werkstoff", Material),
                a("Größe", NominalSize),
                a("DIN/ISO", Standard),
                a("Druckstufe", PressureRating),
                a("Anschluss", Thread),
                a("Hersteller", Manufacturer),
            ],
        );
        types.insert(
            MaterialType::Filter,
            vec![
                a("Typ", TypeDesignation),
                a("Hersteller", Manufacturer),
                a("Referenz", PartNumber),
                a("Größe", Size),
                a("Werkstoff", Material),
            ],
        );
        types.insert(
            MaterialType::Electrical,
            vec![
                a("Typ", TypeDesignation),
                a("Hersteller", Manufacturer),
                a("Spannung (V)", Voltage),
                a("Leistung (kW)", Power),
                a("Frequenz (Hz)", Frequency),
                a("Strom (A)", Current),
                a("Referenz", PartNumber),
            ],
        );
        types.insert(
            MaterialType::Fastener,
            vec![
                a("Typ", TypeDesignation),
                a("Gewinde", Thread),
                a("Größe", Size),
                a("Werkstoff", Material),
                a("DIN/ISO", Standard),
            ],
        );
        types.insert(
            MaterialType::Pipe,
            vec![
                a("Typ", TypeDesignation),
                a("Nennweite", NominalSize),
                a("Größe", Size),
                a("Druckstufe", PressureRating),
                a("Werkstoff", Material),
                a("DIN/ISO", Standard),
                a("Anschluss", Thread),
            ],
        );
        types.insert(
            MaterialType::Mechanical,
            vec![
                a("Typ", TypeDesignation),
                a("Größe", Size),
                a("Werkstoff", Material),
                a("Hersteller", Manufacturer),
                a("Referenz", PartNumber),
                a("DIN/ISO", Standard),
            ],
        );
        Self { types }
    }
}
