use crate::models::MaterialType;

/// German compound nouns carry the part type somewhere inside the word
/// (`WELLENDICHTRING`, `SCHRÄGKUGELLAGER`), so keywords are matched as
/// substrings. Order matters: the first matching row wins, which keeps
/// `SICHERUNGSRING` a ring rather than an electrical fuse.
const TYPE_KEYWORDS: &[(MaterialType, &[&str])] = &[
    (
        MaterialType::Seal,
        &[
            "DICHT", "SIMMERRING", "O-RING", "ORING", "MANSCHETTE", "STOPFBUCHS", "PACKUNG",
        ],
    ),
    (MaterialType::Filter, &["FILTER"]),
    (MaterialType::Bearing, &["LAGER"]),
    (MaterialType::Valve, &["VENTIL", "KLAPPE", "SCHIEBER", "HAHN"]),
    (MaterialType::Ring, &["RING"]),
    (
        MaterialType::Electrical,
        &[
            "SCHÜTZ", "SCHUETZ", "RELAIS", "MOTOR", "SICHERUNG", "SPANNUNG", "LEISTUNG", "KABEL",
            "SCHALTER", "SENSOR", "NETZTEIL",
        ],
    ),
    (
        MaterialType::Fastener,
        &[
            "SCHRAUBE", "MUTTER", "SCHEIBE", "BOLZEN", "DÜBEL", "NIET", "GEWINDESTANGE", "STIFT",
        ],
    ),
    (
        MaterialType::Pipe,
        &["ROHR", "SCHLAUCH", "FITTING", "BOGEN", "FLANSCH", "MUFFE"],
    ),
    (
        MaterialType::Mechanical,
        &[
            "WELLE", "BUCHSE", "KUPPLUNG", "ZAHNRAD", "RIEMEN", "KETTE", "FEDER", "HÜLSE",
        ],
    ),
];

/// Confidence of a keyword hit in the product segment; a hit elsewhere in
/// the text scores lower.
const PRODUCT_HIT_CONFIDENCE: f32 = 0.7;
const TEXT_HIT_CONFIDENCE: f32 = 0.5;

fn keyword_type(upper: &str) -> Option<MaterialType> {
    TYPE_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| upper.contains(w)))
        .map(|(t, _)| *t)
}

/// Guess the material type from the uppercase product segment, then from
/// the whole uppercase text.
pub fn classify_material_type(product: &str, full_text: &str) -> Option<(MaterialType, f32)> {
    if let Some(t) = keyword_type(product) {
        return Some((t, PRODUCT_HIT_CONFIDENCE));
    }
    keyword_type(full_text).map(|t| (t, TEXT_HIT_CONFIDENCE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Option<MaterialType> {
        classify_material_type(text, text).map(|(t, _)| t)
    }

    #[test]
    fn compound_nouns() {
        assert_eq!(classify("WELLENDICHTRING"), Some(MaterialType::Seal));
        assert_eq!(classify("SCHRÄGKUGELLAGER 7205"), Some(MaterialType::Bearing));
        assert_eq!(classify("APIC WASSERFILTER FMA 9000"), Some(MaterialType::Filter));
        assert_eq!(classify("SIEMENS SCHÜTZ"), Some(MaterialType::Electrical));
        assert_eq!(classify("SECHSKANTSCHRAUBE M10X40"), Some(MaterialType::Fastener));
        assert_eq!(classify("KUGELHAHN DN 50"), Some(MaterialType::Valve));
    }

    #[test]
    fn table_order_breaks_ties() {
        assert_eq!(classify("SICHERUNGSRING DIN 471"), Some(MaterialType::Ring));
        assert_eq!(classify("O-RING 20X3"), Some(MaterialType::Seal));
    }

    #[test]
    fn product_segment_scores_higher() {
        let (t, conf) = classify_material_type("APIC", "APIC | ERSATZFILTER").unwrap();
        assert_eq!(t, MaterialType::Filter);
        assert!(conf < PRODUCT_HIT_CONFIDENCE);
    }

    #[test]
    fn no_keyword_no_type() {
        assert_eq!(classify("FMA 9000"), None);
        assert_eq!(classify(""), None);
    }
}
