//! The matcher battery. Every matcher runs on one uppercase segment and is
//! independent of the others; overlaps between matchers are left for the
//! resolver. Only dimension matches are de-overlapped here.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::lexicon::{canonical_unit, find_words, Lexicon};
use crate::models::{CharacteristicKind, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Dimension,
    MaterialCode,
    Standard,
    PressureRating,
    NominalSize,
    Thread,
    Voltage,
    Power,
    Frequency,
    Current,
    Manufacturer,
    PartNumber,
    TypeDesignation,
    Quantity,
}

impl MatchKind {
    pub fn characteristic_kind(&self) -> CharacteristicKind {
        match self {
            Self::Dimension => CharacteristicKind::Dimension,
            Self::MaterialCode => CharacteristicKind::MaterialCode,
            Self::Standard => CharacteristicKind::StandardCode,
            Self::PressureRating => CharacteristicKind::PressureRating,
            Self::NominalSize => CharacteristicKind::NominalSize,
            Self::Thread => CharacteristicKind::Thread,
            Self::Voltage | Self::Power | Self::Frequency | Self::Current => {
                CharacteristicKind::Electrical
            }
            Self::Manufacturer => CharacteristicKind::Manufacturer,
            Self::PartNumber => CharacteristicKind::PartNumber,
            Self::TypeDesignation => CharacteristicKind::Other,
            Self::Quantity => CharacteristicKind::Quantity,
        }
    }

    /// Categorization slot the match can fill. Quantities feed the unit of
    /// measure instead.
    pub fn slot(&self) -> Option<Slot> {
        let slot = match self {
            Self::Dimension => Slot::Size,
            Self::MaterialCode => Slot::Material,
            Self::Standard => Slot::Standard,
            Self::PressureRating => Slot::PressureRating,
            Self::NominalSize => Slot::NominalSize,
            Self::Thread => Slot::Thread,
            Self::Voltage => Slot::Voltage,
            Self::Power => Slot::Power,
            Self::Frequency => Slot::Frequency,
            Self::Current => Slot::Current,
            Self::Manufacturer => Slot::Manufacturer,
            Self::PartNumber => Slot::PartNumber,
            Self::TypeDesignation => Slot::TypeDesignation,
            Self::Quantity => return None,
        };
        Some(slot)
    }

    /// Brand and type tokens are part of how a product is named; every
    /// other kind is lifted out of the first segment.
    pub fn stays_in_name(&self) -> bool {
        matches!(self, Self::Manufacturer | Self::TypeDesignation)
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Self::Dimension | Self::Standard | Self::PressureRating | Self::NominalSize => 0.9,
            Self::MaterialCode | Self::Thread | Self::PartNumber => 0.85,
            Self::Voltage | Self::Power | Self::Frequency | Self::Current => 0.8,
            Self::Manufacturer | Self::TypeDesignation => 0.75,
            Self::Quantity => 0.7,
        }
    }
}

/// One matcher hit inside a segment's uppercase text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub kind: MatchKind,
    /// Byte span in the segment's uppercase text.
    pub start: usize,
    pub end: usize,
    /// Normalized value for categorization.
    pub value: String,
}

impl RuleMatch {
    fn new(kind: MatchKind, start: usize, end: usize, value: String) -> Self {
        Self {
            kind,
            start,
            end,
            value,
        }
    }

    fn len(&self) -> usize {
        self.end - self.start
    }

    fn overlaps(&self, other: &RuleMatch) -> bool {
        self.start < other.end && other.start < self.end
    }
}

const NUM: &str = r"\d+(?:[.,]\d+)?";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static DIM_TRIPLE: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?:Ø\s*|\b)({NUM})\s*[X*]\s*({NUM})\s*[X*]\s*({NUM})(?:\s*MM)?\b"
    ))
});

static DIM_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(r"(?:Ø\s*|\b)({NUM})\s*[X*]\s*({NUM})(?:\s*MM)?\b"))
});

static DIAMETER: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"Ø\s*({NUM})(?:\s*MM)?\b")));

static MATERIAL_NUMBER: LazyLock<Regex> = LazyLock::new(|| compile(r"\b(1\.[0-9]{4})\b"));

static STANDARD: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(DIN\s+EN\s+ISO|DIN\s+EN|DIN\s+ISO|EN\s+ISO|DIN|ISO|EN|ASME|ANSI|VDE|IEC|VDI)\s*-?\s*(\d{2,6}(?:[-.:]\d+)*)\b",
    )
});

static PRESSURE_PN: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"\bPN\s*({NUM})\b")));

static PRESSURE_BAR: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"\b({NUM})\s*BAR\b")));

static NOMINAL_DN: LazyLock<Regex> = LazyLock::new(|| compile(r"\bDN\s*(\d+)\b"));

static METRIC_THREAD: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"\b(M(?:[3-9]|[1-9]\d)(?:[.,]\d+)?(?:\s*X\s*{NUM})?)\b"
    ))
});

static PIPE_THREAD: LazyLock<Regex> = LazyLock::new(|| {
    compile(r#"\b((?:G|RP|R|NPT)\s?(?:\d+(?:\s\d+)?/\d+|\d+(?:[.,]\d+)?\s*"))"#)
});

static VOLTAGE: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"\b({NUM})\s?V(?:AC|DC)?\b")));

static POWER: LazyLock<Regex> = LazyLock::new(|| compile(&format!(r"\b({NUM})\s?KW\b")));

static FREQUENCY: LazyLock<Regex> = LazyLock::new(|| compile(&format!(r"\b({NUM})\s?HZ\b")));

static CURRENT: LazyLock<Regex> = LazyLock::new(|| compile(&format!(r"\b({NUM})\s?A\b")));

static PART_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:REFERENZ|REF|ART(?:IKEL)?[.-]?\s?NR|BEST(?:ELL)?[.-]?\s?NR|MAT[.-]?\s?NR|TEILE?[.-]?\s?NR|ID[.-]?\s?NR)\b\.?\s*:?\s*([A-Z0-9][A-Z0-9/.\-]*[A-Z0-9]|[A-Z0-9])",
    )
});

static TYPE_DESIGNATION: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\b(?:TYPE|TYP|BAUFORM|BAUART)\b\.?\s*:?\s*([A-Z0-9][A-Z0-9/.\-]*)")
});

static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"\b({NUM})\s?(STK|STÜCK|STUECK|ST|MTR|METER|M|KG|LTR|LITER|L|SATZ|SET|PAAR|PAK|ROLLE|ROL)\b"
    ))
});

fn collect<F>(re: &Regex, upper: &str, kind: MatchKind, value: F) -> Vec<RuleMatch>
where
    F: Fn(&Captures) -> String,
{
    re.captures_iter(upper)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(RuleMatch::new(kind, whole.start(), whole.end(), value(&caps)))
        })
        .collect()
}

fn group(caps: &Captures, i: usize) -> String {
    caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default()
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Dimension triples, pairs and single diameters. Overlapping candidates
/// are resolved by longest span, then leftmost.
pub fn dimension_matches(upper: &str) -> Vec<RuleMatch> {
    let joined = |caps: &Captures| {
        (1..caps.len())
            .filter_map(|i| caps.get(i))
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join("X")
    };
    let mut all = collect(&DIM_TRIPLE, upper, MatchKind::Dimension, joined);
    all.extend(collect(&DIM_PAIR, upper, MatchKind::Dimension, joined));
    all.extend(collect(&DIAMETER, upper, MatchKind::Dimension, |c| {
        format!("Ø{}", group(c, 1))
    }));
    select_non_overlapping(all)
}

fn select_non_overlapping(mut candidates: Vec<RuleMatch>) -> Vec<RuleMatch> {
    candidates.sort_by(|a, b| b.len().cmp(&a.len()).then(a.start.cmp(&b.start)));
    let mut chosen: Vec<RuleMatch> = Vec::new();
    for c in candidates {
        if !chosen.iter().any(|k| k.overlaps(&c)) {
            chosen.push(c);
        }
    }
    chosen.sort_by_key(|m| m.start);
    chosen
}

pub fn material_matches(upper: &str, lexicon: &Lexicon) -> Vec<RuleMatch> {
    let mut out: Vec<RuleMatch> = lexicon
        .materials
        .as_ref()
        .map(|re| {
            find_words(re, upper)
                .into_iter()
                .map(|(s, e)| {
                    RuleMatch::new(MatchKind::MaterialCode, s, e, upper[s..e].to_string())
                })
                .collect()
        })
        .unwrap_or_default();
    for m in collect(&MATERIAL_NUMBER, upper, MatchKind::MaterialCode, |c| group(c, 1)) {
        if !out.iter().any(|o| o.overlaps(&m)) {
            out.push(m);
        }
    }
    out.sort_by_key(|m| m.start);
    out
}

pub fn standard_matches(upper: &str) -> Vec<RuleMatch> {
    let mut out = collect(&STANDARD, upper, MatchKind::Standard, |c| {
        format!("{} {}", collapse(&group(c, 1)), group(c, 2))
    });
    out.extend(collect(&PRESSURE_PN, upper, MatchKind::PressureRating, |c| {
        format!("PN {}", group(c, 1))
    }));
    out.extend(collect(&PRESSURE_BAR, upper, MatchKind::PressureRating, |c| {
        format!("{} BAR", group(c, 1))
    }));
    out.extend(collect(&NOMINAL_DN, upper, MatchKind::NominalSize, |c| {
        format!("DN {}", group(c, 1))
    }));
    out
}

pub fn thread_matches(upper: &str) -> Vec<RuleMatch> {
    let mut out = collect(&METRIC_THREAD, upper, MatchKind::Thread, |c| {
        group(c, 1).split_whitespace().collect()
    });
    out.extend(collect(&PIPE_THREAD, upper, MatchKind::Thread, |c| {
        collapse(&group(c, 1))
    }));
    out
}

pub fn electrical_matches(upper: &str) -> Vec<RuleMatch> {
    let mut out = collect(&VOLTAGE, upper, MatchKind::Voltage, |c| group(c, 1));
    out.extend(collect(&POWER, upper, MatchKind::Power, |c| group(c, 1)));
    out.extend(collect(&FREQUENCY, upper, MatchKind::Frequency, |c| group(c, 1)));
    out.extend(collect(&CURRENT, upper, MatchKind::Current, |c| group(c, 1)));
    out
}

pub fn brand_matches(upper: &str, lexicon: &Lexicon) -> Vec<RuleMatch> {
    lexicon
        .brands
        .as_ref()
        .map(|re| {
            find_words(re, upper)
                .into_iter()
                .map(|(s, e)| {
                    RuleMatch::new(MatchKind::Manufacturer, s, e, upper[s..e].to_string())
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn reference_matches(upper: &str) -> Vec<RuleMatch> {
    let mut out = collect(&PART_NUMBER, upper, MatchKind::PartNumber, |c| group(c, 1));
    out.extend(collect(&TYPE_DESIGNATION, upper, MatchKind::TypeDesignation, |c| {
        group(c, 1)
    }));
    out
}

/// Quantity tokens (`10 M`, `2 STK`); the value is the canonical unit.
pub fn quantity_matches(upper: &str) -> Vec<RuleMatch> {
    QUANTITY
        .captures_iter(upper)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let unit = canonical_unit(caps.get(2)?.as_str())?;
            Some(RuleMatch::new(
                MatchKind::Quantity,
                whole.start(),
                whole.end(),
                unit.to_string(),
            ))
        })
        .collect()
}

/// Run the full battery over one uppercase segment, in matcher priority
/// order, each group sorted by position.
pub fn match_segment(upper: &str, lexicon: &Lexicon) -> Vec<RuleMatch> {
    let mut all = Vec::new();
    all.extend(dimension_matches(upper));
    all.extend(material_matches(upper, lexicon));
    all.extend(standard_matches(upper));
    all.extend(thread_matches(upper));
    all.extend(electrical_matches(upper));
    all.extend(brand_matches(upper, lexicon));
    all.extend(reference_matches(upper));
    all.extend(quantity_matches(upper));
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::rules::lexicon::DEFAULT_BRANDS;

    fn lexicon() -> Lexicon {
        let brands: Vec<String> = DEFAULT_BRANDS.iter().map(|s| s.to_string()).collect();
        Lexicon::new(&brands, &[]).unwrap()
    }

    fn values(matches: &[RuleMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.value.as_str()).collect()
    }

    #[test]
    fn dimension_triple() {
        let m = dimension_matches("105X130X12");
        assert_eq!(values(&m), vec!["105X130X12"]);
        assert_eq!((m[0].start, m[0].end), (0, 10));
    }

    #[test]
    fn dimension_triple_with_spaces_and_unit() {
        let m = dimension_matches("MASSE 105 X 130 X 12 MM");
        assert_eq!(values(&m), vec!["105X130X12"]);
    }

    #[test]
    fn pair_with_decimal_comma() {
        assert_eq!(values(&dimension_matches("O-RING 20X2,5")), vec!["20X2,5"]);
    }

    #[test]
    fn longest_overlapping_dimension_wins() {
        // Ø20 alone and the Ø20X3 pair overlap; the longer pair is kept
        let m = dimension_matches("Ø20X3");
        assert_eq!(values(&m), vec!["20X3"]);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn equal_length_overlaps_prefer_leftmost() {
        let picked = select_non_overlapping(vec![
            RuleMatch::new(MatchKind::Dimension, 2, 6, "b".into()),
            RuleMatch::new(MatchKind::Dimension, 0, 4, "a".into()),
        ]);
        assert_eq!(values(&picked), vec!["a"]);
    }

    #[test]
    fn separate_dimensions_both_fire() {
        let m = dimension_matches("20X3 UND 30X4");
        assert_eq!(values(&m), vec!["20X3", "30X4"]);
    }

    #[test]
    fn metric_thread_is_not_a_dimension() {
        assert!(dimension_matches("M10X1,5").is_empty());
        assert_eq!(values(&thread_matches("M10X1,5")), vec!["M10X1,5"]);
    }

    #[test]
    fn single_diameter() {
        assert_eq!(values(&dimension_matches("ROHR Ø 48,3")), vec!["Ø48,3"]);
    }

    #[test]
    fn diameter_swallows_its_unit() {
        let m = dimension_matches("GLEITRINGDICHTUNG Ø 40 MM");
        assert_eq!(values(&m), vec!["Ø40"]);
        assert_eq!(&"GLEITRINGDICHTUNG Ø 40 MM"[m[0].start..m[0].end], "Ø 40 MM");
    }

    #[test]
    fn material_codes_and_numbers() {
        let lex = lexicon();
        assert_eq!(values(&material_matches("SL/VITON", &lex)), vec!["VITON"]);
        assert_eq!(
            values(&material_matches("WELLE 1.4571 C45", &lex)),
            vec!["1.4571", "C45"]
        );
    }

    #[test]
    fn extra_material_codes_from_config() {
        let lex = Lexicon::new(&[], &["HYTREL".to_string()]).unwrap();
        assert_eq!(values(&material_matches("MEMBRAN HYTREL", &lex)), vec!["HYTREL"]);
    }

    #[test]
    fn standard_pressure_and_nominal_codes() {
        let m = standard_matches("DIN 3760 PN16 DN 50 DIN EN ISO 4014");
        let v = values(&m);
        assert!(v.contains(&"DIN 3760"));
        assert!(v.contains(&"DIN EN ISO 4014"));
        assert!(v.contains(&"PN 16"));
        assert!(v.contains(&"DN 50"));
    }

    #[test]
    fn electrical_ratings() {
        let m = electrical_matches("LEISTUNG 45,0 KW/400V 50HZ/AC 16A");
        let kinds: Vec<MatchKind> = m.iter().map(|x| x.kind).collect();
        assert_eq!(values(&m), vec!["400", "45,0", "50", "16"]);
        assert_eq!(
            kinds,
            vec![
                MatchKind::Voltage,
                MatchKind::Power,
                MatchKind::Frequency,
                MatchKind::Current
            ]
        );
    }

    #[test]
    fn brands_are_recognized() {
        let lex = lexicon();
        assert_eq!(values(&brand_matches("SIEMENS SCHÜTZ", &lex)), vec!["SIEMENS"]);
        assert!(brand_matches("WASSERFILTER", &lex).is_empty());
    }

    #[test]
    fn part_number_reference() {
        let m = reference_matches("REF: 9000/CPF01/230/VH");
        assert_eq!(values(&m), vec!["9000/CPF01/230/VH"]);
        assert_eq!(m[0].kind, MatchKind::PartNumber);
    }

    #[test]
    fn keyword_must_stand_alone() {
        assert!(reference_matches("TYPENSCHILD").is_empty());
        assert_eq!(values(&reference_matches("REFERENZ 4711")), vec!["4711"]);
    }

    #[test]
    fn type_designation() {
        let m = reference_matches("TYP BASL");
        assert_eq!(values(&m), vec!["BASL"]);
        assert_eq!(m[0].kind, MatchKind::TypeDesignation);
    }

    #[test]
    fn quantity_yields_canonical_unit() {
        assert_eq!(values(&quantity_matches("SCHLAUCH 10 MTR")), vec!["M"]);
        assert_eq!(values(&quantity_matches("2 STÜCK")), vec!["ST"]);
        assert!(quantity_matches("M10").is_empty());
    }

    #[test]
    fn no_match_for_plain_words() {
        assert!(match_segment("BA", &lexicon()).is_empty());
    }
}
