//! Word lists the rule matchers compile into alternations. Brands and extra
//! material codes are extended from configuration.

use regex::Regex;

/// Alloy, polymer and elastomer abbreviations seen in material texts.
pub const DEFAULT_MATERIAL_CODES: &[&str] = &[
    "VITON", "FKM", "FPM", "FFKM", "NBR", "HNBR", "EPDM", "VMQ", "SILIKON", "SILICON", "PTFE",
    "TEFLON", "PU", "PUR", "POM", "PA", "PA6", "PA66", "PE", "PE-HD", "PP", "PVC", "PVDF", "PEEK",
    "NYLON", "EDELSTAHL", "NIRO", "INOX", "V2A", "V4A", "MESSING", "BRONZE", "ROTGUSS", "GUSS",
    "GG25", "GGG40", "GJL-250", "STAHL", "ST37", "S235", "S235JR", "S355", "C45", "42CRMO4",
    "16MNCR5", "ALU", "ALUMINIUM", "KUPFER", "GRAPHIT", "KERAMIK",
];

/// Manufacturers frequent enough in plant maintenance stock to be worth
/// recognizing without the LLM.
pub const DEFAULT_BRANDS: &[&str] = &[
    "SIEMENS", "SKF", "FAG", "INA", "NSK", "NTN", "TIMKEN", "SCHAEFFLER", "FREUDENBERG", "SIMRIT",
    "TRELLEBORG", "PARKER", "FESTO", "BOSCH", "REXROTH", "BÜRKERT", "BUERKERT", "GEMÜ", "ABB",
    "SCHNEIDER", "DANFOSS", "GRUNDFOS", "KSB", "SEW", "LENZE", "PHOENIX CONTACT", "WAGO", "IFM",
    "SICK", "PEPPERL+FUCHS", "ENDRESS+HAUSER", "VEGA", "SAMSON", "ARI", "APIC", "HAWE", "HYDAC",
    "MANN+HUMMEL", "MAHLE", "ELRING", "KLINGER",
];

/// Compiled brand and material-code alternations.
#[derive(Debug, Clone)]
pub struct Lexicon {
    pub materials: Option<Regex>,
    pub brands: Option<Regex>,
}

impl Lexicon {
    /// Built-in material codes plus `extra_material_codes`; brands exactly
    /// as configured.
    pub fn new(brands: &[String], extra_material_codes: &[String]) -> Result<Self, regex::Error> {
        let mut materials: Vec<String> = DEFAULT_MATERIAL_CODES
            .iter()
            .map(|s| s.to_string())
            .collect();
        materials.extend(extra_material_codes.iter().cloned());
        Ok(Self {
            materials: word_alternation(&materials)?,
            brands: word_alternation(brands)?,
        })
    }
}

/// Map a unit spelling to the ERP base unit code.
pub fn canonical_unit(token: &str) -> Option<&'static str> {
    let unit = match token.trim().trim_end_matches('.').to_uppercase().as_str() {
        "ST" | "STK" | "STCK" | "STÜCK" | "STUECK" | "PC" | "PCS" => "ST",
        "M" | "MTR" | "METER" | "LFM" => "M",
        "KG" => "KG",
        "L" | "LTR" | "LITER" => "L",
        "SATZ" | "SET" | "SAT" => "SATZ",
        "PAAR" | "PAA" | "PR" => "PAAR",
        "PAK" | "PACK" | "PCK" | "PAKET" => "PAK",
        "ROL" | "ROLLE" | "RLL" => "ROL",
        "M2" => "M2",
        "M3" => "M3",
        "KAR" | "KARTON" => "KAR",
        _ => return None,
    };
    Some(unit)
}

/// Compile a whole-word alternation over uppercase entries. Longer entries
/// come first so `PA66` wins over `PA`.
pub fn word_alternation(words: &[String]) -> Result<Option<Regex>, regex::Error> {
    let mut upper: Vec<String> = words
        .iter()
        .map(|w| w.trim().to_uppercase())
        .filter(|w| !w.is_empty())
        .collect();
    if upper.is_empty() {
        return Ok(None);
    }
    upper.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    upper.dedup();

    let body = upper
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    // \b only works next to word characters; entries may end in '+' etc.
    Regex::new(&format!(r"(?:^|[^\p{{L}}\p{{N}}])({body})(?:$|[^\p{{L}}\p{{N}}])")).map(Some)
}

/// All `(start, end)` spans of group 1 of a [`word_alternation`] regex.
/// Each search resumes at the end of the previous word so a shared
/// delimiter (`NBR/PE`) can open the next match.
pub fn find_words(re: &Regex, text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut at = 0;
    while at <= text.len() {
        let Some(caps) = re.captures_at(text, at) else {
            break;
        };
        let Some(word) = caps.get(1) else {
            break;
        };
        spans.push((word.start(), word.end()));
        at = word.end();
    }
    spans
}
