//! Rule-Based Extractor.
//!
//! Runs the matcher battery over every segment of a normalized record and
//! emits `rule` candidates. Matchers never veto each other; the resolver
//! and the categorization mapper decide between conflicting candidates.

pub mod classify;
pub mod lexicon;
pub mod patterns;

use crate::config::PipelineConfig;
use crate::models::{CandidateField, CharacteristicKind, ExtractionCandidate, MaterialType, Slot};
use crate::pipeline::normalize::{NormalizedText, Segment};

use classify::classify_material_type;
use lexicon::{canonical_unit, Lexicon};
use patterns::{match_segment, MatchKind, RuleMatch};

const PRODUCT_NAME_CONFIDENCE: f32 = 0.6;
const PRODUCT_AS_TYPE_CONFIDENCE: f32 = 0.5;
const UNIT_SEGMENT_CONFIDENCE: f32 = 0.8;
const OTHER_CHARACTERISTIC_CONFIDENCE: f32 = 0.5;

const FOR_PREFIXES: &[&str] = &["FÜR ", "FUER "];

pub struct RuleExtractor {
    lexicon: Lexicon,
}

impl RuleExtractor {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, regex::Error> {
        Ok(Self::new(Lexicon::new(
            &config.known_brands,
            &config.extra_material_codes,
        )?))
    }

    /// All rule candidates for a record, in detection order. An empty
    /// record yields no candidates.
    pub fn extract(&self, text: &NormalizedText) -> Vec<ExtractionCandidate> {
        let mut out = Vec::new();
        let Some(first) = text.first_segment() else {
            return out;
        };

        let first_matches = match_segment(&first.upper, &self.lexicon);
        let name_start = for_prefix_len(&first.upper);
        let product = product_name(first, name_start, &first_matches);
        out.push(ExtractionCandidate::rule(
            CandidateField::ProductName,
            product.clone(),
            PRODUCT_NAME_CONFIDENCE,
        ));

        if let Some((material_type, confidence)) =
            classify_material_type(&first.upper[name_start..], &text.upper())
        {
            out.push(ExtractionCandidate::rule(
                CandidateField::MaterialType,
                material_type.as_str(),
                confidence,
            ));
        }

        let mut explicit_type = false;

        // Specification tokens lifted out of the product segment
        for span in merge_spans(first_matches.iter().filter(|m| !m.kind.stays_in_name())) {
            let in_span: Vec<&RuleMatch> = first_matches
                .iter()
                .filter(|m| m.start >= span.0 && m.end <= span.1)
                .collect();
            if in_span.iter().all(|m| m.kind == MatchKind::Quantity) {
                continue;
            }
            push_characteristic(&mut out, first.raw_slice(span.0, span.1), &in_span);
        }
        explicit_type |= self.push_slots(&mut out, first, &first_matches);

        for segment in &text.segments[1..] {
            if let Some(unit) = canonical_unit(&segment.raw) {
                out.push(ExtractionCandidate::rule(
                    CandidateField::UnitOfMeasure,
                    unit,
                    UNIT_SEGMENT_CONFIDENCE,
                ));
                continue;
            }
            let matches = match_segment(&segment.upper, &self.lexicon);
            let refs: Vec<&RuleMatch> = matches.iter().collect();
            push_characteristic(&mut out, &segment.raw, &refs);
            explicit_type |= self.push_slots(&mut out, segment, &matches);
        }

        if !explicit_type {
            out.push(ExtractionCandidate::slot(
                Slot::TypeDesignation,
                product,
                PRODUCT_AS_TYPE_CONFIDENCE,
            ));
        }
        out
    }

    /// Classify a free-standing characteristic (e.g. one the LLM returned)
    /// by its most salient pattern.
    pub fn classify_characteristic(&self, value: &str) -> CharacteristicKind {
        let matches = match_segment(&value.to_uppercase(), &self.lexicon);
        let refs: Vec<&RuleMatch> = matches.iter().collect();
        most_salient(&refs).map_or(CharacteristicKind::Other, |m| m.kind.characteristic_kind())
    }

    /// Material-type guess for text without running the full battery.
    pub fn classify_material_type(&self, text: &NormalizedText) -> Option<MaterialType> {
        let first = text.first_segment()?;
        classify_material_type(&first.upper, &text.upper()).map(|(t, _)| t)
    }

    /// Emit slot and unit candidates for a segment's matches. Returns true
    /// when an explicit type designation was among them.
    fn push_slots(
        &self,
        out: &mut Vec<ExtractionCandidate>,
        segment: &Segment,
        matches: &[RuleMatch],
    ) -> bool {
        let mut explicit_type = false;
        for m in matches {
            if m.kind == MatchKind::Quantity {
                out.push(ExtractionCandidate::rule(
                    CandidateField::UnitOfMeasure,
                    m.value.clone(),
                    m.kind.confidence(),
                ));
                continue;
            }
            let Some(slot) = m.kind.slot() else {
                continue;
            };
            let value = match m.kind {
                MatchKind::Manufacturer | MatchKind::MaterialCode => {
                    segment.raw_slice(m.start, m.end).to_string()
                }
                _ => m.value.clone(),
            };
            explicit_type |= slot == Slot::TypeDesignation;
            out.push(ExtractionCandidate::slot(slot, value, m.kind.confidence()));
        }
        explicit_type
    }
}

fn for_prefix_len(upper: &str) -> usize {
    FOR_PREFIXES
        .iter()
        .find(|p| upper.starts_with(**p) && upper.len() > p.len())
        .map_or(0, |p| p.len())
}

/// Product name: the first segment without a leading "für" and without the
/// specification tokens found in it. A letterless fragment right after a
/// lifted token (the `70` of `NBR 70`) qualifies that token and goes with
/// it. Falls back to the whole segment when nothing nameable is left.
fn product_name(first: &Segment, name_start: usize, matches: &[RuleMatch]) -> String {
    let cuts = merge_spans(
        matches
            .iter()
            .filter(|m| !m.kind.stays_in_name() && m.start >= name_start),
    );

    let mut pieces = Vec::new();
    let mut at = name_start;
    let mut after_cut = false;
    for (start, end) in cuts {
        if start > at {
            push_piece(&mut pieces, first.raw_slice(at, start), after_cut);
        }
        at = at.max(end);
        after_cut = true;
    }
    if at < first.upper.len() {
        push_piece(&mut pieces, first.raw_slice(at, first.upper.len()), after_cut);
    }

    let name = tidy(&pieces.join(" "));
    if name.chars().any(|c| c.is_alphabetic()) {
        return name;
    }
    let whole = tidy(first.raw_slice(name_start, first.upper.len()));
    if whole.is_empty() {
        first.raw.clone()
    } else {
        whole
    }
}

fn push_piece<'a>(pieces: &mut Vec<&'a str>, piece: &'a str, after_cut: bool) {
    if after_cut && !piece.chars().any(|c| c.is_alphabetic()) {
        return;
    }
    pieces.push(piece);
}

fn tidy(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| matches!(c, '-' | ',' | '/' | ':' | '.' | ' '))
        .to_string()
}

/// Union of overlapping or touching match spans, sorted by start.
fn merge_spans<'a>(matches: impl Iterator<Item = &'a RuleMatch>) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = matches.map(|m| (m.start, m.end)).collect();
    spans.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

fn most_salient<'a>(matches: &[&'a RuleMatch]) -> Option<&'a RuleMatch> {
    matches
        .iter()
        .copied()
        .filter(|m| m.kind != MatchKind::TypeDesignation)
        .min_by_key(|m| (m.kind.characteristic_kind().salience(), m.start))
}

fn push_characteristic(out: &mut Vec<ExtractionCandidate>, value: &str, matches: &[&RuleMatch]) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    let (kind, confidence) = match most_salient(matches) {
        Some(m) => (m.kind.characteristic_kind(), m.kind.confidence()),
        None => (CharacteristicKind::Other, OTHER_CHARACTERISTIC_CONFIDENCE),
    };
    out.push(ExtractionCandidate::rule(
        CandidateField::Characteristic { kind },
        value,
        confidence,
    ));
}
