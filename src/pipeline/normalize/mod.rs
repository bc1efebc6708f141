//! Text Normalizer.
//!
//! Turns one raw spreadsheet cell into a canonical segment sequence. Every
//! segment keeps the cleaned original casing next to the uppercase form the
//! matchers run on, so product names can be rendered as written.

pub mod sanitize;

use std::ops::Range;

use serde::{Deserialize, Serialize};

use sanitize::{clean_characters, collapse_whitespace, repair_mojibake};

/// Separator used when segments are joined back into one line.
pub const SEGMENT_SEPARATOR: &str = " | ";

/// One delimiter-bounded piece of the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Cleaned text in its original casing.
    pub raw: String,
    /// Uppercase form used for matching.
    pub upper: String,
}

impl Segment {
    fn new(raw: String) -> Self {
        let upper = raw.to_uppercase();
        Self { raw, upper }
    }

    /// Byte range of `raw` whose uppercase is `upper[start..end]`.
    /// `None` when a bound falls inside a multi-char expansion (`ß` → `SS`).
    pub fn raw_range(&self, start: usize, end: usize) -> Option<Range<usize>> {
        if start > end {
            return None;
        }
        let mut upper_pos = 0;
        let mut raw_start = None;
        for (i, c) in self.raw.char_indices() {
            if upper_pos == start && raw_start.is_none() {
                raw_start = Some(i);
            }
            if upper_pos == end {
                return raw_start.map(|s| s..i);
            }
            upper_pos += c.to_uppercase().map(char::len_utf8).sum::<usize>();
        }
        if upper_pos == start && raw_start.is_none() {
            raw_start = Some(self.raw.len());
        }
        if upper_pos == end {
            return raw_start.map(|s| s..self.raw.len());
        }
        None
    }

    /// Original-casing text for an uppercase span, falling back to the
    /// uppercase text when the span cannot be mapped.
    pub fn raw_slice(&self, start: usize, end: usize) -> &str {
        match self.raw_range(start, end) {
            Some(r) => &self.raw[r],
            None => &self.upper[start..end],
        }
    }
}

/// Normalized view of a raw record. Owned by the pipeline run that built it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedText {
    pub original: String,
    pub segments: Vec<Segment>,
}

impl NormalizedText {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first_segment(&self) -> Option<&Segment> {
        self.segments.first()
    }

    /// Segments in original casing, joined with ` | `.
    pub fn cleaned(&self) -> String {
        join(self.segments.iter().map(|s| s.raw.as_str()))
    }

    /// Segments uppercased, joined with ` | `.
    pub fn upper(&self) -> String {
        join(self.segments.iter().map(|s| s.upper.as_str()))
    }

    /// First whitespace token of the first segment, original casing.
    pub fn first_token(&self) -> Option<&str> {
        self.first_segment()
            .and_then(|s| s.raw.split_whitespace().next())
    }
}

fn join<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.collect::<Vec<_>>().join(SEGMENT_SEPARATOR)
}

/// Normalize a raw description. Pure and deterministic; never fails.
pub fn normalize(raw: &str) -> NormalizedText {
    let cleaned = clean_characters(&repair_mojibake(raw));
    let segments = split_segments(&cleaned)
        .into_iter()
        .map(|s| collapse_whitespace(&s))
        .filter(|s| !s.is_empty() && s.chars().any(|c| c.is_alphanumeric()))
        .map(Segment::new)
        .collect();

    NormalizedText {
        original: raw.to_string(),
        segments,
    }
}

/// Split on `//`, `|`, `;`, line breaks, tabs, and commas that are not a
/// decimal comma between two digits. A single `/` is part of the token
/// (`SL/VITON`, `50HZ/AC`).
fn split_segments(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let is_break = match c {
            '|' | ';' | '\n' | '\t' => true,
            '/' => {
                if chars.get(i + 1) == Some(&'/') {
                    i += 1;
                    true
                } else {
                    false
                }
            }
            ',' => {
                let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
                let next_digit = chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
                !(prev_digit && next_digit)
            }
            _ => false,
        };

        if is_break {
            segments.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
        i += 1;
    }
    segments.push(current);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raws(n: &NormalizedText) -> Vec<&str> {
        n.segments.iter().map(|s| s.raw.as_str()).collect()
    }

    #[test]
    fn splits_on_double_slash() {
        let n = normalize("WELLENDICHTRING // 105X130X12 // SL/VITON // BA");
        assert_eq!(raws(&n), vec!["WELLENDICHTRING", "105X130X12", "SL/VITON", "BA"]);
    }

    #[test]
    fn keeps_decimal_comma() {
        let n = normalize("Siemens Schütz | Spulensp. 230V, 50HZ/AC | Leistung 45,0 KW/400V");
        assert_eq!(
            raws(&n),
            vec!["Siemens Schütz", "Spulensp. 230V", "50HZ/AC", "Leistung 45,0 KW/400V"]
        );
    }

    #[test]
    fn uppercase_alongside_original() {
        let n = normalize("für APIC Wasserfilter FMA 9000");
        let s = n.first_segment().unwrap();
        assert_eq!(s.raw, "für APIC Wasserfilter FMA 9000");
        assert_eq!(s.upper, "FÜR APIC WASSERFILTER FMA 9000");
    }

    #[test]
    fn empty_and_whitespace_inputs_have_no_segments() {
        assert!(normalize("").is_empty());
        assert!(normalize("   \t  ").is_empty());
        assert!(normalize(" // | ,, ").is_empty());
    }

    #[test]
    fn drops_punctuation_only_segments() {
        let n = normalize("Kugellager | - | 6204 2RS");
        assert_eq!(raws(&n), vec!["Kugellager", "6204 2RS"]);
    }

    #[test]
    fn cleaned_and_upper_join_segments() {
        let n = normalize("O-Ring;20x3;nbr 70");
        assert_eq!(n.cleaned(), "O-Ring | 20x3 | nbr 70");
        assert_eq!(n.upper(), "O-RING | 20X3 | NBR 70");
    }

    #[test]
    fn first_token_keeps_casing() {
        let n = normalize("Schrägkugellager 7205 | FAG");
        assert_eq!(n.first_token(), Some("Schrägkugellager"));
    }

    #[test]
    fn original_is_retained_verbatim() {
        let raw = "  Dichtung  //  DN50 ";
        assert_eq!(normalize(raw).original, raw);
    }

    #[test]
    fn raw_slice_maps_uppercase_span_back() {
        let n = normalize("O-Ring 20x3 nbr");
        let seg = n.first_segment().unwrap();
        let start = seg.upper.find("NBR").unwrap();
        assert_eq!(seg.raw_slice(start, start + 3), "nbr");
    }

    #[test]
    fn raw_range_handles_expanding_uppercase() {
        // "ß" uppercases to "SS", shifting every later offset by one byte
        let n = normalize("Stoß 20x3");
        let seg = n.first_segment().unwrap();
        assert_eq!(seg.upper, "STOSS 20X3");
        let start = seg.upper.find("20X3").unwrap();
        assert_eq!(seg.raw_slice(start, start + 4), "20x3");
        // A bound inside the expansion cannot be mapped
        assert!(seg.raw_range(0, 4).is_none());
    }

    #[test]
    fn deterministic() {
        let raw = "Ventil | DN 50 | PN 16 | GG25";
        assert_eq!(normalize(raw), normalize(raw));
    }
}
