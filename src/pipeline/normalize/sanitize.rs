use unicode_normalization::UnicodeNormalization;

/// UTF-8 text that was decoded as Latin-1/CP1252 somewhere on its way out
/// of the ERP export. Longest sequences first.
const MOJIBAKE: &[(&str, &str)] = &[
    ("Ã¤", "ä"),
    ("Ã¶", "ö"),
    ("Ã¼", "ü"),
    ("Ã„", "Ä"),
    ("Ã–", "Ö"),
    ("Ãœ", "Ü"),
    ("ÃŸ", "ß"),
    ("Ã©", "é"),
    ("Ã¨", "è"),
    ("Ã˜", "Ø"),
    ("Ã¸", "ø"),
    ("Ã—", "×"),
    ("Â°", "°"),
    ("Â²", "²"),
    ("Â³", "³"),
    ("Âµ", "µ"),
    ("Â½", "½"),
    ("Â\u{a0}", " "),
];

/// Repair double-encoded umlauts and symbols. Text without the telltale
/// lead bytes is returned untouched.
pub fn repair_mojibake(text: &str) -> String {
    if !text.contains('Ã') && !text.contains('Â') {
        return text.to_string();
    }
    MOJIBAKE
        .iter()
        .fold(text.to_string(), |acc, (bad, good)| acc.replace(bad, good))
}

/// NFC-compose, drop control and zero-width characters, and fold
/// typographic variants onto the ASCII forms the matchers expect.
pub fn clean_characters(text: &str) -> String {
    text.nfc()
        .filter_map(|c| match c {
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{FFFD}' => None,
            // Line structure is a delimiter, keep it for the splitter
            '\n' | '\t' => Some(c),
            '\r' => Some('\n'),
            c if c.is_control() => None,
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => Some(' '),
            '×' => Some('x'),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => Some('-'),
            '\u{2018}' | '\u{2019}' | '´' | '`' => Some('\''),
            '\u{201C}' | '\u{201D}' | '„' => Some('"'),
            '⌀' => Some('Ø'),
            c => Some(c),
        })
        .collect()
}

/// Collapse internal whitespace runs to one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repairs_double_encoded_umlauts() {
        assert_eq!(repair_mojibake("Siemens SchÃ¼tz"), "Siemens Schütz");
        assert_eq!(repair_mojibake("AuÃŸenring"), "Außenring");
        assert_eq!(repair_mojibake("20Â°C"), "20°C");
    }

    #[test]
    fn leaves_clean_text_alone() {
        assert_eq!(repair_mojibake("Größe DN 50"), "Größe DN 50");
    }

    #[test]
    fn composes_decomposed_umlauts() {
        let decomposed = "Schu\u{0308}tz";
        assert_eq!(clean_characters(decomposed), "Schütz");
    }

    #[test]
    fn strips_control_and_zero_width() {
        let raw = "O-Ring\u{200B} 20x3\x00\x07";
        assert_eq!(clean_characters(raw), "O-Ring 20x3");
    }

    #[test]
    fn folds_typographic_variants() {
        assert_eq!(clean_characters("105×130×12"), "105x130x12");
        assert_eq!(clean_characters("M10\u{00A0}–\u{00A0}8.8"), "M10 - 8.8");
        assert_eq!(clean_characters("⌀20"), "Ø20");
    }

    #[test]
    fn keeps_line_breaks_as_delimiters() {
        assert_eq!(clean_characters("a\r\nb\tc"), "a\n\nb\tc");
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(collapse_whitespace("  PN   16 \t "), "PN 16");
    }
}
