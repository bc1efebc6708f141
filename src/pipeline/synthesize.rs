//! Short-Description Synthesizer.

use crate::models::{Categorization, Characteristic, UNKNOWN_SENTINEL};

/// Upper bound for any configured label length.
pub const MAX_SHORT_DESCRIPTION_LEN: usize = 40;

/// Leftover room of this many characters or fewer is not worth a fragment.
const MIN_FRAGMENT_CHARS: usize = 3;

const MAX_APPENDED: usize = 2;

/// Build the label: product name followed by up to two characteristics,
/// most salient first (dimension, then material, then standard). Lengths
/// are counted in characters. Characteristics are cut before the product
/// name is; the name is only cut when it alone exceeds `max_len`.
/// Categorization values stand in when there are no characteristics.
pub fn synthesize_short_description(
    product_name: &str,
    characteristics: &[Characteristic],
    categorization: &Categorization,
    max_len: usize,
) -> String {
    let max_len = max_len.clamp(1, MAX_SHORT_DESCRIPTION_LEN);
    let name = match product_name.trim() {
        "" => UNKNOWN_SENTINEL,
        n => n,
    };
    if char_len(name) >= max_len {
        let cut = truncate_chars(name, max_len);
        return if cut.is_empty() {
            name.chars().take(max_len).collect()
        } else {
            cut
        };
    }

    let name_upper = name.to_uppercase();
    let mut ranked: Vec<(u8, usize, &str)> = characteristics
        .iter()
        .enumerate()
        .map(|(i, c)| (c.kind.salience(), i, c.value.trim()))
        .collect();
    if ranked.is_empty() {
        ranked = categorization
            .values()
            .enumerate()
            .map(|(i, v)| (u8::MAX, i, v.trim()))
            .collect();
    }
    ranked.sort();

    let mut label = name.to_string();
    let mut appended = 0;
    for (_, _, value) in ranked {
        if appended == MAX_APPENDED {
            break;
        }
        if value.is_empty() || name_upper.contains(&value.to_uppercase()) {
            continue;
        }
        let room = max_len.saturating_sub(char_len(&label) + 1);
        if char_len(value) <= room {
            label.push(' ');
            label.push_str(value);
            appended += 1;
        } else {
            if room > MIN_FRAGMENT_CHARS {
                let fragment = truncate_chars(value, room);
                if !fragment.is_empty() {
                    label.push(' ');
                    label.push_str(&fragment);
                }
            }
            break;
        }
    }
    label
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// First `max` characters, without trailing whitespace or separators.
fn truncate_chars(s: &str, max: usize) -> String {
    let cut: String = s.chars().take(max).collect();
    cut.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ',' | '/' | '.' | ':'))
        .to_string()
}
