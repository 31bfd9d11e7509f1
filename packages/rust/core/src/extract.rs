//! Signal extraction: free-form deal text → [`SignalRecord`].
//!
//! Each field has its own matcher, run independently over the whole text;
//! the first left-to-right match wins. The only cross-field dependency is
//! that a city is looked for just in front of the matched state token.
//! Extraction is pure and never fails.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use underwrite_shared::{PropertyType, REGION_CODES, SignalRecord};

/// Lower-case words that collide with region codes ("in", "or", "me", ...).
/// They are only accepted as codes when written upper-case.
const AMBIGUOUS_WORDS: [&str; 14] = [
    "al", "co", "de", "hi", "id", "in", "la", "ma", "me", "mi", "oh", "ok", "or", "pa",
];

/// Extract all signals from `text`.
pub fn extract(text: &str) -> SignalRecord {
    let state = find_state(text);
    let city = state
        .as_ref()
        .and_then(|(_, start)| find_city_before(text, *start));

    let record = SignalRecord {
        state: state.map(|(code, _)| code),
        city,
        postal_code: find_postal_code(text),
        property_type: find_property_type(text),
        floor_area_sqft: find_floor_area(text),
    };

    debug!(?record, "extracted signals");
    record
}

// ---------------------------------------------------------------------------
// Postal code
// ---------------------------------------------------------------------------

/// First standalone run of exactly five digits.
fn find_postal_code(text: &str) -> Option<String> {
    static ZIP_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b\d{5}\b").expect("valid regex"));

    ZIP_RE.find(text).map(|m| m.as_str().to_string())
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// First whole-word region code, upper-cased, with its byte offset.
///
/// Upper-case tokens are preferred; a case-insensitive match is used only
/// when the text has none, and then skips lower-case English words that
/// double as codes.
fn find_state(text: &str) -> Option<(String, usize)> {
    static EXACT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(&format!(r"\b(?:{})\b", REGION_CODES.join("|"))).expect("valid regex")
    });
    static FOLDED_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(&format!(r"(?i)\b(?:{})\b", REGION_CODES.join("|"))).expect("valid regex")
    });

    if let Some(m) = EXACT_RE.find(text) {
        return Some((m.as_str().to_string(), m.start()));
    }

    FOLDED_RE
        .find_iter(text)
        .find(|m| !AMBIGUOUS_WORDS.contains(&m.as_str()))
        .map(|m| (m.as_str().to_ascii_uppercase(), m.start()))
}

// ---------------------------------------------------------------------------
// City
// ---------------------------------------------------------------------------

/// Locality name directly in front of the state token at `state_start`.
///
/// The separator may be a comma and/or any whitespace, line breaks included.
/// The run of letters, spaces and tabs before it is narrowed to its trailing
/// capitalised words; the run does not cross a line break. With a comma
/// separator an all-lower-case run is accepted as-is.
fn find_city_before(text: &str, state_start: usize) -> Option<String> {
    let before = &text[..state_start];
    let spaced = before.trim_end();

    let (head, has_comma) = match spaced.strip_suffix(',') {
        Some(head) => (head.trim_end(), true),
        None => (spaced, false),
    };

    // Token glued to the previous character, e.g. "(CA".
    if !has_comma && spaced.len() == before.len() {
        return None;
    }

    let run_start = head
        .char_indices()
        .rev()
        .find(|(_, c)| !(c.is_alphabetic() || matches!(c, ' ' | '\t')))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let words: Vec<&str> = head[run_start..].split_whitespace().collect();
    if words.is_empty() {
        return None;
    }

    let capitalised = words
        .iter()
        .rev()
        .take_while(|w| w.chars().next().is_some_and(char::is_uppercase))
        .count();

    let chosen = if capitalised > 0 {
        &words[words.len() - capitalised..]
    } else if has_comma {
        &words[..]
    } else {
        return None;
    };

    Some(title_case(chosen))
}

fn title_case(words: &[&str]) -> String {
    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Property type
// ---------------------------------------------------------------------------

fn find_property_type(text: &str) -> Option<PropertyType> {
    static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
        let names: Vec<&str> = PropertyType::ALL.iter().map(|t| t.as_str()).collect();
        Regex::new(&format!(r"(?i)\b(?:{})\b", names.join("|"))).expect("valid regex")
    });

    TYPE_RE
        .find(text)
        .and_then(|m| PropertyType::from_name(m.as_str()))
}

// ---------------------------------------------------------------------------
// Floor area
// ---------------------------------------------------------------------------

/// First number (optionally comma-grouped) directly followed by a square-foot unit.
///
/// Accepts `sqft`, `sf`, `sq ft`, `sq. ft.` and `sq.ft.` in any case. A number
/// that is the tail of a malformed one (`1234,567 sf`, `2.5 sf`) or that
/// doesn't fit an integer leaves the field unset.
fn find_floor_area(text: &str) -> Option<u64> {
    static AREA_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\b(\d{1,3}(?:,\d{3})+|\d+)\s*(?:sq\.?\s*ft|sf)\b").expect("valid regex")
    });

    let caps = AREA_RE.captures(text)?;
    let number = caps.get(1)?;

    let mut preceding = text[..number.start()].chars().rev();
    if let (Some(sep @ (',' | '.')), Some(prev)) = (preceding.next(), preceding.next()) {
        if prev.is_ascii_digit() {
            debug!(separator = %sep, "floor area is part of a malformed number");
            return None;
        }
    }

    number
        .as_str()
        .replace(',', "")
        .parse::<u64>()
        .ok()
        .filter(|area| *area > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_details() {
        let record = extract("Office building at 123 Main St, Anytown, CA 90210. 50,000 sqft.");
        assert_eq!(
            record,
            SignalRecord {
                state: Some("CA".into()),
                city: Some("Anytown".into()),
                postal_code: Some("90210".into()),
                property_type: Some(PropertyType::Office),
                floor_area_sqft: Some(50_000),
            }
        );
    }

    #[test]
    fn minimal_details() {
        let record = extract("Property in TX. 1,200 sf retail space.");
        assert_eq!(
            record,
            SignalRecord {
                state: Some("TX".into()),
                city: None,
                postal_code: None,
                property_type: Some(PropertyType::Retail),
                floor_area_sqft: Some(1200),
            }
        );
    }

    #[test]
    fn no_details() {
        let record = extract("A piece of property.");
        assert!(record.is_empty());
    }

    #[test]
    fn state_without_city() {
        let record = extract("A 25,000 sq. ft. industrial warehouse in FL 33101.");
        assert_eq!(record.state.as_deref(), Some("FL"));
        assert_eq!(record.city, None);
        assert_eq!(record.postal_code.as_deref(), Some("33101"));
        assert_eq!(record.property_type, Some(PropertyType::Industrial));
        assert_eq!(record.floor_area_sqft, Some(25_000));
    }

    #[test]
    fn city_requires_state() {
        let texts = [
            "Anytown, somewhere 90210",
            "Retail strip in Springfield",
            "Downtown Austin TX multifamily",
            "san diego, ca land parcel",
            "",
        ];
        for text in texts {
            let record = extract(text);
            if record.city.is_some() {
                assert!(record.state.is_some(), "city without state for {text:?}");
            }
        }
    }

    #[test]
    fn city_from_whitespace_separator() {
        let record = extract("Downtown office in Austin TX");
        assert_eq!(record.state.as_deref(), Some("TX"));
        assert_eq!(record.city.as_deref(), Some("Austin"));
    }

    #[test]
    fn city_across_line_break() {
        let record = extract("Office at 1 Main St, Anytown,\nCA 90210");
        assert_eq!(record.state.as_deref(), Some("CA"));
        assert_eq!(record.city.as_deref(), Some("Anytown"));

        let record = extract("Office in Austin\nTX");
        assert_eq!(record.city.as_deref(), Some("Austin"));

        let record = extract("Anytown,\r\nCA");
        assert_eq!(record.city.as_deref(), Some("Anytown"));
    }

    #[test]
    fn city_run_stops_at_previous_line() {
        let record = extract("Property Summary\nAustin TX");
        assert_eq!(record.city.as_deref(), Some("Austin"));
    }

    #[test]
    fn multi_word_city_is_title_cased() {
        let record = extract("Site: SAN FRANCISCO, CA");
        assert_eq!(record.city.as_deref(), Some("San Francisco"));

        let record = extract("lot at 12 elm st, san diego, ca");
        assert_eq!(record.state.as_deref(), Some("CA"));
        assert_eq!(record.city.as_deref(), Some("San Diego"));
    }

    #[test]
    fn state_glued_to_punctuation_has_no_city() {
        let record = extract("Anytown(CA)");
        assert_eq!(record.state.as_deref(), Some("CA"));
        assert_eq!(record.city, None);
    }

    #[test]
    fn uppercase_code_beats_earlier_lowercase_word() {
        let record = extract("Located in a park, or near one, in OR");
        assert_eq!(record.state.as_deref(), Some("OR"));
    }

    #[test]
    fn lowercase_state_code_is_accepted() {
        let record = extract("warehouse near reno, nv");
        assert_eq!(record.state.as_deref(), Some("NV"));
        assert_eq!(record.city.as_deref(), Some("Warehouse Near Reno"));
    }

    #[test]
    fn no_region_token_means_no_state() {
        for text in ["Texas office tower", "A CAT in the park", "NEW listing"] {
            let record = extract(text);
            assert_eq!(record.state, None, "{text:?}");
            assert_eq!(record.city, None, "{text:?}");
        }
    }

    #[test]
    fn first_match_wins() {
        let record = extract("Retail and office mixed use, 10001 or 20002, 3,000 sf then 9,000 sf");
        assert_eq!(record.property_type, Some(PropertyType::Retail));
        assert_eq!(record.postal_code.as_deref(), Some("10001"));
        assert_eq!(record.floor_area_sqft, Some(3000));
    }

    #[test]
    fn property_type_is_whole_word() {
        assert_eq!(extract("Landlord approval pending").property_type, None);
        assert_eq!(
            extract("MULTIFAMILY complex").property_type,
            Some(PropertyType::Multifamily)
        );
    }

    #[test]
    fn floor_area_unit_variants() {
        let cases = [
            ("50,000 sqft", 50_000),
            ("1,200 sf", 1200),
            ("800SF", 800),
            ("2,500 sq ft", 2500),
            ("3,000 sq. ft.", 3000),
            ("4000 sq.ft. building", 4000),
            ("12,345,678 SQFT", 12_345_678),
            ("50,000 sq  ft", 50_000),
            ("50,000 SQ.  FT.", 50_000),
        ];
        for (text, expected) in cases {
            assert_eq!(extract(text).floor_area_sqft, Some(expected), "{text:?}");
        }
    }

    #[test]
    fn malformed_floor_area_is_unset() {
        assert_eq!(extract("1234,567 sf").floor_area_sqft, None);
        assert_eq!(extract("2.5 sf").floor_area_sqft, None);
        assert_eq!(extract("0 sqft").floor_area_sqft, None);
        assert_eq!(extract("99999999999999999999999 sf").floor_area_sqft, None);
        assert_eq!(extract("50,000 square meters").floor_area_sqft, None);
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = "Office building at 123 Main St, Anytown, CA 90210. 50,000 sqft.";
        assert_eq!(extract(text), extract(text));
    }
}
