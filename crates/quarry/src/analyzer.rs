//! Tokenization and per-kind normalization.
//!
//! Text content is split into words on non-alphanumeric separators, with
//! the running word index as position. Typed content (int, date,
//! position) is one token, canonicalized so that equal values share one
//! key and lexicographic key order is value order.

use time::{Date, Month};

use crate::index::key_proxy::parse_geo;

/// Splits text content into `(position, word)` pairs.
pub fn tokenize_text(content: &str) -> Vec<(u32, String)> {
    content
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .enumerate()
        .map(|(position, word)| (position as u32, word.to_string()))
        .collect()
}

/// Typed contexts index their whole content as a single token.
pub fn tokenize_value(content: &str) -> Vec<(u32, String)> {
    let token = content.trim();
    if token.is_empty() {
        return Vec::new();
    }
    vec![(0, token.to_string())]
}

/// Text terms are indexed as written; case is the search mode's concern.
pub fn normalize_text(term: &str) -> Option<String> {
    Some(term.to_string())
}

/// Canonical decimal rendering: `+007` and `7` become the same key.
pub fn normalize_int(term: &str) -> Option<String> {
    term.trim().parse::<i64>().ok().map(|value| value.to_string())
}

fn split_date(term: &str) -> Option<(i32, Option<u8>, Option<u8>)> {
    let mut parts = term.trim().splitn(3, '-');
    let year = parts.next()?;
    if year.is_empty() || year.len() > 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year.parse().ok()?;

    let segment = |text: Option<&str>| -> Option<Option<u8>> {
        match text {
            None => Some(None),
            Some(part) => {
                if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_digit())
                {
                    return None;
                }
                part.parse().ok().map(Some)
            }
        }
    };

    let month = segment(parts.next())?;
    let day = segment(parts.next())?;
    Some((year, month, day))
}

/// Accepts `YYYY`, `YYYY-MM` and `YYYY-MM-DD`, zero-padded on the way
/// out so that the canonical form orders chronologically. Full dates are
/// checked against the calendar.
pub fn normalize_date(term: &str) -> Option<String> {
    match split_date(term)? {
        (year, None, None) => Some(format!("{year:04}")),
        (year, Some(month), None) => {
            (1..=12).contains(&month).then(|| format!("{year:04}-{month:02}"))
        }
        (year, Some(month), Some(day)) => {
            Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()?;
            Some(format!("{year:04}-{month:02}-{day:02}"))
        }
        (_, None, Some(_)) => None,
    }
}

/// Document values must be full calendar dates; prefixes are for queries.
pub fn normalize_date_value(term: &str) -> Option<String> {
    match split_date(term)? {
        (_, Some(_), Some(_)) => normalize_date(term),
        _ => None,
    }
}

/// Canonical `lat,lon` rendering on the position grid.
pub fn normalize_position(term: &str) -> Option<String> {
    let (lat, lon) = parse_geo(term)?;
    Some(format!("{lat:.5},{lon:.5}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_tokens_carry_word_positions() {
        let tokens = tokenize_text("a b c a b");
        let words: Vec<&str> = tokens.iter().map(|(_, word)| word.as_str()).collect();
        assert_eq!(words, vec!["a", "b", "c", "a", "b"]);
        let positions: Vec<u32> = tokens.iter().map(|(position, _)| *position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn separators_do_not_produce_empty_tokens() {
        let tokens = tokenize_text("  hello,   world! ");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0], (0, "hello".to_string()));
        assert_eq!(tokens[1], (1, "world".to_string()));
    }

    #[test]
    fn int_terms_are_canonicalized() {
        assert_eq!(normalize_int("007"), Some("7".to_string()));
        assert_eq!(normalize_int("+42"), Some("42".to_string()));
        assert_eq!(normalize_int("-0"), Some("0".to_string()));
        assert_eq!(normalize_int("fortytwo"), None);
    }

    #[test]
    fn date_terms_allow_prefixes_but_values_do_not() {
        assert_eq!(normalize_date("2014-1-5"), Some("2014-01-05".to_string()));
        assert_eq!(normalize_date("2014-2"), Some("2014-02".to_string()));
        assert_eq!(normalize_date("2014"), Some("2014".to_string()));
        assert_eq!(normalize_date("2014-02-30"), None);
        assert_eq!(normalize_date("someday"), None);

        assert_eq!(normalize_date_value("2014-01-15"), Some("2014-01-15".to_string()));
        assert_eq!(normalize_date_value("2014-01"), None);
    }

    #[test]
    fn positions_normalize_onto_the_grid() {
        let normalized = normalize_position(" 53.55 , 10.0 ").unwrap();
        assert_eq!(normalized, "53.55000,10.00000");
        assert_eq!(normalize_position("95.0,0.0"), None);
    }
}
