//! Human-friendly duration strings used by token lifetimes.
//!
//! Accepts a bare number of seconds (`"900"`) or a number followed by one of
//! `s`, `m`, `h`, `d`, `w` (`"12h"`, `"30d"`).

/// Parses a duration string into whole seconds.
pub fn parse_duration_secs(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let (digits, multiplier) = match raw.char_indices().last() {
        Some((idx, unit)) if unit.is_ascii_alphabetic() => {
            let multiplier = match unit.to_ascii_lowercase() {
                's' => 1,
                'm' => 60,
                'h' => 60 * 60,
                'd' => 24 * 60 * 60,
                'w' => 7 * 24 * 60 * 60,
                _ => return None,
            };
            (&raw[..idx], multiplier)
        }
        _ => (raw, 1),
    };

    let value: i64 = digits.trim().parse().ok()?;
    if value <= 0 {
        return None;
    }
    value.checked_mul(multiplier)
}

pub(crate) fn env_duration(name: &str, default_secs: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_duration_secs(&v))
        .unwrap_or(default_secs)
}

pub(crate) fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units() {
        assert_eq!(parse_duration_secs("45s"), Some(45));
        assert_eq!(parse_duration_secs("15m"), Some(900));
        assert_eq!(parse_duration_secs("12h"), Some(43_200));
        assert_eq!(parse_duration_secs("30d"), Some(2_592_000));
        assert_eq!(parse_duration_secs("1w"), Some(604_800));
    }

    #[test]
    fn test_bare_seconds() {
        assert_eq!(parse_duration_secs("900"), Some(900));
        assert_eq!(parse_duration_secs(" 60 "), Some(60));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_duration_secs(""), None);
        assert_eq!(parse_duration_secs("h"), None);
        assert_eq!(parse_duration_secs("12y"), None);
        assert_eq!(parse_duration_secs("-5m"), None);
        assert_eq!(parse_duration_secs("0"), None);
    }
}
