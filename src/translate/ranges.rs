//! Range derivation for string operators
//!
//! Prefix matches become sorted-index range scans `[prefix, successor)`;
//! suffix matches become anchored, fully escaped regular expressions.

/// Highest Unicode scalar value, appended when no code point can be incremented
pub const SENTINEL: char = char::MAX;

/// Exclusive upper bound for strings prefixed by `s`.
///
/// The last code point below `char::MAX` is incremented (skipping the
/// surrogate gap) and everything after it is dropped. If every code point is
/// already `char::MAX`, [`SENTINEL`] is appended instead. That result is
/// itself prefixed by `s`, so it is not an exclusive bound for such strings;
/// [`prefix_range`] leaves the range open in that case.
pub fn lexicographic_successor(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();

    for (i, c) in chars.iter().enumerate().rev() {
        if let Some(next) = next_char(*c) {
            let mut out: String = chars[..i].iter().collect();
            out.push(next);
            return out;
        }
    }

    let mut out = s.to_string();
    out.push(SENTINEL);
    out
}

fn next_char(c: char) -> Option<char> {
    match c as u32 {
        0xD7FF => Some('\u{E000}'),
        code => char::from_u32(code + 1),
    }
}

/// Range `[prefix, successor(prefix))` covering every string with `prefix`.
///
/// The upper bound is `None` when no finite string bounds the prefixed set:
/// the empty prefix, or a prefix made only of `char::MAX`.
pub fn prefix_range(prefix: &str) -> (String, Option<String>) {
    let upper = if prefix.chars().all(|c| c == char::MAX) {
        None
    } else {
        Some(lexicographic_successor(prefix))
    };
    (prefix.to_string(), upper)
}

/// Regular expression matching strings that end with `suffix` literally
pub fn suffix_pattern(suffix: &str) -> String {
    format!("{}$", regex::escape(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successor_increments_last_char() {
        assert_eq!(lexicographic_successor("abc"), "abd");
        assert_eq!(lexicographic_successor("a"), "b");
        assert_eq!(lexicographic_successor("az"), "a{");
    }

    #[test]
    fn test_successor_skips_maximal_tail() {
        let s = format!("ab{}", char::MAX);
        assert_eq!(lexicographic_successor(&s), "ac");
    }

    #[test]
    fn test_successor_all_maximal_appends_sentinel() {
        let s = format!("{}{}", char::MAX, char::MAX);
        let next = lexicographic_successor(&s);
        assert_eq!(next, format!("{}{}", s, SENTINEL));
        assert!(next > s);
    }

    #[test]
    fn test_successor_skips_surrogates() {
        assert_eq!(lexicographic_successor("\u{D7FF}"), "\u{E000}");
    }

    #[test]
    fn test_successor_multibyte() {
        assert_eq!(lexicographic_successor("caf\u{e9}"), "caf\u{ea}");
        assert!(lexicographic_successor("日本") > "日本".to_string());
    }

    #[test]
    fn test_prefix_range_bounds() {
        let (lo, hi) = prefix_range("user_");
        let hi = hi.unwrap();
        assert_eq!(lo, "user_");
        assert_eq!(hi, "user`");
        assert!(lo.as_str() <= "user_42" && "user_42" < hi.as_str());
        assert!(!("user" >= lo.as_str()));
    }

    #[test]
    fn test_prefix_range_open_when_unbounded() {
        assert_eq!(prefix_range(""), (String::new(), None));

        let maximal = format!("{}{}", char::MAX, char::MAX);
        let (lo, hi) = prefix_range(&maximal);
        assert_eq!(lo, maximal);
        assert_eq!(hi, None);

        // The appended sentinel would exclude this string from its own prefix range
        let extended = format!("{}{}", maximal, char::MAX);
        assert!(extended.starts_with(&maximal));
        assert_eq!(lexicographic_successor(&maximal), extended);
    }

    #[test]
    fn test_suffix_pattern_escapes_metacharacters() {
        assert_eq!(suffix_pattern("@example.com"), "@example\\.com$");
        assert_eq!(suffix_pattern("(a+b)*"), "\\(a\\+b\\)\\*$");
        assert_eq!(suffix_pattern("plain"), "plain$");
    }
}
