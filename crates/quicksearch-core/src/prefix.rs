//! Prefix matching as a half-open string range.
//!
//! `s2` starts with `s` exactly when `s <= s2 < next_string(s)`. Storage
//! backends use this to turn a prefix query into an index-friendly range
//! scan instead of a `LIKE` pattern. Ordering is by code point, which is
//! the byte order of UTF-8 and the order SQLite's `BINARY` collation uses.

/// The least string, in code point order, that is greater than every
/// string starting with `s`.
///
/// Increments the last code point, skipping the surrogate gap. A trailing
/// `char::MAX` cannot be incremented, so it is dropped and the previous
/// code point is incremented instead. Returns `None` when no such string
/// exists (`s` is empty or consists only of `char::MAX`), meaning the
/// range is unbounded above.
///
/// ```
/// use quicksearch_core::prefix::next_string;
///
/// assert_eq!(next_string("abc").as_deref(), Some("abd"));
/// assert_eq!(next_string("\u{D7FF}").as_deref(), Some("\u{E000}"));
/// assert_eq!(next_string(""), None);
/// ```
pub fn next_string(s: &str) -> Option<String> {
    let mut chars: Vec<char> = s.chars().collect();
    while let Some(last) = chars.pop() {
        if let Some(next) = next_char(last) {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

fn next_char(c: char) -> Option<char> {
    match c {
        '\u{D7FF}' => Some('\u{E000}'),
        char::MAX => None,
        _ => char::from_u32(c as u32 + 1),
    }
}

/// Whether `candidate` falls in `[prefix, next_string(prefix))`.
pub fn in_prefix_range(candidate: &str, prefix: &str) -> bool {
    if candidate < prefix {
        return false;
    }
    match next_string(prefix) {
        Some(upper) => candidate < upper.as_str(),
        None => true,
    }
}
