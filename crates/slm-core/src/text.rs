//! String helpers that respect UTF-8 char boundaries.

/// Longest prefix of `s` that is at most `max_bytes` long and ends on a char
/// boundary.
#[must_use]
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
