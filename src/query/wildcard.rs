//! Wildcard pattern handling.
//!
//! User-facing patterns use `*` (any run of characters) and `?` (exactly
//! one character). Two consumers exist: SQL `LIKE` translation for the
//! query builder, and direct path matching for discovery filters. Literal
//! `%`, `_` and `\` in user patterns are escaped so they never act as SQL
//! wildcards.

/// Escape character used in every generated `LIKE` clause. The builder
/// appends `ESCAPE '\'` wherever a translated pattern is bound.
pub const LIKE_ESCAPE: char = '\\';

/// Translate a `*`/`?` pattern into a `LIKE` pattern.
pub fn to_like_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '*' => out.push('%'),
            '?' => out.push('_'),
            '%' | '_' | '\\' => {
                out.push(LIKE_ESCAPE);
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// True when the pattern contains wildcard metacharacters.
pub fn contains_wildcards(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Match a `*`/`?` pattern against a string, case-insensitively.
///
/// Iterative two-pointer matcher with backtracking to the last `*`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}
