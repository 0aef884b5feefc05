//! Free-text canonicalization for search terms and match patterns

/// Normalize a job title or skill for consistent matching.
///
/// Lowercases, replaces everything that is not a letter, digit, whitespace,
/// `+`, or `#` with a space, collapses whitespace runs, and trims. `+` and `#`
/// survive so terms like "c++" and "c#" keep their meaning.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let replaced: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '+' || c == '#' {
                c
            } else {
                ' '
            }
        })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape regex metacharacters so a normalized skill can be embedded in an
/// alternation pattern.
pub fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '.' | '*' | '+' | '?' | '^' | '$' | '{' | '}' | '(' | ')' | '|' | '[' | ']' | '\\'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
