//! Text normalization helpers shared by the scorer, embedder and mitigator.

/// Lowercased alphanumeric tokens. Apostrophes inside words are kept.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Upper-case the first letter of `replacement` when `original` starts with one.
pub fn match_case(original: &str, replacement: &str) -> String {
    let starts_upper = original.chars().next().map(char::is_uppercase).unwrap_or(false);
    if !starts_upper {
        return replacement.to_string();
    }
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
