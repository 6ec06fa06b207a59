//! Slug generation (SPEC_FULL.md §4.4): normalize a title (or first 60
//! chars of text) to a URL-safe base, then hand it to `Store::claim_slug`
//! for collision-safe, monotonically-growing suffix allocation.

pub fn base_slug_from(text: &str) -> String {
    let truncated: String = text.chars().take(60).collect();
    let mut slug = String::with_capacity(truncated.len());
    let mut prev_hyphen = false;
    for c in truncated.chars() {
        if c.is_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            prev_hyphen = false;
        } else if !prev_hyphen {
            slug.push('-');
            prev_hyphen = true;
        }
    }
    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_punctuation_and_case() {
        assert_eq!(base_slug_from("Hello, World!"), "hello-world");
    }

    #[test]
    fn collapses_repeated_separators() {
        assert_eq!(base_slug_from("a   b---c"), "a-b-c");
    }

    #[test]
    fn truncates_to_sixty_chars() {
        let long = "a".repeat(100);
        assert_eq!(base_slug_from(&long).len(), 60);
    }

    #[test]
    fn empty_input_yields_fallback() {
        assert_eq!(base_slug_from("!!!"), "untitled");
    }
}
