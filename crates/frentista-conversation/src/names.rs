//! Name validation and cleanup for the onboarding dialogue.
//!
//! A valid name is 2-60 characters of letters (accented Latin included)
//! and whitespace, 1 to 5 words. Cleanup capitalizes each word.

pub fn is_valid_name(text: &str) -> bool {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if !(2..=60).contains(&len) {
        return false;
    }
    if !trimmed
        .chars()
        .all(|c| c.is_alphabetic() || c.is_whitespace())
    {
        return false;
    }
    let words = trimmed.split_whitespace().count();
    (1..=5).contains(&words)
}

/// Validated and capitalized name, or None when the text fails the
/// predicate.
pub fn clean_name(text: &str) -> Option<String> {
    if !is_valid_name(text) {
        return None;
    }
    Some(
        text.trim()
            .split_whitespace()
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accented_name_valid() {
        assert!(is_valid_name("João Silva"));
        assert_eq!(clean_name("João Silva").as_deref(), Some("João Silva"));
    }

    #[test]
    fn test_empty_invalid() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("   "));
    }

    #[test]
    fn test_digits_invalid() {
        assert!(!is_valid_name("abc123"));
        assert!(!is_valid_name("123"));
    }

    #[test]
    fn test_word_count_bounds() {
        assert!(is_valid_name("A B C D E"));
        assert!(!is_valid_name("A B C D E F"));
    }

    #[test]
    fn test_length_bounds() {
        assert!(!is_valid_name("a"));
        assert!(is_valid_name("ab"));
        let long = "a".repeat(61);
        assert!(!is_valid_name(&long));
    }

    #[test]
    fn test_capitalization() {
        assert_eq!(
            clean_name("maria souza").as_deref(),
            Some("Maria Souza")
        );
        assert_eq!(
            clean_name("  JOSÉ  dos SANTOS ").as_deref(),
            Some("José Dos Santos")
        );
    }
}
