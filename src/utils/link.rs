//! Link classification.

/// Whether `link` carries a URL scheme (`https:`, `mailto:`, ...).
#[inline]
pub fn is_external_link(link: &str) -> bool {
    link.find(':').is_some_and(|pos| {
        pos > 0
            && link[..pos]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Split `path#fragment`; the fragment is empty when absent.
#[inline]
pub fn split_path_fragment(url: &str) -> (&str, &str) {
    url.split_once('#').unwrap_or((url, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_external_link() {
        assert!(is_external_link("https://example.com"));
        assert!(is_external_link("mailto:me@example.com"));
        assert!(!is_external_link("./notes/a.md"));
        assert!(!is_external_link("/about"));
        assert!(!is_external_link(":oops"));
    }

    #[test]
    fn test_split_path_fragment() {
        assert_eq!(split_path_fragment("a/b#intro"), ("a/b", "intro"));
        assert_eq!(split_path_fragment("a/b"), ("a/b", ""));
    }
}
