use std::sync::LazyLock;

use regex::{NoExpand, Regex};

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[ &/\\#,+()$~%.'":*?<>{}]"#).expect("static pattern")
});

/// Replaces every filesystem-unsafe character of `name` with `replacement`.
pub fn sanitize(name: &str, replacement: &str) -> String {
    UNSAFE_CHARS.replace_all(name, NoExpand(replacement)).into_owned()
}

pub fn sanitize_filename(name: &str) -> String {
    sanitize(name, "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_every_unsafe_char() {
        let unsafe_chars = r#" &/\#,+()$~%.'":*?<>{}"#;
        let expected = "_".repeat(unsafe_chars.chars().count());
        assert_eq!(sanitize_filename(unsafe_chars), expected);
    }

    #[test]
    fn test_keeps_safe_text_and_does_not_collapse() {
        assert_eq!(sanitize_filename("Rick Astley - Never Gonna Give You Up (Official Video)"),
            "Rick_Astley_-_Never_Gonna_Give_You_Up__Official_Video_");
        assert_eq!(sanitize_filename("a..b"), "a__b");
        assert_eq!(sanitize_filename("日本語-ok_1"), "日本語-ok_1");
    }

    #[test]
    fn test_replacement_is_literal() {
        assert_eq!(sanitize("a b", "$0"), "a$0b");
        assert_eq!(sanitize("a b", ""), "ab");
    }

    #[test]
    fn test_idempotent() {
        for title in ["What's up? (live) 100%", "", "plain", "<<{}>>"] {
            let once = sanitize_filename(title);
            assert_eq!(sanitize_filename(&once), once);
        }
    }
}
