//! Phrase value type and output-name helpers.

/// One distinct phrase heading into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    /// The phrase as the caller wrote it (trimmed).
    pub text: String,
    /// Case/whitespace-insensitive form used for deduplication and as the
    /// manifest key.
    pub normalized: String,
}

impl Phrase {
    pub fn new(text: &str) -> Self {
        let text = text.trim().to_string();
        let normalized = normalize(&text);
        Phrase { text, normalized }
    }
}

/// Normalize a phrase for deduplication: lowercase and collapse all
/// internal whitespace runs to single spaces.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Filesystem-safe slug of a phrase, bounded to `max_len` characters.
pub fn slug(text: &str) -> String {
    const MAX_LEN: usize = 60;
    let replaced: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let joined = replaced
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let truncated: String = joined.chars().take(MAX_LEN).collect();
    let trimmed = truncated.trim_matches('_');
    if trimmed.is_empty() {
        "phrase".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Short stable key derived from the normalized phrase, so the same phrase
/// always maps to the same output file across runs.
pub fn stable_key(text: &str) -> String {
    let hash = blake3::hash(normalize(text).as_bytes());
    hash.to_hex().as_str()[..12].to_string()
}

/// Deterministic output filename for the `index`-th phrase of a batch.
pub fn output_filename(index: usize, text: &str) -> String {
    format!("{:04}_{}_{}.mp4", index, slug(text), stable_key(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_case_and_whitespace() {
        assert_eq!(normalize("Hello  World"), "hello world");
        assert_eq!(normalize("  Hello \t world \n"), "hello world");
        assert_eq!(normalize("HELLO"), normalize("hello "));
    }

    #[test]
    fn slug_is_filesystem_safe() {
        assert_eq!(slug("Bom dia, tudo bem?"), "bom_dia_tudo_bem");
        assert_eq!(slug("???"), "phrase");
        let long = "palavra ".repeat(30);
        assert!(slug(&long).chars().count() <= 60);
    }

    #[test]
    fn stable_key_ignores_case_and_spacing() {
        assert_eq!(stable_key("Hello"), stable_key("hello "));
        assert_ne!(stable_key("Hello"), stable_key("Good morning"));
        assert_eq!(stable_key("x").len(), 12);
    }

    #[test]
    fn output_filename_is_deterministic() {
        let a = output_filename(1, "Bom dia");
        let b = output_filename(1, "Bom dia");
        assert_eq!(a, b);
        assert!(a.starts_with("0001_bom_dia_"));
        assert!(a.ends_with(".mp4"));
    }
}
