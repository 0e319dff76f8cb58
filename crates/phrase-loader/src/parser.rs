//! Collecting phrases from CLI arguments and phrase-list files.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{PhraseLoadError, Result};
use crate::types::Phrase;

/// Turn a mixture of literal phrases and phrase-list file paths into an
/// ordered, deduplicated sequence of distinct phrases.
///
/// An input is treated as a file when it names an existing `.txt` file;
/// anything else is a literal phrase. Inside files, blank lines and lines
/// whose first non-whitespace character is `#` are ignored. Deduplication
/// is by normalized text; the first occurrence wins and fixes the order.
pub fn collect_phrases(inputs: &[String]) -> Result<Vec<Phrase>> {
    let mut phrases = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for input in inputs {
        let path = Path::new(input);
        if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            for line in read_phrase_file(path)? {
                push_unique(&mut phrases, &mut seen, &line);
            }
        } else {
            push_unique(&mut phrases, &mut seen, input);
        }
    }

    if phrases.is_empty() {
        return Err(PhraseLoadError::Empty);
    }
    debug!("collected {} distinct phrases from {} inputs", phrases.len(), inputs.len());
    Ok(phrases)
}

fn read_phrase_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|source| PhraseLoadError::FileRead {
        path: path.display().to_string(),
        source,
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn push_unique(phrases: &mut Vec<Phrase>, seen: &mut HashSet<String>, text: &str) {
    let phrase = Phrase::new(text);
    if phrase.text.is_empty() {
        return;
    }
    if seen.insert(phrase.normalized.clone()) {
        phrases.push(phrase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".txt")
            .tempfile()
            .expect("create temp file");
        file.write_all(content.as_bytes()).expect("write temp file");
        file
    }

    #[test]
    fn dedupes_case_and_whitespace_variants_first_wins() {
        let inputs = vec![
            "Hello".to_string(),
            "Hello ".to_string(),
            "hello".to_string(),
            "Good morning".to_string(),
        ];
        let phrases = collect_phrases(&inputs).unwrap();
        assert_eq!(phrases.len(), 2);
        assert_eq!(phrases[0].text, "Hello");
        assert_eq!(phrases[1].text, "Good morning");
    }

    #[test]
    fn file_parsing_skips_comments_and_blanks_in_order() {
        let file = write_temp("# header comment\n\nBom dia\n   # indented comment\nBoa tarde\n\n  Boa noite  \n");
        let inputs = vec![file.path().display().to_string()];
        let phrases = collect_phrases(&inputs).unwrap();
        let texts: Vec<_> = phrases.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["Bom dia", "Boa tarde", "Boa noite"]);
    }

    #[test]
    fn mixes_literals_and_files() {
        let file = write_temp("from file\nHello\n");
        let inputs = vec!["Hello".to_string(), file.path().display().to_string()];
        let phrases = collect_phrases(&inputs).unwrap();
        let texts: Vec<_> = phrases.iter().map(|p| p.text.as_str()).collect();
        // "Hello" inside the file is a duplicate of the literal.
        assert_eq!(texts, vec!["Hello", "from file"]);
    }

    #[test]
    fn missing_literal_path_is_treated_as_a_phrase() {
        let inputs = vec!["no/such/file.txt is fine as words".to_string()];
        let phrases = collect_phrases(&inputs).unwrap();
        assert_eq!(phrases.len(), 1);
    }

    #[test]
    fn empty_input_set_is_an_error() {
        let file = write_temp("# only comments\n\n");
        let inputs = vec![file.path().display().to_string()];
        assert!(matches!(collect_phrases(&inputs), Err(PhraseLoadError::Empty)));
    }
}
