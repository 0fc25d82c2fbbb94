//! New-file title validation
//!
//! Rules are checked in a fixed order and the first failure wins:
//! extension, whitespace, length, duplicate.

use super::files::FileListCache;
use thiserror::Error;

/// Required source file extension (without the dot)
pub const SOURCE_EXTENSION: &str = "sc";

/// Longest accepted basename, in characters
pub const MAX_BASENAME_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TitleError {
    #[error("File name must end in '.sc'.")]
    MissingExtension,
    #[error("File name must be one word.")]
    ContainsWhitespace,
    #[error("Max character limit exceeded.")]
    TooLong,
    #[error("Duplicate file name.")]
    Duplicate,
}

/// Validate a candidate title against the current file list.
///
/// Returns the title to store: the input with surrounding whitespace removed.
pub fn validate_title(candidate: &str, existing: &FileListCache) -> Result<String, TitleError> {
    let trimmed = candidate.trim();
    let lowered = trimmed.to_lowercase();

    let mut parts = lowered.split('.');
    let (Some(basename), Some(extension), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(TitleError::MissingExtension);
    };
    if extension != SOURCE_EXTENSION {
        return Err(TitleError::MissingExtension);
    }
    if basename.chars().any(char::is_whitespace) {
        return Err(TitleError::ContainsWhitespace);
    }
    if basename.chars().count() > MAX_BASENAME_CHARS {
        return Err(TitleError::TooLong);
    }
    if existing.contains_title(trimmed) {
        return Err(TitleError::Duplicate);
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{FileId, FileSummary};

    fn cache(titles: &[&str]) -> FileListCache {
        let mut cache = FileListCache::default();
        cache.replace(
            titles
                .iter()
                .enumerate()
                .map(|(i, t)| FileSummary {
                    id: FileId::from(i as i64),
                    title: t.to_string(),
                })
                .collect(),
        );
        cache
    }

    #[test]
    fn accepts_simple_title() {
        assert_eq!(validate_title("  main.sc ", &cache(&[])), Ok("main.sc".to_string()));
    }

    #[test]
    fn extension_is_case_insensitive() {
        assert!(validate_title("Main.SC", &cache(&[])).is_ok());
    }

    #[test]
    fn rejects_wrong_or_missing_extension() {
        let list = cache(&[]);
        for bad in ["main", "main.rs", "main.sc.bak", "a.b.sc", ".", ""] {
            assert_eq!(
                validate_title(bad, &list),
                Err(TitleError::MissingExtension),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn rejects_inner_whitespace() {
        assert_eq!(
            validate_title("my file.sc", &cache(&[])),
            Err(TitleError::ContainsWhitespace)
        );
        assert_eq!(
            validate_title("my\tfile.sc", &cache(&[])),
            Err(TitleError::ContainsWhitespace)
        );
    }

    #[test]
    fn length_limit_is_on_basename() {
        let at_limit = format!("{}.sc", "a".repeat(MAX_BASENAME_CHARS));
        let over = format!("{}.sc", "a".repeat(MAX_BASENAME_CHARS + 1));
        assert!(validate_title(&at_limit, &cache(&[])).is_ok());
        assert_eq!(validate_title(&over, &cache(&[])), Err(TitleError::TooLong));
    }

    #[test]
    fn duplicates_are_case_insensitive() {
        assert_eq!(
            validate_title("MAIN.sc", &cache(&["main.sc"])),
            Err(TitleError::Duplicate)
        );
    }

    #[test]
    fn first_failing_rule_wins() {
        let long_spaced = format!("{} x.sc", "a".repeat(MAX_BASENAME_CHARS + 5));
        // whitespace beats length
        assert_eq!(
            validate_title(&long_spaced, &cache(&[])),
            Err(TitleError::ContainsWhitespace)
        );
        // extension beats everything
        assert_eq!(
            validate_title("my file.txt", &cache(&["my file.txt"])),
            Err(TitleError::MissingExtension)
        );
        // length beats duplicate
        let long = format!("{}.sc", "b".repeat(MAX_BASENAME_CHARS + 1));
        assert_eq!(validate_title(&long, &cache(&[long.as_str()])), Err(TitleError::TooLong));
    }

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(
            TitleError::MissingExtension.to_string(),
            "File name must end in '.sc'."
        );
        assert_eq!(TitleError::Duplicate.to_string(), "Duplicate file name.");
    }
}
