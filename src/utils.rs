//! Text cleaning pipeline applied to artifact tokens by every creator.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::Artifact;
use crate::types::ArtifactId;

/// One normalization step; steps run in the order they are configured.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStep {
    /// Collapse whitespace runs to single spaces and trim.
    RemoveWhitespace,
    /// Split camelCase, PascalCase, snake_case, and kebab-case words.
    SeparateJoinedWords,
    /// Replace anything other than letters, digits, and whitespace with a space.
    RemoveUnwantedChars,
    /// Drop words shorter than the given number of characters.
    FilterMinLength(usize),
}

impl CleaningStep {
    fn apply(&self, text: &str) -> String {
        match self {
            CleaningStep::RemoveWhitespace => normalize_inline_whitespace(text),
            CleaningStep::SeparateJoinedWords => separate_joined_words(text),
            CleaningStep::RemoveUnwantedChars => {
                let kept: String = text
                    .chars()
                    .map(|ch| {
                        if ch.is_alphanumeric() || ch.is_whitespace() {
                            ch
                        } else {
                            ' '
                        }
                    })
                    .collect();
                normalize_inline_whitespace(kept)
            }
            CleaningStep::FilterMinLength(min_len) => text
                .split_whitespace()
                .filter(|word| word.chars().count() >= *min_len)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Ordered list of cleaning steps. The empty pipeline leaves text untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextCleaner {
    steps: Vec<CleaningStep>,
}

impl TextCleaner {
    /// Create a pipeline from explicit steps.
    pub fn new(steps: Vec<CleaningStep>) -> Self {
        Self { steps }
    }

    /// Configured steps in execution order.
    pub fn steps(&self) -> &[CleaningStep] {
        &self.steps
    }

    /// Run every step over `text`.
    pub fn clean(&self, text: &str) -> String {
        let mut current = text.to_string();
        for step in &self.steps {
            current = step.apply(&current);
        }
        current
    }

    /// Clean `token` and build an artifact, or `None` when nothing survives.
    pub fn artifact(&self, id: impl Into<ArtifactId>, token: &str) -> Option<Arc<Artifact>> {
        let cleaned = self.clean(token);
        if cleaned.trim().is_empty() {
            return None;
        }
        Some(Arc::new(Artifact::new(id, cleaned)))
    }
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_inline_whitespace<T: AsRef<str>>(text: T) -> String {
    let mut normalized = String::new();
    let mut seen_space = false;
    for ch in text.as_ref().chars() {
        if ch.is_whitespace() {
            if !seen_space {
                normalized.push(' ');
                seen_space = true;
            }
        } else {
            normalized.push(ch);
            seen_space = false;
        }
    }
    normalized.trim().to_string()
}

/// Insert spaces at case transitions and replace `_`/`-` joiners.
pub fn separate_joined_words(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    for (idx, ch) in chars.iter().enumerate() {
        if *ch == '_' || *ch == '-' {
            out.push(' ');
            continue;
        }
        if idx > 0 && is_word_boundary(&chars, idx) {
            out.push(' ');
        }
        out.push(*ch);
    }
    out
}

fn is_word_boundary(chars: &[char], idx: usize) -> bool {
    let prev = chars[idx - 1];
    let current = chars[idx];
    if !current.is_uppercase() {
        return false;
    }
    if prev.is_lowercase() || prev.is_ascii_digit() {
        return true;
    }
    // Acronym followed by a word: the `S` in `HTTPServer`.
    prev.is_uppercase() && chars.get(idx + 1).is_some_and(|next| next.is_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_inline_whitespace_collapses_runs() {
        let input = "Alpha\n\n  Beta\tGamma";
        assert_eq!(normalize_inline_whitespace(input), "Alpha Beta Gamma");
    }

    #[test]
    fn separate_joined_words_handles_common_joiners() {
        assert_eq!(separate_joined_words("getUserName"), "get User Name");
        assert_eq!(separate_joined_words("snake_case-name"), "snake case name");
        assert_eq!(separate_joined_words("HTTPServer"), "HTTP Server");
    }

    #[test]
    fn steps_run_in_configured_order() {
        let cleaner = TextCleaner::new(vec![
            CleaningStep::SeparateJoinedWords,
            CleaningStep::RemoveUnwantedChars,
            CleaningStep::FilterMinLength(3),
            CleaningStep::RemoveWhitespace,
        ]);
        assert_eq!(cleaner.clean("parseConfig(a, fileName);"), "parse Config file Name");
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let cleaner = TextCleaner::default();
        assert_eq!(cleaner.clean("  keep  me "), "  keep  me ");
    }

    #[test]
    fn artifacts_that_clean_to_empty_are_dropped() {
        let cleaner = TextCleaner::new(vec![
            CleaningStep::RemoveUnwantedChars,
            CleaningStep::FilterMinLength(4),
        ]);
        assert!(cleaner.artifact("a1", "{ } ;").is_none());
        assert!(cleaner.artifact("a2", "ok no").is_none());
        let kept = cleaner.artifact("a3", "valid token").unwrap();
        assert_eq!(kept.token, "valid token");
    }

    #[test]
    fn cleaning_steps_deserialize_from_snake_case() {
        let cleaner: TextCleaner =
            serde_json::from_str(r#"["remove_whitespace", {"filter_min_length": 2}]"#).unwrap();
        assert_eq!(
            cleaner.steps(),
            &[CleaningStep::RemoveWhitespace, CleaningStep::FilterMinLength(2)]
        );
    }
}
