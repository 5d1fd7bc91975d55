//! Entity identifier extraction.
//!
//! An ordered chain of (pattern, transform) pairs, specific to generic, evaluated
//! first-match-wins. Captured tokens that are generic words are rejected and the scan moves on.

use regex::Regex;

use wellroute_types::errors::RouterError;

/// Single words that look like tokens after "for"/"well" but never name an entity.
pub const GENERIC_WORDS: &[&str] = &[
    "formation",
    "analysis",
    "data",
    "quality",
    "porosity",
    "shale",
    "saturation",
    "evaluation",
    "correlation",
    "comparison",
    "all",
    "the",
    "a",
    "an",
    "this",
    "that",
    "these",
    "those",
    "each",
    "every",
    "my",
    "our",
    "me",
    "us",
    "it",
    "them",
    "wells",
    "well",
    "logs",
    "log",
    "field",
    "information",
    "info",
    "details",
    "production",
    "completion",
    "water",
    "wind",
    "solar",
    "maintenance",
    "equipment",
    "today",
    "tomorrow",
    "you",
    "example",
    "now",
    "top",
    "bottom",
    "first",
    "last",
];

/// Ordinal and ranking words that form `top-10` style phrases. These share the
/// dataset-ID shape, so the word before the number is checked on its own.
pub const RANKING_PREFIXES: &[&str] = &["top", "bottom", "first", "last", "next", "best", "worst"];

/// Whether `token` is on the generic-word denylist (case-insensitive).
pub fn is_generic(token: &str) -> bool {
    let lowered = token.to_ascii_lowercase();
    GENERIC_WORDS.contains(&lowered.as_str())
}

/// Whether `token` is a ranking phrase such as `top-10` or `last_5` rather than an identifier.
pub fn is_ranking_phrase(token: &str) -> bool {
    token
        .split_once(&['-', '_'][..])
        .is_some_and(|(head, tail)| {
            !tail.is_empty()
                && tail.chars().all(|c| c.is_ascii_digit())
                && RANKING_PREFIXES.contains(&head.to_ascii_lowercase().as_str())
        })
}

fn is_rejected(token: &str) -> bool {
    is_generic(token) || is_ranking_phrase(token)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transform {
    /// Dataset identifiers are canonically upper case.
    Uppercase,
    /// Upper-case only tokens that carry a digit ("well 7a" -> "7A", "for eagle" unchanged).
    UppercaseIfNumbered,
}

impl Transform {
    fn apply(self, token: &str) -> String {
        match self {
            Transform::Uppercase => token.to_uppercase(),
            Transform::UppercaseIfNumbered => {
                if token.chars().any(|c| c.is_ascii_digit()) {
                    token.to_uppercase()
                } else {
                    token.to_string()
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct EntityPattern {
    regex: Regex,
    transform: Transform,
}

/// Compiled entity extraction chain.
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    /// Explicit dataset-ID forms (e.g. `WELL-001`, `sandstone_res_02`).
    dataset_id: EntityPattern,
    /// Remaining patterns, in evaluation order after `dataset_id`.
    contextual: Vec<EntityPattern>,
}

impl EntityExtractor {
    pub fn new() -> Result<Self, RouterError> {
        let compile = |pattern: &str, transform: Transform| {
            Regex::new(pattern)
                .map(|regex| EntityPattern { regex, transform })
                .map_err(|e| RouterError::Config(format!("invalid entity pattern '{pattern}': {e}")))
        };

        Ok(Self {
            dataset_id: compile(
                r"(?i)\b([a-z][a-z0-9]*(?:[-_][a-z0-9]+)*[-_]\d+[a-z]?)\b",
                Transform::Uppercase,
            )?,
            contextual: vec![
                compile(
                    r"(?i)\b(?:for|analy[sz]e)\s+(?:well\s+)?([a-z0-9][a-z0-9_-]*)",
                    Transform::UppercaseIfNumbered,
                )?,
                compile(
                    r"(?i)\bwell\s+([a-z0-9][a-z0-9_-]*)",
                    Transform::UppercaseIfNumbered,
                )?,
            ],
        })
    }

    /// First acceptable entity in `text`, trying patterns specific to generic.
    pub fn extract(&self, text: &str) -> Option<String> {
        let text = text.trim();
        std::iter::once(&self.dataset_id)
            .chain(self.contextual.iter())
            .find_map(|pattern| first_accepted(pattern, text))
    }

    /// Every dataset-ID form mentioned in `text`, deduplicated, in order of appearance.
    pub fn dataset_ids(&self, text: &str) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for caps in self.dataset_id.regex.captures_iter(text) {
            let Some(token) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if is_rejected(token) {
                continue;
            }
            let id = self.dataset_id.transform.apply(token);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

fn first_accepted(pattern: &EntityPattern, text: &str) -> Option<String> {
    pattern
        .regex
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .find(|token| !is_rejected(token))
        .map(|token| pattern.transform.apply(token))
}
