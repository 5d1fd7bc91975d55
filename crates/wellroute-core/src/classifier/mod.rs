//! Priority-ordered, scored pattern classifier.
//!
//! `classify` is pure: normalize, extract an entity, score every rule as one reduction
//! over the catalog (priority rules first), then fall back to fixed heuristics when the
//! best score is below the confidence floor. Ties keep the earlier rule.

pub mod entity;
pub mod method;
pub mod rules;

use tracing::debug;

use wellroute_types::config::WellrouteConfig;
use wellroute_types::errors::RouterError;
use wellroute_types::model::{ClassificationResult, Intent};

pub use entity::EntityExtractor;
pub use rules::{PatternRule, RuleSet};

/// Default confidence floor.
pub const DEFAULT_CONFIDENCE_FLOOR: i32 = 5;

/// Intent returned when nothing else fires.
pub const DEFAULT_INTENT: Intent = Intent::NaturalLanguage;

/// Noun whose bare mention (with no entity) means "list the wells".
const DOMAIN_NOUN: &str = "well";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FallbackCheck {
    /// Every phrase is contained in the message.
    AllPhrases(&'static [&'static str]),
    /// An entity was extracted (or hinted).
    HasEntity,
    /// The domain noun is mentioned but no entity was found.
    DomainNounWithoutEntity,
    Always,
}

#[derive(Debug, Clone, Copy)]
struct Fallback {
    check: FallbackCheck,
    intent: Intent,
}

/// Low-confidence heuristics, in the order they are tried.
const FALLBACKS: &[Fallback] = &[
    Fallback {
        check: FallbackCheck::AllPhrases(&["porosity", "shale", "saturation"]),
        intent: Intent::FormationEvaluation,
    },
    Fallback {
        check: FallbackCheck::AllPhrases(&["compare", "wells"]),
        intent: Intent::MultiWellCorrelation,
    },
    Fallback {
        check: FallbackCheck::AllPhrases(&["correlat", "wells"]),
        intent: Intent::MultiWellCorrelation,
    },
    Fallback {
        check: FallbackCheck::AllPhrases(&["data", "quality"]),
        intent: Intent::DataQuality,
    },
    Fallback {
        check: FallbackCheck::HasEntity,
        intent: Intent::WellInfo,
    },
    Fallback {
        check: FallbackCheck::DomainNounWithoutEntity,
        intent: Intent::ListWells,
    },
    Fallback {
        check: FallbackCheck::Always,
        intent: DEFAULT_INTENT,
    },
];

impl FallbackCheck {
    fn fires(self, normalized: &str, has_entity: bool) -> bool {
        match self {
            FallbackCheck::AllPhrases(phrases) => phrases.iter().all(|p| normalized.contains(p)),
            FallbackCheck::HasEntity => has_entity,
            FallbackCheck::DomainNounWithoutEntity => {
                !has_entity && normalized.contains(DOMAIN_NOUN)
            }
            FallbackCheck::Always => true,
        }
    }
}

/// Lowercase and trim.
pub fn normalize(message: &str) -> String {
    message.trim().to_lowercase()
}

/// Maps a message to one intent of the closed set.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: RuleSet,
    entities: EntityExtractor,
    confidence_floor: i32,
}

impl Classifier {
    pub fn new(rules: RuleSet, confidence_floor: i32) -> Result<Self, RouterError> {
        Ok(Self {
            rules,
            entities: EntityExtractor::new()?,
            confidence_floor,
        })
    }

    /// Built-in catalog with the default floor.
    pub fn builtin() -> Result<Self, RouterError> {
        Self::new(RuleSet::builtin()?, DEFAULT_CONFIDENCE_FLOOR)
    }

    /// Catalog from `rules.yaml` when present, else the built-in one; floor from `router.yaml`.
    pub fn from_config(config: &WellrouteConfig) -> Result<Self, RouterError> {
        let rules = match &config.rules {
            Some(rules) => RuleSet::from_config(rules)?,
            None => RuleSet::builtin()?,
        };
        Self::new(rules, config.router.classifier.confidence_floor)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn entities(&self) -> &EntityExtractor {
        &self.entities
    }

    /// Classify one message. `known_entity_hint` is used only when the message names no entity.
    pub fn classify(&self, message: &str, known_entity_hint: Option<&str>) -> ClassificationResult {
        let normalized = normalize(message);
        let entity = self.resolve_entity(message, known_entity_hint);
        let has_entity = entity.is_some();

        let (best_intent, best_score) = self.score(&normalized, has_entity);

        let intent = if best_score >= self.confidence_floor {
            best_intent
        } else {
            let fallback = FALLBACKS
                .iter()
                .find(|f| f.check.fires(&normalized, has_entity))
                .map(|f| f.intent)
                .unwrap_or(DEFAULT_INTENT);
            debug!(
                best_intent = %best_intent,
                best_score,
                fallback = %fallback,
                "best score below confidence floor, using fallback"
            );
            fallback
        };

        ClassificationResult {
            intent,
            confidence_score: best_score,
            extracted_method: method::method_for(intent, &normalized),
            extracted_entity: entity,
        }
    }

    /// Result for a caller-selected intent. No rule is scored.
    pub fn overridden(
        &self,
        intent: Intent,
        message: &str,
        known_entity_hint: Option<&str>,
    ) -> ClassificationResult {
        ClassificationResult {
            intent,
            confidence_score: 0,
            extracted_entity: self.resolve_entity(message, known_entity_hint),
            extracted_method: method::method_for(intent, &normalize(message)),
        }
    }

    /// Highest-scoring rule; the first one reached keeps a tie.
    fn score(&self, normalized: &str, has_entity: bool) -> (Intent, i32) {
        self.rules
            .in_evaluation_order()
            .fold((Intent::Unknown, 0), |best, rule| {
                let score = rule.score(normalized, has_entity);
                if score > best.1 {
                    (rule.intent, score)
                } else {
                    best
                }
            })
    }

    fn resolve_entity(&self, message: &str, hint: Option<&str>) -> Option<String> {
        self.entities.extract(message).or_else(|| {
            hint.map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
        })
    }
}
