//! Pattern rule catalog and per-rule scoring.
//!
//! A rule votes for one intent. Scoring against a normalized (lowercase, trimmed) message:
//! - +10 once if any pattern matches
//! - +2 per contained keyword
//! - +20 once if the rule is high-priority and has already scored
//! - +5 / -3 if the rule expects a well and one was / was not extracted (scored rules only)

use regex::{Regex, RegexBuilder};

use wellroute_types::config::RuleConfig;
use wellroute_types::errors::RouterError;
use wellroute_types::model::Intent;

pub const PATTERN_SCORE: i32 = 10;
pub const KEYWORD_SCORE: i32 = 2;
pub const PRIORITY_BOOST: i32 = 20;
pub const ENTITY_BONUS: i32 = 5;
pub const MISSING_ENTITY_PENALTY: i32 = 3;

/// One compiled rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub intent: Intent,
    patterns: Vec<Regex>,
    keywords: Vec<String>,
    pub requires_well_context: bool,
    pub priority: bool,
}

impl PatternRule {
    /// Compile a rule. Patterns are matched case-insensitively; keywords are lowercased.
    pub fn new(
        intent: Intent,
        patterns: &[&str],
        keywords: &[&str],
        requires_well_context: bool,
        priority: bool,
    ) -> Result<Self, RouterError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        RouterError::Config(format!(
                            "rule for '{intent}': invalid pattern '{p}': {e}"
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            intent,
            patterns,
            keywords: keywords.iter().map(|k| k.trim().to_lowercase()).collect(),
            requires_well_context,
            priority,
        })
    }

    pub fn from_config(rule: &RuleConfig) -> Result<Self, RouterError> {
        let patterns: Vec<&str> = rule.patterns.iter().map(String::as_str).collect();
        let keywords: Vec<&str> = rule.keywords.iter().map(String::as_str).collect();
        Self::new(
            rule.agent,
            &patterns,
            &keywords,
            rule.requires_well_context,
            rule.priority,
        )
    }

    /// Score this rule against an already-normalized message.
    pub fn score(&self, normalized: &str, has_entity: bool) -> i32 {
        let mut score = 0;
        if self.patterns.iter().any(|p| p.is_match(normalized)) {
            score += PATTERN_SCORE;
        }
        let keyword_hits = self
            .keywords
            .iter()
            .filter(|k| !k.is_empty() && normalized.contains(k.as_str()))
            .count() as i32;
        score += KEYWORD_SCORE * keyword_hits;

        if score > 0 {
            if self.priority {
                score += PRIORITY_BOOST;
            }
            if self.requires_well_context {
                score += if has_entity {
                    ENTITY_BONUS
                } else {
                    -MISSING_ENTITY_PENALTY
                };
            }
        }
        score
    }
}

/// Ordered rule catalog.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<PatternRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(rules: &[RuleConfig]) -> Result<Self, RouterError> {
        rules
            .iter()
            .map(PatternRule::from_config)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Catalog order.
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// High-priority rules first, then regular rules, each group in catalog order.
    pub fn in_evaluation_order(&self) -> impl Iterator<Item = &PatternRule> {
        self.rules
            .iter()
            .filter(|r| r.priority)
            .chain(self.rules.iter().filter(|r| !r.priority))
    }

    /// The built-in catalog.
    ///
    /// Several rules overlap on purpose (a "well log" shown "in minecraft" must land on
    /// visualization); the priority flags and evaluation order resolve those overlaps.
    /// A single keyword hit on a priority rule scores 22 and outbids a complete
    /// single-well calculation (17), so priority keywords are limited to domain terms.
    pub fn builtin() -> Result<Self, RouterError> {
        let rules = vec![
            // Domain-switching rules first: these must beat petrophysics wording.
            PatternRule::new(
                Intent::MultiWellCorrelation,
                // "wells" must be plural or two identifiers must be named: the `well`
                // inside `WELL-001` is a word of its own.
                &[
                    r"\bcorrelat\w*\b.*\bwells\b",
                    r"\bcompare\b.*\bwells\b",
                    r"\b(compare|correlat\w*)\b.*\b[a-z][a-z0-9]*[-_]\d+[a-z]?\b.*\b[a-z][a-z0-9]*[-_]\d+[a-z]?\b",
                    r"\bmulti[- ]?well\b",
                    r"\bwell[- ]to[- ]well\b",
                ],
                &["multi-well", "well-to-well", "between wells"],
                false,
                true,
            )?,
            PatternRule::new(
                Intent::Maintenance,
                &[
                    r"\bmaintenance\b",
                    r"\bequipment\b.*\b(failure|health|status|inspection)\b",
                    r"\b(pump|compressor|valve)\s+(failure|health|inspection)\b",
                    r"\bwork\s+orders?\b",
                ],
                &["maintenance", "failure prediction", "work order"],
                false,
                true,
            )?,
            PatternRule::new(
                Intent::Renewable,
                &[
                    r"\bwind\s+(farm|turbines?|energy|resource|layout)\b",
                    r"\bsolar\b",
                    r"\brenewables?\b",
                    r"\bwake\s+(effect|analysis|loss(es)?)\b",
                    r"\bturbine\s+layout\b",
                ],
                &["renewable", "wind farm", "turbine", "solar", "wake"],
                false,
                true,
            )?,
            PatternRule::new(
                Intent::Visualization,
                &[
                    r"\bminecraft\b",
                    r"\b3d\s+(visuali[sz]ation|view|model)\b",
                    r"\bvisuali[sz]e\b.*\bin\s+3d\b",
                ],
                &["minecraft"],
                false,
                true,
            )?,
            PatternRule::new(
                Intent::CrossWellAnalytics,
                &[
                    r"\bcross[- ]well\b",
                    r"\ball\s+(the\s+)?wells\b.*\b(average|summary|statistics|analytics|trends?)\b",
                    r"\b(field|portfolio)[- ]wide\b",
                    r"\b(rank|ranking)\b.*\bwells\b",
                    r"\b(top|bottom)[- ]?\d+\s+wells\b",
                ],
                &["cross-well", "cross well", "across all wells", "field-wide"],
                false,
                true,
            )?,
            // Petrophysics and general rules.
            PatternRule::new(
                Intent::WellInfo,
                &[
                    r"\b(info|information|details|overview|summary|header)\b.*\b(for|of|about|on)\b",
                    r"\btell me about\b",
                    r"\bshow\b.*\bwell\b",
                    r"\bwell\s+(data|logs?|curves?)\b",
                ],
                &["information", "info", "details", "overview", "about", "log"],
                true,
                false,
            )?,
            PatternRule::new(
                Intent::CalculatePorosity,
                &[r"\bporosity\b", r"\bphi\b"],
                &["porosity", "density", "neutron", "sonic"],
                true,
                false,
            )?,
            PatternRule::new(
                Intent::CalculateShale,
                &[
                    r"\bshale\b",
                    r"\bv\s?sh\b",
                    r"\bclay\s+volume\b",
                ],
                &["shale", "larionov", "clavier", "gamma ray"],
                true,
                false,
            )?,
            PatternRule::new(
                Intent::CalculateSaturation,
                &[r"\bsaturation\b", r"\bsw\b", r"\barchie\b"],
                &["saturation", "archie", "simandoux", "indonesia", "resistivity"],
                true,
                false,
            )?,
            PatternRule::new(
                Intent::DataQuality,
                &[
                    r"\bdata\s+quality\b",
                    r"\bquality\s+(check|assessment|control|report)\b",
                    r"\bqc\b",
                    r"\b(missing|null)\s+(values|data)\b",
                ],
                &["quality", "completeness", "missing", "outlier"],
                true,
                false,
            )?,
            PatternRule::new(
                Intent::FormationEvaluation,
                &[
                    r"\bformation\s+evaluation\b",
                    r"\bpetrophysical\s+(analysis|evaluation|interpretation)\b",
                    r"\bcompletion\s+(analysis|evaluation)\b",
                    r"\b(full|complete|comprehensive)\s+(log\s+)?analysis\b",
                ],
                &["formation", "evaluation", "petrophysical", "completion", "pay zone"],
                true,
                false,
            )?,
            PatternRule::new(
                Intent::ListWells,
                &[
                    r"\b(list|show|display|get)\b(\s+\w+){0,3}\s+wells\b",
                    r"\bwhat\s+wells\b",
                    r"\bhow\s+many\s+wells\b",
                    r"\bavailable\s+wells\b",
                ],
                &["list", "wells", "available"],
                false,
                false,
            )?,
            PatternRule::new(
                Intent::NaturalLanguage,
                &[
                    r"^(what|why|how|explain|describe|who|when|where)\b",
                    r"\b(map\s+of|where\s+is|location\s+of)\b",
                ],
                &["explain", "what is", "why", "how does", "definition"],
                false,
                false,
            )?,
        ];
        Ok(Self::new(rules))
    }
}
