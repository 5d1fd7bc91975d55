/// Configuration types for the wellroute request router.
///
/// Parsed from the YAML files of a config directory by
/// [`ConfigLoader`](crate::config_loader::ConfigLoader).
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::BackendError;
use crate::model::{ActiveCollection, Intent};

/// Logical backend names used by the built-in agents.
pub mod backends {
    pub const PETROPHYSICS: &str = "petrophysics";
    pub const RENEWABLE: &str = "renewable";
    pub const VISUALIZATION: &str = "visualization";
    pub const KNOWLEDGE: &str = "knowledge";
    pub const MAINTENANCE: &str = "maintenance";
}

/// Top-level router configuration, parsed from `router.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    /// Backends keyed by logical name.
    #[serde(default = "default_backends")]
    pub backends: BTreeMap<String, BackendConfig>,
    #[serde(default)]
    pub http: HttpBackendConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            scope: ScopeConfig::default(),
            backends: default_backends(),
            http: HttpBackendConfig::default(),
        }
    }
}

fn default_backends() -> BTreeMap<String, BackendConfig> {
    [
        (backends::PETROPHYSICS, "PETROPHYSICS_CALCULATOR_FUNCTION_NAME"),
        (backends::RENEWABLE, "RENEWABLE_ORCHESTRATOR_FUNCTION_NAME"),
        (backends::VISUALIZATION, "MINECRAFT_BACKEND_FUNCTION_NAME"),
        (backends::KNOWLEDGE, "KNOWLEDGE_BACKEND_FUNCTION_NAME"),
        (backends::MAINTENANCE, "MAINTENANCE_BACKEND_FUNCTION_NAME"),
    ]
    .into_iter()
    .map(|(name, env)| {
        (
            name.to_string(),
            BackendConfig {
                function_name: None,
                function_name_env: Some(env.to_string()),
            },
        )
    })
    .collect()
}

/// Classifier tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Best scores below this floor are discarded in favour of fallback heuristics.
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: i32,
}

fn default_confidence_floor() -> i32 {
    5
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            confidence_floor: default_confidence_floor(),
        }
    }
}

/// Scope guard tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// How many out-of-scope identifiers an approval prompt lists by name.
    #[serde(default = "default_max_listed_entities")]
    pub max_listed_entities: usize,
}

fn default_max_listed_entities() -> usize {
    5
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            max_listed_entities: default_max_listed_entities(),
        }
    }
}

/// Where to find one backend's deployed function name.
///
/// ```yaml
/// backends:
///   petrophysics:
///     function_name_env: PETROPHYSICS_CALCULATOR_FUNCTION_NAME
///   visualization:
///     function_name: minecraft-backend-prod
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Literal function name. Takes precedence over the env var.
    #[serde(default)]
    pub function_name: Option<String>,
    /// Environment variable holding the function name.
    #[serde(default)]
    pub function_name_env: Option<String>,
}

impl BackendConfig {
    /// Name of the setting a user must provide to configure this backend.
    pub fn setting_name(&self, logical_name: &str) -> String {
        match &self.function_name_env {
            Some(env) => env.clone(),
            None => format!("backends.{logical_name}.function_name"),
        }
    }

    /// Resolve the deployed function name, reading the environment if needed.
    pub fn resolve(&self, logical_name: &str) -> Result<String, BackendError> {
        if let Some(name) = self.function_name.as_deref().map(str::trim) {
            if !name.is_empty() {
                return Ok(name.to_string());
            }
        }
        if let Some(env) = &self.function_name_env {
            if let Ok(value) = std::env::var(env) {
                let value = value.trim();
                if !value.is_empty() {
                    return Ok(value.to_string());
                }
            }
        }
        Err(BackendError::NotConfigured {
            setting: self.setting_name(logical_name),
        })
    }
}

/// HTTP backend client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpBackendConfig {
    /// Base URL of the function gateway.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Connection establishment timeout.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Whole-request timeout. Unset means calls may wait indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:9000".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: None,
        }
    }
}

/// One declarative classifier rule, as written in `rules.yaml`.
///
/// ```yaml
/// rules:
///   - agent: calculate_porosity
///     patterns: ["porosity"]
///     keywords: ["porosity", "density", "neutron"]
///     requires_well_context: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Intent the rule votes for.
    pub agent: Intent,
    /// Regex patterns; the first match scores once.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Lowercase keywords; each contained keyword scores.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Whether the rule expects a well/entity in the message.
    #[serde(default)]
    pub requires_well_context: bool,
    /// High-priority rules are evaluated first and get a boost when they score.
    #[serde(default)]
    pub priority: bool,
}

/// Shape of `rules.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesFile {
    pub rules: Vec<RuleConfig>,
}

/// Seed entry for the in-memory collection store, from `collections/*.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSeed {
    /// Sessions bound to this collection.
    #[serde(default)]
    pub session_ids: Vec<String>,
    pub collection: ActiveCollection,
}

/// Everything loaded from a config directory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WellrouteConfig {
    pub router: RouterConfig,
    /// Replacement rule catalog; `None` means use the built-in catalog.
    pub rules: Option<Vec<RuleConfig>>,
    pub collections: Vec<CollectionSeed>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_declares_standard_backends() {
        let config = RouterConfig::default();
        assert_eq!(config.classifier.confidence_floor, 5);
        assert_eq!(config.scope.max_listed_entities, 5);
        for name in [
            backends::PETROPHYSICS,
            backends::RENEWABLE,
            backends::VISUALIZATION,
            backends::KNOWLEDGE,
            backends::MAINTENANCE,
        ] {
            assert!(config.backends.contains_key(name), "missing {name}");
        }
        assert_eq!(config.http.request_timeout_secs, None);
    }

    #[test]
    fn test_literal_function_name_wins() {
        let backend = BackendConfig {
            function_name: Some("petro-calc-prod".to_string()),
            function_name_env: Some("WELLROUTE_TEST_UNSET_VAR_A".to_string()),
        };
        assert_eq!(backend.resolve("petrophysics").unwrap(), "petro-calc-prod");
    }

    #[test]
    fn test_missing_function_name_names_env_setting() {
        let backend = BackendConfig {
            function_name: Some("   ".to_string()),
            function_name_env: Some("WELLROUTE_TEST_UNSET_VAR_B".to_string()),
        };
        let err = backend.resolve("petrophysics").unwrap_err();
        assert_eq!(
            err,
            BackendError::NotConfigured {
                setting: "WELLROUTE_TEST_UNSET_VAR_B".to_string()
            }
        );
    }

    #[test]
    fn test_missing_everything_names_config_key() {
        let backend = BackendConfig {
            function_name: None,
            function_name_env: None,
        };
        let err = backend.resolve("renewable").unwrap_err();
        assert_eq!(
            err,
            BackendError::NotConfigured {
                setting: "backends.renewable.function_name".to_string()
            }
        );
    }

    #[test]
    fn test_rule_config_parses_with_defaults() {
        let rule: RuleConfig = serde_yaml::from_str(
            r#"
agent: list_wells
patterns: ["list wells"]
"#,
        )
        .unwrap();
        assert_eq!(rule.agent, Intent::ListWells);
        assert!(rule.keywords.is_empty());
        assert!(!rule.priority);
        assert!(!rule.requires_well_context);
    }
}
