/// Config directory loader with validation.
///
/// Reads all config from a directory path and validates it as a whole before anything
/// is wired up. Backend function names are not resolved here; they are read from the
/// environment at call time so a missing value surfaces as a configuration error on the
/// request that needs it.
use std::collections::HashSet;
use std::path::Path;

use crate::config::*;
use crate::errors::RouterError;
use crate::model::Intent;

/// Loads and validates configuration from a directory.
///
/// Expected directory structure:
/// ```text
/// config/
/// ├── router.yaml
/// ├── rules.yaml          (optional)
/// └── collections/        (optional)
///     ├── north-sea.yaml
///     └── permian.yaml
/// ```
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load all configuration from a directory and validate it.
    pub fn load(config_dir: &Path) -> Result<WellrouteConfig, RouterError> {
        let config = Self::load_all(config_dir)?;
        Self::validate(&config)?;
        tracing::info!(
            dir = %config_dir.display(),
            backends = config.router.backends.len(),
            custom_rules = config.rules.as_ref().map(Vec::len),
            collections = config.collections.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load all config files from a directory without validating them.
    pub fn load_all(config_dir: &Path) -> Result<WellrouteConfig, RouterError> {
        let router = Self::load_router(config_dir)?;
        let rules = Self::load_rules(config_dir)?;
        let collections = Self::load_collections(config_dir)?;

        Ok(WellrouteConfig {
            router,
            rules,
            collections,
        })
    }

    /// Load router.yaml from the config directory.
    fn load_router(config_dir: &Path) -> Result<RouterConfig, RouterError> {
        let path = config_dir.join("router.yaml");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| RouterError::Config(format!("failed to read {}: {e}", path.display())))?;
        serde_yaml::from_str(&content)
            .map_err(|e| RouterError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Load rules.yaml if present.
    fn load_rules(config_dir: &Path) -> Result<Option<Vec<RuleConfig>>, RouterError> {
        let path = config_dir.join("rules.yaml");
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| RouterError::Config(format!("failed to read {}: {e}", path.display())))?;
        let file: RulesFile = serde_yaml::from_str(&content)
            .map_err(|e| RouterError::Config(format!("failed to parse {}: {e}", path.display())))?;
        Ok(Some(file.rules))
    }

    /// Load all collection seeds from `config/collections/`.
    fn load_collections(config_dir: &Path) -> Result<Vec<CollectionSeed>, RouterError> {
        let collections_dir = config_dir.join("collections");
        let mut seeds = Vec::new();

        if !collections_dir.exists() {
            return Ok(seeds);
        }

        let entries = std::fs::read_dir(&collections_dir).map_err(|e| {
            RouterError::Config(format!("failed to read {}: {e}", collections_dir.display()))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                RouterError::Config(format!("failed to read directory entry: {e}"))
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
                paths.push(path);
            }
        }
        // read_dir order is platform dependent
        paths.sort();

        for path in paths {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                RouterError::Config(format!("failed to read {}: {e}", path.display()))
            })?;
            let seed: CollectionSeed = serde_yaml::from_str(&content).map_err(|e| {
                RouterError::Config(format!("failed to parse {}: {e}", path.display()))
            })?;
            seeds.push(seed);
        }

        Ok(seeds)
    }

    /// Validate the aggregate config for internal consistency.
    ///
    /// Checks:
    /// - Confidence floor and listed-entity limit are positive
    /// - Every backend names a function or an env var, and env var names are well formed
    /// - The HTTP base URL is http(s)
    /// - Every rule pattern compiles and no rule votes for `unknown`
    /// - Collection ids are unique and no session is bound twice
    pub fn validate(config: &WellrouteConfig) -> Result<(), RouterError> {
        Self::validate_router(&config.router)?;
        if let Some(rules) = &config.rules {
            Self::validate_rules(rules)?;
        }
        Self::validate_collections(&config.collections)?;
        Ok(())
    }

    /// Validate router.yaml.
    fn validate_router(config: &RouterConfig) -> Result<(), RouterError> {
        if config.classifier.confidence_floor <= 0 {
            return Err(RouterError::Config(format!(
                "classifier.confidence_floor must be positive (got {})",
                config.classifier.confidence_floor
            )));
        }
        if config.scope.max_listed_entities == 0 {
            return Err(RouterError::Config(
                "scope.max_listed_entities must be positive (got 0)".to_string(),
            ));
        }

        for (name, backend) in &config.backends {
            let has_literal = backend
                .function_name
                .as_deref()
                .is_some_and(|n| !n.trim().is_empty());
            match &backend.function_name_env {
                Some(env) => validate_env_var_name(env).map_err(|e| {
                    RouterError::Config(format!("backend '{name}': {e}"))
                })?,
                None if !has_literal => {
                    return Err(RouterError::Config(format!(
                        "backend '{name}': declare function_name or function_name_env"
                    )));
                }
                None => {}
            }
        }

        validate_base_url(&config.http.base_url)?;
        if config.http.connect_timeout_secs == 0 {
            return Err(RouterError::Config(
                "http.connect_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate rules.yaml.
    fn validate_rules(rules: &[RuleConfig]) -> Result<(), RouterError> {
        if rules.is_empty() {
            return Err(RouterError::Config(
                "rules.yaml must declare at least one rule".to_string(),
            ));
        }
        for (index, rule) in rules.iter().enumerate() {
            if rule.agent == Intent::Unknown {
                return Err(RouterError::Config(format!(
                    "rule #{index}: 'unknown' is not a routable agent"
                )));
            }
            if rule.patterns.is_empty() && rule.keywords.is_empty() {
                return Err(RouterError::Config(format!(
                    "rule #{index} ({}): needs at least one pattern or keyword",
                    rule.agent
                )));
            }
            for pattern in &rule.patterns {
                regex::Regex::new(pattern).map_err(|e| {
                    RouterError::Config(format!(
                        "rule #{index} ({}): invalid regex '{pattern}': {e}",
                        rule.agent
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Validate collection seeds.
    fn validate_collections(seeds: &[CollectionSeed]) -> Result<(), RouterError> {
        let mut ids: HashSet<&str> = HashSet::new();
        let mut sessions: HashSet<&str> = HashSet::new();
        for seed in seeds {
            if !ids.insert(seed.collection.id.as_str()) {
                return Err(RouterError::Config(format!(
                    "duplicate collection id '{}'",
                    seed.collection.id
                )));
            }
            for session in &seed.session_ids {
                if !sessions.insert(session.as_str()) {
                    return Err(RouterError::Config(format!(
                        "session '{session}' is bound to more than one collection"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Validate an env var name: non-empty, upper snake case, not starting with a digit.
fn validate_env_var_name(name: &str) -> Result<(), RouterError> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RouterError::Config(format!(
            "invalid env var name '{name}': expected UPPER_SNAKE_CASE"
        )))
    }
}

/// Validate that the base URL is http or https.
fn validate_base_url(url: &str) -> Result<(), RouterError> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    match rest {
        Some(host) if !host.trim_matches('/').is_empty() => Ok(()),
        _ => Err(RouterError::Config(format!(
            "invalid http.base_url '{url}': expected http:// or https:// with a host"
        ))),
    }
}
