//! Active-collection scope gate.
//!
//! A pure function of the requested identifiers and the session's collection: no I/O,
//! no state, identical inputs give identical decisions.

use std::collections::HashSet;

use wellroute_types::config::ScopeConfig;
use wellroute_types::model::{ActiveCollection, ScopeDecision};

/// Decides ALLOW or NEEDS_APPROVAL for the entities a request will touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeGuard {
    max_listed_entities: usize,
}

impl Default for ScopeGuard {
    fn default() -> Self {
        Self::from_config(&ScopeConfig::default())
    }
}

impl ScopeGuard {
    pub fn new(max_listed_entities: usize) -> Self {
        Self {
            max_listed_entities,
        }
    }

    pub fn from_config(config: &ScopeConfig) -> Self {
        Self::new(config.max_listed_entities)
    }

    /// Check `requested` against `collection`.
    ///
    /// Members match by id or by display name, case-insensitively. Out-of-scope ids are
    /// reported once each, in request order.
    pub fn check(
        &self,
        requested: &[String],
        collection: Option<&ActiveCollection>,
    ) -> ScopeDecision {
        let Some(collection) = collection else {
            return ScopeDecision::allow();
        };

        let members: HashSet<String> = collection
            .member_entity_ids
            .iter()
            .chain(collection.member_display_names.values())
            .map(|m| m.trim().to_lowercase())
            .collect();

        let mut seen = HashSet::new();
        let out_of_scope: Vec<String> = requested
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .filter(|id| !members.contains(&id.to_lowercase()))
            .filter(|id| seen.insert(id.to_lowercase()))
            .map(str::to_string)
            .collect();

        if out_of_scope.is_empty() {
            return ScopeDecision::allow();
        }

        let prompt = self.render_prompt(collection, &out_of_scope);
        ScopeDecision {
            allowed: false,
            out_of_scope_entity_ids: out_of_scope,
            approval_prompt: Some(prompt),
        }
    }

    fn render_prompt(&self, collection: &ActiveCollection, out_of_scope: &[String]) -> String {
        let count = out_of_scope.len();
        let noun = if count == 1 { "well" } else { "wells" };
        let listed = out_of_scope
            .iter()
            .take(self.max_listed_entities)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        let remainder = count.saturating_sub(self.max_listed_entities);
        let listed = if remainder > 0 {
            format!("{listed} and {remainder} more")
        } else {
            listed
        };

        format!(
            "This request touches {count} {noun} outside the active collection \"{name}\": \
             {listed}. Reply \"approve\" to include them for this request, or narrow your \
             request to wells in \"{name}\".",
            name = collection.name,
        )
    }
}
