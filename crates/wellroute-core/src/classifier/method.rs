//! Sub-method lookup for calculation intents.

use wellroute_types::model::Intent;

pub const DEFAULT_POROSITY_METHOD: &str = "density";
pub const DEFAULT_SHALE_METHOD: &str = "larionov_tertiary";
pub const DEFAULT_SATURATION_METHOD: &str = "archie";

/// (phrase, method) pairs; the first contained phrase wins, so compound names come first.
const POROSITY_METHODS: &[(&str, &str)] = &[
    ("density-neutron", "density_neutron"),
    ("density neutron", "density_neutron"),
    ("neutron-density", "density_neutron"),
    ("sonic", "sonic"),
    ("neutron", "neutron"),
    ("effective", "effective"),
    ("density", "density"),
];

const SHALE_METHODS: &[(&str, &str)] = &[
    ("pre-tertiary", "larionov_pre_tertiary"),
    ("pre tertiary", "larionov_pre_tertiary"),
    ("older rocks", "larionov_pre_tertiary"),
    ("clavier", "clavier"),
    ("linear", "linear"),
    ("larionov", "larionov_tertiary"),
];

const SATURATION_METHODS: &[(&str, &str)] = &[
    ("simandoux", "simandoux"),
    ("indonesia", "indonesia"),
    ("archie", "archie"),
];

/// Method for `intent` named in the normalized message, or the intent's primary method.
///
/// Non-calculation intents have no method.
pub fn method_for(intent: Intent, normalized: &str) -> Option<String> {
    let (table, default) = match intent {
        Intent::CalculatePorosity => (POROSITY_METHODS, DEFAULT_POROSITY_METHOD),
        Intent::CalculateShale => (SHALE_METHODS, DEFAULT_SHALE_METHOD),
        Intent::CalculateSaturation => (SATURATION_METHODS, DEFAULT_SATURATION_METHOD),
        _ => return None,
    };
    let method = table
        .iter()
        .find(|(phrase, _)| normalized.contains(phrase))
        .map(|(_, method)| *method)
        .unwrap_or(default);
    Some(method.to_string())
}
