//! Role to variable name mapping.

use serde::{Deserialize, Serialize};

/// Names of the catalog variables the provider reads for each role.
///
/// Offering roles take the offering name as their only parameter; phenomenon,
/// feature, observation and result roles take the respective identifier.
/// `offering_names` takes no parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableContract {
    pub offering_names: String,
    pub offering_name: String,
    pub offering_description: String,
    pub offering_begin: String,
    pub offering_end: String,
    pub offering_procedures: String,
    pub offering_phenomena: String,
    pub offering_features: String,

    pub phenomenon_id: String,
    pub phenomenon_name: String,
    pub phenomenon_description: String,
    pub phenomenon_unit: String,

    pub feature_id: String,
    pub feature_name: String,
    pub feature_description: String,
    pub feature_geometry: String,

    pub observation_id: String,
    pub observation_procedure: String,
    pub observation_phenomenon: String,
    pub observation_feature: String,
    pub observation_begin: String,
    pub observation_end: String,
    pub observation_value: String,
    pub observation_unit: String,

    pub result_times: String,
    pub result_values: String,
}

impl Default for VariableContract {
    fn default() -> Self {
        let name = |role: &str| role.to_string();
        Self {
            offering_names: name("offering.names"),
            offering_name: name("offering.name"),
            offering_description: name("offering.description"),
            offering_begin: name("offering.begin_time"),
            offering_end: name("offering.end_time"),
            offering_procedures: name("offering.procedures"),
            offering_phenomena: name("offering.phenomena"),
            offering_features: name("offering.features"),

            phenomenon_id: name("phenomenon.id"),
            phenomenon_name: name("phenomenon.name"),
            phenomenon_description: name("phenomenon.description"),
            phenomenon_unit: name("phenomenon.unit"),

            feature_id: name("feature.id"),
            feature_name: name("feature.name"),
            feature_description: name("feature.description"),
            feature_geometry: name("feature.geometry"),

            observation_id: name("observation.id"),
            observation_procedure: name("observation.procedure"),
            observation_phenomenon: name("observation.phenomenon"),
            observation_feature: name("observation.feature"),
            observation_begin: name("observation.begin_time"),
            observation_end: name("observation.end_time"),
            observation_value: name("observation.value"),
            observation_unit: name("observation.unit"),

            result_times: name("result.times"),
            result_values: name("result.values"),
        }
    }
}
