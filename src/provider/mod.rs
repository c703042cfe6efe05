//! Service-facing view of the loaded variables.
//!
//! [`SosProvider`] turns `load_data` calls into offering, phenomenon, feature,
//! observation and result records. Which variable feeds which field is set by
//! the [`VariableContract`].

mod contract;
mod model;

pub use contract::VariableContract;
pub use model::{
    FeatureOfInterest, Observation, ObservationOffering, ObservationResult, Phenomenon,
    ResultEntry,
};

use std::sync::Arc;

use crate::error::SosResult;
use crate::executor::ValuesProvider;
use crate::values::ValuesStore;

pub struct SosProvider {
    values: Arc<dyn ValuesProvider>,
    contract: VariableContract,
}

impl SosProvider {
    pub fn new(values: Arc<dyn ValuesProvider>, contract: VariableContract) -> Self {
        Self { values, contract }
    }

    pub fn contract(&self) -> &VariableContract {
        &self.contract
    }

    fn load(&self, variables: &[&String], parameters: &[&str]) -> SosResult<ValuesStore> {
        let variables: Vec<&str> = variables.iter().map(|v| v.as_str()).collect();
        let parameters: Vec<String> = parameters.iter().map(|p| p.to_string()).collect();
        self.values.load_data(&variables, &parameters)
    }

    /// Names of every offering.
    pub fn offering_names(&self) -> SosResult<Vec<String>> {
        let c = &self.contract;
        let values = self.load(&[&c.offering_names], &[])?;
        Ok(values.multiple_strings(&c.offering_names))
    }

    /// `Ok(None)` when no offering called `name` exists.
    pub fn observation_offering(&self, name: &str) -> SosResult<Option<ObservationOffering>> {
        let c = &self.contract;
        let values = self.load(
            &[
                &c.offering_name,
                &c.offering_description,
                &c.offering_begin,
                &c.offering_end,
                &c.offering_procedures,
                &c.offering_phenomena,
                &c.offering_features,
            ],
            &[name],
        )?;

        let Some(found) = values.single_value(&c.offering_name) else {
            tracing::debug!("[PROVIDER] No offering named {}", name);
            return Ok(None);
        };

        Ok(Some(ObservationOffering {
            name: found.to_string(),
            description: owned(values.single_value(&c.offering_description)),
            begin_time: owned(values.single_value(&c.offering_begin)),
            end_time: owned(values.single_value(&c.offering_end)),
            procedures: values.multiple_strings(&c.offering_procedures),
            phenomena: values.multiple_strings(&c.offering_phenomena),
            features_of_interest: values.multiple_strings(&c.offering_features),
        }))
    }

    pub fn phenomenon(&self, id: &str) -> SosResult<Option<Phenomenon>> {
        let c = &self.contract;
        let values = self.load(
            &[
                &c.phenomenon_id,
                &c.phenomenon_name,
                &c.phenomenon_description,
                &c.phenomenon_unit,
            ],
            &[id],
        )?;

        Ok(values.single_value(&c.phenomenon_id).map(|found| Phenomenon {
            id: found.to_string(),
            name: owned(values.single_value(&c.phenomenon_name)),
            description: owned(values.single_value(&c.phenomenon_description)),
            unit: owned(values.single_value(&c.phenomenon_unit)),
        }))
    }

    pub fn feature_of_interest(&self, id: &str) -> SosResult<Option<FeatureOfInterest>> {
        let c = &self.contract;
        let values = self.load(
            &[
                &c.feature_id,
                &c.feature_name,
                &c.feature_description,
                &c.feature_geometry,
            ],
            &[id],
        )?;

        Ok(values.single_value(&c.feature_id).map(|found| FeatureOfInterest {
            id: found.to_string(),
            name: owned(values.single_value(&c.feature_name)),
            description: owned(values.single_value(&c.feature_description)),
            geometry: owned(values.single_value(&c.feature_geometry)),
        }))
    }

    pub fn observation(&self, id: &str) -> SosResult<Option<Observation>> {
        let c = &self.contract;
        let values = self.load(
            &[
                &c.observation_id,
                &c.observation_procedure,
                &c.observation_phenomenon,
                &c.observation_feature,
                &c.observation_begin,
                &c.observation_end,
                &c.observation_value,
                &c.observation_unit,
            ],
            &[id],
        )?;

        Ok(values.single_value(&c.observation_id).map(|found| Observation {
            id: found.to_string(),
            procedure: owned(values.single_value(&c.observation_procedure)),
            phenomenon: owned(values.single_value(&c.observation_phenomenon)),
            feature_of_interest: owned(values.single_value(&c.observation_feature)),
            begin_time: owned(values.single_value(&c.observation_begin)),
            end_time: owned(values.single_value(&c.observation_end)),
            value: owned(values.single_value(&c.observation_value)),
            unit: owned(values.single_value(&c.observation_unit)),
        }))
    }

    /// Time/value series of result `id`, paired by row position.
    ///
    /// `Ok(None)` when no statement produced the time series.
    pub fn result(&self, id: &str) -> SosResult<Option<ObservationResult>> {
        let c = &self.contract;
        let values = self.load(&[&c.result_times, &c.result_values], &[id])?;

        if !values.contains_multiple(&c.result_times) {
            return Ok(None);
        }

        let times = values.multiple_value(&c.result_times);
        let results = values.multiple_value(&c.result_values);
        let entries = (0..times.len().max(results.len()))
            .map(|i| ResultEntry {
                time: times.get(i).cloned().flatten(),
                value: results.get(i).cloned().flatten(),
            })
            .collect();

        Ok(Some(ObservationResult {
            id: id.to_string(),
            entries,
        }))
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}
