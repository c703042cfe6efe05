//! Canned answers for exercising code built on [`ValuesProvider`] without a
//! store.

use parking_lot::Mutex;

use super::ValuesProvider;
use crate::error::SosResult;
use crate::values::ValuesStore;

/// Serves fixed values keyed by the parameter list of the request.
///
/// A request receives every requested variable present in the answer
/// registered for its parameters; anything else is absent, as it would be for
/// a variable no statement owns.
#[derive(Default)]
pub struct CannedValues {
    answers: Vec<(Vec<String>, ValuesStore)>,
    requests: Mutex<Vec<(Vec<String>, Vec<String>)>>,
}

impl CannedValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `values` as the answer for requests made with `parameters`.
    pub fn with_answer(mut self, parameters: &[&str], values: ValuesStore) -> Self {
        let key = parameters.iter().map(|p| p.to_string()).collect();
        self.answers.push((key, values));
        self
    }

    /// Every `(variables, parameters)` pair requested so far.
    pub fn requests(&self) -> Vec<(Vec<String>, Vec<String>)> {
        self.requests.lock().clone()
    }
}

impl ValuesProvider for CannedValues {
    fn load_data(&self, variables: &[&str], parameters: &[String]) -> SosResult<ValuesStore> {
        self.requests.lock().push((
            variables.iter().map(|v| v.to_string()).collect(),
            parameters.to_vec(),
        ));

        Ok(self
            .answers
            .iter()
            .find(|(key, _)| key.as_slice() == parameters)
            .map(|(_, values)| values.restricted_to(variables.iter().copied()))
            .unwrap_or_default())
    }
}
