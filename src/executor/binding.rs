//! Positional parameter binding.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::catalog::StatementDescriptor;
use crate::store::{ParamType, Session, SqlParam};

/// Turns textual request parameters into typed bind values.
///
/// Integer slots are bound as integers when the driver reports slot types.
/// The first time a driver reports that it cannot describe its parameters,
/// the binder switches to text-only binding for good.
#[derive(Debug, Default)]
pub struct ParameterBinder {
    text_only: AtomicBool,
}

impl ParameterBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_text_only(&self) -> bool {
        self.text_only.load(Ordering::Acquire)
    }

    pub fn bind(
        &self,
        session: &dyn Session,
        descriptor: &StatementDescriptor,
        params: &[String],
    ) -> Vec<SqlParam> {
        let types = self.slot_types(session, descriptor);

        params
            .iter()
            .enumerate()
            .map(|(slot, raw)| {
                match types.as_ref().and_then(|t| t.get(slot)) {
                    Some(ParamType::Integer) => match raw.trim().parse::<i64>() {
                        Ok(value) => SqlParam::Integer(value),
                        Err(e) => {
                            tracing::warn!(
                                "[LOADER] Parameter {} of statement {} is not an integer ('{}'): {}; left unbound",
                                slot + 1,
                                descriptor.handle,
                                raw,
                                e
                            );
                            SqlParam::Unbound
                        }
                    },
                    _ => SqlParam::Text(raw.clone()),
                }
            })
            .collect()
    }

    fn slot_types(
        &self,
        session: &dyn Session,
        descriptor: &StatementDescriptor,
    ) -> Option<Vec<ParamType>> {
        if self.is_text_only() {
            return None;
        }

        match session.parameter_types(&descriptor.sql) {
            Ok(Some(types)) => Some(types),
            Ok(None) => {
                if !self.text_only.swap(true, Ordering::AcqRel) {
                    tracing::info!(
                        "[LOADER] Driver does not report parameter types, binding all parameters as text"
                    );
                }
                None
            }
            Err(e) => {
                tracing::warn!(
                    "[LOADER] Parameter types of statement {} unavailable: {}",
                    descriptor.handle,
                    e
                );
                None
            }
        }
    }
}
