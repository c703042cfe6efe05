//! Variable loader
//!
//! Resolves requested variables to the statements owning them, runs those
//! statements and folds their rows into one [`ValuesStore`].
//!
//! # Execution modes
//!
//! - Sequential: statements run one after another on the calling thread.
//! - Parallel: single-row statements are fed to the worker pool and all of
//!   them are awaited before any multi-row statement is submitted. At most
//!   `in_flight` statements of a phase are outstanding at any time.
//!
//! A statement that fails is logged and its variables are left out of the
//! result; the call itself still succeeds.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use super::binding::ParameterBinder;
use super::ValuesProvider;
use crate::catalog::{StatementDescriptor, StatementHandle, StatementKind, VariableCatalog};
use crate::config::{ExecutionConfig, ExecutionMode};
use crate::error::{SosError, SosResult};
use crate::store::{Row, SessionPool};
use crate::values::ValuesStore;

/// State shared with worker tasks.
struct LoaderShared {
    catalog: Arc<VariableCatalog>,
    sessions: SessionPool,
    binder: ParameterBinder,
}

impl LoaderShared {
    fn run_statement(&self, handle: StatementHandle, params: &[String]) -> SosResult<ValuesStore> {
        let descriptor = self.catalog.get(handle);
        let guard = self.sessions.acquire();
        let rows = guard.with_session(|session| {
            let bound = self.binder.bind(session, descriptor, params);
            session.query(&descriptor.sql, &bound)
        })?;
        Ok(extract(descriptor, rows))
    }
}

/// Builds the fragment one statement contributes.
fn extract(descriptor: &StatementDescriptor, rows: Vec<Row>) -> ValuesStore {
    let mut values = ValuesStore::new();
    match descriptor.kind {
        StatementKind::Single => {
            let first = rows.into_iter().next();
            for (column, name) in descriptor.variables.iter().enumerate() {
                let value = first.as_ref().and_then(|row| row.get(column).cloned().flatten());
                values.add_single_value(name.as_str(), value);
            }
        }
        StatementKind::Multiple => {
            for name in &descriptor.variables {
                values.create_multiple_value(name.as_str());
            }
            for mut row in rows {
                for (column, name) in descriptor.variables.iter().enumerate() {
                    let value = row.get_mut(column).and_then(Option::take);
                    values.append_to_multiple_value(name, value);
                }
            }
        }
    }
    values
}

pub struct QueryExecutor {
    shared: Arc<LoaderShared>,
    mode: ExecutionMode,
    in_flight: usize,
    workers: Option<ThreadPool>,
}

impl QueryExecutor {
    pub fn new(
        catalog: Arc<VariableCatalog>,
        sessions: SessionPool,
        execution: &ExecutionConfig,
    ) -> SosResult<Self> {
        let workers = match execution.mode {
            ExecutionMode::Sequential => None,
            ExecutionMode::Parallel => Some(
                ThreadPoolBuilder::new()
                    .num_threads(execution.workers.max(1))
                    .thread_name(|i| format!("sos-loader-{}", i))
                    .build()
                    .map_err(|e| {
                        SosError::ConfigurationError(format!("cannot start loader workers: {}", e))
                    })?,
            ),
        };

        tracing::debug!(
            "[LOADER] {} mode, {} session(s), in-flight width {}",
            execution.mode,
            sessions.size(),
            execution.in_flight
        );

        Ok(Self {
            shared: Arc::new(LoaderShared {
                catalog,
                sessions,
                binder: ParameterBinder::new(),
            }),
            mode: execution.mode,
            in_flight: execution.in_flight.max(1),
            workers,
        })
    }

    pub fn catalog(&self) -> &VariableCatalog {
        &self.shared.catalog
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Loads `variables`, binding `parameters` positionally to every statement
    /// involved.
    ///
    /// Errors only when a statement expects a different number of parameters;
    /// that check happens before anything runs.
    pub fn load_data(&self, variables: &[&str], parameters: &[String]) -> SosResult<ValuesStore> {
        let catalog = &self.shared.catalog;
        let resolution = catalog.resolve(variables.iter().copied());

        for name in &resolution.unresolved {
            tracing::warn!("[LOADER] No statement owns variable '{}'", name);
        }

        for handle in resolution.single.iter().chain(&resolution.multiple) {
            let descriptor = catalog.get(*handle);
            if descriptor.parameter_count != parameters.len() {
                return Err(SosError::ConfigurationError(format!(
                    "statement {} for {:?} takes {} parameter(s), {} given",
                    descriptor.handle,
                    descriptor.variables,
                    descriptor.parameter_count,
                    parameters.len()
                )));
            }
        }

        tracing::debug!(
            "[LOADER] {} variable(s) -> {} single + {} multiple statement(s)",
            variables.len(),
            resolution.single.len(),
            resolution.multiple.len()
        );

        let mut values = ValuesStore::new();
        match &self.workers {
            Some(workers) => {
                let params: Arc<[String]> = parameters.into();
                self.run_phase(workers, &resolution.single, &params, &mut values);
                self.run_phase(workers, &resolution.multiple, &params, &mut values);
            }
            None => {
                for handle in resolution.single.iter().chain(&resolution.multiple) {
                    let outcome = self.shared.run_statement(*handle, parameters);
                    self.absorb(*handle, outcome, &mut values);
                }
            }
        }
        Ok(values)
    }

    /// Runs one phase on the worker pool and returns once every statement of
    /// the phase has completed.
    fn run_phase(
        &self,
        workers: &ThreadPool,
        handles: &[StatementHandle],
        params: &Arc<[String]>,
        values: &mut ValuesStore,
    ) {
        if handles.is_empty() {
            return;
        }

        let (tx, rx) = mpsc::sync_channel(self.in_flight);
        let mut pending = handles.iter().copied();
        let mut outstanding = 0usize;

        for handle in pending.by_ref().take(self.in_flight) {
            self.submit(workers, handle, params, tx.clone());
            outstanding += 1;
        }

        while outstanding > 0 {
            let Ok((handle, outcome)) = rx.recv() else {
                break;
            };
            outstanding -= 1;
            self.absorb(handle, outcome, values);

            if let Some(next) = pending.next() {
                self.submit(workers, next, params, tx.clone());
                outstanding += 1;
            }
        }
    }

    fn submit(
        &self,
        workers: &ThreadPool,
        handle: StatementHandle,
        params: &Arc<[String]>,
        tx: mpsc::SyncSender<(StatementHandle, SosResult<ValuesStore>)>,
    ) {
        let shared = Arc::clone(&self.shared);
        let params = Arc::clone(params);
        workers.spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                shared.run_statement(handle, &params)
            }))
            .unwrap_or_else(|_| {
                Err(SosError::ExecutionError(format!(
                    "worker panicked running statement {}",
                    handle
                )))
            });
            let _ = tx.send((handle, outcome));
        });
    }

    fn absorb(&self, handle: StatementHandle, outcome: SosResult<ValuesStore>, values: &mut ValuesStore) {
        match outcome {
            Ok(fragment) => values.merge(fragment),
            Err(e) => {
                let descriptor = self.shared.catalog.get(handle);
                tracing::error!(
                    "[LOADER] Statement {} failed, variables {:?} left out: {}",
                    handle,
                    descriptor.variables,
                    e
                );
            }
        }
    }

    /// Releases compiled statements and stops the worker pool.
    pub fn close(self) {
        self.shared.sessions.release_all();
        drop(self.workers);
        tracing::debug!("[LOADER] Closed");
    }
}

impl ValuesProvider for QueryExecutor {
    fn load_data(&self, variables: &[&str], parameters: &[String]) -> SosResult<ValuesStore> {
        QueryExecutor::load_data(self, variables, parameters)
    }
}
