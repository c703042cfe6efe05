//! Observation filter builder
//!
//! Lifecycle:
//! 1. `init_filter_observation` or `init_filter_get_result`
//! 2. any number of `set_*` constraints, each AND-ed into the predicate
//! 3. `filter_observation` or `filter_result`, which consumes the builder
//!
//! Execution failures surface as `ServiceFailure` with no partial result.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::predicate::Predicate;
use super::temporal::{IntervalColumns, TemporalOperand};
use crate::config::FilterConfig;
use crate::error::{SosError, SosResult};
use crate::provider::ObservationOffering;
use crate::store::{Row, SessionPool, SqlParam};

/// Response mode requested by a GetObservation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObservationMode {
    #[default]
    Inline,
    ResultTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterPhase {
    Uninitialized,
    Observation(ObservationMode),
    Result { procedure: String },
}

/// One row of a result-bearing filter query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultInterval {
    pub identifier: String,
    pub begin_time: String,
    pub end_time: Option<String>,
}

pub struct ObservationFilterBuilder {
    settings: Arc<FilterConfig>,
    sessions: SessionPool,
    phase: FilterPhase,
    clauses: Vec<Predicate>,
}

impl ObservationFilterBuilder {
    pub fn new(settings: Arc<FilterConfig>, sessions: SessionPool) -> Self {
        Self {
            settings,
            sessions,
            phase: FilterPhase::Uninitialized,
            clauses: Vec::new(),
        }
    }

    pub fn phase(&self) -> &FilterPhase {
        &self.phase
    }

    /// The accumulated predicate: the AND of every constraint so far.
    pub fn predicate(&self) -> Predicate {
        Predicate::and(self.clauses.clone())
    }

    fn start(&mut self, operation: &'static str, phase: FilterPhase) -> SosResult<()> {
        if self.phase != FilterPhase::Uninitialized {
            return Err(SosError::invalid_parameter(
                operation,
                "filter is already initialized",
            ));
        }
        self.phase = phase;
        Ok(())
    }

    fn require_initialized(&self, operation: &'static str) -> SosResult<()> {
        if self.phase == FilterPhase::Uninitialized {
            return Err(SosError::invalid_parameter(
                operation,
                "filter is not initialized",
            ));
        }
        Ok(())
    }

    fn remap<'a>(&'a self, procedure: &'a str) -> &'a str {
        self.settings
            .procedure_aliases
            .get(procedure)
            .map(String::as_str)
            .unwrap_or(procedure)
    }

    fn interval(&self) -> IntervalColumns<'_> {
        IntervalColumns {
            begin: &self.settings.begin_time,
            end: &self.settings.end_time,
        }
    }

    pub fn init_filter_observation(&mut self, mode: ObservationMode) -> SosResult<()> {
        self.start("init_filter_observation", FilterPhase::Observation(mode))
    }

    /// Starts a result filter restricted to one procedure.
    pub fn init_filter_get_result(&mut self, procedure: &str) -> SosResult<()> {
        let procedure = self.remap(procedure).to_string();
        self.start(
            "init_filter_get_result",
            FilterPhase::Result {
                procedure: procedure.clone(),
            },
        )?;
        let clause = Predicate::eq(&self.settings.procedure, procedure);
        self.clauses.push(clause);
        Ok(())
    }

    /// Matches any of `ids` (after alias translation); with no ids, any
    /// procedure of `offering`.
    pub fn set_procedure(&mut self, ids: &[String], offering: &ObservationOffering) -> SosResult<()> {
        self.require_initialized("set_procedure")?;
        let column = &self.settings.procedure;
        let clause = if ids.is_empty() {
            Predicate::any_of(column, offering.procedures.iter().map(String::as_str))
        } else {
            Predicate::any_of(column, ids.iter().map(|id| self.remap(id)))
        };
        self.clauses.push(clause);
        Ok(())
    }

    /// Matches any of the simple phenomena or composite phenomena. With both
    /// lists empty the group matches nothing.
    pub fn set_observed_properties(&mut self, simple: &[String], composite: &[String]) -> SosResult<()> {
        self.require_initialized("set_observed_properties")?;
        let mut group: Vec<Predicate> = simple
            .iter()
            .map(|id| Predicate::eq(&self.settings.phenomenon, id.as_str()))
            .collect();
        group.extend(
            composite
                .iter()
                .map(|id| Predicate::eq(&self.settings.composite_phenomenon, id.as_str())),
        );
        if group.is_empty() {
            tracing::debug!("[FILTER] Empty observed property group, filter matches nothing");
        }
        self.clauses.push(Predicate::or(group));
        Ok(())
    }

    pub fn set_feature_of_interest(&mut self, ids: &[String]) -> SosResult<()> {
        self.require_initialized("set_feature_of_interest")?;
        let clause = Predicate::any_of(&self.settings.feature_of_interest, ids.iter().map(String::as_str));
        self.clauses.push(clause);
        Ok(())
    }

    pub fn set_time_equals(&mut self, operand: &TemporalOperand) -> SosResult<()> {
        self.require_initialized("set_time_equals")?;
        let clause = self.interval().equals(operand)?;
        self.clauses.push(clause);
        Ok(())
    }

    pub fn set_time_before(&mut self, operand: &TemporalOperand) -> SosResult<()> {
        self.require_initialized("set_time_before")?;
        let clause = self.interval().before(operand)?;
        self.clauses.push(clause);
        Ok(())
    }

    pub fn set_time_after(&mut self, operand: &TemporalOperand) -> SosResult<()> {
        self.require_initialized("set_time_after")?;
        let clause = self.interval().after(operand)?;
        self.clauses.push(clause);
        Ok(())
    }

    pub fn set_time_during(&mut self, operand: &TemporalOperand) -> SosResult<()> {
        self.require_initialized("set_time_during")?;
        let clause = self.interval().during(operand)?;
        self.clauses.push(clause);
        Ok(())
    }

    /// SQL and parameters of the query for the given select list.
    fn render(&self, columns: &[&str]) -> (String, Vec<SqlParam>) {
        let s = &self.settings;
        let mut params = Vec::new();
        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), s.table);
        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.predicate().to_sql(&mut params));
        }
        sql.push_str(&format!(" ORDER BY {}, {}", s.begin_time, s.identifier));
        (sql, params)
    }

    pub fn observation_sql(&self) -> (String, Vec<SqlParam>) {
        self.render(&[self.settings.identifier.as_str()])
    }

    pub fn result_sql(&self) -> (String, Vec<SqlParam>) {
        let s = &self.settings;
        self.render(&[s.identifier.as_str(), s.begin_time.as_str(), s.end_time.as_str()])
    }

    fn run(&self, operation: &'static str, sql: &str, params: &[SqlParam]) -> SosResult<Vec<Row>> {
        self.require_initialized(operation)?;
        tracing::debug!("[FILTER] {}: {}", operation, self.predicate());

        let guard = self.sessions.acquire();
        guard
            .with_session(|session| session.query(sql, params))
            .map_err(|e| {
                tracing::error!("[FILTER] {} failed: {}", operation, e);
                e.into_service_failure()
            })
    }

    /// Identifiers of the matching observations, ordered by begin time.
    pub fn filter_observation(self) -> SosResult<Vec<String>> {
        let (sql, params) = self.observation_sql();
        let rows = self.run("filter_observation", &sql, &params)?;
        rows.into_iter()
            .map(|mut row| take_required(&mut row, 0, "identifier"))
            .collect()
    }

    /// `(identifier, begin, end)` of the matching observations, ordered by
    /// begin time.
    pub fn filter_result(self) -> SosResult<Vec<ResultInterval>> {
        let (sql, params) = self.result_sql();
        let rows = self.run("filter_result", &sql, &params)?;
        rows.into_iter()
            .map(|mut row| {
                Ok(ResultInterval {
                    identifier: take_required(&mut row, 0, "identifier")?,
                    begin_time: take_required(&mut row, 1, "begin time")?,
                    end_time: row.get_mut(2).and_then(Option::take),
                })
            })
            .collect()
    }
}

fn take_required(row: &mut Row, column: usize, what: &str) -> SosResult<String> {
    row.get_mut(column)
        .and_then(Option::take)
        .ok_or_else(|| SosError::ServiceFailure(format!("filter row without {}", what)))
}
