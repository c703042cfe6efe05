//! Temporal operands and the interval relations used by observation filters.
//!
//! A stored observation covers `[begin, end]`; `end` is NULL for an
//! instantaneous observation. Time positions are compared as text, so stored
//! times must be ISO-8601 in UTC (`Z`). Operand positions that parse as
//! RFC 3339 are converted to that form before comparison; other positions are
//! compared as given.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::predicate::Predicate;
use crate::error::{SosError, SosResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TemporalOperand {
    Instant { position: String },
    Period { begin: String, end: String },
}

impl TemporalOperand {
    pub fn instant(position: impl Into<String>) -> Self {
        TemporalOperand::Instant {
            position: position.into(),
        }
    }

    pub fn period(begin: impl Into<String>, end: impl Into<String>) -> Self {
        TemporalOperand::Period {
            begin: begin.into(),
            end: end.into(),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            TemporalOperand::Instant { .. } => "time instant",
            TemporalOperand::Period { .. } => "time period",
        }
    }

    /// Same operand with every RFC 3339 position rewritten in UTC.
    pub fn normalized(&self) -> TemporalOperand {
        match self {
            TemporalOperand::Instant { position } => TemporalOperand::Instant {
                position: to_utc(position),
            },
            TemporalOperand::Period { begin, end } => TemporalOperand::Period {
                begin: to_utc(begin),
                end: to_utc(end),
            },
        }
    }

    fn validate(&self, operation: &'static str) -> SosResult<()> {
        match self {
            TemporalOperand::Instant { position } => {
                if position.trim().is_empty() {
                    return Err(SosError::invalid_parameter(
                        operation,
                        "time instant has no position",
                    ));
                }
            }
            TemporalOperand::Period { begin, end } => {
                if begin.trim().is_empty() || end.trim().is_empty() {
                    return Err(SosError::invalid_parameter(
                        operation,
                        "time period needs both a begin and an end position",
                    ));
                }
                if let (Ok(b), Ok(e)) = (
                    DateTime::parse_from_rfc3339(begin),
                    DateTime::parse_from_rfc3339(end),
                ) {
                    if b > e {
                        return Err(SosError::invalid_parameter(
                            operation,
                            format!("time period ends before it begins ({} > {})", begin, end),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn to_utc(position: &str) -> String {
    match DateTime::parse_from_rfc3339(position.trim()) {
        Ok(dt) => dt
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        Err(_) => position.to_string(),
    }
}

/// Column names of the stored interval.
#[derive(Debug, Clone, Copy)]
pub struct IntervalColumns<'a> {
    pub begin: &'a str,
    pub end: &'a str,
}

impl IntervalColumns<'_> {
    fn wrong_shape(operation: &'static str, expected: &str, given: &TemporalOperand) -> SosError {
        SosError::invalid_parameter(
            operation,
            format!("expected a {}, got a {}", expected, given.shape()),
        )
    }

    /// Instant: the row is the point `t`, or its interval contains `t`.
    /// Period: both bounds are equal.
    pub fn equals(&self, operand: &TemporalOperand) -> SosResult<Predicate> {
        const OP: &str = "set_time_equals";
        operand.validate(OP)?;
        Ok(match &operand.normalized() {
            TemporalOperand::Instant { position: t } => Predicate::or(vec![
                Predicate::and(vec![
                    Predicate::eq(self.begin, t.as_str()),
                    Predicate::is_null(self.end),
                ]),
                Predicate::and(vec![
                    Predicate::le(self.begin, t.as_str()),
                    Predicate::ge(self.end, t.as_str()),
                ]),
            ]),
            TemporalOperand::Period { begin, end } => Predicate::and(vec![
                Predicate::eq(self.begin, begin.as_str()),
                Predicate::eq(self.end, end.as_str()),
            ]),
        })
    }

    /// The row begins at or before `t`, whatever its end.
    pub fn before(&self, operand: &TemporalOperand) -> SosResult<Predicate> {
        const OP: &str = "set_time_before";
        match operand {
            TemporalOperand::Instant { position } => {
                operand.validate(OP)?;
                let t = to_utc(position);
                Ok(Predicate::le(self.begin, t))
            }
            other => Err(Self::wrong_shape(OP, "time instant", other)),
        }
    }

    /// The row begins at or after `t`, or is still running at `t`.
    pub fn after(&self, operand: &TemporalOperand) -> SosResult<Predicate> {
        const OP: &str = "set_time_after";
        match operand {
            TemporalOperand::Instant { position } => {
                operand.validate(OP)?;
                let t = to_utc(position);
                Ok(Predicate::or(vec![
                    Predicate::ge(self.begin, t.as_str()),
                    Predicate::and(vec![
                        Predicate::le(self.begin, t.as_str()),
                        Predicate::ge(self.end, t),
                    ]),
                ]))
            }
            other => Err(Self::wrong_shape(OP, "time instant", other)),
        }
    }

    /// The row and the period `[b, e]` share at least one instant.
    pub fn during(&self, operand: &TemporalOperand) -> SosResult<Predicate> {
        const OP: &str = "set_time_during";
        match operand {
            TemporalOperand::Period { begin, end } => {
                operand.validate(OP)?;
                let (b, e) = (to_utc(begin), to_utc(end));
                let (b, e) = (b.as_str(), e.as_str());
                Ok(Predicate::or(vec![
                    // row inside the period
                    Predicate::and(vec![Predicate::ge(self.begin, b), Predicate::le(self.end, e)]),
                    // period inside the row
                    Predicate::and(vec![Predicate::le(self.begin, b), Predicate::ge(self.end, e)]),
                    // row overlaps the period's begin
                    Predicate::and(vec![
                        Predicate::le(self.begin, b),
                        Predicate::ge(self.end, b),
                        Predicate::le(self.end, e),
                    ]),
                    // row overlaps the period's end
                    Predicate::and(vec![
                        Predicate::ge(self.begin, b),
                        Predicate::le(self.begin, e),
                        Predicate::ge(self.end, e),
                    ]),
                    // instantaneous row inside the period
                    Predicate::and(vec![
                        Predicate::is_null(self.end),
                        Predicate::ge(self.begin, b),
                        Predicate::le(self.begin, e),
                    ]),
                ]))
            }
            other => Err(Self::wrong_shape(OP, "time period", other)),
        }
    }
}
