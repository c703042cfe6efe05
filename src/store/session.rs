//! Driver seam between the engine and the backing relational store.

use crate::error::SosResult;

/// One result row; column `i` holds the textual rendering of the value, or
/// `None` for SQL NULL.
pub type Row = Vec<Option<String>>;

/// Declared type of a positional parameter slot, as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Integer,
    Text,
    Other,
}

/// A value bound to a positional parameter slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Integer(i64),
    Text(String),
    /// Nothing bound; the store sees NULL.
    Unbound,
}

/// Shape of a successfully compiled statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedShape {
    pub parameter_count: usize,
    pub column_count: usize,
}

/// A long-lived connection to the backing store.
///
/// Implementations keep compiled statements keyed by their text, so calling
/// [`Session::query`] repeatedly with the same SQL does not recompile it.
pub trait Session: Send {
    /// Compiles `sql` and reports its parameter and column counts.
    fn prepare(&self, sql: &str) -> SosResult<PreparedShape>;

    /// Declared parameter types of `sql`, or `Ok(None)` when the driver has no
    /// way to report them.
    fn parameter_types(&self, sql: &str) -> SosResult<Option<Vec<ParamType>>>;

    /// Runs `sql` with positional parameters and collects every row.
    fn query(&self, sql: &str, params: &[SqlParam]) -> SosResult<Vec<Row>>;

    /// Drops compiled statements held by the session.
    fn release(&self) {}
}
