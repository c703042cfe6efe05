//! Variable catalog
//!
//! Compiled once from the configured query definitions. Every statement lives
//! in one arena and every variable name indexes straight into it, so a
//! variable resolves to exactly one statement.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::config::QueryDefinition;
use crate::error::{SosError, SosResult};
use crate::store::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    /// At most one row, one scalar per variable
    Single,
    /// Any number of rows, one sequence per variable
    Multiple,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::Single => write!(f, "single"),
            StatementKind::Multiple => write!(f, "multiple"),
        }
    }
}

/// Index of a statement in the catalog arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StatementHandle(usize);

impl StatementHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StatementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementDescriptor {
    pub handle: StatementHandle,
    pub kind: StatementKind,
    pub sql: String,
    pub parameter_count: usize,
    /// Owned variables; variable `i` is read from result column `i`.
    pub variables: Vec<String>,
}

impl StatementDescriptor {
    pub fn owns(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }
}

/// Statements covering a requested variable set, in ascending handle order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub single: Vec<StatementHandle>,
    pub multiple: Vec<StatementHandle>,
    /// Requested variables no statement owns
    pub unresolved: Vec<String>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.single.is_empty() && self.multiple.is_empty()
    }

    pub fn statement_count(&self) -> usize {
        self.single.len() + self.multiple.len()
    }
}

#[derive(Debug, Default)]
pub struct VariableCatalog {
    statements: Vec<StatementDescriptor>,
    index: HashMap<String, StatementHandle>,
}

impl VariableCatalog {
    /// Compiles every definition against `session`.
    ///
    /// A definition that fails to compile is logged and dropped. A definition
    /// without variables, or a variable claimed by two definitions, fails the
    /// whole catalog.
    pub fn compile(
        single: &[QueryDefinition],
        multiple: &[QueryDefinition],
        session: &dyn Session,
    ) -> SosResult<Self> {
        let mut catalog = VariableCatalog::default();
        let mut dropped = 0usize;

        let groups = [
            (StatementKind::Single, single),
            (StatementKind::Multiple, multiple),
        ];
        for (kind, definitions) in groups {
            for definition in definitions {
                if !catalog.add(kind, definition, session)? {
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            tracing::warn!(
                "[CATALOG] {} definition(s) dropped, {} statement(s) available",
                dropped,
                catalog.len()
            );
        } else {
            tracing::info!(
                "[CATALOG] Compiled {} statement(s) owning {} variable(s)",
                catalog.len(),
                catalog.index.len()
            );
        }
        Ok(catalog)
    }

    /// Returns `Ok(false)` when the definition was dropped.
    fn add(
        &mut self,
        kind: StatementKind,
        definition: &QueryDefinition,
        session: &dyn Session,
    ) -> SosResult<bool> {
        if definition.variables.is_empty() {
            return Err(SosError::ConfigurationError(format!(
                "{} query defines no variables: {}",
                kind, definition.query
            )));
        }

        let mut seen = BTreeSet::new();
        for name in &definition.variables {
            if self.index.contains_key(name) || !seen.insert(name.as_str()) {
                return Err(SosError::ConfigurationError(format!(
                    "variable '{}' is owned by more than one statement",
                    name
                )));
            }
        }

        let shape = match session.prepare(&definition.query) {
            Ok(shape) => shape,
            Err(e) => {
                tracing::error!(
                    "[CATALOG] Dropping {} statement for {:?}: {}",
                    kind,
                    definition.variables,
                    e
                );
                return Ok(false);
            }
        };

        if shape.column_count < definition.variables.len() {
            tracing::error!(
                "[CATALOG] Dropping {} statement for {:?}: {} column(s) for {} variable(s)",
                kind,
                definition.variables,
                shape.column_count,
                definition.variables.len()
            );
            return Ok(false);
        }

        let handle = StatementHandle(self.statements.len());
        for name in &definition.variables {
            self.index.insert(name.clone(), handle);
        }
        self.statements.push(StatementDescriptor {
            handle,
            kind,
            sql: definition.query.clone(),
            parameter_count: shape.parameter_count,
            variables: definition.variables.clone(),
        });
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn get(&self, handle: StatementHandle) -> &StatementDescriptor {
        &self.statements[handle.0]
    }

    pub fn statements(&self) -> &[StatementDescriptor] {
        &self.statements
    }

    /// The statement owning `name`, whatever its kind.
    pub fn statement_of(&self, name: &str) -> Option<&StatementDescriptor> {
        self.index.get(name).map(|handle| self.get(*handle))
    }

    /// The statement owning `name` if it is of the given kind.
    pub fn statement_for(&self, name: &str, kind: StatementKind) -> Option<&StatementDescriptor> {
        self.statement_of(name).filter(|d| d.kind == kind)
    }

    /// Minimal set of statements producing the requested variables. Repeated
    /// variables, and variables sharing a statement, collapse to one entry.
    pub fn resolve<'a, I>(&self, names: I) -> Resolution
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut single = BTreeSet::new();
        let mut multiple = BTreeSet::new();
        let mut unresolved = Vec::new();

        for name in names {
            match self.index.get(name) {
                Some(handle) => {
                    match self.get(*handle).kind {
                        StatementKind::Single => single.insert(*handle),
                        StatementKind::Multiple => multiple.insert(*handle),
                    };
                }
                None => {
                    if !unresolved.iter().any(|u| u == name) {
                        unresolved.push(name.to_string());
                    }
                }
            }
        }

        Resolution {
            single: single.into_iter().collect(),
            multiple: multiple.into_iter().collect(),
            unresolved,
        }
    }
}
