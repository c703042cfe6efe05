pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod filter;
pub mod provider;
pub mod store;
pub mod values;

pub use catalog::{StatementDescriptor, StatementHandle, StatementKind, VariableCatalog};
pub use config::{EngineConfig, ExecutionConfig, ExecutionMode, FilterConfig, QueryDefinition};
pub use engine::SosEngine;
pub use error::{SosError, SosResult};
pub use executor::{CannedValues, QueryExecutor, ValuesProvider};
pub use filter::{ObservationFilterBuilder, ObservationMode, ResultInterval, TemporalOperand};
pub use provider::{ObservationOffering, SosProvider, VariableContract};
pub use store::{Session, SessionPool, SqliteSession};
pub use values::ValuesStore;
