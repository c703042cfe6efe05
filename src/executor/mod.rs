//! Query executor subsystem
//!
//! - [`QueryExecutor`] loads variables from the store through the catalog.
//! - [`CannedValues`] answers the same requests from fixed data.
//!
//! Both implement [`ValuesProvider`], which is all the provider facade needs.

mod binding;
mod canned;
mod loader;

pub use binding::ParameterBinder;
pub use canned::CannedValues;
pub use loader::QueryExecutor;

use crate::error::SosResult;
use crate::values::ValuesStore;

/// Source of variable values for a request.
pub trait ValuesProvider: Send + Sync {
    fn load_data(&self, variables: &[&str], parameters: &[String]) -> SosResult<ValuesStore>;
}
