//! Backing store access: the driver seam, the SQLite driver and the session pool.

mod pool;
mod session;
mod sqlite;

pub use pool::{PoolStats, SessionGuard, SessionPool};
pub use session::{ParamType, PreparedShape, Row, Session, SqlParam};
pub use sqlite::SqliteSession;
