//! Wiring of sessions, catalog, executor, provider and filters.

use std::sync::Arc;

use crate::catalog::VariableCatalog;
use crate::config::{EngineConfig, FilterConfig};
use crate::error::SosResult;
use crate::executor::QueryExecutor;
use crate::filter::ObservationFilterBuilder;
use crate::provider::SosProvider;
use crate::store::{PoolStats, SessionPool};

pub struct SosEngine {
    sessions: SessionPool,
    executor: Arc<QueryExecutor>,
    provider: SosProvider,
    filter_settings: Arc<FilterConfig>,
}

impl SosEngine {
    /// Opens the database named by `config` and compiles its catalog.
    pub fn open(config: EngineConfig) -> SosResult<Self> {
        config.validate()?;
        let sessions = SessionPool::open_sqlite(&config.database, config.session_count())?;
        Self::with_sessions(config, sessions)
    }

    /// Builds an engine over an already opened session pool.
    pub fn with_sessions(config: EngineConfig, sessions: SessionPool) -> SosResult<Self> {
        let catalog = {
            let guard = sessions.acquire();
            guard.with_session(|session| {
                VariableCatalog::compile(&config.single, &config.multiple, session)
            })?
        };

        let executor = Arc::new(QueryExecutor::new(
            Arc::new(catalog),
            sessions.clone(),
            &config.execution,
        )?);
        let provider = SosProvider::new(executor.clone(), config.contract);

        tracing::info!(
            "[ENGINE] Ready: {} statement(s), {} mode",
            executor.catalog().len(),
            executor.mode()
        );

        Ok(Self {
            sessions,
            executor,
            provider,
            filter_settings: Arc::new(config.filter),
        })
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub fn provider(&self) -> &SosProvider {
        &self.provider
    }

    /// A fresh, uninitialized observation filter.
    pub fn filter(&self) -> ObservationFilterBuilder {
        ObservationFilterBuilder::new(self.filter_settings.clone(), self.sessions.clone())
    }

    pub fn session_stats(&self) -> PoolStats {
        self.sessions.stats()
    }

    /// Releases compiled statements and stops the loader workers.
    pub fn close(self) {
        let Self {
            executor, provider, ..
        } = self;
        // The provider holds the only other handle; `executor()` lends
        // references only.
        drop(provider);
        if let Some(executor) = Arc::into_inner(executor) {
            executor.close();
        }
        tracing::debug!("[ENGINE] Closed");
    }
}
