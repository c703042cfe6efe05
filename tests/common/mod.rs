//! Common test utilities for engine tests
//!
//! Provides shared helper functions for:
//! - Seeding an observation database in a temporary directory
//! - Building engine configurations over it
//! - A scripted session for failure injection

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::Connection;
use sosquery::store::{ParamType, PreparedShape, Row, Session, SqlParam};
use sosquery::{EngineConfig, ExecutionMode, QueryDefinition, SosEngine, SosError, SosResult};
use tempfile::TempDir;

const SCHEMA: &str = "
    CREATE TABLE offering (name TEXT PRIMARY KEY, description TEXT, begin_time TEXT, end_time TEXT);
    CREATE TABLE offering_procedure (offering TEXT, procedure_id TEXT);
    CREATE TABLE offering_phenomenon (offering TEXT, phenomenon_id TEXT);
    CREATE TABLE offering_feature (offering TEXT, feature_id TEXT);
    CREATE TABLE phenomenon (id TEXT PRIMARY KEY, name TEXT, description TEXT, unit TEXT);
    CREATE TABLE feature (id TEXT PRIMARY KEY, name TEXT, description TEXT, geometry TEXT);
    CREATE TABLE observation (
        id TEXT PRIMARY KEY,
        procedure_id TEXT,
        phenomenon_id TEXT,
        composite_phenomenon_id TEXT,
        feature_of_interest_id TEXT,
        begin_time TEXT,
        end_time TEXT,
        value REAL,
        unit TEXT
    );
    CREATE TABLE result_value (observation_id TEXT, seq INTEGER, time TEXT, value REAL);
";

/// Observations of 2024-01-01, `(id, procedure, phenomenon, composite,
/// feature, begin hour, end hour)`.
pub const OBSERVATIONS: &[(&str, &str, &str, Option<&str>, &str, &str, Option<&str>)] = &[
    ("o1", "p1", "temperature", None, "f1", "05", Some("15")),
    ("o2", "p1", "temperature", None, "f1", "12", Some("18")),
    ("o3", "p1", "temperature", None, "f1", "18", Some("23")),
    ("o4", "p1", "humidity", Some("weather"), "f1", "08", Some("22")),
    ("o5", "p2", "temperature", None, "f2", "15", None),
    ("o6", "p2", "humidity", None, "f2", "00", Some("05")),
    ("o7", "p3", "temperature", None, "f2", "21", Some("23")),
    ("o8", "p3", "humidity", None, "f2", "22", None),
];

pub fn at(hour: &str) -> String {
    format!("2024-01-01T{}:00:00Z", hour)
}

/// Seeds the observation database and returns its path.
pub fn create_seeded_database() -> (PathBuf, TempDir) {
    let tmp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = tmp_dir.path().join("observations.db");
    let conn = Connection::open(&path).expect("Failed to create database");
    conn.execute_batch(SCHEMA).unwrap();

    conn.execute(
        "INSERT INTO offering VALUES (?1, ?2, ?3, ?4)",
        ("weather-station", "Roof weather station", at("00"), at("23")),
    )
    .unwrap();
    conn.execute(
        "INSERT INTO offering VALUES ('idle', NULL, NULL, NULL)",
        [],
    )
    .unwrap();
    for procedure in ["p1", "p2"] {
        conn.execute(
            "INSERT INTO offering_procedure VALUES ('weather-station', ?1)",
            [procedure],
        )
        .unwrap();
    }
    for phenomenon in ["temperature", "humidity"] {
        conn.execute(
            "INSERT INTO offering_phenomenon VALUES ('weather-station', ?1)",
            [phenomenon],
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO offering_feature VALUES ('weather-station', 'f1')",
        [],
    )
    .unwrap();

    conn.execute_batch(
        "INSERT INTO phenomenon VALUES ('temperature', 'Air temperature', NULL, 'degC');
         INSERT INTO phenomenon VALUES ('humidity', 'Relative humidity', NULL, '%');
         INSERT INTO feature VALUES ('f1', 'Roof', 'North roof', 'POINT(7.1 50.7)');
         INSERT INTO feature VALUES ('f2', 'Garden', NULL, NULL);",
    )
    .unwrap();

    for (i, (id, procedure, phenomenon, composite, feature, begin, end)) in
        OBSERVATIONS.iter().enumerate()
    {
        conn.execute(
            "INSERT INTO observation VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'degC')",
            (
                id,
                procedure,
                phenomenon,
                composite,
                feature,
                at(begin),
                end.map(at),
                10.5 + i as f64,
            ),
        )
        .unwrap();
    }

    conn.execute_batch(
        "INSERT INTO result_value VALUES ('o1', 1, '2024-01-01T05:00:00Z', 4.5);
         INSERT INTO result_value VALUES ('o1', 2, '2024-01-01T10:00:00Z', NULL);
         INSERT INTO result_value VALUES ('o1', 3, '2024-01-01T15:00:00Z', 7.25);",
    )
    .unwrap();

    (path, tmp_dir)
}

/// Catalog covering every provider role plus the `var01`..`var03` fixtures.
pub fn catalog_config(database: &Path, mode: ExecutionMode) -> EngineConfig {
    let mut config = EngineConfig::new(database);
    config.execution.mode = mode;
    config.execution.workers = 3;
    config.execution.in_flight = 2;

    config.single = vec![
        QueryDefinition::new(
            "SELECT MIN(begin_time), MAX(end_time) FROM observation WHERE procedure_id = ?",
            &["var01", "var02"],
        ),
        QueryDefinition::new(
            "SELECT name, description, begin_time, end_time FROM offering WHERE name = ?",
            &[
                "offering.name",
                "offering.description",
                "offering.begin_time",
                "offering.end_time",
            ],
        ),
        QueryDefinition::new(
            "SELECT id, name, description, unit FROM phenomenon WHERE id = ?",
            &[
                "phenomenon.id",
                "phenomenon.name",
                "phenomenon.description",
                "phenomenon.unit",
            ],
        ),
        QueryDefinition::new(
            "SELECT id, name, description, geometry FROM feature WHERE id = ?",
            &["feature.id", "feature.name", "feature.description", "feature.geometry"],
        ),
        QueryDefinition::new(
            "SELECT id, procedure_id, phenomenon_id, feature_of_interest_id, begin_time, end_time, value, unit \
             FROM observation WHERE id = ?",
            &[
                "observation.id",
                "observation.procedure",
                "observation.phenomenon",
                "observation.feature",
                "observation.begin_time",
                "observation.end_time",
                "observation.value",
                "observation.unit",
            ],
        ),
    ];

    config.multiple = vec![
        QueryDefinition::new(
            "SELECT id FROM observation WHERE procedure_id = ? ORDER BY begin_time",
            &["var03"],
        ),
        QueryDefinition::new("SELECT name FROM offering ORDER BY name", &["offering.names"]),
        QueryDefinition::new(
            "SELECT procedure_id FROM offering_procedure WHERE offering = ? ORDER BY procedure_id",
            &["offering.procedures"],
        ),
        QueryDefinition::new(
            "SELECT phenomenon_id FROM offering_phenomenon WHERE offering = ? ORDER BY phenomenon_id",
            &["offering.phenomena"],
        ),
        QueryDefinition::new(
            "SELECT feature_id FROM offering_feature WHERE offering = ? ORDER BY feature_id",
            &["offering.features"],
        ),
        QueryDefinition::new(
            "SELECT time, value FROM result_value WHERE observation_id = ? ORDER BY seq",
            &["result.times", "result.values"],
        ),
    ];

    config
}

pub fn open_engine(mode: ExecutionMode) -> (SosEngine, TempDir) {
    let (path, tmp) = create_seeded_database();
    let engine = SosEngine::open(catalog_config(&path, mode)).expect("Failed to open engine");
    (engine, tmp)
}

/// Start and end ticks of one query run.
#[derive(Debug, Clone)]
pub struct Span {
    pub sql: String,
    pub start: usize,
    pub end: usize,
}

/// Ordering and concurrency record shared by clones of a [`ScriptedSession`].
#[derive(Default)]
pub struct RunLog {
    clock: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
    spans: Mutex<Vec<Span>>,
}

impl RunLog {
    /// Most queries ever running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn spans_matching(&self, fragment: &str) -> Vec<Span> {
        self.spans
            .lock()
            .iter()
            .filter(|span| span.sql.contains(fragment))
            .cloned()
            .collect()
    }

    fn enter(&self) -> usize {
        let start = self.clock.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        start
    }

    fn leave(&self, sql: &str, start: usize) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        let end = self.clock.fetch_add(1, Ordering::SeqCst);
        self.spans.lock().push(Span {
            sql: sql.to_string(),
            start,
            end,
        });
    }
}

/// Session answering from a script and recording every query.
///
/// Statements are compiled as having one column per `,` in the select list
/// plus one, and one parameter per `?`. Any statement containing `FAIL`
/// fails when run, and one containing `PANIC` panics. Each query holds the
/// session for `pace`.
#[derive(Clone, Default)]
pub struct ScriptedSession {
    pub calls: Arc<Mutex<Vec<(String, Vec<SqlParam>)>>>,
    pub log: Arc<RunLog>,
    pub releases: Arc<AtomicUsize>,
    pub pace: Duration,
}

impl ScriptedSession {
    pub fn paced(pace: Duration) -> Self {
        Self {
            pace,
            ..Default::default()
        }
    }

    pub fn calls_to(&self, sql: &str) -> Vec<Vec<SqlParam>> {
        self.calls
            .lock()
            .iter()
            .filter(|(s, _)| s == sql)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

fn select_list(sql: &str) -> &str {
    let upper = sql.to_ascii_uppercase();
    match upper.find(" FROM ") {
        Some(end) => &sql[..end],
        None => sql,
    }
}

impl Session for ScriptedSession {
    fn prepare(&self, sql: &str) -> SosResult<PreparedShape> {
        Ok(PreparedShape {
            parameter_count: sql.matches('?').count(),
            column_count: select_list(sql).matches(',').count() + 1,
        })
    }

    fn parameter_types(&self, sql: &str) -> SosResult<Option<Vec<ParamType>>> {
        Ok(Some(vec![ParamType::Text; sql.matches('?').count()]))
    }

    fn query(&self, sql: &str, params: &[SqlParam]) -> SosResult<Vec<Row>> {
        self.calls.lock().push((sql.to_string(), params.to_vec()));

        let start = self.log.enter();
        if !self.pace.is_zero() {
            std::thread::sleep(self.pace);
        }
        self.log.leave(sql, start);

        if sql.contains("PANIC") {
            panic!("scripted panic running {}", sql);
        }
        if sql.contains("FAIL") {
            return Err(SosError::ExecutionError("scripted failure".to_string()));
        }
        let columns = select_list(sql).matches(',').count() + 1;
        let row = |n: usize| -> Row { (0..columns).map(|c| Some(format!("r{}c{}", n, c))).collect() };
        Ok(vec![row(0), row(1)])
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}
