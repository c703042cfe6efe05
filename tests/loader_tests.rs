//! Variable loading against a seeded database and a scripted session

mod common;

use std::time::Duration;

use common::{at, catalog_config, create_seeded_database, open_engine, ScriptedSession};
use sosquery::store::{Session, SessionPool, SqlParam};
use sosquery::{EngineConfig, ExecutionMode, QueryDefinition, SosEngine, SosError};

fn params(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_single_and_multiple_statements_together() {
    let (engine, _tmp) = open_engine(ExecutionMode::Sequential);

    let values = engine
        .executor()
        .load_data(&["var01", "var03"], &params(&["p1"]))
        .unwrap();

    assert_eq!(values.single_value("var01"), Some(at("05").as_str()));
    assert_eq!(values.single_value("var02"), Some(at("23").as_str()));
    assert_eq!(values.multiple_strings("var03"), vec!["o1", "o4", "o2", "o3"]);
    engine.close();
}

#[test]
fn test_unowned_variable_absent_and_empty_result_null() {
    let (engine, _tmp) = open_engine(ExecutionMode::Sequential);

    let values = engine
        .executor()
        .load_data(&["var01", "var03", "nobody.owns.this"], &params(&["p9"]))
        .unwrap();

    assert!(!values.contains_single("nobody.owns.this"));
    assert!(!values.contains_multiple("nobody.owns.this"));

    // aggregate over no rows yields one row of NULLs
    assert!(values.contains_single("var01"));
    assert_eq!(values.single_value("var01"), None);

    assert!(values.contains_multiple("var03"));
    assert!(values.multiple_value("var03").is_empty());
}

#[test]
fn test_single_statement_without_rows_records_nulls() {
    let (engine, _tmp) = open_engine(ExecutionMode::Sequential);

    let values = engine
        .executor()
        .load_data(&["phenomenon.id", "phenomenon.unit"], &params(&["pressure"]))
        .unwrap();

    assert!(values.contains_single("phenomenon.id"));
    assert!(values.contains_single("phenomenon.unit"));
    assert!(values.contains_single("phenomenon.name"));
    assert_eq!(values.single_value("phenomenon.id"), None);
}

#[test]
fn test_repeated_loads_are_equal() {
    let (engine, _tmp) = open_engine(ExecutionMode::Parallel);
    let variables = ["var01", "var03", "offering.procedures"];

    let first = engine.executor().load_data(&variables, &params(&["p1"])).unwrap();
    let second = engine.executor().load_data(&variables, &params(&["p1"])).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_sequential_and_parallel_agree() {
    let (path, _tmp) = create_seeded_database();
    let sequential = SosEngine::open(catalog_config(&path, ExecutionMode::Sequential)).unwrap();
    let parallel = SosEngine::open(catalog_config(&path, ExecutionMode::Parallel)).unwrap();

    let variables = [
        "offering.name",
        "offering.description",
        "offering.begin_time",
        "offering.procedures",
        "offering.phenomena",
        "offering.features",
    ];
    for offering in ["weather-station", "idle", "missing"] {
        let a = sequential
            .executor()
            .load_data(&variables, &params(&[offering]))
            .unwrap();
        let b = parallel
            .executor()
            .load_data(&variables, &params(&[offering]))
            .unwrap();
        assert_eq!(a, b, "modes disagree for {}", offering);
    }

    sequential.close();
    parallel.close();
}

#[test]
fn test_parallel_load_from_many_threads() {
    let (engine, _tmp) = open_engine(ExecutionMode::Parallel);
    let expected = engine
        .executor()
        .load_data(&["var01", "var03"], &params(&["p1"]))
        .unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..10 {
                    let values = engine
                        .executor()
                        .load_data(&["var01", "var03"], &params(&["p1"]))
                        .unwrap();
                    assert_eq!(values, expected);
                }
            });
        }
    });

    let stats = engine.session_stats();
    assert_eq!(stats.size, 4);
    assert_eq!(stats.in_use, 0);
}

#[test]
fn test_parameter_count_mismatch_is_configuration_error() {
    let (engine, _tmp) = open_engine(ExecutionMode::Sequential);

    let err = engine
        .executor()
        .load_data(&["var01"], &params(&["p1", "extra"]))
        .unwrap_err();
    assert!(matches!(err, SosError::ConfigurationError(_)));

    let err = engine.executor().load_data(&["offering.names", "var01"], &[]).unwrap_err();
    assert!(err.to_string().contains("1 parameter(s), 0 given"));

    // no parameterless statement is involved
    let names = engine.executor().load_data(&["offering.names"], &[]).unwrap();
    assert_eq!(names.multiple_strings("offering.names"), vec!["idle", "weather-station"]);
}

#[test]
fn test_failed_statement_leaves_variables_out() {
    let (path, _tmp) = create_seeded_database();
    let mut config = catalog_config(&path, ExecutionMode::Sequential);
    // json_extract rejects a non-JSON argument only when it runs
    config.single[0] = QueryDefinition::new(
        "SELECT json_extract(?, '$.begin'), json_extract(?, '$.end')",
        &["var01", "var02"],
    );
    config.multiple[0] = QueryDefinition::new(
        "SELECT id FROM observation WHERE procedure_id = ? AND ? IS NOT NULL ORDER BY begin_time",
        &["var03"],
    );
    let engine = SosEngine::open(config).unwrap();

    let values = engine
        .executor()
        .load_data(&["var01", "var03"], &params(&["p1", "p1"]))
        .unwrap();

    assert!(!values.contains_single("var01"));
    assert!(!values.contains_single("var02"));
    assert_eq!(values.multiple_strings("var03"), vec!["o1", "o4", "o2", "o3"]);
}

fn scripted_pool(config: &EngineConfig, session: &ScriptedSession) -> SessionPool {
    let sessions: Vec<Box<dyn Session>> = (0..config.session_count())
        .map(|_| Box::new(session.clone()) as Box<dyn Session>)
        .collect();
    SessionPool::new(sessions).unwrap()
}

fn scripted_engine(mode: ExecutionMode, session: &ScriptedSession) -> SosEngine {
    let mut config = EngineConfig::new("unused.db");
    config.execution.mode = mode;
    config.execution.workers = 2;
    config.single = vec![QueryDefinition::new("SELECT a, b FROM s1 WHERE k = ?", &["var01", "var02"])];
    config.multiple = vec![QueryDefinition::new("SELECT c FROM m1 WHERE k = ?", &["var03"])];

    let pool = scripted_pool(&config, session);
    SosEngine::with_sessions(config, pool).unwrap()
}

#[test]
fn test_each_statement_runs_once_with_bound_parameter() {
    for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
        let session = ScriptedSession::default();
        let engine = scripted_engine(mode, &session);

        let values = engine
            .executor()
            .load_data(&["var01", "var03"], &params(&["x"]))
            .unwrap();

        let bound = vec![SqlParam::Text("x".to_string())];
        assert_eq!(session.calls_to("SELECT a, b FROM s1 WHERE k = ?"), vec![bound.clone()]);
        assert_eq!(session.calls_to("SELECT c FROM m1 WHERE k = ?"), vec![bound]);

        assert_eq!(values.single_value("var01"), Some("r0c0"));
        assert_eq!(values.single_value("var02"), Some("r0c1"));
        assert_eq!(values.multiple_strings("var03"), vec!["r0c0", "r1c0"]);
        engine.close();
    }
}

#[test]
fn test_scripted_failure_is_silent() {
    let session = ScriptedSession::default();
    let mut config = EngineConfig::new("unused.db");
    config.single = vec![QueryDefinition::new("SELECT a, b FROM FAIL WHERE k = ?", &["var01", "var02"])];
    config.multiple = vec![QueryDefinition::new("SELECT c FROM m1 WHERE k = ?", &["var03"])];
    let pool = SessionPool::new(vec![Box::new(session.clone()) as Box<dyn Session>]).unwrap();
    let engine = SosEngine::with_sessions(config, pool).unwrap();

    let values = engine
        .executor()
        .load_data(&["var01", "var03"], &params(&["x"]))
        .unwrap();

    assert!(!values.contains_single("var01"));
    assert!(!values.contains_single("var02"));
    assert!(values.contains_multiple("var03"));
    assert_eq!(session.calls.lock().len(), 2);
}

/// Three single and three multiple statements on three workers, at most two
/// outstanding at a time. The second single statement fails.
fn paced_parallel_engine(session: &ScriptedSession) -> SosEngine {
    let mut config = EngineConfig::new("unused.db");
    config.execution.mode = ExecutionMode::Parallel;
    config.execution.workers = 3;
    config.execution.in_flight = 2;
    config.single = vec![
        QueryDefinition::new("SELECT a, b FROM single1 WHERE k = ?", &["s1a", "s1b"]),
        QueryDefinition::new("SELECT a FROM single2_FAIL WHERE k = ?", &["s2a"]),
        QueryDefinition::new("SELECT a FROM single3 WHERE k = ?", &["s3a"]),
    ];
    config.multiple = vec![
        QueryDefinition::new("SELECT a FROM multiple1 WHERE k = ?", &["m1a"]),
        QueryDefinition::new("SELECT a, b FROM multiple2 WHERE k = ?", &["m2a", "m2b"]),
        QueryDefinition::new("SELECT a FROM multiple3 WHERE k = ?", &["m3a"]),
    ];

    let pool = scripted_pool(&config, session);
    SosEngine::with_sessions(config, pool).unwrap()
}

const PACED_VARIABLES: [&str; 6] = ["s1a", "s2a", "s3a", "m1a", "m2a", "m3a"];

#[test]
fn test_parallel_single_phase_completes_before_multiple_phase() {
    let session = ScriptedSession::paced(Duration::from_millis(5));
    let engine = paced_parallel_engine(&session);

    let values = engine
        .executor()
        .load_data(&PACED_VARIABLES, &params(&["x"]))
        .unwrap();

    let singles = session.log.spans_matching("FROM single");
    let multiples = session.log.spans_matching("FROM multiple");
    assert_eq!(singles.len(), 3);
    assert_eq!(multiples.len(), 3);

    let last_single_end = singles.iter().map(|s| s.end).max().unwrap();
    let first_multiple_start = multiples.iter().map(|s| s.start).min().unwrap();
    assert!(
        last_single_end < first_multiple_start,
        "multiple statement started at {} before single phase ended at {}",
        first_multiple_start,
        last_single_end
    );

    assert!(!values.contains_single("s2a"));
    assert_eq!(values.single_value("s1a"), Some("r0c0"));
    assert_eq!(values.single_value("s1b"), Some("r0c1"));
    assert_eq!(values.single_value("s3a"), Some("r0c0"));
    assert_eq!(values.multiple_strings("m1a"), vec!["r0c0", "r1c0"]);
    assert_eq!(values.multiple_strings("m2b"), vec!["r0c1", "r1c1"]);
    assert_eq!(values.multiple_strings("m3a"), vec!["r0c0", "r1c0"]);
    engine.close();
}

#[test]
fn test_parallel_outstanding_statements_bounded_by_in_flight() {
    let session = ScriptedSession::paced(Duration::from_millis(5));
    let engine = paced_parallel_engine(&session);

    for _ in 0..5 {
        engine
            .executor()
            .load_data(&PACED_VARIABLES, &params(&["x"]))
            .unwrap();
    }

    // three workers are available, but only two statements are ever handed out
    let peak = session.log.peak();
    assert!(peak >= 1);
    assert!(peak <= 2, "{} statements ran at once", peak);
    assert_eq!(session.calls.lock().len(), 30);
    assert_eq!(engine.session_stats().in_use, 0);
}

#[test]
fn test_parallel_panicking_statement_is_left_out() {
    let session = ScriptedSession::default();
    let mut config = EngineConfig::new("unused.db");
    config.execution.mode = ExecutionMode::Parallel;
    config.execution.workers = 2;
    config.single = vec![
        QueryDefinition::new("SELECT a FROM PANIC WHERE k = ?", &["var01"]),
        QueryDefinition::new("SELECT b FROM s2 WHERE k = ?", &["var02"]),
    ];
    config.multiple = vec![QueryDefinition::new("SELECT c FROM m1 WHERE k = ?", &["var03"])];
    let pool = scripted_pool(&config, &session);
    let engine = SosEngine::with_sessions(config, pool).unwrap();

    for _ in 0..2 {
        let values = engine
            .executor()
            .load_data(&["var01", "var02", "var03"], &params(&["x"]))
            .unwrap();

        assert!(!values.contains_single("var01"));
        assert_eq!(values.single_value("var02"), Some("r0c0"));
        assert_eq!(values.multiple_strings("var03"), vec!["r0c0", "r1c0"]);
    }

    // the session borrowed by the panicking task went back to the pool
    assert_eq!(engine.session_stats().in_use, 0);
    engine.close();
}

#[test]
fn test_close_releases_every_session() {
    for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
        let session = ScriptedSession::default();
        let engine = scripted_engine(mode, &session);
        let size = engine.session_stats().size;

        engine
            .executor()
            .load_data(&["var01", "var03"], &params(&["x"]))
            .unwrap();
        assert_eq!(session.release_count(), 0);

        engine.close();
        assert_eq!(session.release_count(), size);
    }
}

#[test]
fn test_duplicate_variable_rejects_catalog() {
    let (path, _tmp) = create_seeded_database();
    let mut config = catalog_config(&path, ExecutionMode::Sequential);
    config
        .multiple
        .push(QueryDefinition::new("SELECT id FROM observation", &["var01"]));

    let err = SosEngine::open(config).err().unwrap();
    assert!(matches!(err, SosError::ConfigurationError(_)));
}

#[test]
fn test_uncompilable_definition_is_dropped() {
    let (path, _tmp) = create_seeded_database();
    let mut config = catalog_config(&path, ExecutionMode::Sequential);
    config
        .single
        .push(QueryDefinition::new("SELECT nope FROM no_such_table", &["broken"]));
    config
        .single
        .push(QueryDefinition::new("SELECT id FROM feature WHERE id = ?", &["too", "many"]));

    let engine = SosEngine::open(config).unwrap();
    assert!(engine.executor().catalog().statement_of("broken").is_none());
    assert!(engine.executor().catalog().statement_of("too").is_none());
    assert!(engine.executor().catalog().statement_of("var01").is_some());

    let values = engine.executor().load_data(&["broken"], &[]).unwrap();
    assert!(values.is_empty());
}
