//! Sessions writing to a file-backed log watched by a monitor.

use std::sync::{Arc, Mutex};

use bumpers_core::checks::{ActionWhitelist, PatternCheck, RedundancyLoop};
use bumpers_core::{
    Alert, BumpersConfig, EventKind, EventLog, EventLogBackend, EventQuery, FailStrategy,
    FileEventLog, Interrupt, InterventionType, Monitor, Session, ValidationContext,
    ValidationPoint,
};

fn blocked_step(session: &mut Session, action: &str) {
    let mut step = ValidationContext::new()
        .with("action", action)
        .with("action_input", "/tmp/report.txt");
    let err = session
        .validate(ValidationPoint::PreAction, &mut step)
        .unwrap_err();
    assert!(matches!(err, Interrupt::Raised(_)));
}

#[test]
fn test_file_log_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events").join("run.jsonl");

    {
        let log = Arc::new(FileEventLog::new(&path).unwrap());
        let mut session = Session::new(log).with_session_id("file-session");
        session.register(ActionWhitelist::new(["read_file"]), ValidationPoint::PreAction);
        session.start_run("Read the report").unwrap();

        let mut ok = ValidationContext::new().with("action", "read_file");
        session.validate(ValidationPoint::PreAction, &mut ok).unwrap();
        blocked_step(&mut session, "delete_file");
    }

    let reopened = FileEventLog::new(&path).unwrap();
    let events = reopened.query(&EventQuery::new()).unwrap();
    assert_eq!(events.len(), 3);
    assert!(events
        .iter()
        .all(|e| e.session_id.as_deref() == Some("file-session")));

    let interventions = reopened
        .query(&EventQuery::new().kind(EventKind::Intervention))
        .unwrap();
    assert_eq!(interventions.len(), 1);
    assert_eq!(
        interventions[0].intervention_type(),
        Some(InterventionType::BlockAction.as_str())
    );
    assert_eq!(interventions[0].context_str("action"), Some("delete_file"));
}

#[test]
fn test_monitor_alerts_on_repeated_blocks_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = BumpersConfig::from_json_str(&format!(
        r#"{{
            "monitor": {{
                "check_interval_secs": 30,
                "failure_rate_threshold": 0.5,
                "repeated_blocks": [{{ "action": "delete_file", "count": 3 }}]
            }},
            "event_log": {{ "backend": "file", "directory": {:?} }}
        }}"#,
        dir.path()
    ))
    .unwrap();
    assert_eq!(config.event_log.backend, EventLogBackend::File);

    let log = config.event_log.build().unwrap();
    let mut session = Session::from_config(&config.enforcement, log.clone());
    session.register(ActionWhitelist::new(["read_file"]), ValidationPoint::PreAction);
    session.start_run("Clean the workspace").unwrap();

    let alerts = Arc::new(Mutex::new(Vec::<Alert>::new()));
    let sink = alerts.clone();
    let mut monitor = Monitor::from_config(&config.monitor, log)
        .unwrap()
        .with_handler(move |alert: &Alert| sink.lock().unwrap().push(alert.clone()));

    blocked_step(&mut session, "delete_file");
    blocked_step(&mut session, "delete_file");
    let fired: Vec<String> = monitor
        .tick()
        .unwrap()
        .into_iter()
        .map(|a| a.condition)
        .collect();
    // two blocks out of two validations trips the failure rate only
    assert_eq!(fired, vec!["high_failure_rate".to_string()]);

    blocked_step(&mut session, "delete_file");
    let fired: Vec<String> = monitor
        .tick()
        .unwrap()
        .into_iter()
        .map(|a| a.condition)
        .collect();
    assert_eq!(fired, vec!["repeated_block:delete_file".to_string()]);
    assert_eq!(alerts.lock().unwrap().len(), 2);
}

#[test]
fn test_env_overrides_select_file_backend() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("override.jsonl");
    let path_str = path.to_string_lossy().to_string();

    let config = BumpersConfig::default()
        .with_overrides(|key| match key {
            "BUMPERS_MAX_SELF_CORRECT" => Some("3".to_string()),
            "BUMPERS_EVENT_LOG" => Some(path_str.clone()),
            _ => None,
        })
        .unwrap();

    assert_eq!(config.enforcement.max_self_correct, 3);
    let log = config.event_log.build().unwrap();
    assert_eq!(log.name(), "file");
    assert!(path.exists());
}

#[test]
fn test_loop_and_pattern_checks_in_one_session() {
    let dir = tempfile::tempdir().unwrap();
    let log: Arc<dyn EventLog> = Arc::new(FileEventLog::in_directory(dir.path()).unwrap());
    let mut session = Session::new(log.clone());
    session
        .register(
            RedundancyLoop::new(2).with_fail_strategy(FailStrategy::LogOnly),
            ValidationPoint::PreAction,
        )
        .register(
            PatternCheck::new([r"(?i)api[_-]?key\s*[:=]"]).unwrap(),
            ValidationPoint::PreOutput,
        );
    session.start_run("Fetch the weather").unwrap();

    let mut verdicts = Vec::new();
    for _ in 0..3 {
        let mut step = ValidationContext::new()
            .with("action", "weather")
            .with("action_input", "Oslo");
        verdicts.push(session.validate(ValidationPoint::PreAction, &mut step).unwrap());
    }
    assert!(verdicts[0].is_passed());
    assert!(verdicts[1].is_passed());
    assert!(!verdicts[2].is_passed());

    let mut out = ValidationContext::new().with("output", "use API_KEY=abc123");
    let err = session
        .validate(ValidationPoint::PreOutput, &mut out)
        .unwrap_err();
    assert_eq!(err.failure().check_name(), "pattern_matcher");

    let failed = log
        .query(&EventQuery::new().kind(EventKind::Validation))
        .unwrap()
        .iter()
        .filter(|e| e.is_failure())
        .count();
    assert_eq!(failed, 2);
}
