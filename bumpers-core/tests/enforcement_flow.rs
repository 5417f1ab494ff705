//! End-to-end enforcement through the engine, dispatcher and session.

use std::sync::Arc;

use chrono::Duration;

use bumpers_core::checks::{ActionWhitelist, ChainLength, ContentFilter, RateLimit};
use bumpers_core::monitor::high_failure_rate;
use bumpers_core::{
    drive, AbortSignal, Event, EventKind, EventLog, EventQuery, EventWindow, FailStrategy, FnCheck,
    InMemoryEventLog, Interrupt, InterventionType, ManualClock, RunReport, RunState, Session,
    StopCause, ValidationContext, ValidationEngine, ValidationPoint, Verdict,
};
use bumpers_core::{CheckResult, Clock, EnforcementConfig, Evaluation};

fn memory_log() -> Arc<InMemoryEventLog> {
    Arc::new(InMemoryEventLog::new())
}

#[test]
fn test_disallowed_action_raises() {
    let mut engine = ValidationEngine::new(memory_log());
    engine.register(ActionWhitelist::new(["search"]), ValidationPoint::PreAction);

    let ctx = ValidationContext::new().with("action", "delete");
    let failure = engine
        .validate(ValidationPoint::PreAction, &ctx)
        .unwrap_err();

    assert_eq!(failure.fail_strategy(), FailStrategy::Raise);
    assert!(failure.message().contains("delete"));
    assert!(failure.message().contains("search"));
}

#[test]
fn test_forbidden_words_in_output() {
    let mut engine = ValidationEngine::new(memory_log());
    engine.register(ContentFilter::new(["secret"]), ValidationPoint::PreOutput);

    let leaked = ValidationContext::new().with("output", "the secret plan");
    let failure = engine
        .validate(ValidationPoint::PreOutput, &leaked)
        .unwrap_err();
    assert!(failure.message().contains("[\"secret\"]"));

    let clean = ValidationContext::new().with("output", "the plan");
    let results = engine.validate(ValidationPoint::PreOutput, &clean).unwrap();
    assert!(results.iter().all(|r| r.passed));
}

#[test]
fn test_rate_limit_window() {
    let clock = Arc::new(ManualClock::starting_now());
    let mut engine = ValidationEngine::new(memory_log());
    engine.register(
        RateLimit::new(2, Duration::seconds(60))
            .unwrap()
            .with_clock(clock.clone()),
        ValidationPoint::PreAction,
    );
    let ctx = ValidationContext::new().with("action", "search");

    assert!(engine.validate(ValidationPoint::PreAction, &ctx).is_ok());
    clock.advance(Duration::seconds(1));
    assert!(engine.validate(ValidationPoint::PreAction, &ctx).is_ok());
    clock.advance(Duration::seconds(1));
    assert!(engine.validate(ValidationPoint::PreAction, &ctx).is_err());

    // 61 seconds after the first call
    clock.advance(Duration::seconds(59));
    assert!(engine.validate(ValidationPoint::PreAction, &ctx).is_ok());
}

#[test]
fn test_failure_rate_condition_over_engine_events() {
    let log = memory_log();
    let mut engine = ValidationEngine::new(log.clone());
    engine.register(
        FnCheck::new("flaky", FailStrategy::LogOnly, |ctx: &ValidationContext| {
            Ok(if ctx.output() == Some("bad") {
                Evaluation::fail("bad output")
            } else {
                Evaluation::pass("ok")
            })
        }),
        ValidationPoint::PreOutput,
    );

    for i in 0..10 {
        let output = if i < 4 { "bad" } else { "good" };
        let _ = engine.validate(
            ValidationPoint::PreOutput,
            &ValidationContext::new().with("output", output),
        );
    }

    let events: Vec<Event> = log
        .query(&EventQuery::new().kind(EventKind::Validation))
        .unwrap();
    assert_eq!(events.len(), 10);

    let now = chrono::Utc::now();
    let window = EventWindow::new(&events, now - Duration::hours(1), now);
    let mut condition = high_failure_rate(0.3, Duration::minutes(15));
    assert!(condition.evaluate(&window, now).is_some());

    let mostly_passing: Vec<Event> = (0..10)
        .map(|i| {
            Event::validation(&CheckResult::new(
                i >= 2,
                "",
                "flaky",
                ValidationPoint::PreOutput,
                ValidationContext::new(),
                FailStrategy::LogOnly,
            ))
        })
        .collect();
    let window = EventWindow::new(&mostly_passing, now - Duration::hours(1), now);
    let mut condition = high_failure_rate(0.3, Duration::minutes(15));
    assert!(condition.evaluate(&window, now).is_none());
}

#[test]
fn test_stop_records_interventions_and_halts() {
    let log = memory_log();
    let mut session = Session::new(log.clone()).with_session_id("session-stop");
    session.register(
        ContentFilter::new(["secret"]).with_fail_strategy(FailStrategy::Stop),
        ValidationPoint::PreOutput,
    );
    let run_id = session.start_run("Summarize the memo").unwrap();

    let mut out = ValidationContext::new().with("output", "the secret plan");
    let err = session
        .validate(ValidationPoint::PreOutput, &mut out)
        .unwrap_err();

    match err {
        Interrupt::Abort(AbortSignal::Stop { cause, .. }) => assert_eq!(cause, StopCause::Policy),
        other => panic!("expected stop, got {:?}", other),
    }
    assert_eq!(session.state(), RunState::Stopped);

    let interventions: Vec<String> = log
        .query(&EventQuery::new().kind(EventKind::Intervention))
        .unwrap()
        .iter()
        .filter_map(|e| e.intervention_type().map(str::to_string))
        .collect();
    assert_eq!(
        interventions,
        vec![
            InterventionType::BlockAction.to_string(),
            InterventionType::Stop.to_string()
        ]
    );
    assert!(log
        .events()
        .iter()
        .all(|e| e.session_id.as_deref() == Some("session-stop")
            && e.run_id.as_deref() == Some(run_id.as_str())));
}

#[test]
fn test_auto_correct_patches_until_budget_spent() {
    let config = EnforcementConfig::new().max_auto_correct(2);
    let mut session = Session::from_config(&config, memory_log());
    session.register(
        ChainLength::new(1).with_fail_strategy(FailStrategy::AutoCorrect),
        ValidationPoint::PreAction,
    );
    session.start_run("Plan a trip").unwrap();

    let mut step = ValidationContext::new()
        .with("question", "Plan a trip")
        .with("action", "search");
    assert!(session
        .validate(ValidationPoint::PreAction, &mut step)
        .unwrap()
        .is_passed());

    for _ in 0..2 {
        let verdict = session
            .validate(ValidationPoint::PreAction, &mut step)
            .unwrap();
        assert!(matches!(verdict, Verdict::Patched { .. }));
    }
    assert!(step.question().unwrap().contains("Previous Action Blocked"));

    let err = session
        .validate(ValidationPoint::PreAction, &mut step)
        .unwrap_err();
    match err {
        Interrupt::Abort(AbortSignal::Stop { cause, .. }) => {
            assert_eq!(cause, StopCause::AutoCorrectExhausted { limit: 2 })
        }
        other => panic!("expected stop, got {:?}", other),
    }
}

#[test]
fn test_driven_run_self_corrects_once() {
    let log = memory_log();
    let mut session = Session::new(log.clone());
    session.register(
        ActionWhitelist::new(["search"]).with_fail_strategy(FailStrategy::SelfCorrect),
        ValidationPoint::PreAction,
    );

    let mut attempts = Vec::new();
    let mut agent = |input: &str, guard: &mut Session| -> Result<String, Interrupt> {
        attempts.push(input.to_string());
        let action = if attempts.len() == 1 { "delete" } else { "search" };
        let mut step = ValidationContext::new()
            .with("question", input)
            .with("action", action)
            .with("action_input", "inbox");
        guard.validate(ValidationPoint::PreAction, &mut step)?;
        Ok("done".to_string())
    };

    let report = drive(&mut session, &mut agent, "Tidy my inbox").unwrap();
    assert_eq!(
        report,
        RunReport::Completed {
            output: "done".to_string(),
            attempts: 2
        }
    );
    assert!(attempts[1].starts_with("Previous Action Blocked"));
    assert!(attempts[1].ends_with("Original request: Tidy my inbox"));
    assert_eq!(session.dispatcher().self_corrections(), 1);

    let self_corrections = log
        .events()
        .iter()
        .filter(|e| e.intervention_type() == Some(InterventionType::SelfCorrect.as_str()))
        .count();
    assert_eq!(self_corrections, 1);
}

#[test]
fn test_manual_clock_is_shared() {
    let clock = ManualClock::starting_now();
    let shared = clock.clone();
    let before = shared.now();
    clock.advance(Duration::seconds(30));
    assert_eq!(shared.now() - before, Duration::seconds(30));
}
