//! End-to-end behaviour of a dashboard session against in-memory fakes.
//!
//! All tests run on tokio's paused clock, so the 3 s / 5 s / 10 s
//! cadences are exact.

mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::sleep;

use common::*;
use edutrack_live::api::types::{demo_roster, demo_stats};
use edutrack_live::api::BatchSummary;
use edutrack_live::engine::DashboardSession;
use edutrack_live::feed::live::ConnectionState;
use edutrack_live::feed::simulator::Simulator;
use edutrack_live::risk::RiskTier;
use edutrack_live::storage::{Health, Origin, Slot};

#[tokio::test(start_paused = true)]
async fn unreachable_backend_shows_demo_numbers() {
    let backend = Arc::new(FakeBackend::unreachable());
    let connector = Arc::new(ScriptedConnector::new());
    let session = DashboardSession::start(&test_config(), backend, connector).unwrap();

    sleep(Duration::from_millis(10)).await;
    let snap = session.snapshot();
    let stats = snap.stats.clone().unwrap();
    assert_eq!(stats.origin, Origin::Demo);
    assert_eq!(stats.value, demo_stats());
    assert_eq!(snap.students.clone().unwrap().value, demo_roster());
    assert_eq!(snap.connectivity.stats, Health::Degraded);

    let view = session.view();
    assert!(view.status.degraded);
    assert_eq!(view.status.backend, "Using demo data - Backend not connected");
    let cards = view.stats.unwrap();
    assert_eq!(cards.total_students, "5");
    assert_eq!(cards.average_score, "81.6%");
    assert_eq!(cards.ai_predictions, "42");
    assert_eq!(cards.risk_level, RiskTier::Medium);

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn roster_row_is_rendered_low_risk() {
    let backend = Arc::new(FakeBackend::healthy());
    let connector = Arc::new(ScriptedConnector::new());
    let _server = connector.accept();
    let session = DashboardSession::start(&test_config(), backend, connector).unwrap();

    sleep(Duration::from_millis(10)).await;
    let view = session.view();
    let rows = view.students.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "John Doe");
    assert_eq!(rows[0].tier, RiskTier::Low);
    assert_eq!(rows[0].row_band, "");
    assert_eq!(rows[0].score_badge, "85%");
    assert_eq!(view.chart.len(), 1);
    assert_eq!(view.status.backend, "Connected to AI Engine");
    assert!(!view.status.degraded);

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stats_poll_every_ten_seconds_roster_once() {
    let backend = Arc::new(FakeBackend::healthy());
    let connector = Arc::new(ScriptedConnector::new());
    let session = DashboardSession::start(&test_config(), backend.clone(), connector).unwrap();

    sleep(Duration::from_millis(500)).await;
    assert_eq!(backend.stats_calls(), 1);
    sleep(Duration::from_secs(50)).await;
    assert_eq!(backend.stats_calls(), 6);
    assert_eq!(backend.roster_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn identical_polls_do_not_drift() {
    let backend = Arc::new(FakeBackend::healthy());
    let connector = Arc::new(ScriptedConnector::new());
    let session = DashboardSession::start(&test_config(), backend, connector).unwrap();
    let mut updates = session.subscribe();

    sleep(Duration::from_secs(35)).await;
    let stats_updates: Vec<_> = std::iter::from_fn(|| updates.try_recv().ok())
        .filter(|u| u.slot == Slot::Stats)
        .collect();
    assert_eq!(stats_updates.len(), 4);
    let first = &stats_updates[0].snapshot.stats;
    for update in &stats_updates {
        assert_eq!(&update.snapshot.stats, first);
    }

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stats_recover_after_backend_returns() {
    let backend = Arc::new(FakeBackend::unreachable());
    let connector = Arc::new(ScriptedConnector::new());
    let session = DashboardSession::start(&test_config(), backend.clone(), connector).unwrap();

    sleep(Duration::from_secs(1)).await;
    assert_eq!(session.snapshot().connectivity.stats, Health::Degraded);

    *backend.stats.lock().unwrap() = Ok(live_stats());
    sleep(Duration::from_secs(10)).await;
    let stats = session.snapshot().stats.unwrap();
    assert_eq!(stats.origin, Origin::Backend);
    assert_eq!(stats.value, live_stats());
    assert_eq!(session.snapshot().connectivity.stats, Health::Healthy);
    // Roster is only fetched at startup and stays on demo data.
    assert_eq!(session.snapshot().students.unwrap().origin, Origin::Demo);

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn batch_analysis_counts_a_prediction() {
    let backend = Arc::new(FakeBackend::healthy());
    let connector = Arc::new(ScriptedConnector::new());
    let session = DashboardSession::start(&test_config(), backend, connector).unwrap();
    sleep(Duration::from_millis(10)).await;

    let outcome = session.run_batch_analysis().await;
    assert_eq!(outcome.origin, Origin::Backend);
    assert_eq!(outcome.value.low_risk, 4);
    assert_eq!(session.view().stats.unwrap().ai_predictions, "43");

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn analysis_failures_return_demo_results() {
    let backend = Arc::new(FakeBackend::unreachable());
    let connector = Arc::new(ScriptedConnector::new());
    let session = DashboardSession::start(&test_config(), backend, connector).unwrap();
    sleep(Duration::from_millis(10)).await;

    let batch = session.run_batch_analysis().await;
    assert_eq!(batch.origin, Origin::Demo);
    assert_eq!((batch.value.high_risk, batch.value.medium_risk, batch.value.low_risk), (1, 2, 2));
    // Demo batch does not count as a prediction.
    assert_eq!(session.view().stats.unwrap().ai_predictions, "42");

    let analysis = session.analyze_student(404).await;
    assert_eq!(analysis.origin, Origin::Demo);
    assert_eq!(analysis.value.student_id, 404);
    assert_eq!(analysis.value.risk_level, "Medium");
    assert_eq!(analysis.value.recommendations.len(), 3);

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn batch_success_leaves_demo_stats_fixed() {
    let backend = Arc::new(FakeBackend::unreachable());
    *backend.batch.lock().unwrap() = Ok(BatchSummary {
        high_risk: 1,
        medium_risk: 0,
        low_risk: 4,
    });
    let connector = Arc::new(ScriptedConnector::new());
    let session = DashboardSession::start(&test_config(), backend, connector).unwrap();
    sleep(Duration::from_millis(10)).await;
    let mut updates = session.subscribe();

    let outcome = session.run_batch_analysis().await;
    assert_eq!(outcome.origin, Origin::Backend);
    assert_eq!(session.snapshot().stats.unwrap().value, demo_stats());
    assert_eq!(session.view().stats.unwrap().ai_predictions, "42");
    assert!(std::iter::from_fn(|| updates.try_recv().ok()).all(|u| u.slot != Slot::Stats));

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn render_loop_exits_while_updates_keep_arriving() {
    let session = DashboardSession::start_with_simulator(
        &test_config(),
        Arc::new(FakeBackend::healthy()),
        Arc::new(ScriptedConnector::new()),
        Simulator::seeded(3),
    )
    .unwrap();

    // Live events every 5 s keep the loop busy; the shutdown timer must
    // still fire on schedule.
    let started = tokio::time::Instant::now();
    let rendered = session
        .render_until(sleep(Duration::from_secs(12)))
        .await
        .unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(12) && elapsed < Duration::from_secs(13));
    assert!(rendered >= 3);

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn at_risk_rows_come_from_the_roster() {
    let backend = Arc::new(FakeBackend::unreachable());
    let connector = Arc::new(ScriptedConnector::new());
    let session = DashboardSession::start(&test_config(), backend, connector).unwrap();
    sleep(Duration::from_millis(10)).await;

    let names: Vec<String> = session.identify_at_risk().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["Mike Johnson".to_string(), "Sarah Williams".to_string()]);

    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_silences_every_producer() {
    let backend = Arc::new(FakeBackend::healthy());
    let connector = Arc::new(ScriptedConnector::new());
    let server = connector.accept();
    let session = DashboardSession::start(&test_config(), backend.clone(), connector).unwrap();
    let mut updates = session.subscribe();
    let mut state = session.connection_state();
    wait_for_state(&mut state, ConnectionState::Open).await;

    session.stop().await;
    while updates.try_recv().is_ok() {}
    let calls = backend.stats_calls();

    let _ = server.send(live_frame(4));
    sleep(Duration::from_secs(60)).await;
    assert_eq!(backend.stats_calls(), calls);
    assert!(matches!(
        updates.try_recv(),
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed)
    ));
}
