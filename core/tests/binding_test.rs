//! Block binding and refresh scheduling tests
//!
//! All tests run on paused virtual time so tick counts are exact.

mod common;

use common::{data, CountingResolver, ScriptedResolver};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use vigil_core::binding::{BindingState, BlockBinding};
use vigil_core::config::VigilConfig;
use vigil_core::source::{DataSourceDescriptor, FetchError, HttpResolver, SourceKind};

const EPS: Duration = Duration::from_millis(1);

// =============================================================================
// Scheduling
// =============================================================================

#[tokio::test(start_paused = true)]
async fn zero_interval_resolves_exactly_once() {
    let resolver = Arc::new(CountingResolver::default());
    let mut binding = BlockBinding::new(
        "cpu",
        Some(DataSourceDescriptor::metric("cpu_usage").with_refresh_interval(0)),
        resolver.clone(),
    );
    binding.start();

    sleep(Duration::from_secs(3600)).await;
    assert_eq!(resolver.calls(), 1);
    assert_eq!(binding.dispatched_calls(), 1);
    assert_eq!(binding.state().data(), Some(&json!(1)));
}

#[tokio::test(start_paused = true)]
async fn absent_interval_resolves_exactly_once() {
    let resolver = Arc::new(CountingResolver::default());
    let mut binding = BlockBinding::new(
        "cpu",
        Some(DataSourceDescriptor::metric("cpu_usage")),
        resolver.clone(),
    );
    binding.start();

    sleep(Duration::from_secs(600)).await;
    assert_eq!(resolver.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn k_ticks_make_k_plus_one_calls() {
    let resolver = Arc::new(CountingResolver::default());
    let mut binding = BlockBinding::new(
        "cpu",
        Some(DataSourceDescriptor::metric("cpu_usage").with_refresh_interval(10)),
        resolver.clone(),
    );
    binding.start();

    // The initial resolve does not wait for the first period
    sleep(EPS).await;
    assert_eq!(resolver.calls(), 1);

    for k in 1..=3 {
        sleep(Duration::from_secs(10)).await;
        assert_eq!(resolver.calls(), k + 1);
    }
    assert_eq!(binding.state().data(), Some(&json!(4)));
}

#[tokio::test(start_paused = true)]
async fn ticks_continue_after_failures() {
    let resolver = Arc::new(ScriptedResolver::new(vec![
        (Duration::ZERO, Err(FetchError::Transport("refused".into()))),
        (Duration::ZERO, Err(FetchError::Transport("refused".into()))),
        (Duration::ZERO, data(json!("back"))),
    ]));
    let mut binding = BlockBinding::new(
        "svc",
        Some(DataSourceDescriptor::endpoint("/health").with_refresh_interval(5)),
        resolver.clone(),
    );
    binding.start();

    sleep(EPS).await;
    assert!(binding.state().error().is_some());

    sleep(Duration::from_secs(10)).await;
    assert_eq!(resolver.calls(), 3);
    assert_eq!(binding.state().data(), Some(&json!("back")));
    assert_eq!(binding.state().error(), None);
}

// =============================================================================
// Failure policy
// =============================================================================

#[tokio::test(start_paused = true)]
async fn configuration_error_is_not_retried() {
    let resolver = Arc::new(HttpResolver::new(&VigilConfig::default()));
    let mut binding = BlockBinding::new(
        "broken",
        Some(DataSourceDescriptor::new(SourceKind::QueryMetric).with_refresh_interval(1)),
        resolver,
    );
    let mut rx = binding.subscribe();
    binding.start();

    sleep(Duration::from_millis(1500)).await;
    assert!(matches!(
        binding.state().error(),
        Some(FetchError::Configuration(_))
    ));
    let _ = rx.borrow_and_update();

    sleep(Duration::from_secs(9)).await;
    assert_eq!(binding.dispatched_calls(), 1);
    // No Loading/Failed flapping on later ticks
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test(start_paused = true)]
async fn fixing_a_misconfigured_source_resumes_polling() {
    let resolver = Arc::new(ScriptedResolver::new(vec![
        (Duration::ZERO, Err(FetchError::Configuration("no query".into()))),
        (Duration::ZERO, data(json!(1))),
        (Duration::ZERO, data(json!(2))),
    ]));
    let mut binding = BlockBinding::new(
        "fixable",
        Some(DataSourceDescriptor::new(SourceKind::QueryMetric).with_refresh_interval(2)),
        resolver.clone(),
    );
    binding.start();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(resolver.calls(), 1);

    assert!(binding.replace_descriptor(Some(
        DataSourceDescriptor::metric("up").with_refresh_interval(2)
    )));
    sleep(Duration::from_secs(2) + EPS).await;
    assert_eq!(resolver.calls(), 3);
    assert_eq!(binding.state().data(), Some(&json!(2)));
}

#[tokio::test(start_paused = true)]
async fn failure_keeps_last_good_value_visible() {
    let resolver = Arc::new(ScriptedResolver::new(vec![
        (Duration::ZERO, data(json!({"p99": 120}))),
        (
            Duration::ZERO,
            Err(FetchError::Upstream {
                status: Some(503),
                message: "unavailable".into(),
            }),
        ),
    ]));
    let mut binding = BlockBinding::new(
        "latency",
        Some(DataSourceDescriptor::metric("p99").with_refresh_interval(5)),
        resolver,
    );
    binding.start();

    sleep(Duration::from_secs(5) + EPS).await;
    let state = binding.state();
    assert!(!state.is_loading());
    assert_eq!(state.data(), Some(&json!({"p99": 120})));
    assert_eq!(state.error().and_then(FetchError::status), Some(503));
}

#[tokio::test(start_paused = true)]
async fn loading_shows_previous_value() {
    let resolver = Arc::new(ScriptedResolver::new(vec![
        (Duration::ZERO, data(json!(7))),
        (Duration::from_secs(3), data(json!(8))),
    ]));
    let mut binding = BlockBinding::new(
        "q",
        Some(DataSourceDescriptor::metric("q").with_refresh_interval(5)),
        resolver,
    );
    binding.start();

    sleep(Duration::from_secs(6)).await;
    let state = binding.state();
    assert!(state.is_loading());
    assert_eq!(state.data(), Some(&json!(7)));

    sleep(Duration::from_secs(3)).await;
    assert_eq!(binding.state().data(), Some(&json!(8)));
}

// =============================================================================
// Ordering and teardown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn last_arrival_wins_over_last_dispatch() {
    let resolver = Arc::new(ScriptedResolver::new(vec![
        // dispatched at t=0, arrives at t=4.5
        (Duration::from_millis(4500), data(json!("first-dispatched"))),
        // dispatched at t=1, arrives at t=2
        (Duration::from_secs(1), data(json!("second-dispatched"))),
    ]));
    let mut binding = BlockBinding::new(
        "race",
        Some(DataSourceDescriptor::metric("up").with_refresh_interval(1)),
        resolver,
    );
    binding.start();

    sleep(Duration::from_millis(2500)).await;
    assert_eq!(binding.state().data(), Some(&json!("second-dispatched")));

    sleep(Duration::from_millis(2100)).await;
    let state = binding.state();
    assert!(state.is_ready());
    assert_eq!(state.data(), Some(&json!("first-dispatched")));
}

#[tokio::test(start_paused = true)]
async fn result_landing_after_stop_is_ignored() {
    let resolver = Arc::new(ScriptedResolver::new(vec![(
        Duration::from_secs(5),
        data(json!("late")),
    )]));
    let mut binding = BlockBinding::new(
        "slow",
        Some(DataSourceDescriptor::endpoint("/slow")),
        resolver.clone(),
    );
    let mut rx = binding.subscribe();
    binding.start();

    sleep(Duration::from_secs(1)).await;
    let at_teardown = binding.state();
    assert_eq!(at_teardown, BindingState::Loading { last: None });
    binding.stop();
    let _ = rx.borrow_and_update();

    sleep(Duration::from_secs(10)).await;
    assert_eq!(binding.state(), at_teardown);
    assert!(!rx.has_changed().unwrap());
    assert_eq!(resolver.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_the_timer() {
    let resolver = Arc::new(CountingResolver::default());
    let mut binding = BlockBinding::new(
        "cpu",
        Some(DataSourceDescriptor::metric("cpu").with_refresh_interval(2)),
        resolver.clone(),
    );
    binding.start();
    sleep(Duration::from_secs(3)).await;
    binding.stop();
    assert!(!binding.is_active());

    sleep(Duration::from_secs(60)).await;
    assert_eq!(resolver.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_binding_tears_it_down() {
    let resolver = Arc::new(CountingResolver::default());
    {
        let mut binding = BlockBinding::new(
            "cpu",
            Some(DataSourceDescriptor::metric("cpu").with_refresh_interval(1)),
            resolver.clone(),
        );
        binding.start();
        sleep(EPS).await;
    }

    sleep(Duration::from_secs(30)).await;
    assert_eq!(resolver.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn replaced_descriptor_ignores_old_in_flight_result() {
    let resolver = Arc::new(ScriptedResolver::new(vec![
        (Duration::from_secs(5), data(json!("old"))),
        (Duration::from_secs(1), data(json!("new"))),
    ]));
    let mut binding = BlockBinding::new(
        "swap",
        Some(DataSourceDescriptor::endpoint("/old")),
        resolver.clone(),
    );
    let rx = binding.subscribe();
    binding.start();

    sleep(Duration::from_millis(500)).await;
    assert!(binding.replace_descriptor(Some(DataSourceDescriptor::endpoint("/new"))));
    assert!(binding.state().is_loading());

    sleep(Duration::from_millis(1100)).await;
    assert_eq!(binding.state().data(), Some(&json!("new")));

    sleep(Duration::from_secs(10)).await;
    assert_eq!(binding.state().data(), Some(&json!("new")));
    // The receiver taken before the swap still follows the block
    assert_eq!(rx.borrow().data(), Some(&json!("new")));
    assert_eq!(resolver.calls(), 2);
}
