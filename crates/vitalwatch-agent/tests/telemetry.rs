//! Telemetry scheduler: send cycles and timing on a paused clock.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{MockCollector, MockPush};
use tokio::time::Instant;
use vitalwatch_agent::{
    HttpOutcome, PushOutcome, ScheduleTiming, TelemetryScheduler, fresh_vitals_channel,
};
use vitalwatch_core::{LatestVitals, SENSORS_EVENT};

fn scheduler(
    collector: &Arc<MockCollector>,
    push: &Arc<MockPush>,
    heart_rate: i32,
) -> Arc<TelemetryScheduler<MockCollector, MockPush>> {
    let vitals = Arc::new(LatestVitals::new());
    vitals.set_heart_rate(heart_rate);
    Arc::new(TelemetryScheduler::new(
        Arc::clone(collector),
        Arc::clone(push),
        vitals,
        "00042",
    ))
}

// ---------------------------------------------------------------------------
// Send cycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cycle_sends_on_both_channels() {
    let collector = Arc::new(MockCollector::default());
    let push = Arc::new(MockPush::connected());
    let sched = scheduler(&collector, &push, 72);

    let report = sched.send_cycle().await;
    assert_eq!(report.push, PushOutcome::Sent);
    assert_eq!(report.http, HttpOutcome::Delivered { status: 200 });

    let record = &collector.vitals()[0];
    assert_eq!(record.patient_id, "00042");
    assert_eq!(record.heart_rate, 72);
    assert!((95..=100).contains(&record.oxygen_saturation));
    assert!((110..140).contains(&record.systolic_pressure));
    assert!((70..90).contains(&record.diastolic_pressure));
    assert!((36.0..38.0).contains(&record.body_temperature));
    assert!(record.glucose.is_none());
    assert_eq!(record.time_stamp % 60_000, 0, "seconds must be zeroed");

    let emitted = push.emitted();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].0, SENSORS_EVENT);
    assert_eq!(emitted[0].1["heart_rate"], 72);
    assert!(emitted[0].1["glucose"].is_null());
}

#[tokio::test]
async fn unworn_cycle_reports_zeros() {
    let collector = Arc::new(MockCollector::default());
    let push = Arc::new(MockPush::connected());
    let sched = scheduler(&collector, &push, 0);

    sched.send_cycle().await;
    let record = &collector.vitals()[0];
    assert_eq!(record.heart_rate, 0);
    assert_eq!(record.oxygen_saturation, 0);
    assert_eq!(record.respiratory_rate, 0);
    assert_eq!(record.body_temperature, 0.0);
}

#[tokio::test]
async fn disconnected_push_still_posts() {
    let collector = Arc::new(MockCollector::default());
    let push = Arc::new(MockPush::default());
    let sched = scheduler(&collector, &push, 72);

    let report = sched.send_cycle().await;
    assert_eq!(report.push, PushOutcome::SkippedDisconnected);
    assert!(report.http.is_delivered());
    assert_eq!(collector.vitals_count(), 1);
    assert!(push.emitted().is_empty());

    let counts = sched.counts();
    assert_eq!(counts.push_skipped, 1);
    assert_eq!(counts.http_delivered, 1);
}

#[tokio::test]
async fn http_failure_does_not_affect_push() {
    let collector = Arc::new(MockCollector::default());
    collector.fail_vitals.store(true, Ordering::SeqCst);
    let push = Arc::new(MockPush::connected());
    let sched = scheduler(&collector, &push, 72);

    let report = sched.send_cycle().await;
    assert_eq!(report.push, PushOutcome::Sent);
    assert!(!report.http.is_delivered());

    let counts = sched.counts();
    assert_eq!(counts.push_sent, 1);
    assert_eq!(counts.http_failed, 1);
    assert!(matches!(counts.last_http, Some(HttpOutcome::Failed { .. })));
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

fn offsets(collector: &MockCollector, origin: Instant) -> Vec<u64> {
    collector
        .vitals_times()
        .into_iter()
        .map(|t| (t - origin).as_secs())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn on_demand_send_keeps_periodic_phase() {
    let collector = Arc::new(MockCollector::default());
    let push = Arc::new(MockPush::default());
    let sched = scheduler(&collector, &push, 72);
    let (trigger, requests) = fresh_vitals_channel();
    let timing = ScheduleTiming {
        initial_delay: Duration::from_secs(10),
        interval: Duration::from_secs(300),
    };

    let origin = Instant::now();
    let task = tokio::spawn(Arc::clone(&sched).run(timing, requests));

    tokio::time::sleep_until(origin + Duration::from_secs(5)).await;
    assert_eq!(collector.vitals_count(), 0, "nothing before the aligned start");

    tokio::time::sleep_until(origin + Duration::from_secs(11)).await;
    assert_eq!(offsets(&collector, origin), vec![10]);

    tokio::time::sleep_until(origin + Duration::from_secs(100)).await;
    assert!(trigger.fire());
    tokio::time::sleep_until(origin + Duration::from_secs(101)).await;
    assert_eq!(offsets(&collector, origin), vec![10, 100]);

    tokio::time::sleep_until(origin + Duration::from_secs(611)).await;
    assert_eq!(offsets(&collector, origin), vec![10, 100, 310, 610]);

    let counts = sched.counts();
    assert_eq!(counts.periodic_cycles, 3);
    assert_eq!(counts.on_demand_cycles, 1);

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn aborted_scheduler_sends_nothing_more() {
    let collector = Arc::new(MockCollector::default());
    let push = Arc::new(MockPush::default());
    let sched = scheduler(&collector, &push, 72);
    let (trigger, requests) = fresh_vitals_channel();

    let task = tokio::spawn(sched.run(ScheduleTiming::immediate(Duration::from_secs(300)), requests));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(collector.vitals_count(), 1);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert!(!trigger.fire(), "receiver dropped with the task");
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(collector.vitals_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn closed_request_channel_keeps_periodic_sends() {
    let collector = Arc::new(MockCollector::default());
    let push = Arc::new(MockPush::default());
    let sched = scheduler(&collector, &push, 72);
    let (trigger, requests) = fresh_vitals_channel();
    drop(trigger);

    let task = tokio::spawn(sched.run(ScheduleTiming::immediate(Duration::from_secs(300)), requests));
    tokio::time::sleep(Duration::from_secs(601)).await;
    assert_eq!(collector.vitals_count(), 3);
    task.abort();
}
