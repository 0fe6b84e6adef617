//! Agent lifecycle and end-to-end flow with mock transports.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use common::{MockCollector, MockPush, test_config, wait_until};
use vitalwatch_agent::{Agent, AgentControl, AgentError, Lifecycle, ScheduleTiming};
use vitalwatch_core::{AgentConfig, BUFFER_SIZE, WearTransition};

type TestAgent = Agent<MockCollector, MockPush>;

fn agent(collector: &Arc<MockCollector>) -> TestAgent {
    Agent::new(test_config(), Arc::clone(collector), Arc::new(MockPush::default())).unwrap()
}

/// Schedule far enough out that no periodic cycle interferes.
fn quiet_timing() -> ScheduleTiming {
    ScheduleTiming {
        initial_delay: Duration::from_secs(3600),
        interval: Duration::from_secs(300),
    }
}

/// Feed a calm lead-in followed by a sustained spike long enough to
/// complete exactly one capture.
fn feed_fall(agent: &TestAgent, ts: &mut u64) {
    for _ in 0..400 {
        agent.on_accelerometer(0.0, 0.0, 9.8, *ts);
        *ts += 20;
    }
    for _ in 0..344 {
        agent.on_accelerometer(40.0, 30.0, 20.0, *ts);
        *ts += 20;
    }
}

#[test]
fn rejects_invalid_config() {
    let config = AgentConfig {
        server_url: String::new(),
        ..AgentConfig::default()
    };
    let result = TestAgent::new(
        config,
        Arc::new(MockCollector::default()),
        Arc::new(MockPush::default()),
    );
    assert!(matches!(result, Err(AgentError::Config(_))));
}

#[test]
fn callbacks_ignored_until_started() {
    let agent = agent(&Arc::new(MockCollector::default()));
    assert_eq!(agent.lifecycle(), Lifecycle::Stopped);
    assert!(!agent.on_accelerometer(0.0, 0.0, 9.8, 0));
    assert!(!agent.on_gyroscope(0.1, 0.1, 0.1));
    assert_eq!(agent.on_pulse(72, 0), None);
    assert!(!agent.request_fresh_vitals());

    let status = agent.status();
    assert_eq!(status.samples_ignored, 3);
    assert_eq!(status.engine.history_len, 0);
    assert_eq!(status.vitals.heart_rate, 0);
}

#[tokio::test(start_paused = true)]
async fn double_start_is_refused() {
    let agent = agent(&Arc::new(MockCollector::default()));
    agent.start_with_timing(quiet_timing()).unwrap();
    assert!(matches!(
        agent.start_with_timing(quiet_timing()),
        Err(AgentError::NotStopped(Lifecycle::Running))
    ));
    agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn fall_is_dispatched_with_gyro_readings() {
    let collector = Arc::new(MockCollector::confirming());
    let agent = agent(&collector);
    agent.start_with_timing(quiet_timing()).unwrap();
    assert!(agent.is_running());

    assert_eq!(agent.on_pulse(72, 0), Some(WearTransition::BecameWorn));
    assert!(agent.on_gyroscope(0.5, -0.5, 0.25));
    let mut ts = 0;
    feed_fall(&agent, &mut ts);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let sent = collector.analyses();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].motion_data.len(), BUFFER_SIZE);
    assert_eq!(sent[0].motion_data[0].gyroscope.x, 0.5);
    assert_eq!(sent[0].patient_id, "00001");

    let status = agent.status();
    assert_eq!(status.dispatch.confirmed, 1);
    assert_eq!(status.engine.stats.events_emitted, 1);
    assert!(!status.engine.collecting);
    assert!(status.worn);

    agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unworn_device_never_captures() {
    let collector = Arc::new(MockCollector::confirming());
    let agent = agent(&collector);
    agent.start_with_timing(quiet_timing()).unwrap();

    assert_eq!(agent.on_pulse(0, 0), Some(WearTransition::Unchanged));
    let mut ts = 0;
    feed_fall(&agent, &mut ts);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(collector.analyses().is_empty());
    let status = agent.status();
    assert_eq!(status.engine.history_len, 0);
    assert_eq!(status.engine.stats.samples_dropped_unworn, 744);

    agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn fresh_vitals_request_sends_latest_heart_rate() {
    let collector = Arc::new(MockCollector::default());
    let agent = agent(&collector);
    agent.start_with_timing(quiet_timing()).unwrap();

    agent.on_pulse(81, 0);
    assert!(AgentControl::request_fresh_vitals(&agent));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let records = collector.vitals();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].heart_rate, 81);
    assert_eq!(agent.status().telemetry.on_demand_cycles, 1);

    agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_everything_and_allows_restart() {
    let collector = Arc::new(MockCollector::default());
    let agent = agent(&collector);
    agent
        .start_with_timing(ScheduleTiming::immediate(Duration::from_secs(300)))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(collector.vitals_count(), 1);

    agent.on_pulse(72, 0);
    for i in 0..20 {
        agent.on_accelerometer(0.0, 0.0, 9.8, i);
    }
    assert_eq!(agent.status().engine.history_len, 20);

    agent.shutdown().await;
    assert_eq!(agent.lifecycle(), Lifecycle::Stopped);
    assert_eq!(agent.status().engine.history_len, 0);
    assert!(!agent.on_accelerometer(0.0, 0.0, 9.8, 21));
    assert!(!agent.request_fresh_vitals());

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(collector.vitals_count(), 1, "no sends after shutdown");

    agent.start_with_timing(quiet_timing()).unwrap();
    assert_eq!(agent.lifecycle(), Lifecycle::Running);
    agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn restart_needs_a_fresh_pulse() {
    let agent = agent(&Arc::new(MockCollector::default()));
    agent.start_with_timing(quiet_timing()).unwrap();
    assert_eq!(agent.on_pulse(72, 0), Some(WearTransition::BecameWorn));
    agent.shutdown().await;

    let status = agent.status();
    assert!(!status.worn);
    assert_eq!(status.vitals.heart_rate, 0);

    agent.start_with_timing(quiet_timing()).unwrap();
    for i in 0..10 {
        assert!(agent.on_accelerometer(0.0, 0.0, 9.8, i));
    }
    let status = agent.status();
    assert_eq!(status.engine.history_len, 0);
    assert_eq!(status.engine.stats.samples_dropped_unworn, 10);

    assert_eq!(agent.on_pulse(70, 1000), Some(WearTransition::BecameWorn));
    agent.on_accelerometer(0.0, 0.0, 9.8, 11);
    assert_eq!(agent.status().engine.history_len, 1);
    agent.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_leaves_no_samples_from_racing_callbacks() {
    let agent = Arc::new(agent(&Arc::new(MockCollector::default())));
    agent.start_with_timing(quiet_timing()).unwrap();
    agent.on_pulse(72, 0);

    let stop = Arc::new(AtomicBool::new(false));
    let feeder = {
        let agent = Arc::clone(&agent);
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            let mut ts = 0;
            while !stop.load(Ordering::SeqCst) {
                agent.on_accelerometer(0.0, 0.0, 9.8, ts);
                ts += 1;
            }
        })
    };

    assert!(wait_until(|| agent.status().engine.history_len > 0).await);
    agent.shutdown().await;
    assert_eq!(agent.status().engine.history_len, 0);

    // Keep feeding for a while after the stop.
    assert!(wait_until(|| agent.status().samples_ignored > 100).await);
    stop.store(true, Ordering::SeqCst);
    feeder.join().unwrap();

    let status = agent.status();
    assert_eq!(status.lifecycle, Lifecycle::Stopped);
    assert_eq!(status.engine.history_len, 0);
    assert!(!status.engine.collecting);
}
