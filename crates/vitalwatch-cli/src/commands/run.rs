//! `vitalwatch run`: start the agent and feed it sensor data.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use vitalwatch_agent::{
    Agent, AgentControl, CollectorClient, HttpCollector, NoPush, PushChannel, ScheduleTiming,
    TcpPushChannel,
};
use vitalwatch_core::AgentConfig;

use super::feed::{self, FeedStats, ReplayRow, SyntheticFeed};

pub struct RunOptions {
    pub config: Option<String>,
    pub server_url: Option<String>,
    pub server_ip: Option<String>,
    pub patient_id: Option<String>,
    pub push_addr: Option<String>,
    pub status_port: Option<u16>,
    pub replay: Option<String>,
    pub simulate: bool,
    pub fall_at: Option<f64>,
    pub rate: f64,
    pub duration: Option<String>,
    pub no_align: bool,
}

enum Feed {
    Replay(Vec<ReplayRow>),
    Synthetic(SyntheticFeed),
}

/// Run the agent until Ctrl+C or `--duration`.
pub fn run(opts: RunOptions) {
    let mut config = super::load_config(opts.config.as_deref());
    if let Some(url) = opts.server_url {
        config.server_url = url;
    }
    if let Some(ip) = opts.server_ip
        && let Err(e) = config.set_server_ip(&ip)
    {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    if let Some(id) = opts.patient_id {
        config.patient_id = id;
    }
    if opts.push_addr.is_some() {
        config.push_address = opts.push_addr;
    }
    if opts.no_align {
        config.align_to_wall_clock = false;
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        eprintln!(
            "Set a collector with --server-ip, --server-url or `vitalwatch config set server_ip <IP>`."
        );
        std::process::exit(1);
    }

    let max_duration = opts.duration.as_deref().map(|d| {
        super::parse_duration(d).unwrap_or_else(|e| {
            eprintln!("{e}");
            std::process::exit(1);
        })
    });

    let feed = match opts.replay {
        Some(path) => {
            let text = std::fs::read_to_string(&path).unwrap_or_else(|e| {
                eprintln!("Error reading {path}: {e}");
                std::process::exit(1);
            });
            let rows = feed::parse_replay(&text).unwrap_or_else(|e| {
                eprintln!("Error in {path}: {e}");
                std::process::exit(1);
            });
            Feed::Replay(rows)
        }
        None if opts.simulate => Feed::Synthetic(SyntheticFeed {
            rate_hz: opts.rate,
            fall_at: opts.fall_at.map(|s| Duration::from_secs_f64(s.max(0.0))),
        }),
        None => {
            eprintln!("Error: choose a sensor feed with --replay <CSV> or --simulate");
            std::process::exit(1);
        }
    };

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }

    print_banner(&config, &feed, opts.status_port, max_duration);

    let rt = super::runtime();
    rt.block_on(async move {
        match config.push_address.clone() {
            Some(addr) => {
                let push = TcpPushChannel::new(addr, config.reconnect_delay());
                drive(config, push, feed, opts.status_port, max_duration, running).await;
            }
            None => drive(config, NoPush, feed, opts.status_port, max_duration, running).await,
        }
    });
}

fn print_banner(
    config: &AgentConfig,
    feed: &Feed,
    status_port: Option<u16>,
    max_duration: Option<Duration>,
) {
    println!("vitalwatch agent v{}", vitalwatch_core::VERSION);
    println!("  Patient:   {}", config.patient_id);
    println!("  Vitals:    {}", config.server_url);
    println!("  Analysis:  {}", config.analysis_url());
    match &config.push_address {
        Some(addr) => println!("  Push:      {addr}"),
        None => println!("  Push:      disabled"),
    }
    println!(
        "  Reports:   every {}s{}",
        config.report_interval_secs,
        if config.align_to_wall_clock {
            ", on wall-clock marks"
        } else {
            ""
        }
    );
    match feed {
        Feed::Replay(rows) => println!("  Feed:      replay ({} rows)", rows.len()),
        Feed::Synthetic(s) => match s.fall_at {
            Some(at) => println!(
                "  Feed:      synthetic at {} Hz, fall at {:.1}s",
                s.rate_hz,
                at.as_secs_f64()
            ),
            None => println!("  Feed:      synthetic at {} Hz", s.rate_hz),
        },
    }
    if let Some(port) = status_port {
        println!("  Status:    http://127.0.0.1:{port}/status");
    }
    match max_duration {
        Some(d) => println!("  Duration:  {}s", d.as_secs()),
        None => println!("  Duration:  until Ctrl+C"),
    }
    println!();
}

async fn drive<P: PushChannel>(
    config: AgentConfig,
    push: P,
    feed: Feed,
    status_port: Option<u16>,
    max_duration: Option<Duration>,
    running: Arc<AtomicBool>,
) {
    let collector = match HttpCollector::new(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error building HTTP client: {e}");
            std::process::exit(1);
        }
    };
    let timing = ScheduleTiming::from_config(&config);
    let agent = match Agent::new(config, Arc::new(collector), Arc::new(push)) {
        Ok(a) => Arc::new(a),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = agent.start_with_timing(timing) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let server = status_port.map(|port| {
        let control: Arc<dyn AgentControl> = agent.clone();
        tokio::spawn(async move {
            if let Err(e) = vitalwatch_server::run_server(control, "127.0.0.1", port).await {
                log::error!("status API failed: {e}");
            }
        })
    });

    let feeder = {
        let agent = Arc::clone(&agent);
        let running = Arc::clone(&running);
        std::thread::spawn(move || play(&agent, feed, &running))
    };

    let start = Instant::now();
    let mut feed_done_logged = false;
    while running.load(Ordering::SeqCst) {
        if let Some(max) = max_duration
            && start.elapsed() >= max
        {
            break;
        }
        if feeder.is_finished() && !feed_done_logged {
            log::info!("feed finished; agent keeps running until Ctrl+C");
            feed_done_logged = true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    running.store(false, Ordering::SeqCst);

    let stats = feeder.join().unwrap_or_else(|_| {
        log::error!("sensor feed thread panicked");
        FeedStats::default()
    });
    agent.shutdown().await;
    if let Some(server) = server {
        server.abort();
    }

    print_summary(&agent, stats, start.elapsed());
}

fn play<C: CollectorClient, P: PushChannel>(
    agent: &Agent<C, P>,
    source: Feed,
    running: &AtomicBool,
) -> FeedStats {
    match source {
        Feed::Replay(rows) => feed::play_replay(agent, &rows, running),
        Feed::Synthetic(s) => feed::play_synthetic(agent, s, running),
    }
}

fn print_summary<C: CollectorClient, P: PushChannel>(
    agent: &Agent<C, P>,
    fed: FeedStats,
    elapsed: Duration,
) {
    let status = agent.status();
    let engine = status.engine.stats;
    println!();
    println!("Stopped after {:.1}s", elapsed.as_secs_f64());
    println!(
        "  Sensor readings:   {} accel, {} gyro, {} pulse",
        fed.accel, fed.gyro, fed.pulse
    );
    println!(
        "  Motion samples:    {} processed, {} dropped while unworn",
        engine.samples_processed, engine.samples_dropped_unworn
    );
    println!(
        "  Detections:        {} thresholds, {} windows, {} aborted",
        engine.thresholds_detected, engine.events_emitted, engine.captures_aborted
    );
    println!(
        "  Analysis:          {} confirmed, {} not confirmed, {} failed, {} skipped",
        status.dispatch.confirmed,
        status.dispatch.not_confirmed,
        status.dispatch.failed,
        status.dispatch.skipped_unworn
    );
    println!(
        "  Vitals reports:    {} delivered, {} failed, {} pushed",
        status.telemetry.http_delivered, status.telemetry.http_failed, status.telemetry.push_sent
    );
}
