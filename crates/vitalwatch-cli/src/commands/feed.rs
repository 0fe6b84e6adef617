//! Sensor feeds for `vitalwatch run`: CSV replay and a synthetic wearer.
//!
//! Feeds run on a plain thread and call the agent's sensor callbacks the way
//! a device sensor service would, paced in real time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::Rng;
use vitalwatch_agent::{Agent, CollectorClient, PushChannel};
use vitalwatch_core::Axis3;

/// One sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Accel(Axis3),
    Gyro(Axis3),
    Pulse(i32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayRow {
    pub timestamp_ms: u64,
    pub reading: Reading,
}

/// Parse `timestamp_ms,kind,v1,v2,v3` rows. A header line, blank lines and
/// `#` comments are skipped. Pulse rows only need `v1`.
pub fn parse_replay(text: &str) -> Result<Vec<ReplayRow>, String> {
    let mut rows = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("timestamp") {
            continue;
        }
        let lineno = idx + 1;
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 3 {
            return Err(format!("line {lineno}: expected timestamp_ms,kind,v1[,v2,v3]"));
        }
        let timestamp_ms: u64 = fields[0]
            .parse()
            .map_err(|_| format!("line {lineno}: bad timestamp '{}'", fields[0]))?;

        let axis = || -> Result<Axis3, String> {
            if fields.len() < 5 {
                return Err(format!("line {lineno}: {} needs three values", fields[1]));
            }
            let v = |i: usize| {
                fields[i]
                    .parse::<f32>()
                    .map_err(|_| format!("line {lineno}: bad value '{}'", fields[i]))
            };
            Ok(Axis3::new(v(2)?, v(3)?, v(4)?))
        };

        let reading = match fields[1].to_ascii_lowercase().as_str() {
            "accel" | "accelerometer" => Reading::Accel(axis()?),
            "gyro" | "gyroscope" => Reading::Gyro(axis()?),
            "pulse" | "hr" => {
                let bpm: f64 = fields[2]
                    .parse()
                    .map_err(|_| format!("line {lineno}: bad pulse '{}'", fields[2]))?;
                Reading::Pulse(bpm.round() as i32)
            }
            other => return Err(format!("line {lineno}: unknown sensor kind '{other}'")),
        };
        rows.push(ReplayRow {
            timestamp_ms,
            reading,
        });
    }
    Ok(rows)
}

/// Counts of readings delivered to the agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub accel: u64,
    pub gyro: u64,
    pub pulse: u64,
}

fn deliver<C: CollectorClient, P: PushChannel>(
    agent: &Agent<C, P>,
    reading: Reading,
    timestamp_ms: u64,
    stats: &mut FeedStats,
) {
    match reading {
        Reading::Accel(a) => {
            if agent.on_accelerometer(a.x, a.y, a.z, timestamp_ms) {
                stats.accel += 1;
            }
        }
        Reading::Gyro(g) => {
            if agent.on_gyroscope(g.x, g.y, g.z) {
                stats.gyro += 1;
            }
        }
        Reading::Pulse(bpm) => {
            if let Some(transition) = agent.on_pulse(bpm, timestamp_ms) {
                stats.pulse += 1;
                log::debug!("pulse {bpm} bpm: {transition}");
            }
        }
    }
}

/// Sleep until `deadline`, waking early if `running` is cleared.
fn sleep_until(deadline: Instant, running: &AtomicBool) -> bool {
    loop {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
}

/// Play rows with their recorded spacing.
pub fn play_replay<C: CollectorClient, P: PushChannel>(
    agent: &Agent<C, P>,
    rows: &[ReplayRow],
    running: &AtomicBool,
) -> FeedStats {
    let mut stats = FeedStats::default();
    let Some(first) = rows.first() else {
        return stats;
    };
    let origin = Instant::now();
    for row in rows {
        let offset = Duration::from_millis(row.timestamp_ms.saturating_sub(first.timestamp_ms));
        if !sleep_until(origin + offset, running) {
            break;
        }
        deliver(agent, row.reading, row.timestamp_ms, &mut stats);
    }
    stats
}

// ---------------------------------------------------------------------------
// Synthetic wearer
// ---------------------------------------------------------------------------

const GRAVITY: f32 = 9.81;
/// Length of the injected impact burst, in samples.
const FALL_SAMPLES: usize = 12;

/// Settings for the synthetic feed.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticFeed {
    pub rate_hz: f64,
    pub fall_at: Option<Duration>,
}

impl SyntheticFeed {
    fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz.clamp(1.0, 1000.0))
    }
}

/// Resting wrist: gravity plus a little tremor.
fn resting_accel<R: Rng + ?Sized>(rng: &mut R) -> Axis3 {
    Axis3::new(
        rng.random_range(-0.3..0.3),
        rng.random_range(-0.3..0.3),
        GRAVITY + rng.random_range(-0.3..0.3),
    )
}

/// Violent multi-axis motion, well above the detection threshold.
fn impact_accel<R: Rng + ?Sized>(rng: &mut R) -> Axis3 {
    Axis3::new(
        rng.random_range(40.0..55.0),
        rng.random_range(-45.0..-30.0),
        rng.random_range(25.0..40.0),
    )
}

fn small_gyro<R: Rng + ?Sized>(rng: &mut R) -> Axis3 {
    Axis3::new(
        rng.random_range(-0.05..0.05),
        rng.random_range(-0.05..0.05),
        rng.random_range(-0.05..0.05),
    )
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Generate readings until `running` is cleared: accelerometer and gyroscope
/// at the configured rate, one pulse per second.
pub fn play_synthetic<C: CollectorClient, P: PushChannel>(
    agent: &Agent<C, P>,
    feed: SyntheticFeed,
    running: &AtomicBool,
) -> FeedStats {
    let mut rng = rand::rng();
    let mut stats = FeedStats::default();
    let period = feed.period();
    let origin = Instant::now();
    let mut next = origin;
    let mut next_pulse = origin;
    let mut fall_remaining = 0usize;
    let mut fall_pending = feed.fall_at;
    let mut heart_rate: i32 = 72;

    while sleep_until(next, running) {
        let ts = epoch_ms();

        if next >= next_pulse {
            heart_rate = (heart_rate + rng.random_range(-2..=2)).clamp(58, 96);
            deliver(agent, Reading::Pulse(heart_rate), ts, &mut stats);
            next_pulse += Duration::from_secs(1);
        }

        if let Some(at) = fall_pending
            && next.duration_since(origin) >= at
        {
            log::info!("injecting synthetic fall");
            fall_pending = None;
            fall_remaining = FALL_SAMPLES;
        }

        let accel = if fall_remaining > 0 {
            fall_remaining -= 1;
            impact_accel(&mut rng)
        } else {
            resting_accel(&mut rng)
        };
        deliver(agent, Reading::Gyro(small_gyro(&mut rng)), ts, &mut stats);
        deliver(agent, Reading::Accel(accel), ts, &mut stats);

        next += period;
    }
    stats
}
