//! Latest observed vital signs and the simulated producer for the values the
//! watch cannot measure.
//!
//! Each field is an independent atomic. A snapshot may mix readings from
//! slightly different instants, which the telemetry cycle tolerates.

use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Values supplied by the simulated producer rather than a sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatedVitals {
    pub oxygen_saturation: u32,
    pub systolic_pressure: u32,
    pub diastolic_pressure: u32,
    pub body_temperature: f64,
    pub respiratory_rate: u32,
}

impl SimulatedVitals {
    /// Draw a plausible set of readings. A zero heart rate (device off the
    /// wrist) yields all zeros.
    pub fn generate<R: Rng + ?Sized>(heart_rate: i32, rng: &mut R) -> Self {
        if heart_rate <= 0 {
            return Self::default();
        }
        let respiratory_rate = match rng.random_range(0..200) {
            0 => rng.random_range(7..=8),
            1..=4 => 11,
            195..=196 => 21,
            197 => rng.random_range(28..=30),
            _ => rng.random_range(12..=20),
        };
        Self {
            oxygen_saturation: rng.random_range(95..=100),
            systolic_pressure: rng.random_range(110..140),
            diastolic_pressure: rng.random_range(70..90),
            body_temperature: 36.0 + rng.random_range(0.0..2.0),
            respiratory_rate,
        }
    }
}

/// Point-in-time copy of [`LatestVitals`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalsSnapshot {
    pub heart_rate: i32,
    #[serde(flatten)]
    pub simulated: SimulatedVitals,
}

/// Last-written-wins store shared between sensor callbacks and the
/// telemetry scheduler.
#[derive(Debug, Default)]
pub struct LatestVitals {
    heart_rate: AtomicI32,
    oxygen_saturation: AtomicU32,
    systolic_pressure: AtomicU32,
    diastolic_pressure: AtomicU32,
    body_temperature_bits: AtomicU64,
    respiratory_rate: AtomicU32,
}

impl LatestVitals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_heart_rate(&self, bpm: i32) {
        self.heart_rate.store(bpm, Ordering::Relaxed);
    }

    pub fn heart_rate(&self) -> i32 {
        self.heart_rate.load(Ordering::Relaxed)
    }

    pub fn set_simulated(&self, v: SimulatedVitals) {
        self.oxygen_saturation
            .store(v.oxygen_saturation, Ordering::Relaxed);
        self.systolic_pressure
            .store(v.systolic_pressure, Ordering::Relaxed);
        self.diastolic_pressure
            .store(v.diastolic_pressure, Ordering::Relaxed);
        self.body_temperature_bits
            .store(v.body_temperature.to_bits(), Ordering::Relaxed);
        self.respiratory_rate
            .store(v.respiratory_rate, Ordering::Relaxed);
    }

    /// Regenerate the simulated fields from the current heart rate.
    pub fn refresh_simulated<R: Rng + ?Sized>(&self, rng: &mut R) -> SimulatedVitals {
        let v = SimulatedVitals::generate(self.heart_rate(), rng);
        self.set_simulated(v);
        v
    }

    pub fn snapshot(&self) -> VitalsSnapshot {
        VitalsSnapshot {
            heart_rate: self.heart_rate(),
            simulated: SimulatedVitals {
                oxygen_saturation: self.oxygen_saturation.load(Ordering::Relaxed),
                systolic_pressure: self.systolic_pressure.load(Ordering::Relaxed),
                diastolic_pressure: self.diastolic_pressure.load(Ordering::Relaxed),
                body_temperature: f64::from_bits(
                    self.body_temperature_bits.load(Ordering::Relaxed),
                ),
                respiratory_rate: self.respiratory_rate.load(Ordering::Relaxed),
            },
        }
    }
}
