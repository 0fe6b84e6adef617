//! Raw sensor readings and the motion sample built from them.
//!
//! Accelerometer ticks drive sampling. The gyroscope is latest-value-only: a
//! [`MotionSample`] pairs each accelerometer reading with whatever gyroscope
//! reading was observed most recently, not with a simultaneous read.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Three-axis reading from the accelerometer or the gyroscope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Axis3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Axis3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm of the three axes.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// One accelerometer tick, joined with the last-known gyroscope reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionSample {
    pub accel: Axis3,
    pub gyro: Axis3,
    /// Monotonic milliseconds.
    pub timestamp: u64,
}

impl MotionSample {
    pub fn new(accel: Axis3, gyro: Axis3, timestamp: u64) -> Self {
        Self {
            accel,
            gyro,
            timestamp,
        }
    }

    /// Accelerometer magnitude, the quantity the detector thresholds on.
    pub fn magnitude(&self) -> f32 {
        self.accel.magnitude()
    }
}

/// Holds the most recent gyroscope reading for pairing with accelerometer
/// ticks arriving on another delivery thread.
#[derive(Debug, Default)]
pub struct GyroLatch {
    latest: Mutex<Axis3>,
}

impl GyroLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, reading: Axis3) {
        *self
            .latest
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = reading;
    }

    pub fn load(&self) -> Axis3 {
        *self
            .latest
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Build a motion sample from an accelerometer tick and the latched gyro.
    pub fn pair(&self, accel: Axis3, timestamp: u64) -> MotionSample {
        MotionSample::new(accel, self.load(), timestamp)
    }
}
