use serde::{Deserialize, Serialize};

/// One linear-acceleration sample from the inertial sensor path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccelerationSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub timestamp_ms: i64,
}

/// Exponential smoothing factor, tuned to reject hand-carried-device
/// vibration.
const SMOOTHING_ALPHA: f32 = 0.8;
/// Smoothed magnitude above this (m/s²) counts as real motion rather than
/// sensor noise.
const MOTION_THRESHOLD: f32 = 0.5;
/// Assumed sampling period. Integration uses this nominal value, not the
/// measured wall-clock delta between samples.
const NOMINAL_SAMPLE_DT: f32 = 0.1;
/// Per-sample bleed-off applied while no net acceleration is detected.
const IDLE_DECAY: f32 = 0.95;

/// Converts a stream of acceleration samples into a smoothed scalar speed
/// estimate.
///
/// Open-loop integration of acceleration with no zero-velocity correction:
/// the estimate drifts. That is accepted behavior, not something to correct
/// here.
pub struct SpeedFusionEstimator {
    smoothed_magnitude: f32,
    speed_mps: f32,
}

impl SpeedFusionEstimator {
    pub fn new() -> Self {
        SpeedFusionEstimator {
            smoothed_magnitude: 0.0,
            speed_mps: 0.0,
        }
    }

    /// Feed one sample and return the updated speed estimate. The result is
    /// never negative.
    pub fn update(&mut self, sample: &AccelerationSample) -> f32 {
        let magnitude =
            (sample.x * sample.x + sample.y * sample.y + sample.z * sample.z).sqrt();

        self.smoothed_magnitude =
            self.smoothed_magnitude * SMOOTHING_ALPHA + magnitude * (1.0 - SMOOTHING_ALPHA);

        if self.smoothed_magnitude > MOTION_THRESHOLD {
            self.speed_mps += self.smoothed_magnitude * NOMINAL_SAMPLE_DT;
        } else {
            self.speed_mps *= IDLE_DECAY;
        }

        if self.speed_mps < 0.0 {
            self.speed_mps = 0.0;
        }

        self.speed_mps
    }

    pub fn speed_mps(&self) -> f32 {
        self.speed_mps
    }
}

impl Default for SpeedFusionEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(x: f32, y: f32, z: f32) -> AccelerationSample {
        AccelerationSample {
            x,
            y,
            z,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn first_motion_sample_integrates_smoothed_magnitude() {
        let mut est = SpeedFusionEstimator::new();

        // |(3, 0, 4)| = 5, smoothed = 0.8*0 + 0.2*5 = 1.0 > threshold,
        // speed = 1.0 * 0.1
        let speed = est.update(&sample(3.0, 0.0, 4.0));
        assert_relative_eq!(speed, 0.1, epsilon = 1e-6);

        // smoothed = 0.8*1.0 + 0.2*5 = 1.8, speed += 0.18
        let speed = est.update(&sample(3.0, 0.0, 4.0));
        assert_relative_eq!(speed, 0.28, epsilon = 1e-6);
    }

    #[test]
    fn sensor_noise_below_threshold_never_builds_speed() {
        let mut est = SpeedFusionEstimator::new();

        // Magnitude 0.3 converges below the 0.5 m/s² motion threshold.
        for _ in 0..500 {
            let speed = est.update(&sample(0.3, 0.0, 0.0));
            assert_eq!(speed, 0.0);
        }
    }

    #[test]
    fn speed_decays_toward_zero_when_motion_stops() {
        let mut est = SpeedFusionEstimator::new();
        for _ in 0..20 {
            est.update(&sample(2.0, 2.0, 1.0));
        }
        let peak = est.speed_mps();
        assert!(peak > 0.0);

        for _ in 0..200 {
            est.update(&sample(0.0, 0.0, 0.0));
        }
        assert!(est.speed_mps() < peak * 0.05);
        assert!(est.speed_mps() >= 0.0);
    }

    #[test]
    fn estimate_is_non_negative_for_arbitrary_sequences() {
        let mut est = SpeedFusionEstimator::new();
        let inputs = [
            (0.0, 0.0, 0.0),
            (-9.0, 4.0, -2.0),
            (0.01, -0.02, 0.005),
            (100.0, -50.0, 25.0),
            (0.0, 0.0, 0.0),
            (-0.4, 0.4, -0.1),
        ];

        for _ in 0..50 {
            for &(x, y, z) in &inputs {
                let speed = est.update(&sample(x, y, z));
                assert!(speed >= 0.0);
            }
        }
    }

    #[test]
    fn fresh_estimator_starts_at_zero() {
        let est = SpeedFusionEstimator::new();
        assert_eq!(est.speed_mps(), 0.0);
    }
}
