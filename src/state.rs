use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// One reported position sample from the positioning subsystem. Immutable;
/// superseded by the next fix, never edited in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    pub accuracy: f32,
    /// Satellite-derived speed in m/s, absent when the provider has no speed
    /// capability.
    pub speed: Option<f32>,
    /// The fix's own timestamp, ms since epoch.
    pub timestamp_ms: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingStatus {
    Active,
    Waiting,
}

/// Latest fused tracking state. `Active` iff a fix has arrived.
#[derive(Clone, Debug)]
pub struct FusedState {
    pub last_fix: Option<Fix>,
    pub fused_speed_mps: f32,
    /// When the current fix was recorded, ms since epoch. 0 before the first
    /// fix.
    pub acquired_at_ms: i64,
    pub status: TrackingStatus,
}

impl FusedState {
    fn empty() -> Self {
        FusedState {
            last_fix: None,
            fused_speed_mps: 0.0,
            acquired_at_ms: 0,
            status: TrackingStatus::Waiting,
        }
    }
}

/// Handle to the one piece of state shared between the acquisition side and
/// the data server. Every write goes through these methods under a single
/// lock, so a reader sees either the old or the new complete record, never a
/// torn mix.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<Mutex<FusedState>>,
}

impl SharedState {
    pub fn new() -> Self {
        SharedState {
            inner: Arc::new(Mutex::new(FusedState::empty())),
        }
    }

    /// Replace the last fix and flip status to `Active`.
    pub fn record_fix(&self, fix: Fix) {
        let mut state = self.inner.lock().unwrap();
        state.last_fix = Some(fix);
        state.status = TrackingStatus::Active;
        state.acquired_at_ms = Utc::now().timestamp_millis();
    }

    /// Store the estimator's latest speed. Clamped at zero; the estimate is
    /// monotonically non-negative.
    pub fn record_speed(&self, speed_mps: f32) {
        let mut state = self.inner.lock().unwrap();
        state.fused_speed_mps = speed_mps.max(0.0);
    }

    pub fn snapshot(&self) -> FusedState {
        self.inner.lock().unwrap().clone()
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().unwrap().status == TrackingStatus::Active
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(lat: f64, lon: f64) -> Fix {
        Fix {
            latitude: lat,
            longitude: lon,
            accuracy: 5.0,
            speed: None,
            timestamp_ms: 1000,
        }
    }

    #[test]
    fn starts_waiting_with_zeroed_fields() {
        let state = SharedState::new();
        let snap = state.snapshot();
        assert!(snap.last_fix.is_none());
        assert_eq!(snap.status, TrackingStatus::Waiting);
        assert_eq!(snap.fused_speed_mps, 0.0);
        assert_eq!(snap.acquired_at_ms, 0);
    }

    #[test]
    fn recording_a_fix_activates() {
        let state = SharedState::new();
        state.record_fix(fix(37.0, -122.0));

        let snap = state.snapshot();
        assert_eq!(snap.status, TrackingStatus::Active);
        assert!(state.is_active());
        assert!(snap.acquired_at_ms > 0);
        assert_eq!(snap.last_fix.unwrap().latitude, 37.0);
    }

    #[test]
    fn fixes_are_superseded_not_merged() {
        let state = SharedState::new();
        state.record_fix(fix(37.0, -122.0));
        state.record_fix(fix(38.0, -121.0));

        let last = state.snapshot().last_fix.unwrap();
        assert_eq!(last.latitude, 38.0);
        assert_eq!(last.longitude, -121.0);
    }

    #[test]
    fn speed_writes_are_clamped_non_negative() {
        let state = SharedState::new();
        state.record_speed(-1.5);
        assert_eq!(state.snapshot().fused_speed_mps, 0.0);

        state.record_speed(3.25);
        assert_eq!(state.snapshot().fused_speed_mps, 3.25);
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let state = SharedState::new();
        state.record_fix(fix(37.0, -122.0));
        let snap = state.snapshot();

        state.record_fix(fix(40.0, -100.0));
        assert_eq!(snap.last_fix.unwrap().latitude, 37.0);
    }
}
