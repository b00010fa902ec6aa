use crate::error::TrackerError;
use crate::estimator::AccelerationSample;
use crate::location::LocationSource;
use crate::state::Fix;
use chrono::Utc;
use log::{debug, info};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

/// Feed simulated linear-acceleration samples at ~20 Hz until the receiver
/// goes away.
pub async fn accel_loop(tx: Sender<AccelerationSample>) {
    let mut ticker = interval(Duration::from_millis(50));
    let mut sample_count = 0u64;

    loop {
        ticker.tick().await;

        match tx.try_send(simulated_accel_sample()) {
            Ok(_) => {
                sample_count += 1;
                if sample_count % 200 == 0 {
                    debug!("[accel] {} samples", sample_count);
                }
            }
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                debug!("[accel] channel closed after {} samples", sample_count);
                break;
            }
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                // Consumer is behind, drop this sample
            }
        }
    }
}

fn simulated_accel_sample() -> AccelerationSample {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let t = COUNTER.fetch_add(1, Ordering::Relaxed) as f64 * 0.05;

    AccelerationSample {
        x: ((t * 2.0 * PI).sin() * 0.6) as f32,
        y: ((t * 2.0 * PI).cos() * 0.4) as f32,
        z: ((t * PI).sin() * 0.2) as f32,
        timestamp_ms: Utc::now().timestamp_millis(),
    }
}

/// Stand-in for the platform location provider: once updates are started it
/// emits a slowly drifting walk at a 1 s cadence. Permission can be toggled
/// externally to exercise the controller's retry path.
pub struct SimulatedLocationSource {
    permission: AtomicBool,
    last_fix: Arc<Mutex<Option<Fix>>>,
    feed: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedLocationSource {
    pub fn new(permission_granted: bool) -> Arc<Self> {
        Arc::new(SimulatedLocationSource {
            permission: AtomicBool::new(permission_granted),
            last_fix: Arc::new(Mutex::new(None)),
            feed: Mutex::new(None),
        })
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }
}

fn simulated_fix() -> Fix {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed) as f64;

    Fix {
        latitude: 37.7749 + seq * 0.00001,
        longitude: -122.4194 + seq * 0.00001,
        accuracy: (5.0 + (seq * 0.1).sin() * 2.0) as f32,
        speed: Some(((seq * 0.5).sin().abs() * 1.2) as f32),
        timestamp_ms: Utc::now().timestamp_millis(),
    }
}

impl LocationSource for SimulatedLocationSource {
    fn has_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    // Must run inside a tokio runtime: the fix feed is a spawned task.
    fn begin_updates(&self, sink: Sender<Fix>) -> Result<(), TrackerError> {
        if !self.has_permission() {
            return Err(TrackerError::PrivilegeDenied);
        }

        let mut feed = self.feed.lock().unwrap();
        if let Some(previous) = feed.take() {
            previous.abort();
        }

        let last_fix = Arc::clone(&self.last_fix);
        *feed = Some(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                let fix = simulated_fix();
                *last_fix.lock().unwrap() = Some(fix.clone());
                if sink.send(fix).await.is_err() {
                    break;
                }
            }
        }));

        info!("simulated location updates started");
        Ok(())
    }

    fn end_updates(&self) {
        if let Some(feed) = self.feed.lock().unwrap().take() {
            feed.abort();
        }
    }

    fn last_known_fix(&self) -> Option<Fix> {
        self.last_fix.lock().unwrap().clone()
    }
}
