use crate::estimator::{AccelerationSample, SpeedFusionEstimator};
use crate::location::LocationSource;
use crate::state::{Fix, SharedState};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Cadence for re-attempting location acquisition while no fix has arrived
/// or the positioning privilege is missing.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(5000);

/// Keeps a best-effort stream of fixes flowing from the location source into
/// the shared state, self-healing while acquisition is not yet active.
///
/// Every `FusedState` write happens on the task spawned by
/// [`start`](AcquisitionController::start); [`stop`](AcquisitionController::stop)
/// joins that task, so no write can land after it returns.
pub struct AcquisitionController {
    state: SharedState,
    source: Arc<dyn LocationSource>,
    retry_interval: Duration,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl AcquisitionController {
    pub fn new(state: SharedState, source: Arc<dyn LocationSource>) -> Self {
        AcquisitionController {
            state,
            source,
            retry_interval: RETRY_INTERVAL,
            shutdown: None,
            task: None,
        }
    }

    /// Override the retry cadence. Test hook; production uses
    /// [`RETRY_INTERVAL`].
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Spawn the acquisition task. `samples` is the inertial delivery path
    /// feeding the speed estimator. No-op when already started.
    pub fn start(&mut self, samples: mpsc::Receiver<AccelerationSample>) {
        if self.task.is_some() {
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = AcquisitionWorker {
            state: self.state.clone(),
            source: Arc::clone(&self.source),
            retry_interval: self.retry_interval,
        };

        self.shutdown = Some(shutdown_tx);
        self.task = Some(tokio::spawn(worker.run(samples, shutdown_rx)));
        info!("acquisition controller started");
    }

    /// Stop the acquisition task and unregister from the location source.
    /// Idempotent, and safe to call from a different task than the one
    /// driving retries.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.task.take() {
            if task.await.is_err() {
                warn!("acquisition task ended abnormally");
            }
            info!("acquisition controller stopped");
        }
    }
}

struct AcquisitionWorker {
    state: SharedState,
    source: Arc<dyn LocationSource>,
    retry_interval: Duration,
}

impl AcquisitionWorker {
    async fn run(
        self,
        mut samples: mpsc::Receiver<AccelerationSample>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        // The worker keeps its own sender alive, so `fix_rx` never closes
        // while the loop runs.
        let (fix_tx, mut fix_rx) = mpsc::channel::<Fix>(32);
        let mut estimator = SpeedFusionEstimator::new();

        let mut retry = interval(self.retry_interval);
        retry.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                Some(fix) = fix_rx.recv() => {
                    debug!(
                        "fix received: {:.6}, {:.6} (±{:.1} m)",
                        fix.latitude, fix.longitude, fix.accuracy
                    );
                    self.state.record_fix(fix);
                }
                Some(sample) = samples.recv() => {
                    let speed = estimator.update(&sample);
                    self.state.record_speed(speed);
                }
                _ = retry.tick() => {
                    // Once a fix is in and the privilege holds, the tick is
                    // a no-op; acquisition is not re-attempted until a check
                    // cycle finds it missing again.
                    if !self.source.has_permission() || !self.state.is_active() {
                        self.attempt_start(&fix_tx);
                    }
                }
            }
        }

        self.source.end_updates();
    }

    /// One acquisition attempt. Privilege denial is the expected steady
    /// state while waiting for a grant; start failures are logged and
    /// retried on the next tick. Neither escapes the controller.
    fn attempt_start(&self, fix_tx: &mpsc::Sender<Fix>) {
        if !self.source.has_permission() {
            debug!("positioning permission not granted, waiting");
            return;
        }

        match self.source.begin_updates(fix_tx.clone()) {
            Ok(()) => {
                if let Some(fix) = self.source.last_known_fix() {
                    self.state.record_fix(fix);
                }
            }
            Err(e) => warn!("acquisition attempt failed: {}", e),
        }
    }
}
