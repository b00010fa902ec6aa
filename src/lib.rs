pub mod config;
pub mod controller;
pub mod error;
pub mod estimator;
pub mod location;
pub mod sensors;
pub mod server;
pub mod state;

pub use config::{AuthConfig, PrefsStore, TokenSource};
pub use controller::AcquisitionController;
pub use error::{TrackerError, TrackerResult};
pub use estimator::{AccelerationSample, SpeedFusionEstimator};
pub use location::LocationSource;
pub use server::{DataServer, LocationResponse, API_PATH};
pub use state::{Fix, FusedState, SharedState, TrackingStatus};
