use anyhow::Result;
use clap::Parser;
use gps_tracker_rs::config::PrefsStore;
use gps_tracker_rs::controller::AcquisitionController;
use gps_tracker_rs::sensors::{accel_loop, SimulatedLocationSource};
use gps_tracker_rs::server::{DataServer, API_PATH};
use gps_tracker_rs::state::SharedState;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "gps_tracker")]
#[command(about = "Background GPS tracker serving fused position and speed over HTTP", long_about = None)]
struct Args {
    /// Prefs file holding the access token and listening port
    #[arg(long, default_value = "gps_prefs.json")]
    prefs: PathBuf,

    /// Persist a new listening port (1024-65535) before starting
    #[arg(long)]
    port: Option<u16>,

    /// Persist a new access token before starting
    #[arg(long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let store = Arc::new(PrefsStore::open(&args.prefs)?);
    if let Some(port) = args.port {
        store.set_port(port)?;
    }
    if let Some(token) = args.token.as_deref() {
        store.set_token(token)?;
    }

    let config = store.load();
    info!("gps tracker starting (prefs: {})", args.prefs.display());

    let state = SharedState::new();
    let source = SimulatedLocationSource::new(true);

    let (accel_tx, accel_rx) = mpsc::channel(500);
    let _accel_handle = tokio::spawn(accel_loop(accel_tx));

    let mut controller = AcquisitionController::new(state.clone(), source.clone());
    controller.start(accel_rx);

    let mut server = DataServer::new(state, store.clone());
    let addr = server.start(config.port).await?;
    info!(
        "serving fused state at http://{}{}?token={}",
        addr, API_PATH, config.token
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    controller.stop().await;
    server.stop().await;
    Ok(())
}
