mod anomaly;
mod commands;
mod config;
mod cycle;
mod hal;
mod state;

use std::{env, sync::Arc};

use anyhow::Result;
use tokio::sync::{mpsc, RwLock};
use tracing::info;
use tracing_subscriber::EnvFilter;

use greenhouse_core::{AlertClassifier, IrrigationController, LightEstimator, LightingController};

use anomaly::EnvelopeOracle;
use cycle::{Controllers, Sensors};
use state::{ControllerState, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ──────────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "greenhouse.toml".to_string());
    let cfg = config::load_or_default(&config_path)?;

    // ── Hardware ────────────────────────────────────────────────────
    let hal = hal::build(&cfg.gpio)?;

    // ── Controllers ─────────────────────────────────────────────────
    let mut estimator = LightEstimator::new(hal.light_adc, hal.rc_pin, cfg.light_tuning())?;

    // One-time blocking baseline measurement, before the cycle loop and
    // before anything else can touch the bus.
    info!("calibrating RC light baseline (~2 s)");
    estimator.calibrate();

    let irrigation = IrrigationController::new(
        hal.pump,
        cfg.irrigation.moisture_low_pct,
        cfg.irrigation.moisture_high_pct,
    )?;
    let lighting = LightingController::new(hal.grow_light, hal::SystemClock, cfg.schedule()?);
    let alerts = AlertClassifier::new(hal.leds, hal.display, cfg.alert_thresholds())?;

    // ── Shared state ────────────────────────────────────────────────
    let shared: SharedState = Arc::new(RwLock::new(ControllerState::new()));
    shared
        .write()
        .await
        .record_system("controller started".to_string());

    // ── Command listeners ───────────────────────────────────────────
    let (tx, mut rx) = mpsc::channel(8);
    tokio::spawn(commands::listen_stdin(tx, Arc::clone(&shared)));
    {
        let irrigation = irrigation.clone();
        let lighting = lighting.clone();
        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                commands::dispatch(cmd, &irrigation, &lighting, &shared).await;
            }
        });
    }

    // ── Cycle loop ──────────────────────────────────────────────────
    cycle::run(
        Controllers {
            estimator,
            irrigation,
            lighting,
            alerts,
        },
        Sensors {
            temp_hum: hal.temp_hum,
            rain: hal.rain,
            moisture: hal.moisture,
        },
        EnvelopeOracle::default(),
        shared,
        cfg.cycle_interval(),
    )
    .await;

    Ok(())
}
