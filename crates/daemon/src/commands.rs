//! External command parsing and dispatch.
//!
//! Commands arrive as JSON payloads from whatever transport the deployment
//! wires up; the daemon itself reads newline-delimited JSON on stdin. A
//! malformed or unknown payload is rejected with an error string and causes
//! no state change.

use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use greenhouse_core::{IrrigationController, LightingController};

use crate::hal::{GrowLightImpl, PumpImpl, SystemClock};
use crate::state::SharedState;

/// Default manual-watering duration when the payload omits one.
const DEFAULT_WATERING_SECS: u64 = 10;
/// Upper bound on one manual watering run.
const MAX_WATERING_SECS: u64 = 3600;
/// Manual lighting overrides hold for an hour.
const MANUAL_LIGHT_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartWatering { duration_secs: u64 },
    StopWatering,
    SetIntensity { pct: u8 },
    /// Dump the current status snapshot as JSON on stdout.
    Status,
}

#[derive(Deserialize)]
struct CommandMsg {
    command: String,
    #[serde(default)]
    duration: Option<u64>,
    #[serde(default)]
    value: Option<i64>,
}

/// Parse one JSON command payload.
pub fn parse_command(payload: &[u8]) -> Result<Command, String> {
    let msg: CommandMsg =
        serde_json::from_slice(payload).map_err(|e| format!("bad command json: {e}"))?;

    match msg.command.as_str() {
        "START_WATERING" => {
            let duration_secs = msg.duration.unwrap_or(DEFAULT_WATERING_SECS);
            if duration_secs == 0 || duration_secs > MAX_WATERING_SECS {
                return Err(format!(
                    "watering duration {duration_secs}s out of range [1, {MAX_WATERING_SECS}]"
                ));
            }
            Ok(Command::StartWatering { duration_secs })
        }
        "STOP_WATERING" => Ok(Command::StopWatering),
        "STATUS" => Ok(Command::Status),
        "SET_INTENSITY" => {
            let value = msg.value.unwrap_or(0);
            if !(0..=100).contains(&value) {
                return Err(format!("intensity {value} out of range [0, 100]"));
            }
            Ok(Command::SetIntensity { pct: value as u8 })
        }
        other => Err(format!("unknown command '{other}'")),
    }
}

/// Apply one parsed command to the controllers.
pub async fn dispatch(
    cmd: Command,
    irrigation: &IrrigationController<PumpImpl>,
    lighting: &LightingController<GrowLightImpl, SystemClock>,
    shared: &SharedState,
) {
    info!(?cmd, "command received");
    let detail = format!("{cmd:?}");
    match cmd {
        Command::StartWatering { duration_secs } => {
            irrigation
                .start_manual(Duration::from_secs(duration_secs))
                .await;
        }
        Command::StopWatering => irrigation.stop_manual().await,
        Command::SetIntensity { pct } => {
            lighting
                .set_manual(pct, Duration::from_secs(MANUAL_LIGHT_SECS))
                .await;
        }
        Command::Status => {
            let snapshot = shared.read().await.to_status();
            match serde_json::to_string(&snapshot) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!("status serialization failed: {e}"),
            }
            return; // a query, not a state change; no event recorded
        }
    }
    shared.write().await.record_system(format!("command: {detail}"));
}

/// Feed newline-delimited JSON commands from stdin into the channel.
pub async fn listen_stdin(tx: mpsc::Sender<Command>, shared: SharedState) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_command(line.as_bytes()) {
            Ok(cmd) => {
                if tx.send(cmd).await.is_err() {
                    break; // dispatcher gone, shutting down
                }
            }
            Err(e) => {
                warn!("{e}");
                shared.write().await.record_error(e);
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
