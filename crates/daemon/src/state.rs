//! Ephemeral controller state shared between the cycle loop and any status
//! consumer. Replaces a boundary-layer status dictionary with an explicit
//! struct behind a single `RwLock`.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use greenhouse_core::{Alert, SensorKind, SensorSample};

/// Maximum number of events retained in the ring buffer.
const MAX_EVENTS: usize = 200;

// ---------------------------------------------------------------------------
// Public type alias
// ---------------------------------------------------------------------------

pub type SharedState = Arc<RwLock<ControllerState>>;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

pub struct ControllerState {
    pub started_at: Instant,
    pub pump_on: bool,
    pub light_intensity: u8,
    pub alert: Option<Alert>,
    pub samples: HashMap<SensorKind, SensorSample>,
    pub events: VecDeque<SystemEvent>,
}

#[derive(Clone, Serialize)]
pub struct SystemEvent {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub kind: EventKind,
    pub detail: String,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Reading,
    Actuator,
    Alert,
    System,
    Error,
}

// ---------------------------------------------------------------------------
// JSON snapshot (what status consumers see)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct StatusSnapshot {
    pub uptime_secs: u64,
    pub pump_on: bool,
    pub light_intensity: u8,
    pub alert: Option<Alert>,
    pub samples: HashMap<SensorKind, SensorSample>,
    pub events: Vec<SystemEvent>,
}

// ---------------------------------------------------------------------------
// Construction & mutation
// ---------------------------------------------------------------------------

impl ControllerState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            pump_on: false,
            light_intensity: 0,
            alert: None,
            samples: HashMap::new(),
            events: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    /// Record one cycle's sensor samples. Absent values show up as "--" in
    /// the event detail instead of being dropped.
    pub fn record_cycle(&mut self, samples: Vec<SensorSample>) {
        let detail = samples
            .iter()
            .map(|s| {
                let value = s
                    .value
                    .map_or_else(|| "--".to_string(), |v| format!("{v:.1}"));
                format!("{:?}={value}", s.kind)
            })
            .collect::<Vec<_>>()
            .join(", ");

        for sample in samples {
            self.samples.insert(sample.kind, sample);
        }
        self.push_event(EventKind::Reading, detail);
    }

    /// Record actuator values; emits an event only when something changed.
    pub fn record_actuators(&mut self, pump_on: bool, light_intensity: u8) {
        if pump_on != self.pump_on {
            let state_str = if pump_on { "ON" } else { "OFF" };
            self.push_event(EventKind::Actuator, format!("pump {state_str}"));
        }
        if light_intensity != self.light_intensity {
            self.push_event(EventKind::Actuator, format!("light {light_intensity}%"));
        }
        self.pump_on = pump_on;
        self.light_intensity = light_intensity;
    }

    /// Record the classifier output; emits an event only on change.
    pub fn record_alert(&mut self, alert: &Alert) {
        let changed = self.alert.as_ref() != Some(alert);
        if changed {
            self.push_event(
                EventKind::Alert,
                format!("{:?}: {} / {}", alert.status, alert.line1, alert.line2),
            );
        }
        self.alert = Some(alert.clone());
    }

    pub fn record_system(&mut self, detail: String) {
        self.push_event(EventKind::System, detail);
    }

    pub fn record_error(&mut self, detail: String) {
        self.push_event(EventKind::Error, detail);
    }

    /// Build the JSON-serialisable status snapshot, newest events first.
    pub fn to_status(&self) -> StatusSnapshot {
        StatusSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs(),
            pump_on: self.pump_on,
            light_intensity: self.light_intensity,
            alert: self.alert.clone(),
            samples: self.samples.clone(),
            events: self.events.iter().rev().cloned().collect(),
        }
    }

    fn push_event(&mut self, kind: EventKind, detail: String) {
        if self.events.len() >= MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(SystemEvent {
            ts: OffsetDateTime::now_utc(),
            kind,
            detail,
        });
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use greenhouse_core::{LedColor, Status};

    fn sample(kind: SensorKind, value: Option<f64>) -> SensorSample {
        SensorSample::new(kind, value, 1_700_000_000)
    }

    fn ok_alert() -> Alert {
        Alert {
            status: Status::Ok,
            line1: "T:23.0C H:60%".to_string(),
            line2: "Lux:OK Day".to_string(),
            led: LedColor::Green,
        }
    }

    #[test]
    fn record_cycle_stores_latest_sample_per_kind() {
        let mut st = ControllerState::new();
        st.record_cycle(vec![sample(SensorKind::Temperature, Some(20.0))]);
        st.record_cycle(vec![sample(SensorKind::Temperature, Some(25.0))]);
        assert_eq!(st.samples.len(), 1);
        assert_eq!(st.samples[&SensorKind::Temperature].value, Some(25.0));
    }

    #[test]
    fn record_cycle_keeps_absent_values_absent() {
        let mut st = ControllerState::new();
        st.record_cycle(vec![sample(SensorKind::Humidity, None)]);
        assert!(st.samples[&SensorKind::Humidity].is_absent());
        assert!(st.events.back().unwrap().detail.contains("Humidity=--"));
    }

    #[test]
    fn actuator_events_only_on_change() {
        let mut st = ControllerState::new();
        st.record_actuators(true, 50);
        st.record_actuators(true, 50);
        let actuator_events = st
            .events
            .iter()
            .filter(|e| e.kind == EventKind::Actuator)
            .count();
        assert_eq!(actuator_events, 2); // pump ON + light 50%, once each
        assert!(st.pump_on);
        assert_eq!(st.light_intensity, 50);
    }

    #[test]
    fn alert_events_only_on_change() {
        let mut st = ControllerState::new();
        st.record_alert(&ok_alert());
        st.record_alert(&ok_alert());
        let alert_events = st
            .events
            .iter()
            .filter(|e| e.kind == EventKind::Alert)
            .count();
        assert_eq!(alert_events, 1);
    }

    #[test]
    fn ring_buffer_is_bounded() {
        let mut st = ControllerState::new();
        for i in 0..250 {
            st.record_system(format!("event {i}"));
        }
        assert_eq!(st.events.len(), MAX_EVENTS);
        // Oldest entries were dropped.
        assert_eq!(st.events.front().unwrap().detail, "event 50");
    }

    #[test]
    fn snapshot_reverses_events_and_serializes() {
        let mut st = ControllerState::new();
        st.record_system("first".to_string());
        st.record_system("second".to_string());
        st.record_alert(&ok_alert());

        let status = st.to_status();
        assert_eq!(status.events[0].kind, EventKind::Alert);
        assert_eq!(status.events.last().unwrap().detail, "first");

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["alert"]["status"], "OK");
        assert_eq!(json["events"][0]["kind"], "alert");
    }
}
