//! Pump control from soil moisture: hysteresis-banded automatic watering
//! plus time-limited manual overrides.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::hysteresis::HysteresisBand;
use crate::timer::OverrideTimer;
use crate::traits::PumpSink;

/// Pump state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WateringState {
    Idle,
    WateringAuto,
    WateringManual,
}

struct Inner<P> {
    pump: P,
    /// Band state `true` means "soil saturated"; the pump runs automatically
    /// while it is `false`.
    saturated: HysteresisBand,
    state: WateringState,
    timer: OverrideTimer,
}

/// Cloneable handle. All transitions, including the deferred override
/// expiry, happen under the single inner mutex.
pub struct IrrigationController<P: PumpSink + Send + 'static> {
    inner: Arc<Mutex<Inner<P>>>,
}

impl<P: PumpSink + Send + 'static> Clone for IrrigationController<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: PumpSink + Send + 'static> IrrigationController<P> {
    /// `low`/`high` are the moisture hysteresis bounds in percent: the pump
    /// starts below `low` and stops above `high`.
    pub fn new(pump: P, low: f64, high: f64) -> Result<Self> {
        // Start saturated: the pump stays off until the soil is provably dry.
        let saturated = HysteresisBand::with_state(low, high, true)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                pump,
                saturated,
                state: WateringState::Idle,
                timer: OverrideTimer::new(),
            })),
        })
    }

    /// One automatic control step. An absent reading holds the current
    /// state; escalation is the alert classifier's job, not ours.
    pub async fn check(&self, moisture: Option<f64>) {
        let mut inner = self.inner.lock().await;
        if inner.state == WateringState::WateringManual {
            return; // manual override: automatic control is skipped entirely
        }
        let Some(m) = moisture else {
            debug!("irrigation: moisture reading absent — holding state");
            return;
        };

        let saturated = inner.saturated.update(m);
        match (saturated, inner.state) {
            (false, WateringState::Idle) => {
                info!(moisture = m, "irrigation: soil too dry — pump ON");
                inner.pump.set(true);
                inner.state = WateringState::WateringAuto;
            }
            (true, WateringState::WateringAuto) => {
                info!(moisture = m, "irrigation: soil moist enough — pump OFF");
                inner.pump.set(false);
                inner.state = WateringState::Idle;
            }
            _ => {
                debug!(moisture = m, state = ?inner.state, "irrigation: holding");
            }
        }
    }

    /// Force the pump on for `duration`. A no-op while auto-watering;
    /// while already manual the pending timer is replaced.
    pub async fn start_manual(&self, duration: Duration) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            WateringState::WateringAuto => {
                warn!("irrigation: pump already running — manual start ignored");
                return;
            }
            WateringState::WateringManual => {
                info!(
                    secs = duration.as_secs(),
                    "irrigation: replacing manual watering timer"
                );
            }
            WateringState::Idle => {
                info!(secs = duration.as_secs(), "irrigation: manual watering ON");
            }
        }

        inner.pump.set(true);
        inner.state = WateringState::WateringManual;

        let handle = Arc::clone(&self.inner);
        inner.timer.arm(duration, async move {
            let mut inner = handle.lock().await;
            if inner.state == WateringState::WateringManual {
                info!("irrigation: manual watering finished — pump OFF");
                inner.pump.set(false);
                inner.state = WateringState::Idle;
            }
        });
    }

    /// Cancel a manual override immediately.
    pub async fn stop_manual(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state != WateringState::WateringManual {
            debug!("irrigation: no manual watering to stop");
            return;
        }
        inner.timer.cancel();
        inner.pump.set(false);
        inner.state = WateringState::Idle;
        info!("irrigation: manual watering stopped");
    }

    pub async fn state(&self) -> WateringState {
        self.inner.lock().await.state
    }

    pub async fn is_watering(&self) -> bool {
        self.inner.lock().await.state != WateringState::Idle
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Clone)]
    struct TestPump {
        on: Arc<AtomicBool>,
    }

    impl TestPump {
        fn new() -> (Self, Arc<AtomicBool>) {
            let on = Arc::new(AtomicBool::new(false));
            (Self { on: Arc::clone(&on) }, on)
        }
    }

    impl PumpSink for TestPump {
        fn set(&mut self, on: bool) {
            self.on.store(on, Ordering::SeqCst);
        }
    }

    /// Controller with the 30/60 default thresholds.
    fn controller() -> (IrrigationController<TestPump>, Arc<AtomicBool>) {
        let (pump, on) = TestPump::new();
        (IrrigationController::new(pump, 30.0, 60.0).unwrap(), on)
    }

    #[tokio::test]
    async fn rejects_inverted_thresholds() {
        let (pump, _) = TestPump::new();
        assert!(IrrigationController::new(pump, 60.0, 30.0).is_err());
    }

    #[tokio::test]
    async fn dry_soil_starts_watering() {
        let (ctl, pump_on) = controller();
        ctl.check(Some(20.0)).await;
        assert!(pump_on.load(Ordering::SeqCst));
        assert_eq!(ctl.state().await, WateringState::WateringAuto);
    }

    #[tokio::test]
    async fn deadband_holds_pump_on() {
        let (ctl, pump_on) = controller();
        ctl.check(Some(20.0)).await;
        ctl.check(Some(45.0)).await; // inside [30, 60]
        assert!(pump_on.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn deadband_holds_pump_off() {
        let (ctl, pump_on) = controller();
        ctl.check(Some(45.0)).await; // never got dry first
        assert!(!pump_on.load(Ordering::SeqCst));
        assert_eq!(ctl.state().await, WateringState::Idle);
    }

    #[tokio::test]
    async fn wet_soil_stops_watering() {
        let (ctl, pump_on) = controller();
        ctl.check(Some(20.0)).await;
        ctl.check(Some(70.0)).await;
        assert!(!pump_on.load(Ordering::SeqCst));
        assert_eq!(ctl.state().await, WateringState::Idle);
    }

    #[tokio::test]
    async fn absent_reading_holds_state() {
        let (ctl, pump_on) = controller();
        ctl.check(Some(20.0)).await;
        ctl.check(None).await;
        assert!(pump_on.load(Ordering::SeqCst));
        assert_eq!(ctl.state().await, WateringState::WateringAuto);
    }

    #[tokio::test]
    async fn manual_override_skips_automatic_check() {
        let (ctl, pump_on) = controller();
        ctl.start_manual(Duration::from_secs(60)).await;
        // Soil is wet, but the override must win.
        ctl.check(Some(70.0)).await;
        assert!(pump_on.load(Ordering::SeqCst));
        assert_eq!(ctl.state().await, WateringState::WateringManual);
    }

    #[tokio::test]
    async fn manual_start_is_noop_while_auto_watering() {
        let (ctl, pump_on) = controller();
        ctl.check(Some(20.0)).await;
        ctl.start_manual(Duration::from_secs(60)).await;
        assert_eq!(ctl.state().await, WateringState::WateringAuto);
        assert!(pump_on.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn manual_override_expires_on_its_own() {
        let (ctl, pump_on) = controller();
        ctl.start_manual(Duration::from_millis(30)).await;
        assert!(pump_on.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!pump_on.load(Ordering::SeqCst));
        assert_eq!(ctl.state().await, WateringState::Idle);
    }

    #[tokio::test]
    async fn restarting_manual_replaces_the_timer() {
        let (ctl, pump_on) = controller();
        ctl.start_manual(Duration::from_millis(30)).await;
        ctl.start_manual(Duration::from_millis(300)).await;

        // Past the first deadline: the replaced timer must not fire.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(pump_on.load(Ordering::SeqCst));
        assert_eq!(ctl.state().await, WateringState::WateringManual);
    }

    #[tokio::test]
    async fn stop_manual_cancels_immediately() {
        let (ctl, pump_on) = controller();
        ctl.start_manual(Duration::from_secs(60)).await;
        ctl.stop_manual().await;
        assert!(!pump_on.load(Ordering::SeqCst));
        assert_eq!(ctl.state().await, WateringState::Idle);
    }

    #[tokio::test]
    async fn stop_manual_without_override_is_noop() {
        let (ctl, pump_on) = controller();
        ctl.check(Some(20.0)).await;
        ctl.stop_manual().await;
        // Auto watering is untouched.
        assert!(pump_on.load(Ordering::SeqCst));
        assert_eq!(ctl.state().await, WateringState::WateringAuto);
    }

    #[tokio::test]
    async fn auto_control_resumes_after_manual_expiry() {
        let (ctl, pump_on) = controller();
        ctl.start_manual(Duration::from_millis(20)).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        ctl.check(Some(20.0)).await;
        assert!(pump_on.load(Ordering::SeqCst));
        assert_eq!(ctl.state().await, WateringState::WateringAuto);
    }
}
