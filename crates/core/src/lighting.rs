//! Grow-light control: wall-clock schedule, darkness boost, and time-limited
//! manual overrides.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Result};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::timer::OverrideTimer;
use crate::traits::{Clock, LightSink};

/// Disjoint, exhaustive intensity bands over the hour of day:
/// `[high_start, med_start)` → 100 %, `[med_start, off_start)` → 50 %,
/// everything else → 0 %.
#[derive(Debug, Clone, Copy)]
pub struct LightSchedule {
    high_start: u8,
    med_start: u8,
    off_start: u8,
}

impl LightSchedule {
    pub fn new(high_start: u8, med_start: u8, off_start: u8) -> Result<Self> {
        ensure!(
            off_start < 24,
            "schedule hours must be below 24, got off_start={off_start}"
        );
        ensure!(
            high_start < med_start && med_start < off_start,
            "schedule hours must be strictly increasing, got {high_start}/{med_start}/{off_start}"
        );
        Ok(Self {
            high_start,
            med_start,
            off_start,
        })
    }

    pub fn intensity_for(&self, hour: u8) -> u8 {
        if (self.high_start..self.med_start).contains(&hour) {
            100
        } else if (self.med_start..self.off_start).contains(&hour) {
            50
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Scheduled,
    Manual,
}

struct Inner<L, C> {
    light: L,
    clock: C,
    schedule: LightSchedule,
    mode: Mode,
    /// Last commanded intensity; the sink is only touched when the computed
    /// value differs.
    intensity: u8,
    timer: OverrideTimer,
}

impl<L: LightSink, C: Clock> Inner<L, C> {
    fn apply(&mut self, target: u8) {
        if target != self.intensity {
            info!(target, "lighting: intensity set");
            self.light.set_intensity(target);
            self.intensity = target;
        }
    }

    fn apply_schedule(&mut self) {
        let hour = self.clock.hour();
        let target = self.schedule.intensity_for(hour);
        debug!(hour, target, "lighting: schedule tick");
        self.apply(target);
    }
}

/// Cloneable handle; all transitions happen under the single inner mutex.
pub struct LightingController<L: LightSink + Send + 'static, C: Clock + Send + 'static> {
    inner: Arc<Mutex<Inner<L, C>>>,
}

impl<L: LightSink + Send + 'static, C: Clock + Send + 'static> Clone for LightingController<L, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: LightSink + Send + 'static, C: Clock + Send + 'static> LightingController<L, C> {
    pub fn new(light: L, clock: C, schedule: LightSchedule) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                light,
                clock,
                schedule,
                mode: Mode::Scheduled,
                intensity: 0,
                timer: OverrideTimer::new(),
            })),
        }
    }

    /// One control step. Darkness pre-empts the schedule (full intensity)
    /// but never pre-empts a manual override.
    pub async fn check(&self, is_dark: bool) {
        let mut inner = self.inner.lock().await;
        if inner.mode == Mode::Manual {
            return;
        }
        if is_dark {
            inner.apply(100);
        } else {
            inner.apply_schedule();
        }
    }

    /// Force `intensity` (clamped to 0–100) for `duration`, after which the
    /// schedule-derived value is restored without any external trigger.
    pub async fn set_manual(&self, intensity: u8, duration: Duration) {
        let pct = intensity.min(100);
        let mut inner = self.inner.lock().await;
        info!(
            pct,
            secs = duration.as_secs(),
            "lighting: manual intensity set"
        );
        inner.mode = Mode::Manual;
        inner.apply(pct);

        let handle = Arc::clone(&self.inner);
        inner.timer.arm(duration, async move {
            let mut inner = handle.lock().await;
            if inner.mode == Mode::Manual {
                info!("lighting: manual override expired — back to schedule");
                inner.mode = Mode::Scheduled;
                inner.apply_schedule();
            }
        });
    }

    /// Cancel a manual override immediately and reapply the schedule.
    pub async fn stop_manual(&self) {
        let mut inner = self.inner.lock().await;
        if inner.mode != Mode::Manual {
            debug!("lighting: no manual override to stop");
            return;
        }
        inner.timer.cancel();
        inner.mode = Mode::Scheduled;
        info!("lighting: manual override cancelled");
        inner.apply_schedule();
    }

    pub async fn intensity(&self) -> u8 {
        self.inner.lock().await.intensity
    }

    pub async fn is_manual(&self) -> bool {
        self.inner.lock().await.mode == Mode::Manual
    }
}

// ===========================================================================
// Tests
// ===========================================================================
