//! The control cycle: read every sensor, run the controllers, classify,
//! record. One failed reading never stops the loop: absence flows through
//! as `None` and the alert classifier decides what it means.

use std::time::Duration;

use tracing::{info, warn};

use greenhouse_core::traits::{
    AnomalyFeatures, AnomalyOracle, MoistureSource, RainSource, TempHumSource,
};
use greenhouse_core::{
    AlertClassifier, IrrigationController, LightEstimator, LightingController, SensorKind,
    SensorSample,
};

use crate::anomaly::EnvelopeOracle;
use crate::hal::{
    DisplayImpl, GrowLightImpl, LedsImpl, LightAdcImpl, MoistureImpl, PumpImpl, RainImpl,
    RcPinImpl, SystemClock, TempHumImpl,
};
use crate::state::SharedState;

pub struct Controllers {
    pub estimator: LightEstimator<LightAdcImpl, RcPinImpl>,
    pub irrigation: IrrigationController<PumpImpl>,
    pub lighting: LightingController<GrowLightImpl, SystemClock>,
    pub alerts: AlertClassifier<LedsImpl, DisplayImpl>,
}

pub struct Sensors {
    pub temp_hum: TempHumImpl,
    pub rain: RainImpl,
    pub moisture: MoistureImpl,
}

/// Run the control loop forever. Intended to be awaited from main after
/// calibration has completed.
pub async fn run(
    mut controllers: Controllers,
    mut sensors: Sensors,
    mut oracle: EnvelopeOracle,
    shared: SharedState,
    interval: Duration,
) {
    info!(interval_sec = interval.as_secs(), "control cycle started");
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;
        run_cycle(&mut controllers, &mut sensors, &mut oracle, &shared).await;
    }
}

async fn run_cycle(
    controllers: &mut Controllers,
    sensors: &mut Sensors,
    oracle: &mut EnvelopeOracle,
    shared: &SharedState,
) {
    let ts = now_unix();

    let (temp, hum) = sensors.temp_hum.read();
    let light = controllers.estimator.read();
    let rain_pct = sensors.rain.read_pct();
    let rain_wet = sensors.rain.is_wet();
    let moisture = sensors.moisture.read();

    info!(
        ?temp,
        ?hum,
        ?rain_pct,
        rain_wet,
        lux = light.lux,
        is_dark = light.is_dark,
        ?moisture,
        "cycle readings"
    );

    controllers.lighting.check(light.is_dark).await;
    controllers.irrigation.check(moisture).await;

    let has_anomaly = oracle.check(&AnomalyFeatures {
        temp,
        hum,
        rain_pct,
        lux: light.lux,
    });
    if has_anomaly {
        warn!("anomaly oracle flagged this cycle");
    }

    let alert = controllers
        .alerts
        .update(temp, hum, rain_pct, rain_wet, light.is_dark, has_anomaly);

    let pump_on = controllers.irrigation.is_watering().await;
    let intensity = controllers.lighting.intensity().await;

    let samples = vec![
        SensorSample::new(SensorKind::Temperature, temp, ts),
        SensorSample::new(SensorKind::Humidity, hum, ts),
        SensorSample::new(SensorKind::RainPct, rain_pct, ts),
        SensorSample::new(
            SensorKind::RainDigital,
            Some(if rain_wet { 1.0 } else { 0.0 }),
            ts,
        ),
        SensorSample::new(SensorKind::SoilMoisture, moisture, ts),
        SensorSample::new(SensorKind::Light, Some(f64::from(light.lux)), ts),
    ];

    let mut st = shared.write().await;
    st.record_cycle(samples);
    st.record_actuators(pump_on, intensity);
    st.record_alert(&alert);
}

pub fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_unix_is_recent() {
        let ts = now_unix();
        // After 2024-01-01 and before 2040-01-01.
        assert!(ts > 1_704_067_200, "timestamp too old: {ts}");
        assert!(ts < 2_208_988_800, "timestamp too far in future: {ts}");
    }
}
