//! Control and estimation core for the greenhouse environmental controller.
//!
//! Everything in this crate derives stable discrete decisions (pump on/off,
//! light intensity, alert level) from cheap, noisy sensor inputs. Hardware
//! access is injected through the capability traits in [`traits`]; no module
//! here opens a bus, parses config, or touches a network.

pub mod alerts;
pub mod hysteresis;
pub mod irrigation;
pub mod light;
pub mod lighting;
pub mod sample;
pub mod timer;
pub mod traits;

pub use alerts::{Alert, AlertClassifier, FailureCounter, Status};
pub use hysteresis::HysteresisBand;
pub use irrigation::IrrigationController;
pub use light::{CalibrationState, LightEstimator, LightReading};
pub use lighting::{LightSchedule, LightingController};
pub use sample::{SensorKind, SensorSample};
pub use timer::OverrideTimer;
pub use traits::LedColor;
