//! Calibration
//!
//! The persisted (anchor image, offset vector) store and the
//! interactive two-phase session that produces entries for it.

mod session;
mod store;

pub use session::{
    CalibrationError, CalibrationEvent, CalibrationPhase, CalibrationProgress, CalibrationSession,
};
pub use store::{CalibrationRecord, CalibrationStore, StoreError};
