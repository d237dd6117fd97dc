// src/drivers/mod.rs
// Headless acquisition core: everything here runs without a window.
pub mod calibration;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod plot;
pub mod scheduler;
#[cfg(test)]
pub mod scripted;
pub mod source;
// Re-export the types the rest of the app works with
pub use calibration::{ChebyshevCalibration, ConversionPolicy};
pub use error::MonitorError;
pub use history::{HistoryFrame, LatestFrame, Retention};
pub use pipeline::{AcquisitionLoop, LoopSettings, StopReason};
pub use plot::{render_columns_png, PlotStyle, RecordedTable};
pub use scheduler::DisplaySurface;
pub use source::{AcquisitionDevice, SimulatedDevice};
