use serde::{Deserialize, Serialize};
/// Seven-term Chebyshev fit mapping a sensor voltage to temperature.
///
/// The input is shifted by `offset_v`, normalized so that `[z_lower, z_upper]`
/// lands on `[-1, 1]`, clamped, and expanded as `sum(a_i * cos(i * acos(k)))`.
/// Readings outside the calibrated interval saturate at the nearest endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct ChebyshevCalibration {
    pub coefficients: [f64; 7],
    pub z_lower: f64,
    pub z_upper: f64,
    pub offset_v: f64,
}
impl Default for ChebyshevCalibration {
    fn default() -> Self {
        Self {
            coefficients: [
                207.313253,
                -126.180277,
                -3.928505,
                -0.942699,
                -0.215084,
                -0.074933,
                -0.016769,
            ],
            z_lower: 0.4969960998,
            z_upper: 1.030625219,
            offset_v: 2.289562,
        }
    }
}
impl ChebyshevCalibration {
    /// Normalized position of `raw_voltage` inside the calibration interval, clamped to [-1, 1].
    pub fn normalized(&self, raw_voltage: f64) -> f64 {
        let v = raw_voltage - self.offset_v;
        let k = ((v - self.z_lower) - (self.z_upper - v)) / (self.z_upper - self.z_lower);
        // NaN passes through clamp unchanged.
        k.clamp(-1.0, 1.0)
    }
    pub fn convert(&self, raw_voltage: f64) -> f64 {
        let theta = self.normalized(raw_voltage).acos();
        self.coefficients
            .iter()
            .enumerate()
            .map(|(i, a)| a * (i as f64 * theta).cos())
            .sum()
    }
}
/// Which channels carry a temperature sensor and get converted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ConversionPolicy {
    #[default]
    All,
    Subset { channels: Vec<usize> },
}
impl ConversionPolicy {
    pub fn applies_to(&self, channel: usize) -> bool {
        match self {
            ConversionPolicy::All => true,
            ConversionPolicy::Subset { channels } => channels.contains(&channel),
        }
    }
    /// Converted values for every channel; unconverted channels hold `NaN`.
    pub fn derive(&self, calibration: &ChebyshevCalibration, raw: &[f64]) -> Vec<f64> {
        raw.iter()
            .enumerate()
            .map(|(idx, v)| {
                if self.applies_to(idx) {
                    calibration.convert(*v)
                } else {
                    f64::NAN
                }
            })
            .collect()
    }
}
