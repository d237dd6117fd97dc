use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::drivers::MonitorError;
/// Multi-channel analog input hardware.
///
/// Backends are opened by their constructor; the caller then configures once,
/// reads batches, and closes exactly once.
pub trait AcquisitionDevice: Send {
    /// Human readable identity, logged after open.
    fn describe(&self) -> String;
    fn configure(&mut self, settings: &[(String, f64)]) -> Result<(), MonitorError>;
    /// One simultaneous reading of every named input, in request order.
    fn read_batch(&mut self, channel_names: &[String]) -> Result<Vec<f64>, MonitorError>;
    fn close(&mut self) -> Result<(), MonitorError>;
}
/// Noisy voltages around a baseline, for running the monitor without hardware.
pub struct SimulatedDevice {
    rng: StdRng,
    baseline_v: f64,
    noise_v: f64,
    range_v: f64,
    phase: f64,
}
impl SimulatedDevice {
    pub fn open(seed: Option<u64>, baseline_v: f64, noise_v: f64) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            baseline_v,
            noise_v: noise_v.abs(),
            range_v: 10.0,
            phase: 0.0,
        }
    }
}
impl AcquisitionDevice for SimulatedDevice {
    fn describe(&self) -> String {
        format!(
            "simulated device (baseline {:.3} V, noise {:.3} V)",
            self.baseline_v, self.noise_v
        )
    }
    fn configure(&mut self, settings: &[(String, f64)]) -> Result<(), MonitorError> {
        // Ranges are symmetric, so the smallest configured one clips every channel.
        if let Some(range) = settings
            .iter()
            .filter(|(name, _)| name.ends_with("_RANGE"))
            .map(|(_, value)| *value)
            .reduce(f64::min)
        {
            if range <= 0.0 {
                return Err(MonitorError::Device(format!("invalid input range {range}")));
            }
            self.range_v = range;
        }
        Ok(())
    }
    fn read_batch(&mut self, channel_names: &[String]) -> Result<Vec<f64>, MonitorError> {
        self.phase += 0.05;
        let readings = (0..channel_names.len())
            .map(|idx| {
                let drift = 0.1 * (self.phase + idx as f64 * 0.3).sin();
                let noise = if self.noise_v > 0.0 {
                    self.rng.gen_range(-self.noise_v..self.noise_v)
                } else {
                    0.0
                };
                (self.baseline_v + drift + noise).clamp(-self.range_v, self.range_v)
            })
            .collect();
        Ok(readings)
    }
    fn close(&mut self) -> Result<(), MonitorError> {
        Ok(())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("AIN{i}")).collect()
    }
    #[test]
    fn simulated_device_stays_inside_configured_range() {
        let mut device = SimulatedDevice::open(Some(7), 9.95, 0.5);
        device
            .configure(&[("AIN0_RANGE".into(), 10.0), ("AIN1_RANGE".into(), 10.0)])
            .unwrap();
        for _ in 0..50 {
            let batch = device.read_batch(&names(4)).unwrap();
            assert_eq!(batch.len(), 4);
            assert!(batch.iter().all(|v| v.abs() <= 10.0));
        }
        assert!(device.configure(&[("AIN0_RANGE".into(), 0.0)]).is_err());
    }
}
