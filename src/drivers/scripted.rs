use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use crate::drivers::{AcquisitionDevice, MonitorError};
/// Calls observed by a [`ScriptedDevice`], shared with the test that built it.
#[derive(Clone, Debug, Default)]
pub struct CallCounts {
    configured: Arc<Mutex<Vec<(String, f64)>>>,
    reads: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}
impl CallCounts {
    pub fn configured(&self) -> Vec<(String, f64)> {
        self.configured
            .lock()
            .map(|settings| settings.clone())
            .unwrap_or_default()
    }
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}
/// Replays fixed readings; useful for tests and deterministic playback.
pub struct ScriptedDevice {
    queue: VecDeque<Vec<f64>>,
    calls: CallCounts,
}
impl ScriptedDevice {
    pub fn new(readings: impl IntoIterator<Item = Vec<f64>>) -> Self {
        Self {
            queue: readings.into_iter().collect(),
            calls: CallCounts::default(),
        }
    }
    pub fn calls(&self) -> CallCounts {
        self.calls.clone()
    }
}
impl AcquisitionDevice for ScriptedDevice {
    fn describe(&self) -> String {
        format!("scripted device ({} readings queued)", self.queue.len())
    }
    fn configure(&mut self, settings: &[(String, f64)]) -> Result<(), MonitorError> {
        if let Ok(mut configured) = self.calls.configured.lock() {
            configured.extend_from_slice(settings);
        }
        Ok(())
    }
    fn read_batch(&mut self, channel_names: &[String]) -> Result<Vec<f64>, MonitorError> {
        let reading = self
            .queue
            .pop_front()
            .ok_or_else(|| MonitorError::Device("scripted readings exhausted".into()))?;
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        if reading.len() != channel_names.len() {
            return Err(MonitorError::ChannelMismatch {
                expected: channel_names.len(),
                actual: reading.len(),
            });
        }
        Ok(reading)
    }
    fn close(&mut self) -> Result<(), MonitorError> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
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
    fn scripted_device_replays_then_runs_dry() {
        let mut device = ScriptedDevice::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let calls = device.calls();
        device
            .configure(&[("AIN0_RANGE".into(), 10.0)])
            .unwrap();
        assert_eq!(device.read_batch(&names(2)).unwrap(), vec![1.0, 2.0]);
        assert_eq!(device.read_batch(&names(2)).unwrap(), vec![3.0, 4.0]);
        assert!(matches!(
            device.read_batch(&names(2)),
            Err(MonitorError::Device(_))
        ));
        device.close().unwrap();
        assert_eq!(calls.reads(), 2);
        assert_eq!(calls.closes(), 1);
        assert_eq!(calls.configured(), vec![("AIN0_RANGE".to_string(), 10.0)]);
    }
}
