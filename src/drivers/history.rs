use std::collections::VecDeque;
use serde::{Deserialize, Serialize};
use crate::drivers::MonitorError;
// Upfront reservation for bounded stores; larger windows grow on demand.
const MAX_PREALLOCATED: usize = 4096;
// Narrowest x-range shown for a bounded store, in seconds.
const MIN_BOUNDED_SPAN_S: f64 = 1.0;
/// How much history the store keeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Retention {
    /// Keep every sample for the lifetime of the process.
    #[default]
    Unbounded,
    /// Keep the most recent `count` samples.
    Samples { count: usize },
    /// Keep samples no older than `window` seconds behind the newest one.
    Seconds { window: f64 },
}
impl Retention {
    pub fn validate(&self) -> Result<(), MonitorError> {
        match *self {
            Retention::Unbounded => Ok(()),
            Retention::Samples { count } if count == 0 => Err(MonitorError::InvalidRetention(
                "sample count must be greater than zero".into(),
            )),
            Retention::Seconds { window } if !(window.is_finite() && window > 0.0) => Err(
                MonitorError::InvalidRetention(format!("window must be positive, got {window}")),
            ),
            _ => Ok(()),
        }
    }
    pub fn is_bounded(&self) -> bool {
        !matches!(self, Retention::Unbounded)
    }
}
/// Time-aligned copy of one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelSnapshot {
    pub channel: usize,
    pub times: Vec<f64>,
    pub raw: Vec<f64>,
    pub derived: Vec<f64>,
}
/// Most recent sample across all channels; feeds the per-cycle bar charts.
#[derive(Clone, Debug, PartialEq)]
pub struct LatestFrame {
    pub sample_index: u64,
    pub time: f64,
    pub raw: Vec<f64>,
    pub derived: Vec<f64>,
}
/// Full-history view used by the detail and overview plots.
#[derive(Clone, Debug)]
pub struct HistoryFrame {
    pub selected_channel: usize,
    pub times: Vec<f64>,
    pub selected_raw: Vec<f64>,
    pub selected_derived: Vec<f64>,
    pub overview_raw: Vec<Vec<f64>>, // channels x samples
    pub bounded: bool,
}
impl HistoryFrame {
    /// X-axis bounds: growing from zero for full history, sliding for bounded stores.
    pub fn x_bounds(&self, min_span: f64) -> (f64, f64) {
        let first = self.times.first().copied().unwrap_or(0.0);
        let last = self.times.last().copied().unwrap_or(0.0);
        if self.bounded {
            (first, last.max(first + MIN_BOUNDED_SPAN_S))
        } else {
            (0.0, last.max(min_span))
        }
    }
}
/// Per-channel raw and derived series sharing one time axis.
pub struct HistoryStore {
    times: VecDeque<f64>,
    raw: Vec<VecDeque<f64>>,     // channel -> samples
    derived: Vec<VecDeque<f64>>, // channel -> samples
    retention: Retention,
    appended: u64,
}
impl HistoryStore {
    pub fn new(channel_count: usize, retention: Retention) -> Result<Self, MonitorError> {
        if channel_count == 0 {
            return Err(MonitorError::InvalidChannelCount);
        }
        retention.validate()?;
        let capacity = match retention {
            Retention::Samples { count } => count.min(MAX_PREALLOCATED).saturating_add(1),
            _ => 0,
        };
        Ok(Self {
            times: VecDeque::with_capacity(capacity),
            raw: (0..channel_count)
                .map(|_| VecDeque::with_capacity(capacity))
                .collect(),
            derived: (0..channel_count)
                .map(|_| VecDeque::with_capacity(capacity))
                .collect(),
            retention,
            appended: 0,
        })
    }
    pub fn channel_count(&self) -> usize {
        self.raw.len()
    }
    pub fn len(&self) -> usize {
        self.times.len()
    }
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
    /// Total number of appends, including evicted samples.
    pub fn appended(&self) -> u64 {
        self.appended
    }
    pub fn append(&mut self, time: f64, raw: &[f64], derived: &[f64]) -> Result<(), MonitorError> {
        let expected = self.channel_count();
        for actual in [raw.len(), derived.len()] {
            if actual != expected {
                return Err(MonitorError::ChannelMismatch { expected, actual });
            }
        }
        if let Some(&previous) = self.times.back() {
            if !(time > previous) {
                return Err(MonitorError::NonMonotonicTime {
                    previous,
                    current: time,
                });
            }
        }
        self.times.push_back(time);
        for (queue, value) in self.raw.iter_mut().zip(raw) {
            queue.push_back(*value);
        }
        for (queue, value) in self.derived.iter_mut().zip(derived) {
            queue.push_back(*value);
        }
        self.appended += 1;
        self.evict();
        Ok(())
    }
    fn evict(&mut self) {
        let excess = match self.retention {
            Retention::Unbounded => 0,
            Retention::Samples { count } => self.times.len().saturating_sub(count),
            Retention::Seconds { window } => {
                let newest = self.times.back().copied().unwrap_or(0.0);
                self.times
                    .iter()
                    .take_while(|t| newest - **t > window)
                    .count()
            }
        };
        if excess == 0 {
            return;
        }
        self.times.drain(..excess);
        for queue in self.raw.iter_mut().chain(self.derived.iter_mut()) {
            queue.drain(..excess);
        }
    }
    pub fn snapshot(&self, channel: usize) -> Result<ChannelSnapshot, MonitorError> {
        let count = self.channel_count();
        if channel >= count {
            return Err(MonitorError::ChannelOutOfRange {
                index: channel,
                count,
            });
        }
        Ok(ChannelSnapshot {
            channel,
            times: self.times.iter().copied().collect(),
            raw: self.raw[channel].iter().copied().collect(),
            derived: self.derived[channel].iter().copied().collect(),
        })
    }
    pub fn latest(&self) -> Option<LatestFrame> {
        let time = *self.times.back()?;
        Some(LatestFrame {
            sample_index: self.appended.saturating_sub(1),
            time,
            raw: self.raw.iter().filter_map(|c| c.back().copied()).collect(),
            derived: self.derived.iter().filter_map(|c| c.back().copied()).collect(),
        })
    }
    pub fn history_frame(&self, selected_channel: usize) -> Result<HistoryFrame, MonitorError> {
        let selected = self.snapshot(selected_channel)?;
        Ok(HistoryFrame {
            selected_channel: selected.channel,
            times: selected.times,
            selected_raw: selected.raw,
            selected_derived: selected.derived,
            overview_raw: self
                .raw
                .iter()
                .map(|c| c.iter().copied().collect())
                .collect(),
            bounded: self.retention.is_bounded(),
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn sample(i: usize, channels: usize) -> (Vec<f64>, Vec<f64>) {
        let raw: Vec<f64> = (0..channels).map(|c| (i * 10 + c) as f64).collect();
        let derived = raw.iter().map(|v| v * 2.0).collect();
        (raw, derived)
    }
    fn assert_aligned(store: &HistoryStore) {
        for c in 0..store.channel_count() {
            let snap = store.snapshot(c).unwrap();
            assert_eq!(snap.times.len(), snap.raw.len());
            assert_eq!(snap.times.len(), snap.derived.len());
            assert_eq!(snap.times.len(), store.len());
        }
    }
    #[test]
    fn unbounded_store_keeps_everything_aligned() {
        let mut store = HistoryStore::new(3, Retention::Unbounded).unwrap();
        for i in 0..50 {
            let (raw, derived) = sample(i, 3);
            store.append(i as f64 * 0.25, &raw, &derived).unwrap();
            assert_aligned(&store);
        }
        assert_eq!(store.len(), 50);
        let snap = store.snapshot(2).unwrap();
        assert_eq!(snap.raw[7], 72.0);
        assert_eq!(snap.derived[7], 144.0);
    }
    #[test]
    fn bounded_by_samples_keeps_most_recent_in_lock_step() {
        let k = 8;
        let mut store = HistoryStore::new(4, Retention::Samples { count: k }).unwrap();
        for i in 0..k + 5 {
            let (raw, derived) = sample(i, 4);
            store.append(i as f64, &raw, &derived).unwrap();
            assert_aligned(&store);
        }
        assert_eq!(store.len(), k);
        assert_eq!(store.appended(), (k + 5) as u64);
        let snap = store.snapshot(3).unwrap();
        let expected_times: Vec<f64> = (5..k + 5).map(|i| i as f64).collect();
        assert_eq!(snap.times, expected_times);
        let expected_raw: Vec<f64> = (5..k + 5).map(|i| (i * 10 + 3) as f64).collect();
        assert_eq!(snap.raw, expected_raw);
        assert!(snap.times.windows(2).all(|w| w[0] < w[1]));
    }
    #[test]
    fn bounded_by_seconds_evicts_old_samples() {
        let mut store = HistoryStore::new(2, Retention::Seconds { window: 1.0 }).unwrap();
        for i in 0..20 {
            let (raw, derived) = sample(i, 2);
            store.append(i as f64 * 0.25, &raw, &derived).unwrap();
        }
        let snap = store.snapshot(0).unwrap();
        // newest is 4.75; everything at or after 3.75 survives
        assert_eq!(snap.times, vec![3.75, 4.0, 4.25, 4.5, 4.75]);
        assert_aligned(&store);
    }
    #[test]
    fn rejects_mismatched_and_non_monotonic_appends() {
        let mut store = HistoryStore::new(2, Retention::Unbounded).unwrap();
        let err = store.append(0.0, &[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            MonitorError::ChannelMismatch {
                expected: 2,
                actual: 1
            }
        ));
        store.append(1.0, &[1.0, 2.0], &[3.0, 4.0]).unwrap();
        let err = store.append(1.0, &[1.0, 2.0], &[3.0, 4.0]).unwrap_err();
        assert!(matches!(err, MonitorError::NonMonotonicTime { .. }));
        assert_eq!(store.len(), 1);
        assert_aligned(&store);
    }
    #[test]
    fn rejects_invalid_configuration() {
        assert!(HistoryStore::new(0, Retention::Unbounded).is_err());
        assert!(HistoryStore::new(1, Retention::Samples { count: 0 }).is_err());
        assert!(HistoryStore::new(1, Retention::Seconds { window: -1.0 }).is_err());
        let store = HistoryStore::new(2, Retention::Unbounded).unwrap();
        assert!(store.snapshot(2).is_err());
        assert!(store.latest().is_none());
    }
    #[test]
    fn frames_expose_latest_and_selected_channel() {
        let mut store = HistoryStore::new(3, Retention::Unbounded).unwrap();
        for i in 0..4 {
            let (raw, derived) = sample(i, 3);
            store.append(i as f64, &raw, &derived).unwrap();
        }
        let latest = store.latest().unwrap();
        assert_eq!(latest.sample_index, 3);
        assert_eq!(latest.raw, vec![30.0, 31.0, 32.0]);
        assert_eq!(latest.derived, vec![60.0, 62.0, 64.0]);
        let frame = store.history_frame(1).unwrap();
        assert_eq!(frame.selected_channel, 1);
        assert_eq!(frame.selected_raw, vec![1.0, 11.0, 21.0, 31.0]);
        assert_eq!(frame.overview_raw.len(), 3);
        assert_eq!(frame.x_bounds(60.0), (0.0, 60.0));
    }
    #[test]
    fn single_sample_bounded_frame_has_a_visible_range() {
        let mut store = HistoryStore::new(1, Retention::Samples { count: 10 }).unwrap();
        store.append(5000.0, &[1.0], &[2.0]).unwrap();
        let (lo, hi) = store.history_frame(0).unwrap().x_bounds(60.0);
        assert_eq!(lo, 5000.0);
        assert!(hi - lo >= 1.0, "got [{lo}, {hi}]");
    }
    #[test]
    fn huge_sample_window_does_not_reserve_up_front() {
        for count in [usize::MAX, 1 << 60, 10_000_000] {
            let mut store = HistoryStore::new(120, Retention::Samples { count }).unwrap();
            let (raw, derived) = sample(0, 120);
            store.append(0.0, &raw, &derived).unwrap();
            store.append(1.0, &raw, &derived).unwrap();
            assert_eq!(store.len(), 2);
        }
    }
}
