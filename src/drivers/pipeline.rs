use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use log::{debug, error, info, warn};
use crate::drivers::calibration::{ChebyshevCalibration, ConversionPolicy};
use crate::drivers::error::MonitorError;
use crate::drivers::history::{HistoryStore, Retention};
use crate::drivers::scheduler::{DisplaySurface, RedrawDecision, RedrawScheduler};
use crate::drivers::source::AcquisitionDevice;
use crate::recorder::{RecordLayout, RecordSink};
use crate::types::MonitorCommand;
/// Static parameters of one acquisition session.
#[derive(Clone, Debug)]
pub struct LoopSettings {
    pub channel_names: Vec<String>,
    pub interval: Duration,
    pub conversion: ConversionPolicy,
    pub retention: Retention,
    pub redraw_every: u64,
}
/// Why [`AcquisitionLoop::run`] returned normally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    ControlDisconnected,
}
/// `now`, or the next representable value above `last` if the clock did not advance.
fn strictly_after(last: Option<f64>, now: f64) -> f64 {
    match last {
        // Elapsed time is never negative, so the bit successor is the next float up.
        Some(last) if now <= last => f64::from_bits(last.to_bits() + 1),
        _ => now,
    }
}
/// Fixed-cadence read / convert / store / persist / redraw cycle.
pub struct AcquisitionLoop<V: DisplaySurface> {
    device: Box<dyn AcquisitionDevice>,
    sink: Box<dyn RecordSink>,
    display: V,
    calibration: ChebyshevCalibration,
    settings: LoopSettings,
    layout: RecordLayout,
    history: HistoryStore,
    scheduler: RedrawScheduler,
    started_at: Instant,
    last_time: Option<f64>,
    shut_down: bool,
}
impl<V: DisplaySurface> AcquisitionLoop<V> {
    /// Takes an opened and configured device and writes the sink header.
    pub fn new(
        device: Box<dyn AcquisitionDevice>,
        mut sink: Box<dyn RecordSink>,
        display: V,
        calibration: ChebyshevCalibration,
        settings: LoopSettings,
    ) -> Result<Self, MonitorError> {
        let channel_count = settings.channel_names.len();
        let history = HistoryStore::new(channel_count, settings.retention)?;
        let scheduler = RedrawScheduler::new(settings.redraw_every, channel_count)?;
        let layout = RecordLayout::new(settings.channel_names.clone(), &settings.conversion);
        sink.write_header(&layout.header())?;
        Ok(Self {
            device,
            sink,
            display,
            calibration,
            settings,
            layout,
            history,
            scheduler,
            started_at: Instant::now(),
            last_time: None,
            shut_down: false,
        })
    }
    #[cfg(test)]
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }
    #[cfg(test)]
    pub fn display(&self) -> &V {
        &self.display
    }
    fn elapsed(&mut self) -> f64 {
        let time = strictly_after(self.last_time, self.started_at.elapsed().as_secs_f64());
        self.last_time = Some(time);
        time
    }
    /// One acquisition cycle.
    pub fn step(&mut self) -> Result<RedrawDecision, MonitorError> {
        let time = self.elapsed();
        let raw = self.device.read_batch(&self.settings.channel_names)?;
        if raw.len() != self.settings.channel_names.len() {
            return Err(MonitorError::ChannelMismatch {
                expected: self.settings.channel_names.len(),
                actual: raw.len(),
            });
        }
        let derived = self.settings.conversion.derive(&self.calibration, &raw);
        self.history.append(time, &raw, &derived)?;
        self.sink.write_row(&self.layout.row(time, &raw, &derived))?;
        let decision = self.scheduler.on_new_sample();
        if decision.cheap {
            if let Some(latest) = self.history.latest() {
                self.display.show_latest(&latest);
            }
        }
        if decision.expensive {
            let frame = self.history.history_frame(decision.selected_channel)?;
            self.display.show_history(&frame);
        }
        Ok(decision)
    }
    fn handle(&mut self, command: MonitorCommand) -> Option<StopReason> {
        match command {
            MonitorCommand::SelectChannel(channel) => {
                let current = self.scheduler.selected_channel();
                match self.scheduler.select_channel(channel) {
                    Ok(()) => debug!("Selection {current} -> {channel} queued"),
                    Err(err) => warn!("Ignoring channel selection: {err}"),
                }
                None
            }
            MonitorCommand::Stop => Some(StopReason::Requested),
        }
    }
    /// Drains queued commands without blocking.
    fn poll_commands(&mut self, commands: &Receiver<MonitorCommand>) -> Option<StopReason> {
        loop {
            match commands.try_recv() {
                Ok(command) => {
                    if let Some(reason) = self.handle(command) {
                        return Some(reason);
                    }
                }
                Err(std::sync::mpsc::TryRecvError::Empty) => return None,
                Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                    return Some(StopReason::ControlDisconnected)
                }
            }
        }
    }
    /// Sleeps for one interval while still reacting to commands.
    fn wait_for_cadence(&mut self, commands: &Receiver<MonitorCommand>) -> Option<StopReason> {
        let deadline = Instant::now() + self.settings.interval;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match commands.recv_timeout(remaining) {
                Ok(command) => {
                    if let Some(reason) = self.handle(command) {
                        return Some(reason);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    return Some(StopReason::ControlDisconnected)
                }
            }
        }
    }
    /// Runs until a stop command, a closed control channel, or an error.
    /// Device and sink are released before returning in every case.
    pub fn run(&mut self, commands: &Receiver<MonitorCommand>) -> Result<StopReason, MonitorError> {
        info!(
            "Acquisition started: {} channels every {:?}",
            self.settings.channel_names.len(),
            self.settings.interval
        );
        let outcome = self.cycle_until_stopped(commands);
        let cleanup = self.shutdown();
        match &outcome {
            Ok(reason) if self.history.is_empty() => {
                warn!("Acquisition stopped ({reason:?}) before the first sample")
            }
            Ok(reason) => info!(
                "Acquisition stopped ({reason:?}) after {} samples, {} retained",
                self.history.appended(),
                self.history.len()
            ),
            Err(err) => error!("Acquisition aborted: {err}"),
        }
        let reason = outcome?;
        cleanup?;
        Ok(reason)
    }
    fn cycle_until_stopped(
        &mut self,
        commands: &Receiver<MonitorCommand>,
    ) -> Result<StopReason, MonitorError> {
        loop {
            if let Some(reason) = self.poll_commands(commands) {
                return Ok(reason);
            }
            let decision = self.step()?;
            debug!("cycle {} stored", decision.cycle);
            if let Some(reason) = self.wait_for_cadence(commands) {
                return Ok(reason);
            }
        }
    }
    /// Closes the device and the sink; later calls are no-ops.
    pub fn shutdown(&mut self) -> Result<(), MonitorError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        let device = self.device.close();
        match &device {
            Ok(()) => info!("Acquisition device closed"),
            Err(err) => error!("Failed to close acquisition device: {err}"),
        }
        let sink = self.sink.close();
        if let Err(err) = &sink {
            error!("Failed to close record sink: {err}");
        }
        device.and(sink)
    }
}
impl<V: DisplaySurface> Drop for AcquisitionLoop<V> {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::history::{HistoryFrame, LatestFrame};
    use crate::drivers::scripted::ScriptedDevice;
    use crate::recorder::CsvRecorder;
    use std::sync::mpsc::channel;
    #[derive(Default)]
    struct CountingDisplay {
        latest: Vec<LatestFrame>,
        history: Vec<HistoryFrame>,
    }
    impl DisplaySurface for CountingDisplay {
        fn show_latest(&mut self, frame: &LatestFrame) {
            self.latest.push(frame.clone());
        }
        fn show_history(&mut self, frame: &HistoryFrame) {
            self.history.push(frame.clone());
        }
    }
    fn settings(channels: usize) -> LoopSettings {
        LoopSettings {
            channel_names: (0..channels).map(|i| format!("AIN{i}")).collect(),
            interval: Duration::ZERO,
            conversion: ConversionPolicy::All,
            retention: Retention::Unbounded,
            redraw_every: 10,
        }
    }
    fn lines(path: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }
    #[test]
    fn repeated_clock_readings_still_advance_time() {
        assert_eq!(strictly_after(None, 0.0), 0.0);
        assert_eq!(strictly_after(Some(1.0), 2.0), 2.0);
        assert!(strictly_after(Some(0.0), 0.0) > 0.0);
        for last in [1.5, (1u64 << 25) as f64, 1.0e9, 3.2e12] {
            let next = strictly_after(Some(last), last);
            assert!(next > last, "{next} not after {last}");
            let mut store = HistoryStore::new(1, Retention::Unbounded).unwrap();
            store.append(last, &[0.0], &[0.0]).unwrap();
            store.append(next, &[0.0], &[0.0]).unwrap();
        }
    }
    #[test]
    fn two_cycles_store_convert_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");
        let device = ScriptedDevice::new(vec![vec![0.0, 1.0, -1.0], vec![0.1, 1.1, -0.9]]);
        let calls = device.calls();
        let sink = CsvRecorder::open(&path).unwrap();
        let calibration = ChebyshevCalibration::default();
        let mut pipeline = AcquisitionLoop::new(
            Box::new(device),
            Box::new(sink),
            CountingDisplay::default(),
            calibration.clone(),
            settings(3),
        )
        .unwrap();
        pipeline.step().unwrap();
        pipeline.step().unwrap();
        let history = pipeline.history();
        assert_eq!(history.len(), 2);
        for (c, expected) in [[0.0, 0.1], [1.0, 1.1], [-1.0, -0.9]].iter().enumerate() {
            let snap = history.snapshot(c).unwrap();
            assert_eq!(snap.raw, expected.to_vec());
            let converted: Vec<f64> = expected.iter().map(|v| calibration.convert(*v)).collect();
            assert_eq!(snap.derived, converted);
            assert!(snap.times[0] < snap.times[1]);
        }
        assert_eq!(pipeline.display().latest.len(), 2);
        assert_eq!(pipeline.display().history.len(), 1);
        pipeline.shutdown().unwrap();
        pipeline.shutdown().unwrap();
        assert_eq!(calls.closes(), 1);
        let written = lines(&path);
        assert_eq!(written.len(), 3);
        assert!(written[0].starts_with("Timestamp,AIN0_Voltage"));
        assert!(written[1].contains(",0.000,1.000,-1.000,"));
        assert!(written[2].contains(",0.100,1.100,-0.900,"));
    }
    #[test]
    fn read_failure_still_releases_device_and_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");
        let readings: Vec<Vec<f64>> = (0..25).map(|i| vec![i as f64, 0.5]).collect();
        let device = ScriptedDevice::new(readings);
        let calls = device.calls();
        let mut pipeline = AcquisitionLoop::new(
            Box::new(device),
            Box::new(CsvRecorder::open(&path).unwrap()),
            CountingDisplay::default(),
            ChebyshevCalibration::default(),
            settings(2),
        )
        .unwrap();
        let (_tx, rx) = channel();
        let err = pipeline.run(&rx).unwrap_err();
        assert!(matches!(err, MonitorError::Device(ref msg) if msg.contains("exhausted")));
        assert_eq!(calls.reads(), 25);
        assert_eq!(calls.closes(), 1);
        let display = pipeline.display();
        assert_eq!(display.latest.len(), 25);
        let cycles: Vec<usize> = display.history.iter().map(|f| f.times.len()).collect();
        assert_eq!(cycles, vec![1, 11, 21]);
        assert_eq!(lines(&path).len(), 26);
        drop(pipeline);
        assert_eq!(calls.closes(), 1);
    }
    #[test]
    fn stop_command_ends_run_between_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let device = ScriptedDevice::new(vec![vec![1.0]; 5]);
        let calls = device.calls();
        let mut pipeline = AcquisitionLoop::new(
            Box::new(device),
            Box::new(CsvRecorder::open(dir.path().join("run.csv")).unwrap()),
            CountingDisplay::default(),
            ChebyshevCalibration::default(),
            settings(1),
        )
        .unwrap();
        let (tx, rx) = channel();
        tx.send(MonitorCommand::Stop).unwrap();
        assert_eq!(pipeline.run(&rx).unwrap(), StopReason::Requested);
        assert_eq!(calls.reads(), 0);
        assert_eq!(calls.closes(), 1);
    }
    #[test]
    fn dropped_control_channel_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let device = ScriptedDevice::new(vec![vec![1.0]; 5]);
        let calls = device.calls();
        let mut pipeline = AcquisitionLoop::new(
            Box::new(device),
            Box::new(CsvRecorder::open(dir.path().join("run.csv")).unwrap()),
            CountingDisplay::default(),
            ChebyshevCalibration::default(),
            settings(1),
        )
        .unwrap();
        let (tx, rx) = channel::<MonitorCommand>();
        drop(tx);
        assert_eq!(pipeline.run(&rx).unwrap(), StopReason::ControlDisconnected);
        assert_eq!(calls.closes(), 1);
    }
    #[test]
    fn selection_command_switches_detail_channel() {
        let dir = tempfile::tempdir().unwrap();
        let device = ScriptedDevice::new(vec![vec![1.0, 2.0, 3.0]; 3]);
        let mut pipeline = AcquisitionLoop::new(
            Box::new(device),
            Box::new(CsvRecorder::open(dir.path().join("run.csv")).unwrap()),
            CountingDisplay::default(),
            ChebyshevCalibration::default(),
            settings(3),
        )
        .unwrap();
        let (tx, rx) = channel();
        tx.send(MonitorCommand::SelectChannel(2)).unwrap();
        tx.send(MonitorCommand::SelectChannel(9)).unwrap();
        assert!(pipeline.run(&rx).is_err());
        let history = &pipeline.display().history;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].selected_channel, 2);
        assert_eq!(history[0].selected_raw, vec![3.0]);
    }
}
