// src/engine.rs
use crate::config::{DeviceConfig, MonitorConfig};
use crate::drivers::{
    AcquisitionDevice, AcquisitionLoop, DisplaySurface, HistoryFrame, LatestFrame, MonitorError,
    SimulatedDevice, StopReason,
};
use crate::ljm::LjmDevice;
use crate::types::*;
use anyhow::{anyhow, Context, Result};
use eframe::egui;
use log::{error, info, warn};
use once_cell::sync::OnceCell;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

// Open the configured backend and push the channel configuration.
// Any failure here is fatal: the window never opens.
pub fn open_device(config: &MonitorConfig) -> Result<Box<dyn AcquisitionDevice>> {
    let mut device: Box<dyn AcquisitionDevice> = match &config.device {
        DeviceConfig::Simulated { seed, baseline_v, noise_v } => {
            Box::new(SimulatedDevice::open(*seed, *baseline_v, *noise_v))
        }
        DeviceConfig::Ljm { device_type, connection_type, identifier, library_path } => {
            Box::new(LjmDevice::open(
                device_type,
                connection_type,
                identifier,
                library_path.as_deref(),
            )?)
        }
    };
    info!("Opened {}", device.describe());
    let settings = config.device_settings();
    if let Err(err) = device.configure(&settings) {
        if let Err(close_err) = device.close() {
            warn!("Closing device after failed configuration: {close_err}");
        }
        return Err(err).context("failed to configure analog inputs");
    }
    info!(
        "Configured {} {} channels for ±{} V range",
        config.channel_count, config.channel_prefix, config.channel_range_v
    );
    Ok(device)
}

// Display surface backed by the GUI thread: frames are parked, rendering happens there.
pub struct GuiDisplay {
    frames: FrameMailbox,
    repaint: Arc<OnceCell<egui::Context>>,
}

impl GuiDisplay {
    pub fn new(frames: FrameMailbox) -> Self {
        Self { frames, repaint: Arc::new(OnceCell::new()) }
    }

    // Hands out the slot the window fills in once it exists
    pub fn repaint_slot(&self) -> Arc<OnceCell<egui::Context>> {
        self.repaint.clone()
    }

    fn repaint(&self) {
        if let Some(ctx) = self.repaint.get() {
            ctx.request_repaint();
        }
    }
}

impl DisplaySurface for GuiDisplay {
    fn show_latest(&mut self, frame: &LatestFrame) {
        self.frames.put_latest(frame.clone());
        self.repaint();
    }

    fn show_history(&mut self, frame: &HistoryFrame) {
        self.frames.put_history(frame.clone());
        self.repaint();
    }
}

type EngineResult = Result<StopReason, MonitorError>;

// Owner side of the acquisition thread. Dropping it stops and joins the thread.
pub struct EngineHandle {
    tx_cmd: Sender<MonitorCommand>,
    thread: Option<JoinHandle<EngineResult>>,
}

impl EngineHandle {
    pub fn commands(&self) -> Sender<MonitorCommand> {
        self.tx_cmd.clone()
    }

    /// Stops the thread if it is still running and returns how acquisition ended.
    pub fn stop(mut self) -> Result<StopReason> {
        self.join()
            .unwrap_or_else(|| Err(anyhow!("acquisition thread already joined")))
    }

    fn join(&mut self) -> Option<Result<StopReason>> {
        let thread = self.thread.take()?;
        // Already gone if the loop failed on its own.
        self.tx_cmd.send(MonitorCommand::Stop).ok();
        Some(match thread.join() {
            Ok(outcome) => outcome.map_err(anyhow::Error::from),
            Err(_) => Err(anyhow!("acquisition thread panicked")),
        })
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Some(Err(err)) = self.join() {
            error!("{err:#}");
        }
    }
}

pub fn spawn_thread(
    mut pipeline: AcquisitionLoop<GuiDisplay>,
    tx: Sender<MonitorMessage>,
    tx_cmd: Sender<MonitorCommand>,
    rx_cmd: Receiver<MonitorCommand>,
) -> Result<EngineHandle> {
    let thread = thread::Builder::new()
        .name("acquisition".to_owned())
        .spawn(move || {
            tx.send(MonitorMessage::Log("Acquisition running".to_owned())).ok();
            let outcome = pipeline.run(&rx_cmd);
            let failure = match &outcome {
                Ok(reason) => {
                    tx.send(MonitorMessage::Log(format!("Stopped: {reason:?}"))).ok();
                    None
                }
                Err(err) => Some(err.to_string()),
            };
            tx.send(MonitorMessage::Stopped(failure)).ok();
            outcome
        })
        .context("failed to spawn acquisition thread")?;
    Ok(EngineHandle { tx_cmd, thread: Some(thread) })
}

// Interrupt path: stop acquisition and close the window; cleanup then runs as on a normal close.
pub fn request_stop(tx_cmd: &Sender<MonitorCommand>, window: &OnceCell<egui::Context>) {
    tx_cmd.send(MonitorCommand::Stop).ok();
    if let Some(ctx) = window.get() {
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }
}

pub fn install_interrupt_handler(
    tx_cmd: Sender<MonitorCommand>,
    window: Arc<OnceCell<egui::Context>>,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    thread::Builder::new()
        .name("interrupt".to_owned())
        .spawn(move || match runtime.block_on(tokio::signal::ctrl_c()) {
            Ok(()) => {
                info!("Interrupt received, stopping acquisition");
                request_stop(&tx_cmd, &window);
            }
            Err(err) => warn!("Cannot listen for Ctrl-C: {err}"),
        })
        .context("failed to spawn interrupt thread")?;
    Ok(())
}
