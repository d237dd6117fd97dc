// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod config;
mod drivers;
mod engine;
mod gui;
mod ljm;
mod recorder;
mod types;
use anyhow::{anyhow, Context, Result};
use eframe::egui;
use log::info;
use std::sync::mpsc::channel;
use crate::config::MonitorConfig;
use crate::drivers::{AcquisitionLoop, ChebyshevCalibration};
use crate::engine::GuiDisplay;
use crate::types::FrameMailbox;
use crate::recorder::CsvRecorder;

fn main() -> Result<()> {
    env_logger::init();
    let config = MonitorConfig::load()?;

    // Device and output file are opened before the window: failures here abort startup.
    let device = engine::open_device(&config)?;
    let recorder = CsvRecorder::open(&config.csv_path)
        .with_context(|| format!("failed to open {}", config.csv_path.display()))?;
    info!("Recording to {}", recorder.path().display());

    let (tx, rx) = channel();
    let (tx_cmd, rx_cmd) = channel();
    let frames = FrameMailbox::default();
    let display = GuiDisplay::new(frames.clone());
    let repaint = display.repaint_slot();
    let pipeline = AcquisitionLoop::new(
        device,
        Box::new(recorder),
        display,
        ChebyshevCalibration::default(),
        config.loop_settings(),
    )?;

    let handle = engine::spawn_thread(pipeline, tx, tx_cmd, rx_cmd)?;
    engine::install_interrupt_handler(handle.commands(), repaint.clone())?;
    let commands = handle.commands();

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1400.0, 900.0])
        .with_min_inner_size([900.0, 600.0])
        .with_title("DAQ Real-Time Monitor");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    let window = eframe::run_native(
        "DAQ Real-Time Monitor",
        options,
        Box::new(move |cc| {
            repaint.set(cc.egui_ctx.clone()).ok();
            Box::new(gui::MonitorApp::new(config, commands, rx, frames))
        }),
    );

    // Window is gone: stop acquisition if it is still running and report how it ended.
    let acquisition = handle.stop();
    window.map_err(|err| anyhow!("window error: {err}"))?;
    let reason = acquisition.context("acquisition failed")?;
    info!("Monitor closed ({reason:?})");
    Ok(())
}
