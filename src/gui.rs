// src/gui.rs
use eframe::egui;
use egui::Color32;
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender};
use crate::config::MonitorConfig;
use crate::drivers::{render_columns_png, HistoryFrame, LatestFrame, MonitorError, PlotStyle, RecordedTable};
use crate::types::*;

const LOG_LINES: usize = 8;
// Messages handled per repaint; the rest wait for the next one
const MAX_MESSAGES_PER_FRAME: usize = 64;

/// `<dir>/<csv stem>_<channel>.png`
pub fn export_path(csv_path: &Path, channel_name: &str) -> PathBuf {
    let stem = csv_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_owned());
    csv_path.with_file_name(format!("{stem}_{channel_name}.png"))
}

// Render one channel of the recorded file next to it
pub fn export_channel_png(
    csv_path: &Path,
    channel_name: &str,
    style: PlotStyle,
) -> Result<PathBuf, MonitorError> {
    let table = RecordedTable::from_csv(csv_path)?;
    let voltage = format!("{channel_name}_Voltage");
    let temp = format!("{channel_name}_Temp");
    let mut columns = vec![voltage.as_str()];
    if table.column_index(&temp).is_ok() {
        columns.push(temp.as_str());
    }
    let png = render_columns_png(&table, "Timestamp", &columns, style)?;
    let target = export_path(csv_path, channel_name);
    std::fs::write(&target, png)?;
    Ok(target)
}

pub struct MonitorApp {
    config: MonitorConfig,
    channel_names: Vec<String>,
    slider_channel: usize,
    latest: Option<LatestFrame>,
    history: Option<HistoryFrame>,
    running: bool,
    failure: Option<String>,
    log_messages: Vec<String>,
    rx: Receiver<MonitorMessage>,
    frames: FrameMailbox,
    tx_cmd: Sender<MonitorCommand>,
}

impl MonitorApp {
    pub fn new(
        config: MonitorConfig,
        tx_cmd: Sender<MonitorCommand>,
        rx: Receiver<MonitorMessage>,
        frames: FrameMailbox,
    ) -> Self {
        let channel_names = config.channel_names();
        Self {
            config,
            channel_names,
            slider_channel: 0,
            latest: None,
            history: None,
            running: true,
            failure: None,
            log_messages: vec!["DAQ monitor ready.".to_owned()],
            rx,
            frames,
            tx_cmd,
        }
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > LOG_LINES {
            self.log_messages.remove(0);
        }
    }

    fn drain_messages(&mut self, ctx: &egui::Context) {
        if let Some(frame) = self.frames.take_latest() {
            self.latest = Some(frame);
        }
        if let Some(frame) = self.frames.take_history() {
            self.history = Some(frame);
        }
        let pending: Vec<MonitorMessage> = self.rx.try_iter().take(MAX_MESSAGES_PER_FRAME).collect();
        for msg in pending {
            match msg {
                MonitorMessage::Log(s) => self.log(&s),
                MonitorMessage::Stopped(failure) => {
                    self.running = false;
                    match &failure {
                        Some(err) => self.log(&format!("Acquisition failed: {err}")),
                        None => self.log("Acquisition stopped"),
                    }
                    self.failure = failure;
                    // Acquisition is over either way; main reports the outcome.
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            }
        }
    }

    fn channel_name(&self, channel: usize) -> String {
        self.channel_names
            .get(channel)
            .cloned()
            .unwrap_or_else(|| format!("channel {channel}"))
    }

    fn export_selected(&mut self) {
        let name = self.channel_name(self.slider_channel);
        match export_channel_png(&self.config.csv_path, &name, PlotStyle::default()) {
            Ok(path) => self.log(&format!("Saved {}", path.display())),
            Err(err) => self.log(&format!("Export failed: {err}")),
        }
    }

    fn bar_charts(&self, ui: &mut egui::Ui) {
        let Some(latest) = &self.latest else {
            ui.label("Waiting for the first sample...");
            return;
        };
        let height = ui.available_height() * 0.3;
        ui.columns(2, |cols| {
            let voltage_bars: Vec<Bar> = latest
                .raw
                .iter()
                .enumerate()
                .map(|(i, v)| Bar::new(i as f64, *v).width(0.8))
                .collect();
            let [v_lo, v_hi] = self.config.voltage_range;
            Plot::new("voltage_bars")
                .height(height)
                .include_y(v_lo)
                .include_y(v_hi)
                .allow_drag(false)
                .allow_zoom(false)
                .y_axis_label("Voltage (V)")
                .show(&mut cols[0], |plot_ui| {
                    plot_ui.bar_chart(
                        BarChart::new(voltage_bars)
                            .color(Color32::from_rgb(0, 160, 255))
                            .name("Voltage"),
                    );
                });

            // Unconverted channels carry NaN and get no bar
            let temp_bars: Vec<Bar> = latest
                .derived
                .iter()
                .enumerate()
                .filter(|(_, t)| t.is_finite())
                .map(|(i, t)| Bar::new(i as f64, *t).width(0.8))
                .collect();
            let [t_lo, t_hi] = self.config.temperature_range;
            Plot::new("temperature_bars")
                .height(height)
                .include_y(t_lo)
                .include_y(t_hi)
                .allow_drag(false)
                .allow_zoom(false)
                .y_axis_label("Temperature (K)")
                .show(&mut cols[1], |plot_ui| {
                    plot_ui.bar_chart(
                        BarChart::new(temp_bars)
                            .color(Color32::from_rgb(255, 80, 80))
                            .name("Temperature"),
                    );
                });
        });
    }

    fn history_plots(&self, ui: &mut egui::Ui) {
        let Some(frame) = &self.history else {
            return;
        };
        let (x_lo, x_hi) = frame.x_bounds(self.config.initial_time_window_s);
        let height = ui.available_height() * 0.5;
        let name = self.channel_name(frame.selected_channel);
        ui.label(format!("{name} over time"));

        let voltage: Vec<[f64; 2]> = frame
            .times
            .iter()
            .zip(&frame.selected_raw)
            .map(|(t, v)| [*t, *v])
            .collect();
        let temperature: Vec<[f64; 2]> = frame
            .times
            .iter()
            .zip(&frame.selected_derived)
            .filter(|(_, d)| d.is_finite())
            .map(|(t, d)| [*t, *d])
            .collect();
        Plot::new("detail_plot")
            .height(height)
            .include_x(x_lo)
            .include_x(x_hi)
            .legend(Legend::default())
            .x_axis_label("Time (s)")
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new(PlotPoints::new(voltage))
                        .name(format!("{name} Voltage (V)"))
                        .color(Color32::from_rgb(0, 255, 255)),
                );
                if !temperature.is_empty() {
                    plot_ui.line(
                        Line::new(PlotPoints::new(temperature))
                            .name(format!("{name} Temperature (K)"))
                            .color(Color32::YELLOW),
                    );
                }
            });

        ui.label("All channels (offset by index)");
        Plot::new("overview_plot")
            .include_x(x_lo)
            .include_x(x_hi)
            .x_axis_label("Time (s)")
            .show(ui, |plot_ui| {
                for (i, series) in frame.overview_raw.iter().enumerate() {
                    let offset = i as f64;
                    let points: Vec<[f64; 2]> = frame
                        .times
                        .iter()
                        .zip(series)
                        .map(|(t, v)| [*t, *v + offset])
                        .collect();
                    let color = if i == frame.selected_channel {
                        Color32::YELLOW
                    } else {
                        Color32::from_gray(140)
                    };
                    plot_ui.line(Line::new(PlotPoints::new(points)).color(color).width(1.0));
                }
            });
    }
}

impl eframe::App for MonitorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_messages(ctx);

        let mut visuals = egui::Visuals::dark();
        visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(10, 10, 15);
        ctx.set_visuals(visuals);

        egui::SidePanel::left("L").min_width(260.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("DAQ Real-Time Monitor");
            ui.separator();

            let (status, color) = match (&self.failure, self.running) {
                (Some(_), _) => ("FAILED", Color32::RED),
                (None, true) => ("ACQUIRING", Color32::GREEN),
                (None, false) => ("STOPPED", Color32::YELLOW),
            };
            ui.label(egui::RichText::new(status).strong().color(color));
            let samples = self.latest.as_ref().map_or(0, |l| l.sample_index + 1);
            ui.label(format!("Samples: {samples}"));
            if let Some(latest) = &self.latest {
                ui.label(format!("Elapsed: {:.1} s", latest.time));
            }
            ui.label(format!("Recording to {}", self.config.csv_path.display()));

            ui.add_space(10.0);
            let last = self.channel_names.len().saturating_sub(1);
            let slider = ui.add(egui::Slider::new(&mut self.slider_channel, 0..=last).text("Channel"));
            if slider.changed() {
                if self.tx_cmd.send(MonitorCommand::SelectChannel(self.slider_channel)).is_err() {
                    self.log("Acquisition thread is no longer running");
                }
            }
            ui.label(self.channel_name(self.slider_channel));

            if ui.button("Export PNG").clicked() {
                self.export_selected();
            }

            ui.add_space(10.0);
            ui.separator();
            egui::ScrollArea::vertical().max_height(160.0).show(ui, |ui| {
                for m in &self.log_messages {
                    ui.monospace(m);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.bar_charts(ui);
            ui.separator();
            self.history_plots(ui);
        });
    }
}
