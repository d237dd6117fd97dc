// src/config.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use crate::drivers::{ConversionPolicy, LoopSettings, MonitorError, Retention};

pub const CONFIG_ENV: &str = "DAQ_MONITOR_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "daq_monitor.json";

// Which hardware backend to open
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceConfig {
    Simulated {
        #[serde(default)]
        seed: Option<u64>,
        #[serde(default = "default_baseline_v")]
        baseline_v: f64,
        #[serde(default = "default_noise_v")]
        noise_v: f64,
    },
    Ljm {
        #[serde(default = "default_device_type")]
        device_type: String,
        #[serde(default = "default_any")]
        connection_type: String,
        #[serde(default = "default_any")]
        identifier: String,
        // Overrides the platform's default LJM library name
        #[serde(default)]
        library_path: Option<PathBuf>,
    },
}

fn default_baseline_v() -> f64 { 2.85 }
fn default_noise_v() -> f64 { 0.01 }
fn default_device_type() -> String { "T7".to_owned() }
fn default_any() -> String { "ANY".to_owned() }

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig::Simulated {
            seed: None,
            baseline_v: default_baseline_v(),
            noise_v: default_noise_v(),
        }
    }
}

/// Settings for one monitoring session, read from a JSON file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub device: DeviceConfig,
    pub channel_count: usize,
    pub channel_prefix: String,
    pub channel_range_v: f64,
    // Extra register writes sent after the per-channel ranges, in name order
    pub extra_settings: BTreeMap<String, f64>,
    pub sampling_interval_ms: u64,
    pub conversion: ConversionPolicy,
    pub retention: Retention,
    pub redraw_every: u64,
    pub csv_path: PathBuf,
    pub initial_time_window_s: f64,
    pub voltage_range: [f64; 2],
    pub temperature_range: [f64; 2],
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            channel_count: 120,
            channel_prefix: "AIN".to_owned(),
            channel_range_v: 10.0,
            extra_settings: BTreeMap::new(),
            sampling_interval_ms: 250,
            conversion: ConversionPolicy::All,
            retention: Retention::Unbounded,
            redraw_every: 10,
            csv_path: PathBuf::from("labjack_data.csv"),
            initial_time_window_s: 60.0,
            voltage_range: [-10.0, 10.0],
            temperature_range: [-100.0, 400.0],
        }
    }
}

impl MonitorConfig {
    /// `$DAQ_MONITOR_CONFIG`, else `./daq_monitor.json` if present, else defaults.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(&path);
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::from_file(local);
        }
        info!("No configuration file found, using defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_json(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        let bad = |msg: String| -> Result<(), MonitorError> { Err(MonitorError::Config(msg)) };
        if self.channel_count == 0 {
            return Err(MonitorError::InvalidChannelCount);
        }
        if self.sampling_interval_ms == 0 {
            return bad("sampling_interval_ms must be greater than zero".into());
        }
        if self.redraw_every == 0 {
            return Err(MonitorError::InvalidRedrawInterval);
        }
        if !(self.channel_range_v > 0.0) {
            return bad(format!("channel_range_v must be positive, got {}", self.channel_range_v));
        }
        if let ConversionPolicy::Subset { channels } = &self.conversion {
            if let Some(&index) = channels.iter().find(|c| **c >= self.channel_count) {
                return Err(MonitorError::ChannelOutOfRange { index, count: self.channel_count });
            }
        }
        self.retention.validate()?;
        for (name, [lo, hi]) in [("voltage_range", self.voltage_range), ("temperature_range", self.temperature_range)] {
            if !(lo < hi) {
                return bad(format!("{name} must be increasing, got [{lo}, {hi}]"));
            }
        }
        Ok(())
    }

    pub fn channel_names(&self) -> Vec<String> {
        (0..self.channel_count)
            .map(|i| format!("{}{}", self.channel_prefix, i))
            .collect()
    }

    // Register writes for the configure step: every channel's range, then the extras
    pub fn device_settings(&self) -> Vec<(String, f64)> {
        self.channel_names()
            .into_iter()
            .map(|name| (format!("{name}_RANGE"), self.channel_range_v))
            .chain(self.extra_settings.iter().map(|(k, v)| (k.clone(), *v)))
            .collect()
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            channel_names: self.channel_names(),
            interval: Duration::from_millis(self.sampling_interval_ms),
            conversion: self.conversion.clone(),
            retention: self.retention,
            redraw_every: self.redraw_every,
        }
    }
}
