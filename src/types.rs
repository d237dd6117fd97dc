// src/types.rs
use crate::drivers::{HistoryFrame, LatestFrame};
use std::sync::{Arc, Mutex};

// Commands sent from the GUI to the acquisition thread
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonitorCommand {
    // Slider moved: focus the detail view on another channel
    SelectChannel(usize),
    Stop,
}

// Messages sent from the acquisition thread to the GUI
#[derive(Clone, Debug)]
pub enum MonitorMessage {
    Log(String),
    Stopped(Option<String>), // engine finished, with error text if it failed
}

// Newest frames waiting for the GUI. A slower reader only ever sees the latest one.
#[derive(Clone, Default)]
pub struct FrameMailbox {
    latest: Arc<Mutex<Option<LatestFrame>>>,   // bar charts, every cycle
    history: Arc<Mutex<Option<HistoryFrame>>>, // detail + overview plots, every M-th cycle
}

impl FrameMailbox {
    pub fn put_latest(&self, frame: LatestFrame) {
        if let Ok(mut slot) = self.latest.lock() {
            *slot = Some(frame);
        }
    }

    pub fn put_history(&self, frame: HistoryFrame) {
        if let Ok(mut slot) = self.history.lock() {
            *slot = Some(frame);
        }
    }

    pub fn take_latest(&self) -> Option<LatestFrame> {
        self.latest.lock().ok().and_then(|mut slot| slot.take())
    }

    pub fn take_history(&self) -> Option<HistoryFrame> {
        self.history.lock().ok().and_then(|mut slot| slot.take())
    }
}
