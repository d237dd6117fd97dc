use crate::drivers::{HistoryFrame, LatestFrame, MonitorError};
/// Consumer of the pipeline's frames.
///
/// `show_latest` is called every cycle and must be cheap; `show_history`
/// carries the full history and only fires when the scheduler allows it.
pub trait DisplaySurface {
    fn show_latest(&mut self, frame: &LatestFrame);
    fn show_history(&mut self, frame: &HistoryFrame);
}
/// Outcome of one scheduling decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RedrawDecision {
    pub cycle: u64,
    pub cheap: bool,
    pub expensive: bool,
    pub selected_channel: usize,
}
/// Decides which views to refresh after each new sample.
pub struct RedrawScheduler {
    every: u64,
    channel_count: usize,
    cycle: u64,
    selected_channel: usize,
    pending_selection: Option<usize>,
}
impl RedrawScheduler {
    pub fn new(every: u64, channel_count: usize) -> Result<Self, MonitorError> {
        if every == 0 {
            return Err(MonitorError::InvalidRedrawInterval);
        }
        if channel_count == 0 {
            return Err(MonitorError::InvalidChannelCount);
        }
        Ok(Self {
            every,
            channel_count,
            cycle: 0,
            selected_channel: 0,
            pending_selection: None,
        })
    }
    pub fn selected_channel(&self) -> usize {
        self.selected_channel
    }
    /// Queues a new focus channel; it takes effect at the next decision.
    pub fn select_channel(&mut self, channel: usize) -> Result<(), MonitorError> {
        if channel >= self.channel_count {
            return Err(MonitorError::ChannelOutOfRange {
                index: channel,
                count: self.channel_count,
            });
        }
        self.pending_selection = Some(channel);
        Ok(())
    }
    pub fn on_new_sample(&mut self) -> RedrawDecision {
        let mut selection_changed = false;
        if let Some(channel) = self.pending_selection.take() {
            selection_changed = channel != self.selected_channel;
            self.selected_channel = channel;
        }
        let cycle = self.cycle;
        self.cycle += 1;
        RedrawDecision {
            cycle,
            cheap: true,
            expensive: cycle % self.every == 0 || selection_changed,
            selected_channel: self.selected_channel,
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn expensive_views_refresh_every_mth_cycle() {
        let mut scheduler = RedrawScheduler::new(10, 4).unwrap();
        let decisions: Vec<RedrawDecision> = (0..25).map(|_| scheduler.on_new_sample()).collect();
        let expensive: Vec<u64> = decisions
            .iter()
            .filter(|d| d.expensive)
            .map(|d| d.cycle)
            .collect();
        assert_eq!(expensive, vec![0, 10, 20]);
        assert_eq!(decisions.iter().filter(|d| d.cheap).count(), 25);
    }
    #[test]
    fn selection_applies_at_next_decision_and_forces_refresh() {
        let mut scheduler = RedrawScheduler::new(10, 4).unwrap();
        scheduler.on_new_sample();
        scheduler.select_channel(3).unwrap();
        assert_eq!(scheduler.selected_channel(), 0);
        let decision = scheduler.on_new_sample();
        assert_eq!(decision.selected_channel, 3);
        assert!(decision.expensive);
        let next = scheduler.on_new_sample();
        assert!(!next.expensive);
        scheduler.select_channel(3).unwrap();
        assert!(!scheduler.on_new_sample().expensive);
    }
    #[test]
    fn rejects_bad_arguments() {
        assert!(RedrawScheduler::new(0, 4).is_err());
        assert!(RedrawScheduler::new(10, 0).is_err());
        let mut scheduler = RedrawScheduler::new(10, 4).unwrap();
        assert!(scheduler.select_channel(4).is_err());
    }
}
