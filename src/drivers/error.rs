use thiserror::Error;
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("channel count must be greater than zero")]
    InvalidChannelCount,
    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
    #[error("channel {index} out of range for {count} channels")]
    ChannelOutOfRange { index: usize, count: usize },
    #[error("sample time must increase: previous {previous}, got {current}")]
    NonMonotonicTime { previous: f64, current: f64 },
    #[error("invalid retention policy: {0}")]
    InvalidRetention(String),
    #[error("redraw interval must be greater than zero")]
    InvalidRedrawInterval,
    #[error("acquisition device error: {0}")]
    Device(String),
    #[error("record sink I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for MonitorError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        MonitorError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for MonitorError {
    fn from(value: image::ImageError) -> Self {
        MonitorError::Plot(value.to_string())
    }
}
