use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use log::{info, warn};
use crate::drivers::{ConversionPolicy, MonitorError};
/// Durable row-by-row storage for acquired samples.
pub trait RecordSink: Send {
    /// Writes the header unless the target already carries one.
    fn write_header(&mut self, columns: &[String]) -> Result<(), MonitorError>;
    /// Persists one row; it must be durable before this returns.
    fn write_row(&mut self, values: &[f64]) -> Result<(), MonitorError>;
    fn close(&mut self) -> Result<(), MonitorError>;
}
/// Column layout shared by the header and every data row.
#[derive(Clone, Debug)]
pub struct RecordLayout {
    channel_names: Vec<String>,
    converted: Vec<usize>,
}
impl RecordLayout {
    pub fn new(channel_names: Vec<String>, policy: &ConversionPolicy) -> Self {
        let converted = (0..channel_names.len())
            .filter(|idx| policy.applies_to(*idx))
            .collect();
        Self {
            channel_names,
            converted,
        }
    }
    pub fn header(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(1 + self.channel_names.len() + self.converted.len());
        columns.push("Timestamp".to_owned());
        columns.extend(self.channel_names.iter().map(|name| format!("{name}_Voltage")));
        columns.extend(
            self.converted
                .iter()
                .map(|idx| format!("{}_Temp", self.channel_names[*idx])),
        );
        columns
    }
    pub fn row(&self, time: f64, raw: &[f64], derived: &[f64]) -> Vec<f64> {
        let mut values = Vec::with_capacity(1 + raw.len() + self.converted.len());
        values.push(time);
        values.extend_from_slice(raw);
        values.extend(
            self.converted
                .iter()
                .map(|idx| derived.get(*idx).copied().unwrap_or(f64::NAN)),
        );
        values
    }
}
// Cuts an unterminated last line left by an interrupted run. Returns the kept length.
fn trim_torn_row(path: &Path) -> std::io::Result<u64> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let len = file.metadata()?.len();
    let mut buf = [0u8; 4096];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(buf.len() as u64);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|b| *b == b'\n') {
            let keep = start + pos as u64 + 1;
            if keep < len {
                warn!(
                    "Dropping {} bytes of an incomplete row at the end of {}",
                    len - keep,
                    path.display()
                );
                file.set_len(keep)?;
            }
            return Ok(keep);
        }
        end = start;
    }
    if len > 0 {
        warn!("{} holds no complete line, starting it over", path.display());
        file.set_len(0)?;
    }
    Ok(0)
}
/// Append-mode CSV file, flushed after every row.
pub struct CsvRecorder {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    has_header: bool,
    rows_written: u64,
}
impl CsvRecorder {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let path = path.as_ref().to_path_buf();
        let has_header = path.is_file() && trim_torn_row(&path)? > 0;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        if has_header {
            info!("Appending to existing record file {}", path.display());
        } else {
            info!("Recording to new file {}", path.display());
        }
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            has_header,
            rows_written: 0,
        })
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    fn writer(&mut self) -> Result<&mut BufWriter<File>, MonitorError> {
        self.writer.as_mut().ok_or_else(|| {
            MonitorError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "record file already closed",
            ))
        })
    }
}
impl RecordSink for CsvRecorder {
    fn write_header(&mut self, columns: &[String]) -> Result<(), MonitorError> {
        if self.has_header {
            return Ok(());
        }
        let w = self.writer()?;
        writeln!(w, "{}", columns.join(","))?;
        w.flush()?;
        self.has_header = true;
        Ok(())
    }
    fn write_row(&mut self, values: &[f64]) -> Result<(), MonitorError> {
        let w = self.writer()?;
        let mut first = true;
        for val in values {
            if !first {
                write!(w, ",")?;
            }
            first = false;
            if val.is_finite() {
                write!(w, "{:.3}", val)?;
            }
        }
        writeln!(w)?;
        w.flush()?;
        self.rows_written += 1;
        Ok(())
    }
    fn close(&mut self) -> Result<(), MonitorError> {
        if let Some(mut w) = self.writer.take() {
            w.flush()?;
            w.get_ref().sync_all()?;
            info!(
                "Record file {} closed after {} rows",
                self.path.display(),
                self.rows_written
            );
        }
        Ok(())
    }
}
impl Drop for CsvRecorder {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("Failed to close {}: {err}", self.path.display());
        }
    }
}
