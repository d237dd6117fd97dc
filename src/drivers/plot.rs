use std::io::Cursor;
use std::path::Path;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::LineSeries;
use plotters::prelude::*;
use crate::drivers::error::MonitorError;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
    /// Caption, axis labels and legend. Needs a system font.
    pub annotate: bool,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            background: RGBColor(10, 10, 10),
            palette: vec![BLUE, RED, GREEN, CYAN, MAGENTA, YELLOW, WHITE],
            annotate: true,
        }
    }
}
/// A recorded CSV file loaded column-wise.
#[derive(Clone, Debug)]
pub struct RecordedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}
impl RecordedTable {
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&text)
    }
    pub fn parse(text: &str) -> Result<Self, MonitorError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| MonitorError::Plot("recorded file is empty".into()))?;
        let columns: Vec<String> = header.split(',').map(|c| c.trim().to_owned()).collect();
        let mut rows = Vec::new();
        for (line_no, line) in lines.enumerate() {
            let row: Vec<f64> = line
                .split(',')
                .map(|field| {
                    let field = field.trim();
                    // Blank fields are values the logger could not convert.
                    if field.is_empty() {
                        Ok(f64::NAN)
                    } else {
                        field.parse::<f64>().map_err(|_| {
                            MonitorError::Plot(format!(
                                "row {}: `{field}` is not a number",
                                line_no + 2
                            ))
                        })
                    }
                })
                .collect::<Result<_, _>>()?;
            if row.len() != columns.len() {
                return Err(MonitorError::Plot(format!(
                    "row {} has {} fields, header has {}",
                    line_no + 2,
                    row.len(),
                    columns.len()
                )));
            }
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }
    pub fn column_index(&self, name: &str) -> Result<usize, MonitorError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| MonitorError::Plot(format!("no column named `{name}`")))
    }
    pub fn column(&self, name: &str) -> Result<Vec<f64>, MonitorError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| row[idx]).collect())
    }
}
/// Renders `y_columns` against `x_column` as line series and encodes a PNG.
pub fn render_columns_png(
    table: &RecordedTable,
    x_column: &str,
    y_columns: &[&str],
    style: PlotStyle,
) -> Result<Vec<u8>, MonitorError> {
    if table.rows.is_empty() {
        return Err(MonitorError::Plot("recorded file has no rows".into()));
    }
    if y_columns.is_empty() {
        return Err(MonitorError::Plot("no columns selected for the y-axis".into()));
    }
    let xs = table.column(x_column)?;
    let series: Vec<(String, Vec<(f64, f64)>)> = y_columns
        .iter()
        .map(|name| {
            let ys = table.column(name)?;
            let points = xs
                .iter()
                .copied()
                .zip(ys)
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .collect();
            Ok(((*name).to_owned(), points))
        })
        .collect::<Result<_, MonitorError>>()?;
    let x_bounds = padded_bounds(series.iter().flat_map(|(_, p)| p.iter().map(|(x, _)| *x)));
    let y_bounds = padded_bounds(series.iter().flat_map(|(_, p)| p.iter().map(|(_, y)| *y)));
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut builder = ChartBuilder::on(&root);
        builder.margin(10);
        if style.annotate {
            let caption = format!("{} vs {x_column}", y_columns.join(", "));
            builder
                .caption(caption, ("sans-serif", 20).into_font().color(&WHITE))
                .set_label_area_size(LabelAreaPosition::Left, 55)
                .set_label_area_size(LabelAreaPosition::Bottom, 40);
        }
        let mut chart =
            builder.build_cartesian_2d(x_bounds.0..x_bounds.1, y_bounds.0..y_bounds.1)?;
        if style.annotate {
            chart
                .configure_mesh()
                .x_desc(x_column)
                .light_line_style(&WHITE.mix(0.1))
                .label_style(("sans-serif", 12).into_font().color(&WHITE))
                .draw()?;
        }
        for (idx, (name, points)) in series.into_iter().enumerate() {
            let color = style.palette[idx % style.palette.len()];
            let drawn = chart.draw_series(LineSeries::new(points, &color))?;
            if style.annotate {
                drawn
                    .label(name)
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
            }
        }
        if style.annotate {
            chart
                .configure_series_labels()
                .border_style(&WHITE.mix(0.2))
                .background_style(&style.background)
                .label_font(("sans-serif", 12).into_font().color(&WHITE))
                .draw()?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn padded_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, MonitorError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| MonitorError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
