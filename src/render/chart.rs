use std::path::{Path, PathBuf};

use crate::error::RenderError;
use crate::processing::histogram::{Histogram, REPORT_BINS};
use crate::render::canvas::{self, Canvas, Color, Rect};
use crate::render::summary::REPORT_TITLE;
use crate::state::dataset::Dataset;

pub const FIGURE_WIDTH: u32 = 1800;
pub const FIGURE_HEIGHT: u32 = 1200;

/// Height of the band holding the figure title.
pub const TITLE_BAND: i32 = 60;

/// Space around each plot area inside its quarter of the figure.
const MARGIN_LEFT: i32 = 150;
const MARGIN_RIGHT: i32 = 30;
const MARGIN_TOP: i32 = 50;
const MARGIN_BOTTOM: i32 = 80;

const LABEL_SCALE: i32 = 2;
const PANEL_TITLE_SCALE: i32 = 3;
const FIGURE_TITLE_SCALE: i32 = 4;
const TARGET_TICKS: usize = 6;

const TIME_LABEL: &str = "TIME (S)";
const CURRENT_LABEL: &str = "CURRENT (A)";
const RAW_LABEL: &str = "ADC RAW VALUE";
const COUNT_LABEL: &str = "COUNT";

/// `<stem>_analysis.png` next to the source CSV.
pub fn figure_path(csv_path: &Path) -> PathBuf {
    sibling_with_suffix(csv_path, "_analysis.png")
}

pub(crate) fn sibling_with_suffix(csv_path: &Path, suffix: &str) -> PathBuf {
    let stem = csv_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    csv_path.with_file_name(format!("{stem}{suffix}"))
}

/// Closed value range of one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    /// Range covering the finite values with `pad` extra on each side. A
    /// degenerate range is widened so it can be drawn.
    pub fn covering(values: &[f64], pad: f64) -> Self {
        let (lo, hi) = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Self::new(lo, hi, pad)
    }

    pub fn new(lo: f64, hi: f64, pad: f64) -> Self {
        if !lo.is_finite() || !hi.is_finite() {
            return Self { min: 0.0, max: 1.0 };
        }
        if lo == hi {
            let half = if lo == 0.0 { 0.5 } else { lo.abs() * 0.05 };
            return Self {
                min: lo - half,
                max: hi + half,
            };
        }
        let span = hi - lo;
        Self {
            min: lo - span * pad,
            max: hi + span * pad,
        }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Captions drawn around one plot area.
struct Captions {
    title: &'static str,
    x_label: &'static str,
    y_label: &'static str,
}

/// Maps data coordinates into a plot area.
struct Panel {
    cell: Rect,
    area: Rect,
    x: AxisRange,
    y: AxisRange,
    captions: Captions,
}

impl Panel {
    fn new(cell: Rect, x: AxisRange, y: AxisRange, captions: Captions) -> Self {
        let area = Rect::new(
            cell.x0 + MARGIN_LEFT,
            cell.y0 + MARGIN_TOP,
            cell.x1 - MARGIN_RIGHT,
            cell.y1 - MARGIN_BOTTOM,
        );
        Self {
            cell,
            area,
            x,
            y,
            captions,
        }
    }

    fn to_px(&self, x: f64, y: f64) -> (i32, i32) {
        let fx = (x - self.x.min) / self.x.span();
        let fy = (y - self.y.min) / self.y.span();
        let px = self.area.x0 as f64 + fx * (self.area.width() - 1) as f64;
        let py = (self.area.y1 - 1) as f64 - fy * (self.area.height() - 1) as f64;
        (px.round() as i32, py.round() as i32)
    }

    /// Grid, frame and numeric tick labels.
    fn draw_axes(&self, canvas: &mut Canvas) {
        canvas.set_clip(None);
        let char_h = canvas::GLYPH_HEIGHT * LABEL_SCALE;

        let xs = nice_ticks(self.x.min, self.x.max, TARGET_TICKS);
        for &t in &xs.values {
            let (px, _) = self.to_px(t, self.y.min);
            canvas.vline(px, self.area.y0, self.area.y1 - 1, canvas::GRID, 1.0);
            let label = format_tick(t, xs.step);
            let w = canvas::text_width(&label, LABEL_SCALE);
            canvas.vline(px, self.area.y1, self.area.y1 + 5, canvas::BLACK, 1.0);
            canvas.text(px - w / 2, self.area.y1 + 10, &label, LABEL_SCALE, canvas::BLACK);
        }

        let ys = nice_ticks(self.y.min, self.y.max, TARGET_TICKS);
        for &t in &ys.values {
            let (_, py) = self.to_px(self.x.min, t);
            canvas.hline(self.area.x0, self.area.x1 - 1, py, canvas::GRID, 1.0);
            let label = format_tick(t, ys.step);
            let w = canvas::text_width(&label, LABEL_SCALE);
            canvas.hline(self.area.x0 - 5, self.area.x0 - 1, py, canvas::BLACK, 1.0);
            canvas.text(self.area.x0 - 10 - w, py - char_h / 2, &label, LABEL_SCALE, canvas::BLACK);
        }

        canvas.stroke_rect(self.area, canvas::BLACK);
        self.draw_captions(canvas);
    }

    /// Title above the plot area, x label under the ticks, y label rotated
    /// along the left edge of the cell.
    fn draw_captions(&self, canvas: &mut Canvas) {
        let mid_x = (self.area.x0 + self.area.x1) / 2;
        let mid_y = (self.area.y0 + self.area.y1) / 2;
        let Captions {
            title,
            x_label,
            y_label,
        } = self.captions;

        let w = canvas::text_width(title, PANEL_TITLE_SCALE);
        let title_y = self.area.y0 - 12 - canvas::GLYPH_HEIGHT * PANEL_TITLE_SCALE;
        canvas.text(mid_x - w / 2, title_y, title, PANEL_TITLE_SCALE, canvas::BLACK);

        let w = canvas::text_width(x_label, LABEL_SCALE);
        let label_y = self.area.y1 + 10 + canvas::GLYPH_HEIGHT * LABEL_SCALE + 16;
        canvas.text(mid_x - w / 2, label_y, x_label, LABEL_SCALE, canvas::BLACK);

        let h = canvas::text_width(y_label, LABEL_SCALE);
        canvas.text_vertical(self.cell.x0 + 16, mid_y + h / 2, y_label, LABEL_SCALE, canvas::BLACK);
    }

    fn clip(&self, canvas: &mut Canvas) {
        canvas.set_clip(Some(self.area));
    }

    fn line_series(&self, canvas: &mut Canvas, xs: &[f64], ys: &[f64], color: Color) {
        self.clip(canvas);
        let points: Vec<(i32, i32)> = xs
            .iter()
            .zip(ys)
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(&x, &y)| self.to_px(x, y))
            .collect();
        canvas.polyline(&points, color, 0.7);
        canvas.set_clip(None);
    }

    fn scatter(&self, canvas: &mut Canvas, xs: &[f64], ys: &[f64], color: Color) {
        self.clip(canvas);
        for (&x, &y) in xs.iter().zip(ys) {
            if x.is_finite() && y.is_finite() {
                let (px, py) = self.to_px(x, y);
                canvas.dot(px, py, 2, color, 0.6);
            }
        }
        canvas.set_clip(None);
    }

    fn bars(&self, canvas: &mut Canvas, hist: &Histogram, color: Color) {
        self.clip(canvas);
        for (i, &count) in hist.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let (x0, y0) = self.to_px(hist.edge(i), count as f64);
            let (x1, y1) = self.to_px(hist.edge(i + 1), 0.0);
            let bar = Rect::new(x0, y0, x1.max(x0 + 1) + 1, y1 + 1);
            canvas.fill_rect(bar, color, 0.7);
            canvas.stroke_rect(bar, canvas::BLACK);
        }
        canvas.set_clip(None);
    }
}

/// Draw the four analysis views into one figure.
pub fn render_figure(dataset: &Dataset) -> Canvas {
    let mut canvas = Canvas::new(FIGURE_WIDTH, FIGURE_HEIGHT, canvas::WHITE);
    let title = REPORT_TITLE.to_ascii_uppercase();
    let w = canvas::text_width(&title, FIGURE_TITLE_SCALE);
    let title_y = (TITLE_BAND - canvas::GLYPH_HEIGHT * FIGURE_TITLE_SCALE) / 2;
    canvas.text((FIGURE_WIDTH as i32 - w) / 2, title_y, &title, FIGURE_TITLE_SCALE, canvas::BLACK);

    let half_w = (FIGURE_WIDTH / 2) as i32;
    let half_h = (FIGURE_HEIGHT as i32 - TITLE_BAND) / 2;
    let cell = |col: i32, row: i32| {
        Rect::new(
            col * half_w,
            TITLE_BAND + row * half_h,
            (col + 1) * half_w,
            TITLE_BAND + (row + 1) * half_h,
        )
    };

    let elapsed = dataset.elapsed_seconds();
    let raw = dataset.raw_values();
    let derived = dataset.derived_values();
    let time_axis = AxisRange::covering(&elapsed, 0.02);
    let raw_axis = AxisRange::covering(&raw, 0.05);
    let derived_axis = AxisRange::covering(&derived, 0.05);

    // current over time
    let p1 = Panel::new(
        cell(0, 0),
        time_axis,
        derived_axis,
        Captions {
            title: "CURRENT OVER TIME",
            x_label: TIME_LABEL,
            y_label: CURRENT_LABEL,
        },
    );
    p1.draw_axes(&mut canvas);
    p1.line_series(&mut canvas, &elapsed, &derived, canvas::BLUE);

    // ADC over time
    let p2 = Panel::new(
        cell(1, 0),
        time_axis,
        raw_axis,
        Captions {
            title: "ADC RAW VALUE OVER TIME",
            x_label: TIME_LABEL,
            y_label: RAW_LABEL,
        },
    );
    p2.draw_axes(&mut canvas);
    p2.line_series(&mut canvas, &elapsed, &raw, canvas::RED);

    // current distribution
    if let Some(hist) = Histogram::compute(&derived, REPORT_BINS) {
        let count_axis = AxisRange {
            min: 0.0,
            max: (hist.max_count() as f64 * 1.05).max(1.0),
        };
        let p3 = Panel::new(
            cell(0, 1),
            AxisRange::new(hist.start, hist.end(), 0.02),
            count_axis,
            Captions {
                title: "CURRENT DISTRIBUTION",
                x_label: CURRENT_LABEL,
                y_label: COUNT_LABEL,
            },
        );
        p3.draw_axes(&mut canvas);
        p3.bars(&mut canvas, &hist, canvas::GREEN);
    }

    // ADC vs current
    let p4 = Panel::new(
        cell(1, 1),
        raw_axis,
        derived_axis,
        Captions {
            title: "ADC RAW VALUE VS CURRENT",
            x_label: RAW_LABEL,
            y_label: CURRENT_LABEL,
        },
    );
    p4.draw_axes(&mut canvas);
    p4.scatter(&mut canvas, &raw, &derived, canvas::BLUE);

    canvas
}

/// Render and save `<stem>_analysis.png`. Returns the written path.
pub fn save_figure(dataset: &Dataset) -> Result<PathBuf, RenderError> {
    let path = figure_path(dataset.source());
    render_figure(dataset).into_image().save(&path)?;
    tracing::info!("Saved figure to {:?}", path);
    Ok(path)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ticks {
    pub step: f64,
    pub values: Vec<f64>,
}

/// Round tick positions (1, 2, 5 times a power of ten) inside `[min, max]`.
pub fn nice_ticks(min: f64, max: f64, target: usize) -> Ticks {
    let span = max - min;
    if !span.is_finite() || span <= 0.0 || target == 0 {
        return Ticks {
            step: 0.0,
            values: vec![min],
        };
    }

    let raw_step = span / target as f64;
    let magnitude = 10f64.powf(raw_step.log10().floor());
    let norm = raw_step / magnitude;
    let step = magnitude
        * if norm <= 1.0 {
            1.0
        } else if norm <= 2.0 {
            2.0
        } else if norm <= 5.0 {
            5.0
        } else {
            10.0
        };

    let first = (min / step).ceil() as i64;
    let last = (max / step).floor() as i64;
    let values = (first..=last)
        .map(|i| {
            let v = i as f64 * step;
            if v.abs() < step * 1e-9 {
                0.0
            } else {
                v
            }
        })
        .collect();
    Ticks { step, values }
}

/// Label text with just enough decimals for the tick step.
pub fn format_tick(value: f64, step: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs().max(step.abs());
    if magnitude >= 1e6 || (step > 0.0 && step < 1e-4) {
        return format!("{value:.1e}");
    }
    let decimals = if step > 0.0 {
        (-step.log10().floor()).max(0.0) as usize
    } else {
        3
    };
    format!("{value:.decimals$}")
}
