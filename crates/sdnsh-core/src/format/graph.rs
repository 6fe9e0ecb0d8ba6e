// ASCII time-series graph

use chrono::{Local, TimeZone};

/// Half an hour either side of a single sample, in milliseconds.
const SINGLE_SAMPLE_SPAN: i64 = 1_800_000;

/// Terminal dimensions the graph is drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphSize {
    pub columns: usize,
    pub lines: usize,
}

impl Default for GraphSize {
    fn default() -> Self {
        Self {
            columns: 80,
            lines: 24,
        }
    }
}

/// Draw `(epoch_ms, value)` points as filled columns under a labelled y
/// axis with date and time ticks along the bottom. Percent units pin the
/// top of the axis at 100.
pub fn line_graph(points: &[(i64, f64)], label: &str, units: Option<&str>, size: GraphSize) -> String {
    if points.is_empty() {
        return "None.".into();
    }
    let mut max_y = points.iter().map(|p| p.1).fold(f64::MIN, f64::max);
    let mut min_x = points.iter().map(|p| p.0).min().unwrap_or_default();
    let mut max_x = points.iter().map(|p| p.0).max().unwrap_or_default();
    if units == Some("%") {
        max_y = 100.0;
    }
    let fractional = max_y < 10.0 && points.iter().any(|p| p.1.fract().abs() > f64::EPSILON);
    let y_label = |y: f64| {
        if fractional {
            format!("{y:.5}")
        } else {
            format!("{}", y.round())
        }
    };
    let axis = y_label(max_y).len();

    let width = size.columns.saturating_sub(axis).max(8);
    let height = size.lines.saturating_sub(5).max(2);
    let y_bucket = max_y / to_f64(height);
    if max_x == min_x {
        min_x -= SINGLE_SAMPLE_SPAN;
        max_x += SINGLE_SAMPLE_SPAN;
    }
    let x_bucket = to_f64_i(max_x - min_x) / to_f64(width);

    let mut grid = vec![vec![' '; width]; height];
    for &(x, y) in points {
        let yc = if y_bucket <= 0.0 {
            height - 1
        } else {
            clamp_index((max_y - y) / y_bucket, height)
        };
        let xc = clamp_index(to_f64_i(x - min_x) / x_bucket, width);
        for line in &mut grid[yc..] {
            line[xc] = '#';
        }
    }

    let mut out = format!("{label}\n");
    for (i, line) in grid.iter().enumerate().take(height - 1) {
        let tick = max_y - to_f64(i) * y_bucket;
        let body: String = line[..width - 1].iter().collect();
        out.push_str(&format!("{:>axis$}|{body}\n", y_label(tick)));
    }
    let floor: String = grid[height - 1][..width - 1]
        .iter()
        .map(|c| if *c == ' ' { '_' } else { *c })
        .collect();
    out.push_str(&format!("{:>axis$}|{floor}\n", "0"));

    // one tick every seven columns, the last pinned to the newest sample
    let ticks = width / 7;
    let interval = to_f64_i(max_x - min_x) / (to_f64(width) / 7.0);
    let mut times = " ".repeat(axis);
    let mut dates = " ".repeat(axis);
    let mut previous_date = String::new();
    for i in 0..ticks {
        let last = i + 1 == ticks;
        let stamp = if last {
            max_x
        } else {
            min_x + round_i64(interval * to_f64(i))
        };
        let Some(when) = Local.timestamp_millis_opt(stamp).single() else {
            continue;
        };
        let (date, time) = if last {
            let pad = " ".repeat(width % 7);
            (
                format!("{pad}{}", when.format(" %m/%d^")),
                format!("{pad}{}", when.format(" %H:%M^")),
            )
        } else {
            (when.format("^%m/%d ").to_string(), when.format("^%H:%M ").to_string())
        };
        times.push_str(&time);
        if date == previous_date {
            dates.push_str(&" ".repeat(7));
        } else {
            dates.push_str(&date);
            previous_date = date;
        }
    }
    out.push_str(&times);
    out.push('\n');
    out.push_str(&dates);
    out.push('\n');
    out.push_str(&" ".repeat(axis + (width / 2).saturating_sub(2)));
    out.push_str("Time");
    out
}

#[allow(clippy::cast_precision_loss)]
fn to_f64(n: usize) -> f64 {
    n as f64
}

#[allow(clippy::cast_precision_loss)]
fn to_f64_i(n: i64) -> f64 {
    n as f64
}

#[allow(clippy::cast_possible_truncation)]
fn round_i64(v: f64) -> i64 {
    v.round() as i64
}

/// Round `v` to a cell index in `0..len`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_index(v: f64, len: usize) -> usize {
    if v.is_nan() || v < 0.0 {
        return 0;
    }
    (v.round() as usize).min(len - 1)
}
