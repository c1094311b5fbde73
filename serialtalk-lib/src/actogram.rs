//! Actogram layout: activity plotted against time of day, one row per day.
//!
//! Rows are double-plotted. The row of day `d` shows day `d` over hours
//! `0..24` and day `d + 1` over hours `24..48`, so that activity crossing
//! midnight reads as one continuous bout. The last day has nothing on the
//! right half of its row.

use crate::constants::ACTOGRAM_SCALE;
use crate::record::Record;
use chrono::{DateTime, NaiveDate, TimeZone, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

const HOURS_PER_ROW: f64 = 48.0;
const BARS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActogramPoint {
    /// Position in the row, `0.0..48.0`
    pub hour: f64,
    /// Bar height, the value scaled so a row never touches the next
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActogramRow {
    pub day: NaiveDate,
    pub points: Vec<ActogramPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Actogram {
    pub title: String,
    /// First day at the top
    pub rows: Vec<ActogramRow>,
    pub max_height: f64,
}

/// Panel layout `(rows, columns)` for `n` channels side by side
pub fn grid_shape(n: usize) -> (usize, usize) {
    let side = (n as f64).sqrt();
    (side.round() as usize, side.ceil() as usize)
}

/// Average points into `bin`-long bins aligned on local midnight of the
/// first point's day. Bins without points are left out.
///
/// Returns `(epoch seconds of bin start, mean value)` in time order.
pub fn resample<Tz: TimeZone>(records: &[Record], tz: &Tz, bin: Duration) -> Vec<(i64, f64)> {
    let bin_secs = bin.as_secs() as i64;
    let Some(first) = records.iter().map(|r| r.timestamp).min() else {
        return Vec::new();
    };
    if bin_secs == 0 {
        return records.iter().map(|r| (r.timestamp as i64, r.value.as_f64())).collect();
    }
    let origin = local_midnight(first as i64, tz).unwrap_or(first as i64);

    let mut bins: BTreeMap<i64, (f64, u32)> = BTreeMap::new();
    for record in records {
        let bucket = (record.timestamp as i64 - origin).div_euclid(bin_secs);
        let entry = bins.entry(origin + bucket * bin_secs).or_insert((0.0, 0));
        entry.0 += record.value.as_f64();
        entry.1 += 1;
    }
    bins.into_iter().map(|(start, (sum, n))| (start, sum / n as f64)).collect()
}

fn local_midnight<Tz: TimeZone>(timestamp: i64, tz: &Tz) -> Option<i64> {
    let local = DateTime::from_timestamp(timestamp, 0)?.with_timezone(tz);
    let midnight = local.date_naive().and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight).earliest().map(|dt| dt.timestamp())
}

impl Actogram {
    /// Lay out records by local calendar day.
    ///
    /// With `display_bin` the records are first resampled to that bin size
    /// to keep long recordings light. Returns `None` when there is nothing
    /// to plot.
    pub fn build<Tz: TimeZone>(
        title: impl Into<String>,
        records: &[Record],
        tz: &Tz,
        display_bin: Option<Duration>,
    ) -> Option<Self> {
        let points = match display_bin {
            Some(bin) => resample(records, tz, bin),
            None => records.iter().map(|r| (r.timestamp as i64, r.value.as_f64())).collect(),
        };

        let mut by_day: BTreeMap<NaiveDate, Vec<(f64, f64)>> = BTreeMap::new();
        for (timestamp, value) in points {
            let Some(utc) = DateTime::from_timestamp(timestamp, 0) else {
                continue;
            };
            let local = utc.with_timezone(tz);
            let hour = local.hour() as f64 + local.minute() as f64 / 60.0 + local.second() as f64 / 3600.0;
            by_day.entry(local.date_naive()).or_default().push((hour, value));
        }

        let first = *by_day.keys().next()?;
        let last = *by_day.keys().next_back()?;

        let mut rows = Vec::new();
        let mut max_height: f64 = 0.0;
        for day in first.iter_days().take_while(|d| *d <= last) {
            let mut points = Vec::new();
            let halves = [(day, 0.0), (day.succ_opt().unwrap_or(day), 24.0)];
            for (half_day, offset) in halves {
                if offset > 0.0 && half_day == day {
                    continue;
                }
                for &(hour, value) in by_day.get(&half_day).into_iter().flatten() {
                    let height = value * ACTOGRAM_SCALE;
                    max_height = max_height.max(height);
                    points.push(ActogramPoint {
                        hour: hour + offset,
                        height,
                    });
                }
            }
            rows.push(ActogramRow { day, points });
        }

        Some(Self {
            title: title.into(),
            rows,
            max_height,
        })
    }

    pub fn days(&self) -> usize {
        self.rows.len()
    }

    /// Render as text, `columns` characters for the 48 hours of a row.
    ///
    /// Each cell shows the tallest point falling in it. The tallest point
    /// of the whole actogram reaches 90% of the cell.
    pub fn render_text(&self, columns: usize) -> String {
        let columns = columns.max(8);
        let mut out = String::new();
        let label_width = 9;

        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "{:label_width$} {}", "", axis(columns));

        // Full scale is the value the tallest bar stands for
        let full_scale = self.max_height / ACTOGRAM_SCALE;
        for row in &self.rows {
            let mut cells = vec![0.0f64; columns];
            for point in &row.points {
                let col = ((point.hour / HOURS_PER_ROW) * columns as f64) as usize;
                let col = col.min(columns - 1);
                cells[col] = cells[col].max(point.height);
            }
            let bars: String = cells
                .iter()
                .map(|&h| {
                    if full_scale <= 0.0 {
                        return BARS[0];
                    }
                    let level = (h / full_scale * (BARS.len() - 1) as f64).round() as usize;
                    BARS[level.min(BARS.len() - 1)]
                })
                .collect();
            let _ = writeln!(out, "{:label_width$} |{}|", row.day.format("%a %d-%m").to_string(), bars);
        }
        out
    }
}

/// Time axis with a label every 6 hours
fn axis(columns: usize) -> String {
    let mut line = vec![' '; columns + 2];
    let mut free = 0;
    for hour in (0..48).step_by(6) {
        let col = 1 + hour * columns / 48;
        let label = format!("{:02}:00", hour % 24);
        if col + label.len() > line.len() {
            break;
        }
        if col < free {
            continue;
        }
        for (i, c) in label.chars().enumerate() {
            line[col + i] = c;
        }
        free = col + label.len() + 1;
    }
    line.into_iter().collect::<String>().trim_end().to_string()
}
