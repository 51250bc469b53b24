//! Test data generators for synthetic model runs and observations.
//!
//! These generators create predictable, verifiable data patterns so a test
//! can tell from a value alone which Set and which cell it came from.

use chrono::NaiveDate;
use composite_common::{Calendar, GridAxes, GridField, SetLabel, TimeSeriesField};

/// A field whose value encodes the Set number, layer and cell.
///
/// `value = set * 10_000 + layer * 1_000 + ilat * 100 + ilon` (for grids up
/// to 10 x 100 cells per layer the encoding is unique).
pub fn set_field(name: &str, axes: &GridAxes, set: u32) -> GridField {
    let mut data = Vec::with_capacity(axes.len());
    for layer in 0..axes.nlayers() {
        for ilat in 0..axes.nlat() {
            for ilon in 0..axes.nlon() {
                data.push((set * 10_000 + layer as u32 * 1_000 + ilat as u32 * 100 + ilon as u32) as f32);
            }
        }
    }
    GridField {
        name: name.to_string(),
        units: None,
        axes: axes.clone(),
        data,
    }
}

/// A field with every value equal to `value`.
pub fn constant_field(name: &str, axes: &GridAxes, value: f32) -> GridField {
    GridField {
        name: name.to_string(),
        units: None,
        axes: axes.clone(),
        data: vec![value; axes.len()],
    }
}

/// `Set1..=SetN` runs of one variable, each encoded with [`set_field`].
pub fn numbered_sets(name: &str, axes: &GridAxes, n: u8) -> Vec<(SetLabel, GridField)> {
    (1..=n)
        .map(|i| (SetLabel::set(i), set_field(name, axes, i as u32)))
        .collect()
}

/// The quadrant Sets used by the composite scenario tests: Set1/Set2/Set3
/// on the 2 x 2 quadrant grid.
pub fn quadrant_sets(name: &str) -> Vec<(SetLabel, GridField)> {
    numbered_sets(name, &crate::fixtures::quadrant_axes(), 3)
}

/// Mid-month dates for every month of `years`.
pub fn monthly_dates(years: std::ops::RangeInclusive<i32>) -> Vec<NaiveDate> {
    years
        .flat_map(|y| (1..=12).filter_map(move |m| NaiveDate::from_ymd_opt(y, m, 15)))
        .collect()
}

/// Every day of `years` in the given calendar.
pub fn daily_dates(years: std::ops::RangeInclusive<i32>, calendar: Calendar) -> Vec<NaiveDate> {
    years
        .flat_map(move |y| {
            (1..=12).flat_map(move |m| {
                (1..=calendar.days_in_month(y, m)).filter_map(move |d| NaiveDate::from_ymd_opt(y, m, d))
            })
        })
        .collect()
}

/// A time series whose every cell at time `t` holds `f(times[t])`.
pub fn uniform_series<F>(
    name: &str,
    axes: &GridAxes,
    calendar: Calendar,
    times: Vec<NaiveDate>,
    f: F,
) -> TimeSeriesField
where
    F: Fn(NaiveDate) -> f32,
{
    let mut data = Vec::with_capacity(times.len() * axes.len());
    for t in &times {
        let v = f(*t);
        data.extend(std::iter::repeat(v).take(axes.len()));
    }
    TimeSeriesField {
        name: name.to_string(),
        units: None,
        calendar,
        times,
        axes: axes.clone(),
        data,
    }
}
