//! Temporal aggregation of model and observation time series.
//!
//! Conversion factors are divisors: a model flux in gC/m²/s with factor
//! `1/86400` becomes gC/m²/day.

use chrono::Datelike;
use composite_common::{
    CompositeError, CompositeResult, ExtraAxis, GridAxes, GridField, TimeSeriesField, TimeStep,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Planting/harvest day written for cells without a crop.
pub const NO_CROP_DAY: f32 = 999.0;

/// Reduction applied across a month axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnualStat {
    Sum,
    Mean,
}

/// Mean annual value of a monthly or daily series.
///
/// With `monthly_total`, values are rates: monthly steps are scaled by the
/// days in their month (calendar-aware) and each year is summed, so a NaN
/// anywhere in a year makes that year NaN. Otherwise each year is averaged
/// over its non-NaN steps. Years are then averaged, skipping NaN.
pub fn mean_annual(ts: &TimeSeriesField, conv_factor: f64, monthly_total: bool) -> CompositeResult<GridField> {
    check_conv_factor(conv_factor)?;
    let step = ts.time_step()?;
    let n = ts.axes.len();

    let mut yearly = Vec::new();
    for year in ts.years() {
        let steps: Vec<usize> = (0..ts.ntimes()).filter(|&t| ts.times[t].year() == year).collect();
        let annual = if monthly_total {
            let mut acc = vec![0.0f64; n];
            for &t in &steps {
                let date = ts.times[t];
                let scale = match step {
                    TimeStep::Monthly => ts.calendar.days_in_month(date.year(), date.month()) as f64,
                    TimeStep::Daily => 1.0,
                };
                for (a, &v) in acc.iter_mut().zip(ts.step(t)) {
                    *a += v as f64 / conv_factor * scale;
                }
            }
            acc.into_iter().map(|v| v as f32).collect()
        } else {
            nan_skipping_mean(steps.iter().map(|&t| ts.step(t)), n, 1.0 / conv_factor)
        };
        yearly.push(annual);
    }

    debug!(
        variable = %ts.name,
        years = yearly.len(),
        step = ?step,
        monthly_total,
        "Computed mean annual"
    );
    Ok(output(ts, ts.axes.clone(), nan_skipping_mean(yearly.iter().map(Vec::as_slice), n, 1.0)))
}

/// Multi-year mean of selected months, on a new `month` axis labelled with
/// `labels` (paired with `months` in order).
///
/// With `monthly_total`, monthly steps are scaled by days in month and
/// daily steps are summed per month (NaN-propagating) before averaging
/// across years. Without it, every step of a month is averaged directly.
pub fn summer_monthly_mean(
    ts: &TimeSeriesField,
    months: &[u32],
    labels: &[String],
    conv_factor: f64,
    monthly_total: bool,
) -> CompositeResult<GridField> {
    check_conv_factor(conv_factor)?;
    if months.len() != labels.len() {
        return Err(CompositeError::InvalidConfig(format!(
            "{} months but {} month labels",
            months.len(),
            labels.len()
        )));
    }
    if ts.axes.extra.is_some() {
        return Err(CompositeError::format(format!(
            "'{}' already has an extra axis; monthly means need a lat/lon series",
            ts.name
        )));
    }

    let step = ts.time_step()?;
    let n = ts.axes.len();
    let mut data = Vec::with_capacity(n * months.len());

    for &month in months {
        let in_month: Vec<usize> = (0..ts.ntimes()).filter(|&t| ts.times[t].month() == month).collect();
        if in_month.is_empty() {
            return Err(CompositeError::format(format!(
                "'{}' has no data for month {}",
                ts.name, month
            )));
        }

        let layer = match (monthly_total, step) {
            (true, TimeStep::Monthly) => {
                let scaled: Vec<Vec<f32>> = in_month
                    .iter()
                    .map(|&t| {
                        let date = ts.times[t];
                        let days = ts.calendar.days_in_month(date.year(), date.month()) as f64;
                        scale(ts.step(t), days / conv_factor)
                    })
                    .collect();
                nan_skipping_mean(scaled.iter().map(Vec::as_slice), n, 1.0)
            }
            (true, TimeStep::Daily) => {
                let mut totals = Vec::new();
                for year in ts.years() {
                    let days: Vec<usize> = in_month.iter().copied().filter(|&t| ts.times[t].year() == year).collect();
                    if days.is_empty() {
                        continue;
                    }
                    let mut acc = vec![0.0f64; n];
                    for &t in &days {
                        for (a, &v) in acc.iter_mut().zip(ts.step(t)) {
                            *a += v as f64 / conv_factor;
                        }
                    }
                    totals.push(acc.into_iter().map(|v| v as f32).collect::<Vec<f32>>());
                }
                nan_skipping_mean(totals.iter().map(Vec::as_slice), n, 1.0)
            }
            (false, _) => nan_skipping_mean(in_month.iter().map(|&t| ts.step(t)), n, 1.0 / conv_factor),
        };
        data.extend(layer);
    }

    let axes = GridAxes::new(ts.axes.lat.clone(), ts.axes.lon.clone())
        .with_extra(ExtraAxis::new("month", labels.to_vec()));
    Ok(output(ts, axes, data))
}

/// Per-year maximum averaged over years (crop yield).
pub fn mean_annual_max(ts: &TimeSeriesField) -> CompositeResult<GridField> {
    let n = ts.axes.len();
    let mut yearly = Vec::new();
    for year in ts.years() {
        let mut max = vec![f32::NAN; n];
        for t in (0..ts.ntimes()).filter(|&t| ts.times[t].year() == year) {
            for (m, &v) in max.iter_mut().zip(ts.step(t)) {
                if !v.is_nan() && (m.is_nan() || v > *m) {
                    *m = v;
                }
            }
        }
        yearly.push(max);
    }
    if yearly.is_empty() {
        return Err(CompositeError::format(format!("'{}' has no time steps", ts.name)));
    }
    Ok(output(ts, ts.axes.clone(), nan_skipping_mean(yearly.iter().map(Vec::as_slice), n, 1.0)))
}

/// Mean planting or harvest day from the December record of each year.
///
/// Days of 0 and 999 mark cells without a crop and are ignored.
pub fn mean_annual_dates(ts: &TimeSeriesField) -> CompositeResult<GridField> {
    let n = ts.axes.len();
    let december: Vec<Vec<f32>> = (0..ts.ntimes())
        .filter(|&t| ts.times[t].month() == 12)
        .map(|t| {
            ts.step(t)
                .iter()
                .map(|&v| if v == NO_CROP_DAY || v == 0.0 { f32::NAN } else { v })
                .collect()
        })
        .collect();

    if december.is_empty() {
        warn!(variable = %ts.name, "No December records; planting/harvest mean is empty");
    }
    Ok(output(ts, ts.axes.clone(), nan_skipping_mean(december.iter().map(Vec::as_slice), n, 1.0)))
}

/// Collapse a month axis into one annual layer.
///
/// Both reductions skip NaN; a cell NaN in every month stays NaN.
pub fn annual_from_climatology(field: &GridField, stat: AnnualStat) -> CompositeResult<GridField> {
    if field.axes.extra.is_none() {
        return Err(CompositeError::format(format!(
            "'{}' has no month axis to collapse",
            field.name
        )));
    }

    let n = field.axes.cells_per_layer();
    let layers = (0..field.nlayers()).map(|k| field.layer(k));
    let data = match stat {
        AnnualStat::Mean => nan_skipping_mean(layers, n, 1.0),
        AnnualStat::Sum => {
            let mut acc = vec![f32::NAN; n];
            for layer in layers {
                for (a, &v) in acc.iter_mut().zip(layer) {
                    if !v.is_nan() {
                        *a = if a.is_nan() { v } else { *a + v };
                    }
                }
            }
            acc
        }
    };

    Ok(GridField {
        name: field.name.clone(),
        units: field.units.clone(),
        axes: GridAxes::new(field.axes.lat.clone(), field.axes.lon.clone()),
        data,
    })
}

/// Replace fill values with NaN.
pub fn mask_values(field: &GridField, fills: &[f32]) -> GridField {
    field.map(field.name.clone(), |v| if fills.contains(&v) { f32::NAN } else { v })
}

/// Replace zero and negative values with NaN.
pub fn mask_non_positive(field: &GridField) -> GridField {
    field.map(field.name.clone(), |v| if v > 0.0 { v } else { f32::NAN })
}

/// Divide every value by `conv_factor`.
pub fn apply_conv_factor(field: &GridField, conv_factor: f64) -> CompositeResult<GridField> {
    check_conv_factor(conv_factor)?;
    Ok(field.map(field.name.clone(), |v| (v as f64 / conv_factor) as f32))
}

fn check_conv_factor(conv_factor: f64) -> CompositeResult<()> {
    if conv_factor == 0.0 || !conv_factor.is_finite() {
        return Err(CompositeError::InvalidConfig(format!(
            "conversion factor must be finite and non-zero, got {}",
            conv_factor
        )));
    }
    Ok(())
}

fn scale(values: &[f32], factor: f64) -> Vec<f32> {
    values.iter().map(|&v| (v as f64 * factor) as f32).collect()
}

/// Cell-wise mean of `rows` times `factor`, skipping NaN. A cell with no
/// value in any row is NaN.
fn nan_skipping_mean<'a, I>(rows: I, n: usize, factor: f64) -> Vec<f32>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut sum = vec![0.0f64; n];
    let mut count = vec![0u32; n];
    for row in rows {
        for ((s, c), &v) in sum.iter_mut().zip(count.iter_mut()).zip(row) {
            if !v.is_nan() {
                *s += v as f64;
                *c += 1;
            }
        }
    }
    sum.into_iter()
        .zip(count)
        .map(|(s, c)| if c == 0 { f32::NAN } else { (s / c as f64 * factor) as f32 })
        .collect()
}

fn output(ts: &TimeSeriesField, axes: GridAxes, data: Vec<f32>) -> GridField {
    GridField {
        name: ts.name.clone(),
        units: None,
        axes,
        data,
    }
}
