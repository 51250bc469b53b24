//! Reading grid fields and time series from NetCDF files.

use std::path::Path;

use chrono::NaiveDate;
use composite_common::{Calendar, ExtraAxis, GridAxes, GridField, TimeSeriesField};
use tracing::debug;

use crate::error::{NetCdfError, NetCdfResult};
use crate::native::{
    find_variable, get_global_string_attr, get_string_attr, open_file, read_coord,
    read_unpacked_f32, LAT_NAMES, LON_NAMES,
};

/// Global attribute carrying the Set label of a composite or run output.
pub const SET_ATTRIBUTE: &str = "Set";

/// Attribute on an extra-axis coordinate variable holding its labels.
pub const LABELS_ATTRIBUTE: &str = "labels";

/// Time coordinate names, in lookup order.
const TIME_NAMES: &[&str] = &["time", "t"];

/// Read a 2-D `(lat, lon)` or 3-D `(extra, lat, lon)` variable.
///
/// The extra axis (month, PFT, column...) takes its labels from the
/// `labels` attribute of the coordinate variable of the same name, its
/// numeric values, or else its indices.
pub fn read_field(path: impl AsRef<Path>, variable: &str) -> NetCdfResult<GridField> {
    let path = path.as_ref();
    let file = open_file(path)?;

    let var = file
        .variable(variable)
        .ok_or_else(|| NetCdfError::MissingData(format!("variable '{}' in {}", variable, path.display())))?;

    let dims: Vec<(String, usize)> = var.dimensions().iter().map(|d| (d.name(), d.len())).collect();
    let extra = match dims.len() {
        2 => None,
        3 => Some(read_extra_axis(&file, &dims[0].0, dims[0].1)?),
        n => {
            return Err(NetCdfError::InvalidFormat(format!(
                "variable '{}' has {} dimensions, expected (lat, lon) or (extra, lat, lon)",
                variable, n
            )))
        }
    };
    let n = dims.len();
    check_spatial_dims(variable, &dims[n - 2].0, &dims[n - 1].0)?;

    let lat = read_coord(&file, LAT_NAMES)?;
    let lon = read_coord(&file, LON_NAMES)?;
    if lat.len() != dims[n - 2].1 || lon.len() != dims[n - 1].1 {
        return Err(NetCdfError::InvalidFormat(format!(
            "coordinate lengths ({}, {}) do not match '{}' shape ({}, {})",
            lat.len(),
            lon.len(),
            variable,
            dims[n - 2].1,
            dims[n - 1].1
        )));
    }

    let mut axes = GridAxes::new(lat, lon);
    if let Some(extra) = extra {
        axes = axes.with_extra(extra);
    }

    let data = read_unpacked_f32(&var)?;
    let mut field = GridField::new(variable, axes, data)?;
    field.units = get_string_attr(&var, "units");

    debug!(
        path = %path.display(),
        variable = variable,
        nlat = field.axes.nlat(),
        nlon = field.axes.nlon(),
        layers = field.nlayers(),
        "Read grid field"
    );

    Ok(field)
}

/// Read a `(time, lat, lon)` or `(time, extra, lat, lon)` variable with
/// decoded CF time stamps.
pub fn read_time_series(path: impl AsRef<Path>, variable: &str) -> NetCdfResult<TimeSeriesField> {
    let path = path.as_ref();
    let file = open_file(path)?;

    let var = file
        .variable(variable)
        .ok_or_else(|| NetCdfError::MissingData(format!("variable '{}' in {}", variable, path.display())))?;

    let dims: Vec<(String, usize)> = var.dimensions().iter().map(|d| (d.name(), d.len())).collect();
    if dims.len() != 3 && dims.len() != 4 {
        return Err(NetCdfError::InvalidFormat(format!(
            "variable '{}' has {} dimensions, expected (time, lat, lon) or (time, extra, lat, lon)",
            variable,
            dims.len()
        )));
    }
    if !TIME_NAMES.contains(&dims[0].0.as_str()) {
        return Err(NetCdfError::InvalidFormat(format!(
            "first dimension of '{}' is '{}', expected time",
            variable, dims[0].0
        )));
    }
    let n = dims.len();
    check_spatial_dims(variable, &dims[n - 2].0, &dims[n - 1].0)?;

    let time_var = find_variable(&file, TIME_NAMES)
        .ok_or_else(|| NetCdfError::MissingData("time coordinate variable".to_string()))?;
    let units = get_string_attr(&time_var, "units")
        .ok_or_else(|| NetCdfError::MissingData("time 'units' attribute".to_string()))?;
    let calendar = match get_string_attr(&time_var, "calendar") {
        Some(name) => name.parse::<Calendar>()?,
        None => Calendar::Standard,
    };
    let offsets: Vec<f64> = time_var.get_values::<f64, _>(..)?;
    let times = decode_times(&units, calendar, &offsets)?;

    let mut axes = GridAxes::new(read_coord(&file, LAT_NAMES)?, read_coord(&file, LON_NAMES)?);
    if n == 4 {
        axes = axes.with_extra(read_extra_axis(&file, &dims[1].0, dims[1].1)?);
    }

    let data = read_unpacked_f32(&var)?;
    let mut ts = TimeSeriesField::new(variable, calendar, times, axes, data)?;
    ts.units = get_string_attr(&var, "units");

    debug!(
        path = %path.display(),
        variable = variable,
        steps = ts.ntimes(),
        calendar = %calendar,
        "Read time series"
    );

    Ok(ts)
}

/// Read the global `Set` attribute, if present.
pub fn read_set_label(path: impl AsRef<Path>) -> NetCdfResult<Option<String>> {
    let file = open_file(path.as_ref())?;
    Ok(get_global_string_attr(&file, SET_ATTRIBUTE))
}

fn check_spatial_dims(variable: &str, lat_dim: &str, lon_dim: &str) -> NetCdfResult<()> {
    if !LAT_NAMES.contains(&lat_dim) || !LON_NAMES.contains(&lon_dim) {
        return Err(NetCdfError::InvalidFormat(format!(
            "trailing dimensions of '{}' are ({}, {}), expected (lat, lon)",
            variable, lat_dim, lon_dim
        )));
    }
    Ok(())
}

fn read_extra_axis(file: &netcdf::File, name: &str, len: usize) -> NetCdfResult<ExtraAxis> {
    let labels = match file.variable(name) {
        Some(var) => {
            if let Some(joined) = get_string_attr(&var, LABELS_ATTRIBUTE) {
                joined.split(',').map(|s| s.trim().to_string()).collect()
            } else {
                let values: Vec<f64> = var.get_values::<f64, _>(..)?;
                values.iter().map(|v| format_axis_value(*v)).collect()
            }
        }
        None => (0..len).map(|i| i.to_string()).collect::<Vec<_>>(),
    };

    if labels.len() != len {
        return Err(NetCdfError::InvalidFormat(format!(
            "axis '{}' has {} labels for {} entries",
            name,
            labels.len(),
            len
        )));
    }
    Ok(ExtraAxis::new(name, labels))
}

fn format_axis_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Decode CF `"<unit> since <date>"` offsets into calendar dates.
pub fn decode_times(units: &str, calendar: Calendar, offsets: &[f64]) -> NetCdfResult<Vec<NaiveDate>> {
    let (unit, rest) = units
        .split_once(" since ")
        .ok_or_else(|| NetCdfError::InvalidFormat(format!("unexpected time units '{}'", units)))?;

    let days_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
        "days" | "day" | "d" => 1.0,
        "hours" | "hour" | "h" => 1.0 / 24.0,
        "minutes" | "minute" | "min" => 1.0 / 1440.0,
        "seconds" | "second" | "s" => 1.0 / 86_400.0,
        other => {
            return Err(NetCdfError::InvalidFormat(format!(
                "unsupported time unit '{}'",
                other
            )))
        }
    };

    let date_str = rest.trim().split([' ', 'T']).next().unwrap_or_default();
    let reference = parse_reference_date(date_str)?;

    offsets
        .iter()
        .map(|&offset| Ok(calendar.add_days(reference, offset * days_per_unit)?))
        .collect()
}

/// Parse `YYYY-M-D`; CF allows unpadded fields such as `1-1-1`.
fn parse_reference_date(s: &str) -> NetCdfResult<NaiveDate> {
    let parts: Vec<&str> = s.split('-').collect();
    let parsed = match parts.as_slice() {
        [y, m, d] => match (y.parse::<i32>(), m.parse::<u32>(), d.parse::<u32>()) {
            (Ok(y), Ok(m), Ok(d)) => NaiveDate::from_ymd_opt(y, m, d),
            _ => None,
        },
        _ => None,
    };
    parsed.ok_or_else(|| NetCdfError::InvalidFormat(format!("unparseable reference date '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_decode_days_noleap() {
        let times = decode_times("days since 2001-01-01 00:00:00", Calendar::NoLeap, &[0.0, 31.0, 365.0]).unwrap();
        assert_eq!(times, vec![date(2001, 1, 1), date(2001, 2, 1), date(2002, 1, 1)]);
    }

    #[test]
    fn test_decode_hours_standard() {
        let times = decode_times("hours since 2004-02-28", Calendar::Standard, &[24.0, 48.0]).unwrap();
        assert_eq!(times, vec![date(2004, 2, 29), date(2004, 3, 1)]);
    }

    #[test]
    fn test_decode_unpadded_reference() {
        let times = decode_times("days since 1-1-1", Calendar::NoLeap, &[0.0]).unwrap();
        assert_eq!(times, vec![date(1, 1, 1)]);
    }

    #[test]
    fn test_decode_rejects_bad_units() {
        assert!(decode_times("days after 2001-01-01", Calendar::NoLeap, &[0.0]).is_err());
        assert!(decode_times("fortnights since 2001-01-01", Calendar::NoLeap, &[0.0]).is_err());
        assert!(decode_times("days since yesterday", Calendar::NoLeap, &[0.0]).is_err());
    }

    #[test]
    fn test_format_axis_value() {
        assert_eq!(format_axis_value(6.0), "6");
        assert_eq!(format_axis_value(0.5), "0.5");
    }
}
