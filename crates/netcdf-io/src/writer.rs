//! Writing grid fields and time series as CF-style NetCDF.

use std::path::Path;

use chrono::{Datelike, NaiveDate, Utc};
use composite_common::{GridAxes, GridField, SetLabel, TimeSeriesField};
use tracing::info;

use crate::error::{NetCdfError, NetCdfResult};
use crate::native::silence_hdf5_errors;
use crate::reader::{LABELS_ATTRIBUTE, SET_ATTRIBUTE};

/// Write a single field with its coordinates, tagged with a Set label.
///
/// Missing cells are stored as NaN with a NaN `_FillValue`, so a read back
/// reproduces the same finite/NaN pattern.
pub fn write_field(path: impl AsRef<Path>, field: &GridField, set_label: &SetLabel) -> NetCdfResult<()> {
    let path = path.as_ref();
    silence_hdf5_errors();
    let mut file = netcdf::create(path)?;

    let mut dims: Vec<&str> = Vec::with_capacity(3);
    if let Some(extra) = &field.axes.extra {
        dims.push(extra.name.as_str());
    }
    dims.push("lat");
    dims.push("lon");

    define_axes(&mut file, &field.axes)?;

    {
        let mut var = file.add_variable::<f32>(&field.name, &dims)?;
        var.put_attribute("_FillValue", f32::NAN)?;
        if let Some(units) = &field.units {
            var.put_attribute("units", units.as_str())?;
        }
        var.put_values(&field.data, ..)?;
    }

    file.add_attribute(SET_ATTRIBUTE, set_label.as_str())?;
    file.add_attribute("history", history_entry().as_str())?;

    info!(
        path = %path.display(),
        variable = %field.name,
        set = %set_label,
        finite_cells = field.finite_count(),
        "Wrote grid field"
    );

    Ok(())
}

/// Write a time series with a `days since <first year>-01-01` time axis in
/// the series' calendar.
pub fn write_time_series(path: impl AsRef<Path>, ts: &TimeSeriesField) -> NetCdfResult<()> {
    let path = path.as_ref();
    let first = ts
        .times
        .first()
        .ok_or_else(|| NetCdfError::MissingData(format!("time steps of '{}'", ts.name)))?;
    let reference = NaiveDate::from_ymd_opt(first.year(), 1, 1)
        .ok_or_else(|| NetCdfError::InvalidFormat(format!("bad year {}", first.year())))?;
    let offsets = ts
        .times
        .iter()
        .map(|t| Ok(ts.calendar.days_since(reference, *t)? as f64))
        .collect::<NetCdfResult<Vec<f64>>>()?;

    silence_hdf5_errors();
    let mut file = netcdf::create(path)?;
    file.add_dimension("time", ts.ntimes())?;
    {
        let mut time_var = file.add_variable::<f64>("time", &["time"])?;
        time_var.put_attribute("units", format!("days since {}", reference.format("%Y-%m-%d")))?;
        time_var.put_attribute("calendar", ts.calendar.to_string())?;
        time_var.put_values(&offsets, ..)?;
    }

    define_axes(&mut file, &ts.axes)?;

    let mut dims: Vec<&str> = vec!["time"];
    if let Some(extra) = &ts.axes.extra {
        dims.push(extra.name.as_str());
    }
    dims.push("lat");
    dims.push("lon");

    {
        let mut var = file.add_variable::<f32>(&ts.name, &dims)?;
        var.put_attribute("_FillValue", f32::NAN)?;
        if let Some(units) = &ts.units {
            var.put_attribute("units", units.as_str())?;
        }
        var.put_values(&ts.data, ..)?;
    }
    file.add_attribute("history", history_entry().as_str())?;

    info!(path = %path.display(), variable = %ts.name, steps = ts.ntimes(), "Wrote time series");
    Ok(())
}

fn define_axes(file: &mut netcdf::FileMut, axes: &GridAxes) -> NetCdfResult<()> {
    file.add_dimension("lat", axes.nlat())?;
    file.add_dimension("lon", axes.nlon())?;

    {
        let mut lat_var = file.add_variable::<f64>("lat", &["lat"])?;
        lat_var.put_attribute("standard_name", "latitude")?;
        lat_var.put_attribute("units", "degrees_north")?;
        lat_var.put_values(&axes.lat, ..)?;
    }
    {
        let mut lon_var = file.add_variable::<f64>("lon", &["lon"])?;
        lon_var.put_attribute("standard_name", "longitude")?;
        lon_var.put_attribute("units", "degrees_east")?;
        lon_var.put_values(&axes.lon, ..)?;
    }

    if let Some(extra) = &axes.extra {
        if let Some(bad) = extra.labels.iter().find(|l| l.contains(',')) {
            return Err(NetCdfError::InvalidFormat(format!(
                "axis label '{}' contains a comma",
                bad
            )));
        }
        file.add_dimension(&extra.name, extra.len())?;
        let positions: Vec<f64> = (0..extra.len()).map(|i| i as f64).collect();
        let mut axis_var = file.add_variable::<f64>(&extra.name, &[extra.name.as_str()])?;
        axis_var.put_attribute(LABELS_ATTRIBUTE, extra.labels.join(","))?;
        axis_var.put_values(&positions, ..)?;
    }
    Ok(())
}

fn history_entry() -> String {
    format!("{}: written by elm-composite", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"))
}
