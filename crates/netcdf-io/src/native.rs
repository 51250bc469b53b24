//! Thin helpers over the native netcdf library.
//!
//! The netcdf crate wraps libnetcdf/HDF5. HDF5 prints diagnostics to stderr
//! for every failed attribute probe, so attribute access goes through
//! [`has_attr`] first and the library's auto-printing is switched off once
//! per process.

use std::path::Path;
use std::sync::Once;

use netcdf::AttributeValue;

use crate::error::{NetCdfError, NetCdfResult};

/// Latitude coordinate names, in lookup order.
pub(crate) const LAT_NAMES: &[&str] = &["lat", "latitude", "y"];

/// Longitude coordinate names, in lookup order.
pub(crate) const LON_NAMES: &[&str] = &["lon", "longitude", "x"];

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when errors
/// are handled gracefully by the Rust code (e.g., when checking for optional
/// attributes that don't exist). This function disables that output by calling
/// H5Eset_auto2 with null handlers. Safe to call multiple times.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Open a NetCDF file, returning [`NetCdfError::FileNotFound`] when the path
/// does not exist.
pub(crate) fn open_file(path: &Path) -> NetCdfResult<netcdf::File> {
    if !path.exists() {
        return Err(NetCdfError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    silence_hdf5_errors();
    netcdf::open(path)
        .map_err(|e| NetCdfError::InvalidFormat(format!("Failed to open {}: {}", path.display(), e)))
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
pub(crate) fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

/// Helper to get f32 attribute.
pub(crate) fn get_f32_attr(var: &netcdf::Variable, name: &str) -> Option<f32> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f32::try_from(attr_value).ok()
}

/// Helper to get a string attribute. String arrays are joined with commas.
pub(crate) fn get_string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    string_value(var.attribute_value(name)?.ok()?)
}

/// Helper to get a global (file-level) string attribute.
pub(crate) fn get_global_string_attr(file: &netcdf::File, name: &str) -> Option<String> {
    if !file.attributes().any(|attr| attr.name() == name) {
        return None;
    }
    string_value(file.attribute(name)?.value().ok()?)
}

fn string_value(value: AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Str(s) => Some(s),
        AttributeValue::Strs(v) => Some(v.join(",")),
        _ => None,
    }
}

/// Find the first variable among `names` present in the file.
pub(crate) fn find_variable<'f>(
    file: &'f netcdf::File,
    names: &[&str],
) -> Option<netcdf::Variable<'f>> {
    names.iter().find_map(|name| file.variable(name))
}

/// Read a 1-D coordinate variable as f64, trying each alias in order.
pub(crate) fn read_coord(file: &netcdf::File, names: &[&str]) -> NetCdfResult<Vec<f64>> {
    let var = find_variable(file, names).ok_or_else(|| {
        NetCdfError::MissingData(format!("{} coordinate variable", names.first().copied().unwrap_or("?")))
    })?;
    if var.dimensions().len() != 1 {
        return Err(NetCdfError::InvalidFormat(format!(
            "coordinate '{}' must be 1-D, found {} dimensions",
            var.name(),
            var.dimensions().len()
        )));
    }
    Ok(var.get_values::<f64, _>(..)?)
}

/// Read a data variable as f32 with CF packing and missing values applied.
///
/// `scale_factor`/`add_offset` are honoured; `_FillValue` and `missing_value`
/// become NaN.
pub(crate) fn read_unpacked_f32(var: &netcdf::Variable) -> NetCdfResult<Vec<f32>> {
    let raw: Vec<f32> = var
        .get_values::<f32, _>(..)
        .map_err(|e| NetCdfError::InvalidFormat(format!("Failed to read {}: {}", var.name(), e)))?;

    let scale_factor = get_f32_attr(var, "scale_factor").unwrap_or(1.0);
    let add_offset = get_f32_attr(var, "add_offset").unwrap_or(0.0);
    let fills: Vec<f32> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|name| get_f32_attr(var, name))
        .filter(|v| v.is_finite())
        .collect();

    Ok(raw
        .into_iter()
        .map(|val| {
            if fills.iter().any(|&f| val == f) {
                f32::NAN
            } else {
                val * scale_factor + add_offset
            }
        })
        .collect())
}
