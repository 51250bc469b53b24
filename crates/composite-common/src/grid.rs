//! Lat/lon grids addressed by coordinate value.
//!
//! Model history files carry explicit `lat`/`lon` coordinate arrays rather
//! than a regular spacing, so cells are located through a [`CoordIndex`]
//! built once per grid instead of arithmetic on the first point and step.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bbox::{normalize_lon_360, BoundingBox};
use crate::error::{CompositeError, CompositeResult};

/// Default tolerance when matching coordinates, in degrees.
pub const DEFAULT_COORD_TOLERANCE: f64 = 1e-4;

/// Optional third axis carried alongside lat/lon (month, PFT, column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraAxis {
    pub name: String,
    pub labels: Vec<String>,
}

impl ExtraAxis {
    pub fn new(name: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            labels,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Coordinate axes of a grid field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxes {
    /// Latitude values, one per row
    pub lat: Vec<f64>,
    /// Longitude values, one per column
    pub lon: Vec<f64>,
    /// Non-spatial leading axis, if any
    pub extra: Option<ExtraAxis>,
}

impl GridAxes {
    pub fn new(lat: Vec<f64>, lon: Vec<f64>) -> Self {
        Self {
            lat,
            lon,
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: ExtraAxis) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn nlat(&self) -> usize {
        self.lat.len()
    }

    pub fn nlon(&self) -> usize {
        self.lon.len()
    }

    /// Number of layers; 1 when no extra axis is present.
    pub fn nlayers(&self) -> usize {
        self.extra.as_ref().map(|e| e.len()).unwrap_or(1)
    }

    /// Cells in one lat/lon layer.
    pub fn cells_per_layer(&self) -> usize {
        self.nlat() * self.nlon()
    }

    /// Total number of values in a field on these axes.
    pub fn len(&self) -> usize {
        self.nlayers() * self.cells_per_layer()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat offset of `(layer, ilat, ilon)` in `[extra][lat][lon]` order.
    pub fn flat_index(&self, layer: usize, ilat: usize, ilon: usize) -> usize {
        (layer * self.nlat() + ilat) * self.nlon() + ilon
    }

    /// Extent of the coordinate values. Longitudes are reported as stored.
    pub fn bbox(&self) -> Option<BoundingBox> {
        let (min_lat, max_lat) = min_max(&self.lat)?;
        let (min_lon, max_lon) = min_max(&self.lon)?;
        Some(BoundingBox::new(min_lon, min_lat, max_lon, max_lat))
    }

    /// Whether the two axis sets describe the same grid within `tolerance`.
    ///
    /// Longitudes are compared in the 0–360 convention.
    pub fn matches(&self, other: &GridAxes, tolerance: f64) -> bool {
        self.lat.len() == other.lat.len()
            && self.lon.len() == other.lon.len()
            && self.extra == other.extra
            && self
                .lat
                .iter()
                .zip(&other.lat)
                .all(|(a, b)| (a - b).abs() <= tolerance)
            && self
                .lon
                .iter()
                .zip(&other.lon)
                .all(|(a, b)| lon_distance(*a, *b) <= tolerance)
    }

    /// Same lat/lon, ignoring the extra axis.
    pub fn spatially_matches(&self, other: &GridAxes, tolerance: f64) -> bool {
        let a = GridAxes::new(self.lat.clone(), self.lon.clone());
        let b = GridAxes::new(other.lat.clone(), other.lon.clone());
        a.matches(&b, tolerance)
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Angular distance between two longitudes regardless of convention.
fn lon_distance(a: f64, b: f64) -> f64 {
    let d = (normalize_lon_360(a) - normalize_lon_360(b)).abs();
    d.min(360.0 - d)
}

/// Coordinate-value → index lookup tables for one grid.
///
/// Coordinates are quantized to multiples of the tolerance and hashed;
/// longitudes are keyed in the 0–360 convention so a mask written with
/// -180..180 longitudes still finds its cells.
#[derive(Debug, Clone)]
pub struct CoordIndex {
    tolerance: f64,
    lat: Vec<f64>,
    lon: Vec<f64>,
    lat_keys: HashMap<i64, usize>,
    lon_keys: HashMap<i64, usize>,
}

impl CoordIndex {
    /// Build the lookup for `axes`. Fails if two coordinates collapse onto
    /// the same key at this tolerance.
    pub fn build(axes: &GridAxes, tolerance: f64) -> CompositeResult<Self> {
        if !(tolerance > 0.0 && tolerance.is_finite()) {
            return Err(CompositeError::InvalidConfig(format!(
                "coordinate tolerance must be positive, got {}",
                tolerance
            )));
        }

        let lat: Vec<f64> = axes.lat.clone();
        let lon: Vec<f64> = axes.lon.iter().map(|&x| normalize_lon_360(x)).collect();

        let lat_keys = Self::keys_for(&lat, tolerance, "lat")?;
        let lon_keys = Self::keys_for(&lon, tolerance, "lon")?;

        Ok(Self {
            tolerance,
            lat,
            lon,
            lat_keys,
            lon_keys,
        })
    }

    fn keys_for(
        values: &[f64],
        tolerance: f64,
        axis: &str,
    ) -> CompositeResult<HashMap<i64, usize>> {
        let mut keys = HashMap::with_capacity(values.len());
        for (i, &v) in values.iter().enumerate() {
            if !v.is_finite() {
                return Err(CompositeError::format(format!(
                    "non-finite {} coordinate at index {}",
                    axis, i
                )));
            }
            if let Some(prev) = keys.insert(quantize(v, tolerance), i) {
                return Err(CompositeError::format(format!(
                    "{} coordinates {} and {} are indistinguishable at tolerance {}",
                    axis, values[prev], v, tolerance
                )));
            }
        }
        Ok(keys)
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Row index of a latitude value.
    pub fn lat_index(&self, lat: f64) -> Option<usize> {
        find(&self.lat_keys, &self.lat, lat, self.tolerance)
    }

    /// Column index of a longitude value (either convention).
    pub fn lon_index(&self, lon: f64) -> Option<usize> {
        if !lon.is_finite() {
            return None;
        }
        let lon = normalize_lon_360(lon);
        find(&self.lon_keys, &self.lon, lon, self.tolerance).or_else(|| {
            // 359.99999 and 0.0 are the same meridian
            if lon + self.tolerance >= 360.0 {
                find(&self.lon_keys, &self.lon, lon - 360.0, self.tolerance)
            } else {
                None
            }
        })
    }

    /// `(ilat, ilon)` of a coordinate pair.
    pub fn lookup(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        Some((self.lat_index(lat)?, self.lon_index(lon)?))
    }
}

fn quantize(v: f64, tolerance: f64) -> i64 {
    (v / tolerance).round() as i64
}

fn find(keys: &HashMap<i64, usize>, values: &[f64], v: f64, tolerance: f64) -> Option<usize> {
    if !v.is_finite() {
        return None;
    }
    let k = quantize(v, tolerance);
    // A value within tolerance may round to a neighbouring key
    [k, k - 1, k + 1]
        .iter()
        .filter_map(|key| keys.get(key).copied())
        .find(|&i| (values[i] - v).abs() <= tolerance)
}

/// A named field on lat/lon (plus optional extra) axes.
///
/// Data is stored as a flat vector in `[extra][lat][lon]` order; missing
/// values are NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridField {
    pub name: String,
    pub units: Option<String>,
    pub axes: GridAxes,
    pub data: Vec<f32>,
}

impl GridField {
    /// Create a field, checking the data length against the axes.
    pub fn new(name: impl Into<String>, axes: GridAxes, data: Vec<f32>) -> CompositeResult<Self> {
        if data.len() != axes.len() {
            return Err(CompositeError::format(format!(
                "data length {} does not match axes ({} x {} x {})",
                data.len(),
                axes.nlayers(),
                axes.nlat(),
                axes.nlon()
            )));
        }
        Ok(Self {
            name: name.into(),
            units: None,
            axes,
            data,
        })
    }

    /// A field of the given shape with every cell NaN.
    pub fn filled_nan(name: impl Into<String>, axes: GridAxes) -> Self {
        let data = vec![f32::NAN; axes.len()];
        Self {
            name: name.into(),
            units: None,
            axes,
            data,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn nlayers(&self) -> usize {
        self.axes.nlayers()
    }

    pub fn get(&self, layer: usize, ilat: usize, ilon: usize) -> f32 {
        self.data[self.axes.flat_index(layer, ilat, ilon)]
    }

    pub fn set(&mut self, layer: usize, ilat: usize, ilon: usize, value: f32) {
        let idx = self.axes.flat_index(layer, ilat, ilon);
        self.data[idx] = value;
    }

    /// One lat/lon layer as a slice.
    pub fn layer(&self, layer: usize) -> &[f32] {
        let n = self.axes.cells_per_layer();
        &self.data[layer * n..(layer + 1) * n]
    }

    /// Value at a coordinate pair, `None` when the coordinate is not on the grid.
    pub fn value_at(&self, index: &CoordIndex, lon: f64, lat: f64, layer: usize) -> Option<f32> {
        if layer >= self.nlayers() {
            return None;
        }
        let (ilat, ilon) = index.lookup(lon, lat)?;
        Some(self.get(layer, ilat, ilon))
    }

    /// Build a coordinate index for this field's axes.
    pub fn coord_index(&self, tolerance: f64) -> CompositeResult<CoordIndex> {
        CoordIndex::build(&self.axes, tolerance)
    }

    /// Apply `f` to every value, producing a new field.
    pub fn map<F>(&self, name: impl Into<String>, f: F) -> GridField
    where
        F: Fn(f32) -> f32,
    {
        GridField {
            name: name.into(),
            units: self.units.clone(),
            axes: self.axes.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Combine two fields on identical axes elementwise.
    pub fn zip_map<F>(&self, other: &GridField, name: impl Into<String>, f: F) -> CompositeResult<GridField>
    where
        F: Fn(f32, f32) -> f32,
    {
        if self.axes != other.axes {
            return Err(CompositeError::alignment(format!(
                "'{}' and '{}' are on different axes",
                self.name, other.name
            )));
        }
        Ok(GridField {
            name: name.into(),
            units: self.units.clone(),
            axes: self.axes.clone(),
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    /// Number of finite values.
    pub fn finite_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }

    /// Mean over finite values, NaN when there are none.
    pub fn nan_mean(&self) -> f64 {
        nan_mean(&self.data)
    }

    /// Whether both fields have non-finite values in exactly the same cells.
    pub fn same_nan_pattern(&self, other: &GridField) -> bool {
        self.data.len() == other.data.len()
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| a.is_finite() == b.is_finite())
    }

    /// Bitwise equality of axes and data, treating NaN cells as equal.
    pub fn bit_identical(&self, other: &GridField) -> bool {
        self.axes == other.axes
            && self.data.len() == other.data.len()
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan()))
    }
}

/// Mean over the finite values of a slice, NaN when there are none.
pub fn nan_mean(values: &[f32]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0f64, 0usize), |(s, c), &v| (s + v as f64, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axes_2x3() -> GridAxes {
        GridAxes::new(vec![40.25, 40.75], vec![-90.25, -89.75, -89.25])
    }

    #[test]
    fn test_flat_index_layout() {
        let axes = axes_2x3().with_extra(ExtraAxis::new(
            "month",
            vec!["June".into(), "July".into()],
        ));
        assert_eq!(axes.len(), 12);
        assert_eq!(axes.flat_index(0, 0, 0), 0);
        assert_eq!(axes.flat_index(0, 1, 2), 5);
        assert_eq!(axes.flat_index(1, 0, 1), 7);
    }

    #[test]
    fn test_coord_index_both_lon_conventions() {
        let index = CoordIndex::build(&axes_2x3(), DEFAULT_COORD_TOLERANCE).unwrap();
        assert_eq!(index.lookup(-89.75, 40.75), Some((1, 1)));
        assert_eq!(index.lookup(270.25, 40.75), Some((1, 1)));
        assert_eq!(index.lookup(-89.75 + 5e-5, 40.25 - 5e-5), Some((0, 1)));
        assert_eq!(index.lookup(-89.5, 40.25), None);
        assert_eq!(index.lookup(f64::NAN, 40.25), None);
    }

    #[test]
    fn test_coord_index_rejects_indistinguishable() {
        let axes = GridAxes::new(vec![1.0, 1.00001], vec![0.0]);
        assert!(matches!(
            CoordIndex::build(&axes, 1e-3),
            Err(CompositeError::FormatError(_))
        ));
    }

    #[test]
    fn test_new_checks_length() {
        assert!(GridField::new("x", axes_2x3(), vec![0.0; 5]).is_err());
        assert!(GridField::new("x", axes_2x3(), vec![0.0; 6]).is_ok());
    }

    #[test]
    fn test_nan_mean_skips_non_finite() {
        assert_eq!(nan_mean(&[1.0, f32::NAN, 3.0, f32::INFINITY]), 2.0);
        assert!(nan_mean(&[f32::NAN]).is_nan());
        assert!(nan_mean(&[]).is_nan());
    }

    #[test]
    fn test_zip_map_requires_same_axes() {
        let a = GridField::new("a", axes_2x3(), vec![1.0; 6]).unwrap();
        let b = GridField::new("b", GridAxes::new(vec![0.0], vec![0.0]), vec![1.0]).unwrap();
        assert!(matches!(
            a.zip_map(&b, "c", |x, y| x - y),
            Err(CompositeError::AlignmentError(_))
        ));
        let c = a.zip_map(&a, "c", |x, y| x + y).unwrap();
        assert!(c.data.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_bit_identical_treats_nan_equal() {
        let a = GridField::filled_nan("a", axes_2x3());
        let b = GridField::filled_nan("a", axes_2x3());
        assert!(a.bit_identical(&b));
        assert!(a.same_nan_pattern(&b));
        assert_eq!(a.finite_count(), 0);
    }

    #[test]
    fn test_axes_match_across_lon_conventions() {
        let a = axes_2x3();
        let b = GridAxes::new(vec![40.25, 40.75], vec![269.75, 270.25, 270.75]);
        assert!(a.matches(&b, DEFAULT_COORD_TOLERANCE));
    }
}
