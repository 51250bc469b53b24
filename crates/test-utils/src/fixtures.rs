//! Common test fixtures for composite-grid tests.
//!
//! This module provides pre-defined grid layouts and coordinates that
//! represent common scenarios in the composite workflow.

use composite_common::GridAxes;

/// Quadrant grid: two rows, two columns.
///
/// Latitudes ascend (row 0 is south), longitudes are in the 0–360
/// convention. Cell names follow the compass: NW is `(lat 41, lon 270)`.
pub mod quadrant {
    pub const LAT: [f64; 2] = [40.0, 41.0];
    pub const LON: [f64; 2] = [270.0, 271.0];

    /// `(lon, lat)` of each quadrant cell.
    pub const NW: (f64, f64) = (270.0, 41.0);
    pub const NE: (f64, f64) = (271.0, 41.0);
    pub const SW: (f64, f64) = (270.0, 40.0);
    pub const SE: (f64, f64) = (271.0, 40.0);

    /// `(ilat, ilon)` of each quadrant cell.
    pub const NW_IDX: (usize, usize) = (1, 0);
    pub const NE_IDX: (usize, usize) = (1, 1);
    pub const SW_IDX: (usize, usize) = (0, 0);
    pub const SE_IDX: (usize, usize) = (0, 1);
}

/// Axes of the quadrant grid.
pub fn quadrant_axes() -> GridAxes {
    GridAxes::new(quadrant::LAT.to_vec(), quadrant::LON.to_vec())
}

/// Half-degree Midwest grid matching the ELM regional runs (20 x 34 cells),
/// longitudes in the 0–360 convention.
pub fn midwest_axes() -> GridAxes {
    let lat = (0..20).map(|i| 37.25 + 0.5 * i as f64).collect();
    let lon = (0..34).map(|i| 260.75 + 0.5 * i as f64).collect();
    GridAxes::new(lat, lon)
}

/// A global half-degree observation grid in the -180..180 convention with
/// latitudes descending, as FluxCom and Madani products are stored.
pub fn global_obs_axes() -> GridAxes {
    let lat = (0..360).map(|i| 89.75 - 0.5 * i as f64).collect();
    let lon = (0..720).map(|i| -179.75 + 0.5 * i as f64).collect();
    GridAxes::new(lat, lon)
}

/// Common site coordinates (id, lat, lon) for testing.
pub mod sites {
    pub const US_NE3: (&str, f64, f64) = ("US-Ne3", 41.1797, -96.4397);
    pub const US_RO1: (&str, f64, f64) = ("US-Ro1", 44.7143, -93.0898);
    pub const US_UIC: (&str, f64, f64) = ("US-UiC", 40.0646, -88.1961);
}

pub use composite_common::{SUMMER_MONTHS, SUMMER_MONTH_LABELS};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midwest_axes_extent() {
        let axes = midwest_axes();
        assert_eq!(axes.nlat(), 20);
        assert_eq!(axes.nlon(), 34);
        assert_eq!(axes.lat[19], 46.75);
        assert_eq!(axes.lon[33], 277.25);
    }

    #[test]
    fn test_global_axes_descend() {
        let axes = global_obs_axes();
        assert_eq!(axes.lat[0], 89.75);
        assert_eq!(axes.lat[359], -89.75);
        assert_eq!(axes.lon[0], -179.75);
        assert_eq!(axes.lon[719], 179.75);
    }
}
