//! Bounding box types and longitude conventions.

use serde::{Deserialize, Serialize};

/// Normalize a longitude to the 0–360° convention used throughout the workflow.
pub fn normalize_lon_360(lon: f64) -> f64 {
    let lon = lon.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if lon >= 360.0 {
        0.0
    } else {
        lon
    }
}

/// A geographic bounding box in degrees.
///
/// Longitudes may be given in either -180..180 or 0..360; comparisons go
/// through [`normalize_lon_360`] so both conventions select the same cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// The Midwest clip polygon used for observation datasets.
    pub fn midwest() -> Self {
        Self::new(-99.25, 37.25, -82.25, 46.75)
    }

    /// Width of the bounding box in degrees.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height of the bounding box in degrees.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Same box with both longitudes in the 0–360 convention.
    pub fn to_lon_360(&self) -> Self {
        Self {
            min_lon: normalize_lon_360(self.min_lon),
            max_lon: normalize_lon_360(self.max_lon),
            ..*self
        }
    }

    /// Check if a point is contained within this bbox (edges inclusive).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.contains_lat(lat) && self.contains_lon(lon)
    }

    pub fn contains_lat(&self, lat: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat
    }

    /// Longitude test in either convention (edges inclusive).
    ///
    /// Boxes that straddle the 0° meridian after normalization wrap around.
    pub fn contains_lon(&self, lon: f64) -> bool {
        let b = self.to_lon_360();
        let lon = normalize_lon_360(lon);
        if b.min_lon <= b.max_lon {
            lon >= b.min_lon && lon <= b.max_lon
        } else {
            lon >= b.min_lon || lon <= b.max_lon
        }
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    /// Compute the intersection of two bounding boxes.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }

        Some(BoundingBox {
            min_lon: self.min_lon.max(other.min_lon),
            min_lat: self.min_lat.max(other.min_lat),
            max_lon: self.max_lon.min(other.max_lon),
            max_lat: self.max_lat.min(other.max_lat),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lon() {
        assert_eq!(normalize_lon_360(-99.25), 260.75);
        assert_eq!(normalize_lon_360(0.0), 0.0);
        assert_eq!(normalize_lon_360(360.0), 0.0);
        assert_eq!(normalize_lon_360(270.5), 270.5);
    }

    #[test]
    fn test_midwest_contains_both_conventions() {
        let bbox = BoundingBox::midwest();
        assert!(bbox.contains(-90.0, 40.0));
        assert!(bbox.contains(270.0, 40.0));
        assert!(!bbox.contains(-100.0, 40.0));
        assert!(!bbox.contains(-90.0, 47.0));
    }

    #[test]
    fn test_contains_lon_wraps_across_meridian() {
        let bbox = BoundingBox::new(-10.0, -5.0, 10.0, 5.0);
        assert!(bbox.contains_lon(355.0));
        assert!(bbox.contains_lon(-10.0));
        assert!(bbox.contains_lon(5.0));
        assert!(!bbox.contains_lon(180.0));
        assert!(!bbox.contains_lon(-11.0));
        assert!(bbox.contains_lat(5.0));
        assert!(!bbox.contains_lat(5.5));
    }

    #[test]
    fn test_intersection() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));

        let intersection = a.intersection(&b).unwrap();
        assert_eq!(intersection, BoundingBox::new(5.0, 5.0, 10.0, 10.0));
    }
}
