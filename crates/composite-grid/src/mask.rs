//! Region mask store.
//!
//! A region mask is the set of (lon, lat) cell centres belonging to one
//! agro-climatic subregion. Masks are produced once, from the defined cells
//! of each regional run, and persisted as JSON arrays of `[lon, lat]` pairs.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use composite_common::{normalize_lon_360, CompositeError, CompositeResult, GridField, Region};
use tracing::{debug, warn};

/// Resolution used to detect duplicate mask cells, in degrees.
const DEDUP_RESOLUTION: f64 = 1e-6;

/// The cells of one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMask {
    pub region: Region,
    cells: Vec<(f64, f64)>,
}

impl RegionMask {
    /// Create a mask, dropping repeated cells (either longitude convention).
    pub fn new(region: Region, cells: Vec<(f64, f64)>) -> Self {
        let mut seen = HashSet::with_capacity(cells.len());
        let cells = cells
            .into_iter()
            .filter(|&(lon, lat)| {
                seen.insert((
                    (normalize_lon_360(lon) / DEDUP_RESOLUTION).round() as i64,
                    (lat / DEDUP_RESOLUTION).round() as i64,
                ))
            })
            .collect();
        Self { region, cells }
    }

    /// Derive a mask from the cells of a regional run that hold data in any layer.
    pub fn from_defined_cells(region: Region, field: &GridField) -> Self {
        let axes = &field.axes;
        let mut cells = Vec::new();
        for (ilat, &lat) in axes.lat.iter().enumerate() {
            for (ilon, &lon) in axes.lon.iter().enumerate() {
                if (0..field.nlayers()).any(|k| !field.get(k, ilat, ilon).is_nan()) {
                    cells.push((lon, lat));
                }
            }
        }
        Self::new(region, cells)
    }

    /// `(lon, lat)` pairs in load order.
    pub fn cells(&self) -> &[(f64, f64)] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Source of region masks.
pub trait RegionMaskStore {
    /// Load the mask of `region`.
    ///
    /// Fails with `ResourceNotFound` when the region's resource cannot be
    /// located and `FormatError` when it is malformed.
    fn load_region_mask(&self, region: Region) -> CompositeResult<RegionMask>;
}

impl<T: RegionMaskStore + ?Sized> RegionMaskStore for &T {
    fn load_region_mask(&self, region: Region) -> CompositeResult<RegionMask> {
        (**self).load_region_mask(region)
    }
}

/// Masks stored as JSON files, resolved through an explicit region→path map.
#[derive(Debug, Clone, Default)]
pub struct FileMaskStore {
    paths: BTreeMap<Region, PathBuf>,
}

impl FileMaskStore {
    pub fn new(paths: BTreeMap<Region, PathBuf>) -> Self {
        Self { paths }
    }

    pub fn with_region(mut self, region: Region, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(region, path.into());
        self
    }

    pub fn path_for(&self, region: Region) -> Option<&Path> {
        self.paths.get(&region).map(PathBuf::as_path)
    }

    /// Check that every mapped resource exists without parsing it.
    pub fn check_resources(&self) -> CompositeResult<()> {
        for (region, path) in &self.paths {
            if !path.is_file() {
                return Err(CompositeError::not_found(format!("{} region mask", region), path));
            }
        }
        Ok(())
    }
}

impl RegionMaskStore for FileMaskStore {
    fn load_region_mask(&self, region: Region) -> CompositeResult<RegionMask> {
        let path = self.paths.get(&region).ok_or_else(|| {
            CompositeError::not_found(format!("{} region mask", region), "<unmapped>")
        })?;

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CompositeError::not_found(format!("{} region mask", region), path));
            }
            Err(e) => return Err(e.into()),
        };

        let cells = parse_mask(&text)
            .map_err(|msg| CompositeError::format(format!("{}: {}", path.display(), msg)))?;
        let mask = RegionMask::new(region, cells);

        if mask.is_empty() {
            warn!(region = %region, path = %path.display(), "Region mask is empty");
        } else {
            debug!(region = %region, path = %path.display(), cells = mask.len(), "Loaded region mask");
        }
        Ok(mask)
    }
}

fn parse_mask(text: &str) -> Result<Vec<(f64, f64)>, String> {
    let raw: Vec<Vec<f64>> =
        serde_json::from_str(text).map_err(|e| format!("expected [[lon, lat], ...]: {}", e))?;

    raw.into_iter()
        .enumerate()
        .map(|(i, pair)| match pair.as_slice() {
            [lon, lat] if lon.is_finite() && lat.is_finite() => Ok((*lon, *lat)),
            [_, _] => Err(format!("entry {} has a non-finite coordinate", i)),
            other => Err(format!("entry {} has {} values, expected 2", i, other.len())),
        })
        .collect()
}

/// Persist a mask in the format [`FileMaskStore`] reads.
pub fn save_region_mask(path: impl AsRef<Path>, mask: &RegionMask) -> CompositeResult<()> {
    let pairs: Vec<[f64; 2]> = mask.cells().iter().map(|&(lon, lat)| [lon, lat]).collect();
    let json = serde_json::to_string(&pairs)?;
    std::fs::write(path.as_ref(), json)?;
    Ok(())
}

/// Masks held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMaskStore {
    masks: BTreeMap<Region, RegionMask>,
}

impl InMemoryMaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mask: RegionMask) {
        self.masks.insert(mask.region, mask);
    }

    pub fn with_mask(mut self, region: Region, cells: Vec<(f64, f64)>) -> Self {
        self.insert(RegionMask::new(region, cells));
        self
    }
}

impl RegionMaskStore for InMemoryMaskStore {
    fn load_region_mask(&self, region: Region) -> CompositeResult<RegionMask> {
        self.masks.get(&region).cloned().ok_or_else(|| {
            CompositeError::not_found(format!("{} region mask", region), "<memory>")
        })
    }
}
