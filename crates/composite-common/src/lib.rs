//! Common types shared across the ELM composite-grid workspace.
//!
//! Model runs calibrated against different flux-tower sites ("Sets") share a
//! lat/lon grid. This crate defines the vocabulary the other crates speak:
//! Set and Region labels, the coordinate-indexed [`GridField`], time series
//! read from model history files, and the error taxonomy.

pub mod bbox;
pub mod error;
pub mod grid;
pub mod labels;
pub mod time;

pub use bbox::{normalize_lon_360, BoundingBox};
pub use error::{CompositeError, CompositeResult};
pub use grid::{nan_mean, CoordIndex, ExtraAxis, GridAxes, GridField, DEFAULT_COORD_TOLERANCE};
pub use labels::{
    set_for_site, CompositeVariant, Region, RegionSetMap, SetLabel, TimeResolution, Variable,
    CONV_SEC_DAY, CONV_UMOLCO2_GC, SUMMER_MONTHS, SUMMER_MONTH_LABELS,
};
pub use time::{Calendar, TimeSeriesField, TimeStep};
