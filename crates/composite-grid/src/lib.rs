//! Region-wise composite grids and model/observation comparison.
//!
//! Several regional model runs ("Set1", "Set2", "Set3", ...) share one
//! lat/lon grid, each calibrated against a different flux-tower site. This
//! crate stitches them into a single "Composite" grid, one subregion at a
//! time, and compares model fields against observation products.
//!
//! # Architecture
//!
//! ```text
//! Set fields ──► MultiSetArray ──► CompositeBuilder ◄── RegionMaskStore
//!                                        │
//!                                        ▼
//!                                  LabeledField ("Composite")
//!                                        │
//! Observation ──► align_to(model grid) ──┤
//!                                        ▼
//!                                  compare() ──► StatsReport / best_set_map
//! ```
//!
//! # Example
//!
//! ```ignore
//! use composite_grid::{CompositeBuilder, CompositeConfig, FileMaskStore, MultiSetArray};
//! use composite_common::CompositeVariant;
//!
//! let builder = CompositeBuilder::new(store, CompositeConfig::default());
//! let composite = builder.build_variant(&multiset, "GPP", CompositeVariant::Rotation)?;
//! ```

pub mod aggregate;
pub mod align;
pub mod builder;
pub mod compare;
pub mod config;
pub mod mask;
pub mod multiset;
pub mod report;
pub mod selection;
pub mod sites;

// Re-export commonly used types at crate root
pub use aggregate::{
    annual_from_climatology, apply_conv_factor, mask_non_positive, mask_values, mean_annual,
    mean_annual_dates, mean_annual_max, summer_monthly_mean, AnnualStat,
};
pub use align::{align_to, clip, normalize_longitudes, regrid, InterpolationMethod};
pub use builder::{
    build_composite, label_for_mapping, rotation_difference, set_vs_composite, CompositeBuilder,
    LabeledField,
};
pub use compare::{compare, compare_one, Comparison, ComparisonStats};
pub use config::{CompositeConfig, OverlapPolicy};
pub use mask::{save_region_mask, FileMaskStore, InMemoryMaskStore, RegionMask, RegionMaskStore};
pub use multiset::MultiSetArray;
pub use report::StatsReport;
pub use selection::{best_set_map, BEST_SET_VARIABLE};
pub use sites::{interpolate_at, layer_index, Site, SiteRow, SiteTable};
