//! Batch evaluation of ELM composite grids.
//!
//! A run is described by one YAML file: the evaluated variable, the Set
//! files, the region masks and the observation products. The pipeline builds
//! each composite variant, compares composites and selected Sets against
//! every observation product, and writes NetCDF grids, text reports and site
//! tables to the output directory.

pub mod config;
pub mod config_loader;
pub mod pipeline;

pub use config::{EvaluatorConfig, LoggingConfig, ObservationConfig, SetSource, SiteConfig};
pub use config_loader::{comparison_order, load_config, parse_config, validate_config};
pub use pipeline::{error_kind, Pipeline, RunSummary};
