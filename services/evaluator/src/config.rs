//! Evaluator run configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use composite_common::{BoundingBox, CompositeVariant, Region, SetLabel, TimeResolution, Variable};
use composite_grid::{AnnualStat, CompositeConfig, InterpolationMethod, Site};
use serde::{Deserialize, Serialize};

/// One evaluation run: a variable at one resolution, its Sets, the region
/// masks, and the observation products to compare against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    pub variable: Variable,

    #[serde(default = "default_resolution")]
    pub resolution: TimeResolution,

    pub output_dir: PathBuf,

    /// Model runs, in member order.
    pub sets: Vec<SetSource>,

    pub region_masks: BTreeMap<Region, PathBuf>,

    #[serde(default = "default_composites")]
    pub composites: Vec<CompositeVariant>,

    #[serde(default)]
    pub composite: CompositeConfig,

    #[serde(default)]
    pub observations: Vec<ObservationConfig>,

    /// Sets compared against observations next to the composites.
    #[serde(default)]
    pub comparison_sets: Vec<SetLabel>,

    #[serde(default)]
    pub sites: Vec<SiteConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_resolution() -> TimeResolution {
    TimeResolution::Annual
}

fn default_composites() -> Vec<CompositeVariant> {
    vec![CompositeVariant::Rotation]
}

/// Where one Set's field comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetSource {
    pub label: SetLabel,
    pub path: PathBuf,

    /// Variable name in the file when it differs from the evaluated variable.
    #[serde(default)]
    pub file_variable: Option<String>,

    /// The file holds a monthly or daily history series to aggregate.
    #[serde(default)]
    pub time_series: bool,
}

/// An observation product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationConfig {
    pub name: String,
    pub path: PathBuf,
    pub variable: String,

    #[serde(default)]
    pub time_series: bool,

    /// Divisor applied while aggregating; defaults to the variable's
    /// observation factor.
    #[serde(default)]
    pub conv_factor: Option<f64>,

    /// Defaults to whether the variable is a monthly total.
    #[serde(default)]
    pub monthly_total: Option<bool>,

    /// Collapse a month axis (MODIS climatologies).
    #[serde(default)]
    pub climatology: Option<AnnualStat>,

    #[serde(default)]
    pub fill_values: Vec<f32>,

    #[serde(default)]
    pub mask_non_positive: bool,

    #[serde(default)]
    pub clip: Option<BoundingBox>,

    #[serde(default)]
    pub interpolation: InterpolationMethod,
}

/// A flux-tower site, optionally with its observed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(flatten)]
    pub site: Site,

    #[serde(default)]
    pub observed: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl ObservationConfig {
    pub fn conv_factor_for(&self, variable: Variable) -> f64 {
        self.conv_factor.unwrap_or_else(|| variable.obs_conv_factor())
    }

    pub fn monthly_total_for(&self, variable: Variable) -> bool {
        self.monthly_total.unwrap_or_else(|| variable.is_monthly_total())
    }
}
