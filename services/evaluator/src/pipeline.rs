//! The evaluation run: load Sets, build composites, compare against
//! observations and write every product to the output directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use composite_common::{
    CompositeError, CompositeVariant, GridField, SetLabel, TimeResolution, TimeSeriesField, Variable,
    SUMMER_MONTHS, SUMMER_MONTH_LABELS,
};
use composite_grid::{
    align_to, annual_from_climatology, apply_conv_factor, best_set_map, compare,
    mask_non_positive, mask_values, mean_annual, mean_annual_dates, mean_annual_max,
    rotation_difference, set_vs_composite, summer_monthly_mean, CompositeBuilder, FileMaskStore,
    LabeledField, MultiSetArray, SiteTable, StatsReport, BEST_SET_VARIABLE,
};
use netcdf_io::{read_field, read_time_series, write_field, NetCdfError};
use tracing::{debug, info, warn};

use crate::config::{EvaluatorConfig, ObservationConfig, SetSource};
use crate::config_loader::comparison_order;

/// Files written by one run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub composites: Vec<PathBuf>,
    pub rotation_difference: Option<PathBuf>,
    pub reports: Vec<PathBuf>,
    pub best_set_maps: Vec<PathBuf>,
    pub site_tables: Vec<PathBuf>,
}

impl RunSummary {
    pub fn files_written(&self) -> usize {
        self.composites.len()
            + self.rotation_difference.iter().count()
            + self.reports.len()
            + self.best_set_maps.len()
            + self.site_tables.len()
    }
}

pub struct Pipeline {
    config: EvaluatorConfig,
    store: FileMaskStore,
}

impl Pipeline {
    pub fn new(config: EvaluatorConfig) -> Self {
        let store = FileMaskStore::new(config.region_masks.clone());
        Self { config, store }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Check that every input file exists without reading any of them.
    pub fn check_resources(&self) -> Result<()> {
        self.store
            .check_resources()
            .context("Region mask check failed")?;

        for set in &self.config.sets {
            if !set.path.is_file() {
                return Err(CompositeError::not_found(format!("Set {} file", set.label), &set.path).into());
            }
        }
        for obs in &self.config.observations {
            if !obs.path.is_file() {
                return Err(CompositeError::not_found(format!("Observation {} file", obs.name), &obs.path).into());
            }
        }
        Ok(())
    }

    pub fn run(&self) -> Result<RunSummary> {
        let variable = self.config.variable;
        let output_dir = &self.config.output_dir;
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

        info!(
            variable = %variable,
            resolution = ?self.config.resolution,
            sets = self.config.sets.len(),
            observations = self.config.observations.len(),
            "Starting evaluation"
        );

        let multiset = self.load_sets()?;
        let builder = CompositeBuilder::new(&self.store, self.config.composite);
        let mut summary = RunSummary::default();

        // Composites and their Set-vs-Composite reports
        let mut composites: BTreeMap<SetLabel, LabeledField> = BTreeMap::new();
        for &variant in &self.config.composites {
            let composite = builder
                .build_variant(&multiset, variable.as_str(), variant)
                .with_context(|| format!("Failed to build {} for {}", variant.output_label(), variable))?;

            let path = output_dir.join(format!("{}_{}.nc", variable, composite.label));
            write_field(&path, &composite.field, &composite.label)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            summary.composites.push(path);

            let sets: Vec<SetLabel> = variant.default_mapping().iter().map(|(_, s)| s.clone()).collect();
            let comparisons = set_vs_composite(&multiset, variable.as_str(), &composite.field, &sets)?;
            let report =
                StatsReport::from_comparisons(composite.label.as_str(), variable.as_str(), &comparisons, &sets);
            let path = output_dir.join(format!("{}_{}_stats.txt", composite.label, variable));
            report.write_to(&path)?;
            summary.reports.push(path);

            composites.insert(composite.label.clone(), composite);
        }

        if let (Some(rot), Some(no_rot)) = (
            composites.get(&CompositeVariant::Rotation.output_label()),
            composites.get(&CompositeVariant::NoRotation.output_label()),
        ) {
            let diff = rotation_difference(&rot.field, &no_rot.field)?;
            let path = output_dir.join(format!("{}_rotation_difference.nc", variable));
            write_field(&path, &diff, &rot.label)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            summary.rotation_difference = Some(path);
        }

        // Observation comparisons
        let order = comparison_order(&self.config);
        for obs in &self.config.observations {
            let (report, best_set) = self
                .evaluate_observation(obs, &multiset, &composites, &order)
                .with_context(|| format!("Failed to evaluate against {}", obs.name))?;
            summary.reports.push(report);
            summary.best_set_maps.extend(best_set);
        }

        if !self.config.sites.is_empty() {
            summary.site_tables = self.write_site_tables(&multiset)?;
        }

        info!(
            variable = %variable,
            files = summary.files_written(),
            output_dir = %output_dir.display(),
            "Evaluation complete"
        );
        Ok(summary)
    }

    // ========================================================================
    // Set loading
    // ========================================================================

    fn load_sets(&self) -> Result<MultiSetArray> {
        let mut fields = Vec::with_capacity(self.config.sets.len());
        for source in &self.config.sets {
            let field = self
                .load_set(source)
                .with_context(|| format!("Failed to load Set {} from {}", source.label, source.path.display()))?;
            debug!(
                set = %source.label,
                finite_cells = field.finite_count(),
                layers = field.nlayers(),
                "Loaded Set"
            );
            fields.push((source.label.clone(), field));
        }
        Ok(MultiSetArray::from_fields(fields, self.config.composite.coord_tolerance)?)
    }

    fn load_set(&self, source: &SetSource) -> Result<GridField> {
        let variable = self.config.variable;
        let name = source.file_variable.as_deref().unwrap_or(variable.as_str());

        let field = if source.time_series {
            let ts = read_time_series(&source.path, name)?;
            aggregate_model(&ts, variable, self.config.resolution)?
        } else {
            read_field(&source.path, name)?
        };
        Ok(self.label_field(field))
    }

    /// Name the field after the run variable and stamp the units the
    /// aggregated values are expressed in.
    fn label_field(&self, field: GridField) -> GridField {
        let variable = self.config.variable;
        let field = field.with_name(variable.as_str());
        match variable.units(self.config.resolution) {
            Some(units) => field.with_units(units),
            None => field,
        }
    }

    // ========================================================================
    // Observations
    // ========================================================================

    /// Prepare one observation product, compare it and write the report and
    /// best-set map. Returns the paths written.
    fn evaluate_observation(
        &self,
        obs: &ObservationConfig,
        multiset: &MultiSetArray,
        composites: &BTreeMap<SetLabel, LabeledField>,
        order: &[SetLabel],
    ) -> Result<(PathBuf, Option<PathBuf>)> {
        let variable = self.config.variable;
        let output_dir = &self.config.output_dir;

        let prepared = self.prepare_observation(obs)?;
        let target = match (composites.values().next(), order.first()) {
            (Some(composite), _) => composite.field.axes.clone(),
            (None, Some(label)) => multiset.select(label, variable.as_str())?.axes.clone(),
            (None, None) => anyhow::bail!("Nothing to compare against {}", obs.name),
        };

        let aligned = align_to(&prepared, &target, obs.interpolation, obs.clip.as_ref())?;
        debug!(
            observation = %obs.name,
            finite_cells = aligned.finite_count(),
            "Aligned observation to model grid"
        );

        let mut models: Vec<(&SetLabel, &GridField)> = Vec::with_capacity(order.len());
        for label in order {
            match composites.get(label) {
                Some(c) => models.push((label, &c.field)),
                None => models.push((label, multiset.select(label, variable.as_str())?)),
            }
        }
        let comparisons = compare(models, &aligned)?;

        let report = StatsReport::from_comparisons(obs.name.as_str(), variable.as_str(), &comparisons, order);
        let report_path = output_dir.join(format!("{}_{}_stats.txt", obs.name, variable));
        report.write_to(&report_path)?;

        if self.config.comparison_sets.is_empty() {
            return Ok((report_path, None));
        }

        let diffs: Vec<(SetLabel, GridField)> = self
            .config
            .comparison_sets
            .iter()
            .filter_map(|label| comparisons.get(label).map(|c| (label.clone(), c.diff.clone())))
            .collect();
        let map = best_set_map(&diffs)?;
        for (i, (label, _)) in diffs.iter().enumerate() {
            info!(observation = %obs.name, index = i + 1, set = %label, "Best-set map legend");
        }

        let map_path = output_dir.join(format!("{}_{}_{}.nc", obs.name, variable, BEST_SET_VARIABLE));
        write_field(&map_path, &map, &SetLabel::new(BEST_SET_VARIABLE))
            .with_context(|| format!("Failed to write {}", map_path.display()))?;

        Ok((report_path, Some(map_path)))
    }

    /// Read an observation product and bring it to model units: aggregate,
    /// collapse a climatology, mask fill values, then apply the conversion
    /// divisor.
    fn prepare_observation(&self, obs: &ObservationConfig) -> Result<GridField> {
        let variable = self.config.variable;

        let mut field = if obs.time_series {
            let ts = read_time_series(&obs.path, &obs.variable)?;
            aggregate_observation(&ts, obs.monthly_total_for(variable), self.config.resolution)?
        } else {
            read_field(&obs.path, &obs.variable)?
        };

        if let Some(stat) = obs.climatology {
            field = annual_from_climatology(&field, stat)?;
        }
        if !obs.fill_values.is_empty() {
            field = mask_values(&field, &obs.fill_values);
        }
        if obs.mask_non_positive {
            field = mask_non_positive(&field);
        }
        let field = apply_conv_factor(&field, obs.conv_factor_for(variable))?;

        if field.finite_count() == 0 {
            warn!(observation = %obs.name, "Observation has no valid cells after masking");
        }
        Ok(self.label_field(field))
    }

    // ========================================================================
    // Sites
    // ========================================================================

    /// One CSV per layer: every Set interpolated at each site, plus the
    /// composite pick when Set1-Set3 are all present.
    fn write_site_tables(&self, multiset: &MultiSetArray) -> Result<Vec<PathBuf>> {
        let variable = self.config.variable;
        let sites: Vec<_> = self.config.sites.iter().map(|s| s.site.clone()).collect();
        let calibrated = (1..=3).all(|n| multiset.contains(&SetLabel::set(n)));

        let fields = multiset.variable_across_sets(variable.as_str());
        let Some((_, reference)) = fields.first() else {
            return Ok(Vec::new());
        };
        let layer_labels: Vec<Option<String>> = match &reference.axes.extra {
            Some(extra) => extra.labels.iter().cloned().map(Some).collect(),
            None => vec![None],
        };

        let mut paths = Vec::with_capacity(layer_labels.len());
        for (layer, layer_label) in layer_labels.iter().enumerate() {
            let mut table = SiteTable::new(&sites);
            for (label, field) in &fields {
                table.add_set((*label).clone(), field, layer)?;
            }
            if calibrated {
                table.add_composite()?;
            }
            if self.config.resolution == TimeResolution::Annual {
                for site in &self.config.sites {
                    if let Some(value) = site.observed {
                        table.set_observed(&site.site.id, value)?;
                    }
                }
            }

            let path = site_table_path(&self.config.output_dir, variable, layer_label.as_deref());
            table
                .write_csv(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), sites = sites.len(), "Wrote site table");
            paths.push(path);
        }
        Ok(paths)
    }
}

fn site_table_path(dir: &Path, variable: Variable, layer: Option<&str>) -> PathBuf {
    match layer {
        Some(layer) => dir.join(format!("{}_{}_sites.csv", variable, layer)),
        None => dir.join(format!("{}_sites.csv", variable)),
    }
}

/// Kind of the first library error in `err`'s chain, for the `kind` log field.
pub fn error_kind(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CompositeError>() {
            return e.kind();
        }
        if let Some(e) = cause.downcast_ref::<NetCdfError>() {
            return match e {
                NetCdfError::FileNotFound { .. } => "ResourceNotFound",
                NetCdfError::IoError(_) => "Io",
                _ => "FormatError",
            };
        }
    }
    "Other"
}

fn summer_labels() -> Vec<String> {
    SUMMER_MONTH_LABELS.iter().map(|s| s.to_string()).collect()
}

/// Reduce a model history series to the evaluated resolution.
fn aggregate_model(ts: &TimeSeriesField, variable: Variable, resolution: TimeResolution) -> Result<GridField> {
    let field = match resolution {
        TimeResolution::Annual => match variable {
            Variable::DMYIELD => mean_annual_max(ts)?,
            Variable::PLANTDAY | Variable::HARVESTDAY => mean_annual_dates(ts)?,
            v => mean_annual(ts, v.model_conv_factor(), v.is_monthly_total())?,
        },
        TimeResolution::Monthly => summer_monthly_mean(
            ts,
            &SUMMER_MONTHS,
            &summer_labels(),
            variable.model_conv_factor(),
            variable.is_monthly_total(),
        )?,
    };
    Ok(field)
}

/// Observation series are aggregated unscaled; the conversion divisor is
/// applied after fill values are masked.
fn aggregate_observation(ts: &TimeSeriesField, monthly_total: bool, resolution: TimeResolution) -> Result<GridField> {
    let field = match resolution {
        TimeResolution::Annual => mean_annual(ts, 1.0, monthly_total)?,
        TimeResolution::Monthly => summer_monthly_mean(ts, &SUMMER_MONTHS, &summer_labels(), 1.0, monthly_total)?,
    };
    Ok(field)
}
