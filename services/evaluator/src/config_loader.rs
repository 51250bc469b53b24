//! Configuration loader for the evaluator.
//!
//! Reads the run YAML, expands environment variables using `${VAR}` and
//! `${VAR:-default}` syntax, applies `COMPOSITE_*` overrides, and validates
//! cross-references between Sets, region masks and composite variants.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use composite_common::{SetLabel, TimeResolution};

use crate::config::EvaluatorConfig;

// ============================================================================
// Loading
// ============================================================================

/// Load, expand and validate an evaluator configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EvaluatorConfig> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read evaluator config from {:?}", path.as_ref()))?;

    parse_config(&content)
        .with_context(|| format!("Invalid evaluator config {:?}", path.as_ref()))
}

/// Expand, parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<EvaluatorConfig> {
    let expanded = expand_env_vars(content)?;

    let mut config: EvaluatorConfig =
        serde_yaml::from_str(&expanded).context("Failed to parse evaluator config YAML")?;

    // COMPOSITE_* variables take precedence over the file
    config.composite = config.composite.with_env_overrides();

    validate_config(&config)?;

    Ok(config)
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand `${VAR}` and `${VAR:-default}` references.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_expr = String::new();
            let mut brace_count = 1;

            while brace_count > 0 {
                match chars.next() {
                    Some('{') => {
                        brace_count += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        brace_count -= 1;
                        if brace_count > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}

// ============================================================================
// Validation
// ============================================================================

pub fn validate_config(config: &EvaluatorConfig) -> Result<()> {
    anyhow::ensure!(!config.sets.is_empty(), "At least one Set must be configured");

    let mut labels = HashSet::new();
    for set in &config.sets {
        anyhow::ensure!(
            labels.insert(set.label.clone()),
            "Set {} is listed more than once",
            set.label
        );
    }

    config
        .composite
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid composite settings: {}", e))?;

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    anyhow::ensure!(
        valid_levels.contains(&config.logging.level.as_str()),
        "Invalid log level: {}. Must be one of: {:?}",
        config.logging.level,
        valid_levels
    );

    let valid_formats = ["json", "pretty"];
    anyhow::ensure!(
        valid_formats.contains(&config.logging.format.as_str()),
        "Invalid log format: {}. Must be one of: {:?}",
        config.logging.format,
        valid_formats
    );

    // Every Set and region a composite variant needs must be configured
    for variant in &config.composites {
        for (region, set) in variant.default_mapping().iter() {
            anyhow::ensure!(
                labels.contains(set),
                "Composite {} needs Set {} for {}, which is not configured",
                variant.output_label(),
                set,
                region
            );
            anyhow::ensure!(
                config.region_masks.contains_key(region),
                "No region mask configured for {}",
                region
            );
        }
    }

    for set in &config.comparison_sets {
        anyhow::ensure!(
            labels.contains(set),
            "Comparison Set {} is not configured",
            set
        );
    }

    anyhow::ensure!(
        config.observations.is_empty() || !comparison_order(config).is_empty(),
        "Observations are configured but there are no composites or comparison Sets to compare"
    );

    let mut names = HashSet::new();
    for obs in &config.observations {
        anyhow::ensure!(
            obs.climatology.is_none() || config.resolution == TimeResolution::Annual,
            "Observation {} collapses a climatology, which only applies to annual runs",
            obs.name
        );

        anyhow::ensure!(!obs.name.is_empty(), "Observation name cannot be empty");
        anyhow::ensure!(
            names.insert(obs.name.as_str()),
            "Observation {} is listed more than once",
            obs.name
        );

        let conv = obs.conv_factor_for(config.variable);
        anyhow::ensure!(
            conv.is_finite() && conv != 0.0,
            "Observation {} has an invalid conversion factor {}",
            obs.name,
            conv
        );

        if let Some(bbox) = &obs.clip {
            anyhow::ensure!(
                bbox.min_lon < bbox.max_lon,
                "{}: clip.min_lon must be less than clip.max_lon",
                obs.name
            );
            anyhow::ensure!(
                bbox.min_lat < bbox.max_lat,
                "{}: clip.min_lat must be less than clip.max_lat",
                obs.name
            );
        }
    }

    if !config.sites.is_empty() {
        anyhow::ensure!(
            config.sites.iter().all(|s| !s.site.id.is_empty()),
            "Site IDs cannot be empty"
        );
    }

    Ok(())
}

/// Labels compared against observations: composites first, then the
/// configured comparison Sets.
pub fn comparison_order(config: &EvaluatorConfig) -> Vec<SetLabel> {
    config
        .composites
        .iter()
        .map(|v| v.output_label())
        .chain(config.comparison_sets.iter().cloned())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
