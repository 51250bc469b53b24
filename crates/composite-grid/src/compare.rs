//! Cross-dataset comparison of model fields against a reference field.

use std::collections::BTreeMap;

use composite_common::{nan_mean, CompositeError, CompositeResult, GridField, SetLabel};
use serde::Serialize;
use tracing::info;

/// Tolerance for treating model and reference axes as the same grid.
const AXIS_TOLERANCE: f64 = 1e-6;

/// Scalar summary of one comparison. Means are over finite cells only and
/// NaN when no cell is finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonStats {
    pub mean_diff: f64,
    pub mean_pct_diff: f64,
    pub mean_abs_pct_diff: f64,
    /// Cells with a finite `pct_diff`.
    pub finite_cells: usize,
}

/// Result of comparing one model field against the reference.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// `model - reference`
    pub diff: GridField,
    /// `100 * model / reference`; non-finite where the reference is 0.
    pub pct_diff: GridField,
    pub stats: ComparisonStats,
}

/// Compare every model field against `reference`.
///
/// Both sides must already share axes (see `align`); a mismatch is an
/// `AlignmentError`. Inputs are not modified.
pub fn compare<'a, I>(model_fields: I, reference: &GridField) -> CompositeResult<BTreeMap<SetLabel, Comparison>>
where
    I: IntoIterator<Item = (&'a SetLabel, &'a GridField)>,
{
    let mut out = BTreeMap::new();
    for (label, model) in model_fields {
        let comparison = compare_one(model, reference)
            .map_err(|e| match e {
                CompositeError::AlignmentError(msg) => {
                    CompositeError::alignment(format!("{}: {}", label, msg))
                }
                other => other,
            })?;
        info!(
            set = %label,
            variable = %model.name,
            mean_diff = comparison.stats.mean_diff,
            mean_pct_diff = comparison.stats.mean_pct_diff,
            finite_cells = comparison.stats.finite_cells,
            "Compared against reference"
        );
        out.insert(label.clone(), comparison);
    }
    Ok(out)
}

/// Compare a single model field against `reference`.
pub fn compare_one(model: &GridField, reference: &GridField) -> CompositeResult<Comparison> {
    if !model.axes.matches(&reference.axes, AXIS_TOLERANCE) {
        return Err(CompositeError::alignment(format!(
            "'{}' ({}x{}) and reference '{}' ({}x{}) are on different grids",
            model.name,
            model.axes.nlat(),
            model.axes.nlon(),
            reference.name,
            reference.axes.nlat(),
            reference.axes.nlon()
        )));
    }

    let diff_data: Vec<f32> = model
        .data
        .iter()
        .zip(&reference.data)
        .map(|(&m, &o)| m - o)
        .collect();
    let pct_data: Vec<f32> = model
        .data
        .iter()
        .zip(&reference.data)
        .map(|(&m, &o)| (100.0 * m as f64 / o as f64) as f32)
        .collect();
    let abs_pct: Vec<f32> = pct_data.iter().map(|v| v.abs()).collect();

    let stats = ComparisonStats {
        mean_diff: nan_mean(&diff_data),
        mean_pct_diff: nan_mean(&pct_data),
        mean_abs_pct_diff: nan_mean(&abs_pct),
        finite_cells: pct_data.iter().filter(|v| v.is_finite()).count(),
    };

    let diff = GridField {
        name: format!("{}_diff", model.name),
        units: model.units.clone(),
        axes: model.axes.clone(),
        data: diff_data,
    };
    let pct_diff = GridField {
        name: format!("{}_pct_diff", model.name),
        units: Some("%".to_string()),
        axes: model.axes.clone(),
        data: pct_data,
    };

    Ok(Comparison { diff, pct_diff, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use composite_common::GridAxes;

    fn row(values: &[f32]) -> GridField {
        let lon = (0..values.len()).map(|i| 270.0 + i as f64).collect();
        GridField::new("GPP", GridAxes::new(vec![40.0], lon), values.to_vec()).unwrap()
    }

    #[test]
    fn test_ratio_formula_and_zero_reference() {
        let result = compare_one(&row(&[10.0, 20.0]), &row(&[5.0, 0.0])).unwrap();
        assert_eq!(result.diff.data, vec![5.0, 20.0]);
        assert_eq!(result.pct_diff.data[0], 200.0);
        assert!(!result.pct_diff.data[1].is_finite());
        assert_eq!(result.stats.finite_cells, 1);
        assert_eq!(result.stats.mean_pct_diff, 200.0);
        assert_eq!(result.stats.mean_diff, 12.5);
    }

    #[test]
    fn test_zero_over_zero_is_nan() {
        let result = compare_one(&row(&[0.0]), &row(&[0.0])).unwrap();
        assert!(result.pct_diff.data[0].is_nan());
        assert!(result.stats.mean_pct_diff.is_nan());
    }

    #[test]
    fn test_abs_mean() {
        let result = compare_one(&row(&[-10.0, 10.0]), &row(&[10.0, 10.0])).unwrap();
        assert_eq!(result.stats.mean_pct_diff, 0.0);
        assert_eq!(result.stats.mean_abs_pct_diff, 100.0);
    }

    #[test]
    fn test_axis_mismatch() {
        let err = compare_one(&row(&[1.0, 2.0]), &row(&[1.0])).unwrap_err();
        assert!(matches!(err, CompositeError::AlignmentError(_)));
    }
}
