//! Best-performing Set per grid cell.

use composite_common::{CompositeError, CompositeResult, GridField, SetLabel};
use tracing::debug;

/// Name of the field produced by [`best_set_map`].
pub const BEST_SET_VARIABLE: &str = "best_set";

/// For every cell, the 1-based position in `diffs` of the candidate whose
/// difference from the reference is smallest in magnitude.
///
/// Ties go to the earlier candidate. Non-finite differences never win, and
/// a cell with no finite candidate is NaN.
pub fn best_set_map(diffs: &[(SetLabel, GridField)]) -> CompositeResult<GridField> {
    let (_, first) = diffs
        .first()
        .ok_or_else(|| CompositeError::InvalidConfig("best-set map needs at least one candidate".to_string()))?;

    for (label, field) in &diffs[1..] {
        if field.axes != first.axes {
            return Err(CompositeError::alignment(format!(
                "{} difference is not on the same grid as {}",
                label, diffs[0].0
            )));
        }
    }

    let data: Vec<f32> = (0..first.data.len())
        .map(|i| {
            let mut best: Option<(usize, f32)> = None;
            for (k, (_, field)) in diffs.iter().enumerate() {
                let magnitude = field.data[i].abs();
                if !magnitude.is_finite() {
                    continue;
                }
                if best.map_or(true, |(_, b)| magnitude < b) {
                    best = Some((k, magnitude));
                }
            }
            best.map_or(f32::NAN, |(k, _)| (k + 1) as f32)
        })
        .collect();

    let field = GridField {
        name: BEST_SET_VARIABLE.to_string(),
        units: None,
        axes: first.axes.clone(),
        data,
    };
    debug!(
        candidates = diffs.len(),
        assigned_cells = field.finite_count(),
        "Computed best-set map"
    );
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use composite_common::GridAxes;

    fn row(values: &[f32]) -> GridField {
        let lon = (0..values.len()).map(|i| i as f64).collect();
        GridField::new("diff", GridAxes::new(vec![0.0], lon), values.to_vec()).unwrap()
    }

    #[test]
    fn test_smallest_magnitude_wins() {
        let diffs = vec![
            (SetLabel::set(1), row(&[3.0, -1.0, f32::NAN, 2.0, f32::NAN])),
            (SetLabel::set(2), row(&[-2.0, 1.0, 5.0, 2.0, f32::INFINITY])),
            (SetLabel::set(3), row(&[4.0, 0.5, f32::NAN, -2.0, f32::NAN])),
        ];
        let map = best_set_map(&diffs).unwrap();
        assert_eq!(map.data[0], 2.0);
        assert_eq!(map.data[1], 3.0);
        assert_eq!(map.data[2], 2.0);
        // Tie between all three
        assert_eq!(map.data[3], 1.0);
        assert!(map.data[4].is_nan());
    }

    #[test]
    fn test_requires_candidates() {
        assert!(best_set_map(&[]).is_err());
    }
}
