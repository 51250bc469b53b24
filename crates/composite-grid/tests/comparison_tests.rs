//! Integration tests for alignment, comparison and best-set selection.

use std::collections::BTreeMap;

use composite_common::{BoundingBox, CompositeError, GridAxes, GridField, SetLabel};
use composite_grid::{
    align_to, best_set_map, clip, compare, normalize_longitudes, regrid, InterpolationMethod,
    StatsReport,
};
use test_utils::{assert_approx_eq, constant_field, global_obs_axes, midwest_axes, temp_test_dir};

fn row(values: &[f32]) -> GridField {
    let lon = (0..values.len()).map(|i| 270.0 + i as f64).collect();
    GridField::new("GPP", GridAxes::new(vec![40.0], lon), values.to_vec()).unwrap()
}

// ============================================================================
// Comparator
// ============================================================================

#[test]
fn test_diff_and_ratio_scenario() {
    let mut models = BTreeMap::new();
    models.insert(SetLabel::composite(), row(&[10.0, 20.0]));
    let obs = row(&[5.0, 0.0]);

    let result = compare(&models, &obs).unwrap();
    let c = &result[&SetLabel::composite()];

    assert_eq!(c.diff.data, vec![5.0, 20.0]);
    assert_eq!(c.pct_diff.data[0], 200.0);
    assert!(!c.pct_diff.data[1].is_finite());
    assert_approx_eq!(c.stats.mean_pct_diff, 200.0, 1e-9);
    assert_approx_eq!(c.stats.mean_abs_pct_diff, 200.0, 1e-9);
}

#[test]
fn test_zero_observation_is_never_finite() {
    let mut models = BTreeMap::new();
    models.insert(SetLabel::set(1), row(&[0.0, -3.0, 7.0]));
    let obs = row(&[0.0, 0.0, 0.0]);

    let result = compare(&models, &obs).unwrap();
    let c = &result[&SetLabel::set(1)];
    assert!(c.pct_diff.data.iter().all(|v| !v.is_finite()));
    assert_eq!(c.stats.finite_cells, 0);
    assert!(c.stats.mean_pct_diff.is_nan());
}

#[test]
fn test_compare_leaves_inputs_untouched() {
    let mut models = BTreeMap::new();
    models.insert(SetLabel::set(1), row(&[1.0, f32::NAN]));
    let obs = row(&[2.0, 2.0]);
    let (models_before, obs_before) = (models.clone(), obs.clone());

    let _ = compare(&models, &obs).unwrap();

    assert!(models[&SetLabel::set(1)].bit_identical(&models_before[&SetLabel::set(1)]));
    assert!(obs.bit_identical(&obs_before));
}

#[test]
fn test_compare_rejects_misaligned_grids() {
    let mut models = BTreeMap::new();
    models.insert(SetLabel::set(1), row(&[1.0, 2.0, 3.0]));
    let err = compare(&models, &row(&[1.0, 2.0])).unwrap_err();
    assert!(matches!(err, CompositeError::AlignmentError(ref msg) if msg.contains("Set1")));
}

#[test]
fn test_report_from_comparisons() {
    let mut models = BTreeMap::new();
    models.insert(SetLabel::composite(), row(&[10.0, 30.0]));
    models.insert(SetLabel::set(2), row(&[5.0, 5.0]));
    let obs = row(&[10.0, 10.0]);
    let result = compare(&models, &obs).unwrap();

    let report = StatsReport::from_comparisons(
        "FluxCom",
        "GPP",
        &result,
        &[SetLabel::composite(), SetLabel::set(2), SetLabel::set(3)],
    );
    let dir = temp_test_dir();
    let path = dir.path().join("FluxCom_GPP_stats.txt");
    report.write_to(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "Average difference between FluxCom Composite set for GPP 10.00");
    assert_eq!(lines[1], "Average difference between FluxCom Set2 set for GPP -5.00");
    assert_eq!(lines[2], "Average % difference between FluxCom Composite set for GPP 200.00");
    assert_eq!(lines[5], "Absolute average % difference between FluxCom Set2 set for GPP 50.00");
}

// ============================================================================
// Alignment
// ============================================================================

#[test]
fn test_clip_global_to_midwest() {
    let global = constant_field("GPP", &global_obs_axes(), 1.0);
    let normalized = normalize_longitudes(&global);
    let clipped = clip(&normalized, &BoundingBox::midwest()).unwrap();

    assert_eq!(clipped.axes.nlon(), 35);
    assert_eq!(clipped.axes.nlat(), 20);
    assert_eq!(clipped.axes.lon[0], 260.75);
    assert_eq!(clipped.axes.lon[34], 277.75);
    // Descending latitude order survives the clip
    assert_eq!(clipped.axes.lat[0], 46.75);
}

#[test]
fn test_clip_without_overlap_fails() {
    let field = row(&[1.0, 2.0]);
    let err = clip(&field, &BoundingBox::new(0.0, -10.0, 10.0, 10.0)).unwrap_err();
    assert!(matches!(err, CompositeError::AlignmentError(_)));
}

#[test]
fn test_align_global_obs_to_midwest_grid() {
    let axes = global_obs_axes();
    // value = lat, so the aligned field's rows are recognisable
    let mut data = Vec::with_capacity(axes.len());
    for &lat in &axes.lat {
        data.extend(std::iter::repeat(lat as f32).take(axes.nlon()));
    }
    let obs = GridField::new("GPP", axes, data).unwrap();

    let model_axes = midwest_axes();
    let aligned = align_to(
        &obs,
        &model_axes,
        InterpolationMethod::Bilinear,
        Some(&BoundingBox::midwest()),
    )
    .unwrap();

    assert_eq!(aligned.axes.lat, model_axes.lat);
    assert_eq!(aligned.axes.lon, model_axes.lon);
    // Latitudes come back ascending even though the source is stored descending
    for (ilat, &lat) in model_axes.lat.iter().enumerate() {
        assert_approx_eq!(aligned.get(0, ilat, 0), lat, 1e-4);
        assert_approx_eq!(aligned.get(0, ilat, model_axes.nlon() - 1), lat, 1e-4);
    }
    assert_eq!(aligned.finite_count(), model_axes.len());
}

#[test]
fn test_align_identity_fast_path() {
    let model_axes = midwest_axes();
    let obs = test_utils::set_field("GPP", &model_axes, 7);
    let aligned = align_to(&obs, &model_axes, InterpolationMethod::Nearest, None).unwrap();
    assert!(aligned.bit_identical(&obs));
}

#[test]
fn test_align_without_overlap_fails() {
    let obs = GridField::new("GPP", GridAxes::new(vec![-30.0, -29.5], vec![10.0, 10.5]), vec![1.0; 4]).unwrap();
    let err = align_to(&obs, &midwest_axes(), InterpolationMethod::Bilinear, None).unwrap_err();
    assert!(matches!(err, CompositeError::AlignmentError(_)));
}

#[test]
fn test_regrid_nan_corner_and_outside_points() {
    let source = GridField::new(
        "GPP",
        GridAxes::new(vec![40.0, 41.0], vec![270.0, 271.0]),
        vec![1.0, f32::NAN, 3.0, 4.0],
    )
    .unwrap();
    let target = GridAxes::new(vec![40.5, 40.0, 42.0], vec![270.5, 270.0]);

    let bilinear = regrid(&source, &target, InterpolationMethod::Bilinear).unwrap();
    assert!(bilinear.get(0, 0, 0).is_nan());
    assert_eq!(bilinear.get(0, 1, 1), 1.0);
    assert!(bilinear.get(0, 2, 0).is_nan());

    let nearest = regrid(&source, &target, InterpolationMethod::Nearest).unwrap();
    assert_eq!(nearest.get(0, 0, 0), 1.0);
}

#[test]
fn test_regrid_rejects_mismatched_extra_axis() {
    use composite_common::ExtraAxis;

    let month = |label: &str| ExtraAxis::new("month", vec![label.to_string()]);
    let source = GridField::new(
        "GPP",
        GridAxes::new(vec![40.0], vec![270.0]).with_extra(month("June")),
        vec![1.0],
    )
    .unwrap();
    let target = GridAxes::new(vec![40.0], vec![270.0]).with_extra(month("July"));
    let err = regrid(&source, &target, InterpolationMethod::Nearest).unwrap_err();
    assert!(matches!(err, CompositeError::AlignmentError(_)));
}

// ============================================================================
// Best-set map
// ============================================================================

#[test]
fn test_best_set_map_from_comparisons() {
    let mut models = BTreeMap::new();
    models.insert(SetLabel::set(1), row(&[11.0, 30.0, f32::NAN]));
    models.insert(SetLabel::set(2), row(&[14.0, 19.0, f32::NAN]));
    let obs = row(&[10.0, 20.0, 5.0]);
    let result = compare(&models, &obs).unwrap();

    let diffs: Vec<(SetLabel, GridField)> = result
        .iter()
        .map(|(label, c)| (label.clone(), c.diff.clone()))
        .collect();
    let map = best_set_map(&diffs).unwrap();

    assert_eq!(map.data[0], 1.0);
    assert_eq!(map.data[1], 2.0);
    assert!(map.data[2].is_nan());
}
