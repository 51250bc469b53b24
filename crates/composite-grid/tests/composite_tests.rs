//! Integration tests for composite building.

use composite_common::{CompositeError, CompositeVariant, Region, RegionSetMap, SetLabel};
use composite_grid::{
    build_composite, set_vs_composite, CompositeBuilder, CompositeConfig, FileMaskStore,
    InMemoryMaskStore, MultiSetArray, OverlapPolicy, RegionMask,
};
use test_utils::{
    midwest_axes, numbered_sets, quadrant, quadrant_sets, set_field, temp_test_dir,
    write_mask_file,
};

fn quadrant_multiset() -> MultiSetArray {
    MultiSetArray::from_fields(quadrant_sets("GPP"), 1e-4).unwrap()
}

/// NW → Northern Rockies (Set1), NE → Upper Midwest (Set2), SW → Ohio Valley (Set3).
fn quadrant_store() -> InMemoryMaskStore {
    InMemoryMaskStore::new()
        .with_mask(Region::NorthernRockies, vec![quadrant::NW])
        .with_mask(Region::UpperMidwest, vec![quadrant::NE])
        .with_mask(Region::OhioValley, vec![quadrant::SW])
}

// ============================================================================
// Quadrant scenario
// ============================================================================

#[test]
fn test_quadrant_composite_copies_mapped_sets() {
    let multiset = quadrant_multiset();
    let store = quadrant_store();
    let composite = build_composite(
        &multiset,
        "GPP",
        &CompositeVariant::Rotation.default_mapping(),
        &store,
    )
    .unwrap();

    assert_eq!(composite.label, SetLabel::composite());
    let field = &composite.field;
    let (nw, ne, sw, se) = (quadrant::NW_IDX, quadrant::NE_IDX, quadrant::SW_IDX, quadrant::SE_IDX);

    let set = |n: u8| multiset.select(&SetLabel::set(n), "GPP").unwrap();
    assert_eq!(field.get(0, nw.0, nw.1), set(1).get(0, nw.0, nw.1));
    assert_eq!(field.get(0, ne.0, ne.1), set(2).get(0, ne.0, ne.1));
    assert_eq!(field.get(0, sw.0, sw.1), set(3).get(0, sw.0, sw.1));
    assert!(field.get(0, se.0, se.1).is_nan());
    assert_eq!(field.finite_count(), 3);
}

#[test]
fn test_build_does_not_mutate_input() {
    let multiset = quadrant_multiset();
    let before = multiset.clone();
    let store = quadrant_store();

    let _ = build_composite(
        &multiset,
        "GPP",
        &CompositeVariant::Rotation.default_mapping(),
        &store,
    )
    .unwrap();

    for label in before.labels() {
        let a = before.select(label, "GPP").unwrap();
        let b = multiset.select(label, "GPP").unwrap();
        assert!(a.bit_identical(b));
    }
}

#[test]
fn test_build_is_idempotent() {
    let multiset = quadrant_multiset();
    let store = quadrant_store();
    let mapping = CompositeVariant::Rotation.default_mapping();

    let first = build_composite(&multiset, "GPP", &mapping, &store).unwrap();
    let second = build_composite(&multiset, "GPP", &mapping, &store).unwrap();

    assert!(first.field.bit_identical(&second.field));
    assert!(first.field.same_nan_pattern(&second.field));
}

#[test]
fn test_no_rot_variant_uses_no_rot_sets() {
    let mut members: Vec<_> = quadrant_sets("GPP");
    members.extend(
        (1..=3u8).map(|n| (SetLabel::set_no_rot(n), set_field("GPP", &test_utils::quadrant_axes(), 10 + n as u32))),
    );
    let multiset = MultiSetArray::from_fields(members, 1e-4).unwrap();
    let builder = CompositeBuilder::new(quadrant_store(), CompositeConfig::default());

    let composite = builder
        .build_variant(&multiset, "GPP", CompositeVariant::NoRotation)
        .unwrap();

    assert_eq!(composite.label, SetLabel::no_rot_composite());
    let (ilat, ilon) = quadrant::NW_IDX;
    let expected = multiset.select(&SetLabel::set_no_rot(1), "GPP").unwrap().get(0, ilat, ilon);
    assert_eq!(composite.field.get(0, ilat, ilon), expected);
}

#[test]
fn test_mask_longitudes_in_either_convention() {
    let multiset = quadrant_multiset();
    let (lon, lat) = quadrant::NE;
    let store = InMemoryMaskStore::new().with_mask(Region::UpperMidwest, vec![(lon - 360.0, lat)]);
    let mapping = RegionSetMap::new(vec![(Region::UpperMidwest, SetLabel::set(2))]).unwrap();

    let composite = build_composite(&multiset, "GPP", &mapping, &store).unwrap();
    let (ilat, ilon) = quadrant::NE_IDX;
    assert_eq!(composite.field.get(0, ilat, ilon), 20_101.0);
}

// ============================================================================
// Extra axes
// ============================================================================

#[test]
fn test_every_layer_is_copied() {
    use composite_common::ExtraAxis;

    let axes = test_utils::quadrant_axes().with_extra(ExtraAxis::new(
        "month",
        vec!["June".into(), "July".into()],
    ));
    let multiset = MultiSetArray::from_fields(numbered_sets("GPP", &axes, 3), 1e-4).unwrap();
    let composite = build_composite(
        &multiset,
        "GPP",
        &CompositeVariant::Rotation.default_mapping(),
        quadrant_store(),
    )
    .unwrap();

    assert_eq!(composite.field.axes.extra, axes.extra);
    let (ilat, ilon) = quadrant::SW_IDX;
    assert_eq!(composite.field.get(0, ilat, ilon), 30_000.0);
    assert_eq!(composite.field.get(1, ilat, ilon), 31_000.0);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unknown_set_in_mapping() {
    let multiset = quadrant_multiset();
    let mapping = RegionSetMap::new(vec![
        (Region::NorthernRockies, SetLabel::set(1)),
        (Region::OhioValley, SetLabel::default_params()),
    ])
    .unwrap();

    let err = build_composite(&multiset, "GPP", &mapping, quadrant_store()).unwrap_err();
    assert!(matches!(err, CompositeError::UnknownSet(ref s) if s == "Default"));
}

#[test]
fn test_unknown_variable() {
    let multiset = quadrant_multiset();
    let err = build_composite(
        &multiset,
        "TLAI",
        &CompositeVariant::Rotation.default_mapping(),
        quadrant_store(),
    )
    .unwrap_err();
    assert!(matches!(err, CompositeError::UnknownVariable { .. }));
}

#[test]
fn test_out_of_bounds_coordinate() {
    let multiset = quadrant_multiset();
    let store = quadrant_store().with_mask(Region::OhioValley, vec![(275.0, 40.0)]);

    let err = build_composite(
        &multiset,
        "GPP",
        &CompositeVariant::Rotation.default_mapping(),
        &store,
    )
    .unwrap_err();
    match err {
        CompositeError::OutOfBoundsCoordinate { region, lon, lat } => {
            assert_eq!(region, "Ohio_Valley");
            assert_eq!(lon, 275.0);
            assert_eq!(lat, 40.0);
        }
        other => panic!("expected OutOfBoundsCoordinate, got {:?}", other),
    }
}

#[test]
fn test_missing_mask_resource() {
    let dir = temp_test_dir();
    let store = FileMaskStore::default()
        .with_region(Region::NorthernRockies, write_mask_file(dir.path(), "nr.json", &[quadrant::NW]))
        .with_region(Region::UpperMidwest, dir.path().join("missing.json"))
        .with_region(Region::OhioValley, write_mask_file(dir.path(), "ov.json", &[quadrant::SW]));

    assert!(matches!(
        store.check_resources(),
        Err(CompositeError::ResourceNotFound { .. })
    ));
    let err = build_composite(
        &quadrant_multiset(),
        "GPP",
        &CompositeVariant::Rotation.default_mapping(),
        &store,
    )
    .unwrap_err();
    assert!(matches!(err, CompositeError::ResourceNotFound { .. }));
}

#[test]
fn test_malformed_mask_resource() {
    let dir = temp_test_dir();
    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "[[270.0, 41.0], [271.0]]").unwrap();
    let store = FileMaskStore::default().with_region(Region::NorthernRockies, &bad);

    let mapping = RegionSetMap::new(vec![(Region::NorthernRockies, SetLabel::set(1))]).unwrap();
    let err = build_composite(&quadrant_multiset(), "GPP", &mapping, &store).unwrap_err();
    assert!(matches!(err, CompositeError::FormatError(_)));
}

#[test]
fn test_reject_policy_reports_both_regions() {
    let store = quadrant_store().with_mask(Region::OhioValley, vec![quadrant::SW, quadrant::NW]);
    let config = CompositeConfig {
        overlap_policy: OverlapPolicy::Reject,
        ..CompositeConfig::default()
    };
    let err = CompositeBuilder::new(&store, config)
        .build_variant(&quadrant_multiset(), "GPP", CompositeVariant::Rotation)
        .unwrap_err();

    match err {
        CompositeError::OverlappingRegions { first, second, .. } => {
            assert_eq!(first, "Northern_Rockies");
            assert_eq!(second, "Ohio_Valley");
        }
        other => panic!("expected OverlappingRegions, got {:?}", other),
    }
}

// ============================================================================
// File-backed masks and derived masks
// ============================================================================

#[test]
fn test_file_masks_on_midwest_grid() {
    let axes = midwest_axes();
    let dir = temp_test_dir();
    // -180 convention in the files, 0-360 on the grid
    let store = FileMaskStore::default()
        .with_region(Region::NorthernRockies, write_mask_file(dir.path(), "nr.json", &[(-99.25, 46.75)]))
        .with_region(Region::UpperMidwest, write_mask_file(dir.path(), "um.json", &[(-93.25, 44.75), (-92.75, 44.75)]))
        .with_region(Region::OhioValley, write_mask_file(dir.path(), "ov.json", &[(-84.25, 39.75)]));

    let multiset = MultiSetArray::from_fields(numbered_sets("GPP", &axes, 3), 1e-4).unwrap();
    let composite = build_composite(
        &multiset,
        "GPP",
        &CompositeVariant::Rotation.default_mapping(),
        &store,
    )
    .unwrap();

    assert_eq!(composite.field.finite_count(), 4);
    // (-93.25, 44.75) is ilat 15, ilon 12
    assert_eq!(composite.field.get(0, 15, 12), 21_512.0);
}

#[test]
fn test_masks_derived_from_regional_runs() {
    let axes = test_utils::quadrant_axes();
    let mut regional = test_utils::constant_field("GPP", &axes, f32::NAN);
    let (ilat, ilon) = quadrant::NE_IDX;
    regional.set(0, ilat, ilon, 1.0);

    let mask = RegionMask::from_defined_cells(Region::UpperMidwest, &regional);
    assert_eq!(mask.cells(), &[quadrant::NE]);

    let mut store = InMemoryMaskStore::new();
    store.insert(mask);
    let mapping = RegionSetMap::new(vec![(Region::UpperMidwest, SetLabel::set(2))]).unwrap();
    let composite = build_composite(&quadrant_multiset(), "GPP", &mapping, &store).unwrap();
    assert_eq!(composite.field.finite_count(), 1);
}

// ============================================================================
// Set vs composite
// ============================================================================

#[test]
fn test_set_vs_composite() {
    let multiset = quadrant_multiset();
    let composite = build_composite(
        &multiset,
        "GPP",
        &CompositeVariant::Rotation.default_mapping(),
        quadrant_store(),
    )
    .unwrap();

    let sets = [SetLabel::set(1), SetLabel::set(2)];
    let result = set_vs_composite(&multiset, "GPP", &composite.field, &sets).unwrap();

    // Set1 equals the composite at NW, is 100 * set1 / setN elsewhere
    let set1 = &result[&SetLabel::set(1)];
    let (ilat, ilon) = quadrant::NW_IDX;
    let idx = composite.field.axes.flat_index(0, ilat, ilon);
    assert_eq!(set1.diff.data[idx], 0.0);
    assert_eq!(set1.pct_diff.data[idx], 100.0);
    assert_eq!(set1.stats.finite_cells, 3);

    // The composite has the multiset's variable appended as a new member
    let extended = multiset
        .with_member(composite.label.clone(), vec![composite.field.clone()])
        .unwrap();
    assert_eq!(extended.len(), 4);
}
