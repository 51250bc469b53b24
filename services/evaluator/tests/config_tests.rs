//! Loading the shipped example configuration.

use composite_common::{CompositeVariant, Region, SetLabel, TimeResolution, Variable};
use composite_grid::{AnnualStat, InterpolationMethod};
use evaluator::{comparison_order, load_config};
use test_utils::workspace_root;

#[test]
fn test_example_config_loads() {
    let path = workspace_root().join("services/evaluator/config/evaluator.example.yaml");
    let config = load_config(&path).unwrap();

    assert_eq!(config.variable, Variable::GPP);
    assert_eq!(config.resolution, TimeResolution::Annual);
    assert_eq!(config.sets.len(), 7);
    assert_eq!(
        config.composites,
        vec![CompositeVariant::Rotation, CompositeVariant::NoRotation]
    );
    assert_eq!(config.region_masks.len(), Region::ALL.len());
    assert_eq!(config.sites.len(), 6);
    assert_eq!(config.logging.format, "json");

    let order = comparison_order(&config);
    assert_eq!(order[0], SetLabel::composite());
    assert_eq!(order[1], SetLabel::no_rot_composite());
    assert_eq!(order[2], SetLabel::default_params());
    assert_eq!(order.len(), 6);

    let fluxcom = &config.observations[0];
    assert!(fluxcom.time_series);
    assert_eq!(fluxcom.interpolation, InterpolationMethod::Bilinear);
    assert_eq!(fluxcom.conv_factor_for(config.variable), Variable::GPP.obs_conv_factor());
    assert!(fluxcom.clip.is_some());

    let modis = &config.observations[1];
    assert_eq!(modis.climatology, Some(AnnualStat::Sum));
    assert_eq!(modis.conv_factor_for(config.variable), 1.0);
}

#[test]
fn test_missing_config_file() {
    let err = load_config("/nonexistent/evaluator.yaml").unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to read evaluator config"));
}
