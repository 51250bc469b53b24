//! `COMPOSITE_*` environment overrides.
//!
//! Kept in its own test binary so the process environment is not shared with
//! tests that expect the file's composite settings.

use composite_grid::OverlapPolicy;
use evaluator::parse_config;

const YAML: &str = r#"
variable: GPP
output_dir: /tmp/out
sets:
  - { label: Set1, path: /data/set1.nc }
  - { label: Set2, path: /data/set2.nc }
  - { label: Set3, path: /data/set3.nc }
region_masks:
  Northern_Rockies: /masks/nr.json
  Upper_Midwest: /masks/um.json
  Ohio_Valley: /masks/ov.json
composite:
  overlap_policy: last_wins
  coord_tolerance: 0.001
"#;

#[test]
fn test_env_overrides_composite_settings() {
    std::env::set_var("COMPOSITE_OVERLAP_POLICY", "reject");
    std::env::set_var("COMPOSITE_COORD_TOLERANCE", "0.3");

    // Out-of-range tolerance from the environment still goes through validation
    let err = parse_config(YAML).unwrap_err();
    assert!(format!("{:#}", err).contains("coord_tolerance"));

    std::env::set_var("COMPOSITE_COORD_TOLERANCE", "0.02");
    let config = parse_config(YAML).unwrap();
    assert_eq!(config.composite.overlap_policy, OverlapPolicy::Reject);
    assert_eq!(config.composite.coord_tolerance, 0.02);

    std::env::remove_var("COMPOSITE_OVERLAP_POLICY");
    std::env::remove_var("COMPOSITE_COORD_TOLERANCE");
    let config = parse_config(YAML).unwrap();
    assert_eq!(config.composite.overlap_policy, OverlapPolicy::LastWins);
    assert_eq!(config.composite.coord_tolerance, 0.001);
}
