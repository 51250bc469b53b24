//! Composite grid builder.
//!
//! A composite stitches several regional runs into one grid: each region's
//! cells take the values of the Set calibrated for that region, every other
//! cell stays NaN.

use std::borrow::Cow;
use std::collections::BTreeMap;

use composite_common::{
    CompositeError, CompositeResult, CompositeVariant, CoordIndex, GridField, Region,
    RegionSetMap, SetLabel,
};
use tracing::{debug, info, warn};

use crate::compare::{compare, Comparison};
use crate::config::{CompositeConfig, OverlapPolicy};
use crate::mask::RegionMaskStore;
use crate::multiset::MultiSetArray;

/// A field tagged with the Set label it carries when placed alongside the runs.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledField {
    pub label: SetLabel,
    pub field: GridField,
}

/// Builds composites from a multi-set array and a region mask store.
#[derive(Debug, Clone)]
pub struct CompositeBuilder<S: RegionMaskStore> {
    store: S,
    config: CompositeConfig,
}

impl<S: RegionMaskStore> CompositeBuilder<S> {
    pub fn new(store: S, config: CompositeConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &CompositeConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Build the composite of `variable`, labelled after the mapping: all
    /// `_no_rot` Sets give "No_rot_Composite", anything else "Composite".
    pub fn build(
        &self,
        multiset: &MultiSetArray,
        variable: &str,
        mapping: &RegionSetMap,
    ) -> CompositeResult<LabeledField> {
        self.build_with_label(multiset, variable, mapping, label_for_mapping(mapping))
    }

    /// Build the composite of one rotation variant with its default mapping.
    pub fn build_variant(
        &self,
        multiset: &MultiSetArray,
        variable: &str,
        variant: CompositeVariant,
    ) -> CompositeResult<LabeledField> {
        self.build_with_label(
            multiset,
            variable,
            &variant.default_mapping(),
            variant.output_label(),
        )
    }

    /// Build the composite of `variable` and tag it with `label`.
    ///
    /// Every mapped Set is resolved before any cell is written, so an
    /// `UnknownSet` or `UnknownVariable` never leaves partial work behind.
    /// The multi-set array is only read.
    pub fn build_with_label(
        &self,
        multiset: &MultiSetArray,
        variable: &str,
        mapping: &RegionSetMap,
        label: SetLabel,
    ) -> CompositeResult<LabeledField> {
        let sources: Vec<(Region, &SetLabel, &GridField)> = mapping
            .iter()
            .map(|(region, set)| Ok((*region, set, multiset.select(set, variable)?)))
            .collect::<CompositeResult<_>>()?;

        let template = match sources.first() {
            Some((_, _, field)) => *field,
            None => multiset
                .variable_across_sets(variable)
                .first()
                .map(|(_, field)| *field)
                .ok_or_else(|| CompositeError::UnknownVariable {
                    set: "<any>".to_string(),
                    variable: variable.to_string(),
                })?,
        };

        let index = self.coord_index(multiset)?;

        let mut output = GridField::filled_nan(variable, template.axes.clone());
        output.units = template.units.clone();

        let nlon = output.axes.nlon();
        let nlayers = output.nlayers();
        let mut owner: Vec<Option<usize>> = vec![None; output.axes.cells_per_layer()];
        let mut overlaps = 0usize;

        for (position, (region, set, source)) in sources.iter().enumerate() {
            let mask = self.store.load_region_mask(*region)?;

            for &(lon, lat) in mask.cells() {
                let (ilat, ilon) =
                    index
                        .lookup(lon, lat)
                        .ok_or_else(|| CompositeError::OutOfBoundsCoordinate {
                            region: region.to_string(),
                            lon,
                            lat,
                        })?;

                let cell = ilat * nlon + ilon;
                if let Some(previous) = owner[cell] {
                    if previous != position {
                        if self.config.overlap_policy == OverlapPolicy::Reject {
                            return Err(CompositeError::OverlappingRegions {
                                first: sources[previous].0.to_string(),
                                second: region.to_string(),
                                lon,
                                lat,
                            });
                        }
                        overlaps += 1;
                    }
                }
                owner[cell] = Some(position);

                for layer in 0..nlayers {
                    output.set(layer, ilat, ilon, source.get(layer, ilat, ilon));
                }
            }

            debug!(
                region = %region,
                set = %set,
                cells = mask.len(),
                "Copied region into composite"
            );
        }

        if overlaps > 0 {
            warn!(
                variable = variable,
                overlapping_cells = overlaps,
                "Regions overlap; later regions overwrote earlier ones"
            );
        }

        let filled = owner.iter().filter(|o| o.is_some()).count();
        info!(
            label = %label,
            variable = variable,
            regions = sources.len(),
            filled_cells = filled,
            total_cells = owner.len(),
            "Built composite"
        );

        Ok(LabeledField { label, field: output })
    }

    fn coord_index<'a>(&self, multiset: &'a MultiSetArray) -> CompositeResult<Cow<'a, CoordIndex>> {
        if multiset.tolerance() == self.config.coord_tolerance {
            Ok(Cow::Borrowed(multiset.index()))
        } else {
            Ok(Cow::Owned(CoordIndex::build(
                multiset.axes(),
                self.config.coord_tolerance,
            )?))
        }
    }
}

/// Build a composite with the default configuration.
pub fn build_composite<S: RegionMaskStore>(
    multiset: &MultiSetArray,
    variable: &str,
    mapping: &RegionSetMap,
    store: S,
) -> CompositeResult<LabeledField> {
    CompositeBuilder::new(store, CompositeConfig::default()).build(multiset, variable, mapping)
}

/// Output label implied by a mapping's Sets.
pub fn label_for_mapping(mapping: &RegionSetMap) -> SetLabel {
    let no_rot = !mapping.is_empty() && mapping.iter().all(|(_, set)| set.as_str().ends_with("_no_rot"));
    if no_rot {
        CompositeVariant::NoRotation.output_label()
    } else {
        CompositeVariant::Rotation.output_label()
    }
}

/// Compare each listed Set against a composite (Set − Composite and
/// `100 * Set / Composite`).
pub fn set_vs_composite(
    multiset: &MultiSetArray,
    variable: &str,
    composite: &GridField,
    sets: &[SetLabel],
) -> CompositeResult<BTreeMap<SetLabel, Comparison>> {
    let fields = sets
        .iter()
        .map(|set| Ok((set, multiset.select(set, variable)?)))
        .collect::<CompositeResult<Vec<_>>>()?;
    compare(fields, composite)
}

/// Cell-wise `composite - no_rot_composite`.
pub fn rotation_difference(composite: &GridField, no_rot: &GridField) -> CompositeResult<GridField> {
    composite.zip_map(no_rot, format!("{}_rotation_diff", composite.name), |a, b| a - b)
}
