//! Multi-set arrays: several model runs on one shared lat/lon grid.

use std::collections::BTreeMap;

use composite_common::{CompositeError, CompositeResult, CoordIndex, GridAxes, GridField, SetLabel};
use tracing::debug;

/// Per-run fields sharing identical lat/lon axes, addressed by Set label.
///
/// Members keep their insertion order. The coordinate index is built once
/// from the shared axes and used for every member.
#[derive(Debug, Clone)]
pub struct MultiSetArray {
    axes: GridAxes,
    index: CoordIndex,
    tolerance: f64,
    members: Vec<(SetLabel, BTreeMap<String, GridField>)>,
}

impl MultiSetArray {
    /// Assemble an array from each Set's fields.
    ///
    /// Every field must sit on the same lat/lon axes (within `tolerance`),
    /// and a variable must carry the same extra axis in every Set.
    pub fn from_members(
        members: Vec<(SetLabel, Vec<GridField>)>,
        tolerance: f64,
    ) -> CompositeResult<Self> {
        let reference = members
            .iter()
            .flat_map(|(_, fields)| fields.first())
            .next()
            .ok_or_else(|| CompositeError::alignment("multi-set array has no fields"))?;

        let axes = GridAxes::new(reference.axes.lat.clone(), reference.axes.lon.clone());
        let index = CoordIndex::build(&axes, tolerance)?;

        let mut array = Self {
            axes,
            index,
            tolerance,
            members: Vec::with_capacity(members.len()),
        };
        for (label, fields) in members {
            array.push_member(label, fields)?;
        }

        debug!(
            sets = array.members.len(),
            nlat = array.axes.nlat(),
            nlon = array.axes.nlon(),
            "Assembled multi-set array"
        );
        Ok(array)
    }

    /// Array holding a single variable per Set.
    pub fn from_fields(fields: Vec<(SetLabel, GridField)>, tolerance: f64) -> CompositeResult<Self> {
        Self::from_members(
            fields.into_iter().map(|(label, f)| (label, vec![f])).collect(),
            tolerance,
        )
    }

    fn push_member(&mut self, label: SetLabel, fields: Vec<GridField>) -> CompositeResult<()> {
        if self.contains(&label) {
            return Err(CompositeError::format(format!("duplicate set label {}", label)));
        }

        let mut by_name = BTreeMap::new();
        for field in fields {
            if !field.axes.spatially_matches(&self.axes, self.tolerance) {
                return Err(CompositeError::alignment(format!(
                    "{} '{}' is not on the shared lat/lon grid",
                    label, field.name
                )));
            }
            if let Some(existing) = self.existing_field(&field.name) {
                if existing.axes.extra != field.axes.extra {
                    return Err(CompositeError::alignment(format!(
                        "{} '{}' has a different extra axis than other sets",
                        label, field.name
                    )));
                }
            }
            if by_name.contains_key(&field.name) {
                return Err(CompositeError::format(format!(
                    "{} lists variable '{}' twice",
                    label, field.name
                )));
            }
            by_name.insert(field.name.clone(), field);
        }

        self.members.push((label, by_name));
        Ok(())
    }

    fn existing_field(&self, variable: &str) -> Option<&GridField> {
        self.members.iter().find_map(|(_, fields)| fields.get(variable))
    }

    /// Shared lat/lon axes.
    pub fn axes(&self) -> &GridAxes {
        &self.axes
    }

    /// Coordinate index of the shared axes.
    pub fn index(&self) -> &CoordIndex {
        &self.index
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn labels(&self) -> impl Iterator<Item = &SetLabel> {
        self.members.iter().map(|(label, _)| label)
    }

    pub fn contains(&self, label: &SetLabel) -> bool {
        self.members.iter().any(|(l, _)| l == label)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The field of `variable` in Set `set`.
    pub fn select(&self, set: &SetLabel, variable: &str) -> CompositeResult<&GridField> {
        let (_, fields) = self
            .members
            .iter()
            .find(|(label, _)| label == set)
            .ok_or_else(|| CompositeError::UnknownSet(set.to_string()))?;
        fields.get(variable).ok_or_else(|| CompositeError::UnknownVariable {
            set: set.to_string(),
            variable: variable.to_string(),
        })
    }

    /// `variable` in every Set that carries it, in member order.
    pub fn variable_across_sets(&self, variable: &str) -> Vec<(&SetLabel, &GridField)> {
        self.members
            .iter()
            .filter_map(|(label, fields)| fields.get(variable).map(|f| (label, f)))
            .collect()
    }

    /// A new array with one more member appended, e.g. a composite placed
    /// alongside the Sets it was built from. `self` is left unchanged.
    pub fn with_member(&self, label: SetLabel, fields: Vec<GridField>) -> CompositeResult<Self> {
        let mut next = self.clone();
        next.push_member(label, fields)?;
        Ok(next)
    }
}
