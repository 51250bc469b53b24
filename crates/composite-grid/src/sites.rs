//! Point extraction at flux-tower sites.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use composite_common::{set_for_site, CompositeError, CompositeResult, GridAxes, GridField, SetLabel};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::align::{regrid, InterpolationMethod};

/// A flux-tower site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
}

impl Site {
    pub fn new(id: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            lat,
            lon,
        }
    }
}

/// Bilinear value of `field` at a point, NaN outside the grid or next to a
/// NaN cell. Longitude may use either convention.
pub fn interpolate_at(field: &GridField, lat: f64, lon: f64, layer: usize) -> CompositeResult<f64> {
    if layer >= field.nlayers() {
        return Err(CompositeError::format(format!(
            "'{}' has {} layers, asked for layer {}",
            field.name,
            field.nlayers(),
            layer
        )));
    }
    let point = GridAxes::new(vec![lat], vec![lon]);
    let sampled = regrid(field, &point, InterpolationMethod::Bilinear)?;
    Ok(sampled.get(layer, 0, 0) as f64)
}

/// Position of `label` on the field's extra axis.
pub fn layer_index(field: &GridField, label: &str) -> CompositeResult<usize> {
    field
        .axes
        .extra
        .as_ref()
        .and_then(|extra| extra.labels.iter().position(|l| l == label))
        .ok_or_else(|| CompositeError::format(format!("'{}' has no layer labelled '{}'", field.name, label)))
}

/// One row of a [`SiteTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRow {
    pub site: Site,
    pub values: BTreeMap<SetLabel, f64>,
    pub observed: Option<f64>,
}

/// Model values at each site per Set, plus the composite pick and the
/// tower observation.
#[derive(Debug, Clone, Default)]
pub struct SiteTable {
    columns: Vec<SetLabel>,
    rows: Vec<SiteRow>,
}

impl SiteTable {
    pub fn new(sites: &[Site]) -> Self {
        Self {
            columns: Vec::new(),
            rows: sites
                .iter()
                .map(|site| SiteRow {
                    site: site.clone(),
                    values: BTreeMap::new(),
                    observed: None,
                })
                .collect(),
        }
    }

    pub fn rows(&self) -> &[SiteRow] {
        &self.rows
    }

    /// Set labels in column order.
    pub fn columns(&self) -> &[SetLabel] {
        &self.columns
    }

    /// Interpolate `field` at every site into the column `label`.
    pub fn add_set(&mut self, label: SetLabel, field: &GridField, layer: usize) -> CompositeResult<()> {
        for row in &mut self.rows {
            let value = interpolate_at(field, row.site.lat, row.site.lon, layer)?;
            debug!(site = %row.site.id, set = %label, value, "Interpolated site value");
            row.values.insert(label.clone(), value);
        }
        self.push_column(label);
        Ok(())
    }

    /// Record the tower observation of a site.
    pub fn set_observed(&mut self, site_id: &str, value: f64) -> CompositeResult<()> {
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.site.id == site_id)
            .ok_or_else(|| CompositeError::InvalidConfig(format!("unknown site {}", site_id)))?;
        row.observed = Some(value);
        Ok(())
    }

    /// Add a "Composite" column holding, for each site, the value of the
    /// Set calibrated for it. Sites outside the calibration table get NaN.
    pub fn add_composite(&mut self) -> CompositeResult<()> {
        let composite = SetLabel::composite();
        for row in &mut self.rows {
            let value = match set_for_site(&row.site.id) {
                Some(set) => *row
                    .values
                    .get(&set)
                    .ok_or_else(|| CompositeError::UnknownSet(set.to_string()))?,
                None => {
                    warn!(site = %row.site.id, "Site has no calibration Set; composite value left empty");
                    f64::NAN
                }
            };
            row.values.insert(composite.clone(), value);
        }
        self.push_column(composite);
        Ok(())
    }

    fn push_column(&mut self, label: SetLabel) {
        if !self.columns.contains(&label) {
            self.columns.push(label);
        }
    }

    fn has_observations(&self) -> bool {
        self.rows.iter().any(|r| r.observed.is_some())
    }

    /// Write the table as CSV. When observations are present every Set
    /// column gets a `<Set>_per_diff` companion, `100 * (model - obs) / obs`.
    pub fn to_writer<W: Write>(&self, writer: W) -> CompositeResult<()> {
        let with_obs = self.has_observations();
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = vec!["SiteID".to_string(), "lat".to_string(), "lon".to_string()];
        if with_obs {
            header.push("Observed".to_string());
        }
        header.extend(self.columns.iter().map(|c| c.to_string()));
        if with_obs {
            header.extend(self.columns.iter().map(|c| format!("{}_per_diff", c)));
        }
        wtr.write_record(&header).map_err(csv_error)?;

        for row in &self.rows {
            let mut record = vec![row.site.id.clone(), row.site.lat.to_string(), row.site.lon.to_string()];
            let observed = row.observed.unwrap_or(f64::NAN);
            if with_obs {
                record.push(observed.to_string());
            }
            let values: Vec<f64> = self
                .columns
                .iter()
                .map(|c| row.values.get(c).copied().unwrap_or(f64::NAN))
                .collect();
            record.extend(values.iter().map(|v| v.to_string()));
            if with_obs {
                record.extend(values.iter().map(|v| (100.0 * (v - observed) / observed).to_string()));
            }
            wtr.write_record(&record).map_err(csv_error)?;
        }

        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> CompositeResult<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.to_writer(file)
    }
}

fn csv_error(e: csv::Error) -> CompositeError {
    match e.into_kind() {
        csv::ErrorKind::Io(err) => CompositeError::Io(err),
        other => CompositeError::format(format!("CSV: {:?}", other)),
    }
}
