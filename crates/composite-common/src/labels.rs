//! Set, region and variable identifiers.
//!
//! These replace the string-keyed dictionaries of the workflow scripts with
//! enumerated, immutable lookups.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CompositeError, CompositeResult};

/// Seconds-per-day conversion used for model carbon fluxes (gC/m2/s → gC/m2/day).
pub const CONV_SEC_DAY: f64 = 1.0 / 86_400.0;

/// Micromoles CO2 to grams carbon factor used by flux-tower style products.
pub const CONV_UMOLCO2_GC: f64 = 1.03775;

/// Label of one member of a multi-set array (e.g. "Set1", "Set2_no_rot", "Composite").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetLabel(String);

impl SetLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Calibrated run `SetN`.
    pub fn set(n: u8) -> Self {
        Self(format!("Set{}", n))
    }

    /// Calibrated run without crop rotation, `SetN_no_rot`.
    pub fn set_no_rot(n: u8) -> Self {
        Self(format!("Set{}_no_rot", n))
    }

    /// The run with default model parameters.
    pub fn default_params() -> Self {
        Self("Default".to_string())
    }

    pub fn composite() -> Self {
        Self("Composite".to_string())
    }

    pub fn no_rot_composite() -> Self {
        Self("No_rot_Composite".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl fmt::Display for SetLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SetLabel {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Agro-climatic subregion of the study domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "Northern_Rockies")]
    NorthernRockies,
    #[serde(rename = "Upper_Midwest")]
    UpperMidwest,
    #[serde(rename = "Ohio_Valley")]
    OhioValley,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::NorthernRockies, Region::UpperMidwest, Region::OhioValley];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::NorthernRockies => "Northern_Rockies",
            Region::UpperMidwest => "Upper_Midwest",
            Region::OhioValley => "Ohio_Valley",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = CompositeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Northern_Rockies" => Ok(Region::NorthernRockies),
            "Upper_Midwest" => Ok(Region::UpperMidwest),
            "Ohio_Valley" => Ok(Region::OhioValley),
            other => Err(CompositeError::InvalidConfig(format!("unknown region '{}'", other))),
        }
    }
}

/// Which family of runs a composite is stitched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeVariant {
    /// Corn/soybean rotation runs, labelled "Composite".
    Rotation,
    /// Runs without rotation, labelled "No_rot_Composite".
    NoRotation,
}

impl CompositeVariant {
    pub fn output_label(&self) -> SetLabel {
        match self {
            CompositeVariant::Rotation => SetLabel::composite(),
            CompositeVariant::NoRotation => SetLabel::no_rot_composite(),
        }
    }

    /// Region→Set mapping used for this variant.
    pub fn default_mapping(&self) -> RegionSetMap {
        let label = |n| match self {
            CompositeVariant::Rotation => SetLabel::set(n),
            CompositeVariant::NoRotation => SetLabel::set_no_rot(n),
        };
        RegionSetMap {
            entries: vec![
                (Region::NorthernRockies, label(1)),
                (Region::UpperMidwest, label(2)),
                (Region::OhioValley, label(3)),
            ],
        }
    }
}

/// Ordered region→Set mapping. Order is the fill order of a composite build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(Region, SetLabel)>", into = "Vec<(Region, SetLabel)>")]
pub struct RegionSetMap {
    entries: Vec<(Region, SetLabel)>,
}

impl RegionSetMap {
    /// Build a mapping, rejecting a region listed twice.
    pub fn new(entries: Vec<(Region, SetLabel)>) -> CompositeResult<Self> {
        for (i, (region, _)) in entries.iter().enumerate() {
            if entries[..i].iter().any(|(r, _)| r == region) {
                return Err(CompositeError::InvalidConfig(format!(
                    "region {} mapped more than once",
                    region
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Region, &SetLabel)> {
        self.entries.iter().map(|(r, s)| (r, s))
    }

    pub fn set_for(&self, region: Region) -> Option<&SetLabel> {
        self.entries.iter().find(|(r, _)| *r == region).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Vec<(Region, SetLabel)>> for RegionSetMap {
    type Error = CompositeError;

    fn try_from(entries: Vec<(Region, SetLabel)>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<RegionSetMap> for Vec<(Region, SetLabel)> {
    fn from(map: RegionSetMap) -> Self {
        map.entries
    }
}

/// Months averaged for the monthly evaluation.
pub const SUMMER_MONTHS: [u32; 4] = [6, 7, 8, 9];

/// Labels of [`SUMMER_MONTHS`] on the `month` axis.
pub const SUMMER_MONTH_LABELS: [&str; 4] = ["June", "July", "August", "September"];

/// Temporal resolution of an evaluated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeResolution {
    Annual,
    Monthly,
}

/// Model output variables evaluated by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum Variable {
    GPP,
    ER,
    NEE,
    NPP,
    NBP,
    TER,
    NCE,
    EFLX_LH_TOT,
    FSH,
    TLAI,
    LAI,
    DMYIELD,
    PLANTDAY,
    HARVESTDAY,
}

impl Variable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variable::GPP => "GPP",
            Variable::ER => "ER",
            Variable::NEE => "NEE",
            Variable::NPP => "NPP",
            Variable::NBP => "NBP",
            Variable::TER => "TER",
            Variable::NCE => "NCE",
            Variable::EFLX_LH_TOT => "EFLX_LH_TOT",
            Variable::FSH => "FSH",
            Variable::TLAI => "TLAI",
            Variable::LAI => "LAI",
            Variable::DMYIELD => "DMYIELD",
            Variable::PLANTDAY => "PLANTDAY",
            Variable::HARVESTDAY => "HARVESTDAY",
        }
    }

    /// Divisor applied to raw model output. Carbon fluxes are stored per
    /// second; dividing by `1/86400` gives per-day values.
    pub fn model_conv_factor(&self) -> f64 {
        match self {
            Variable::GPP | Variable::ER | Variable::NEE | Variable::NPP | Variable::NBP => {
                CONV_SEC_DAY
            }
            _ => 1.0,
        }
    }

    /// Divisor applied to tower and gridded observations, converting
    /// umol CO2 to gC.
    pub fn obs_conv_factor(&self) -> f64 {
        match self {
            Variable::GPP | Variable::ER => 1.0 / CONV_UMOLCO2_GC,
            _ => 1.0,
        }
    }

    /// Whether monthly values are rates that must be integrated over the
    /// days of the month to form totals.
    pub fn is_monthly_total(&self) -> bool {
        self.model_conv_factor() != 1.0
    }

    /// Human-readable label with units, `None` when the variable has no
    /// meaningful rendering at that resolution.
    pub fn label(&self, resolution: TimeResolution) -> Option<&'static str> {
        match resolution {
            TimeResolution::Annual => match self {
                Variable::GPP => Some("Gross Primary Productivity [gC m-2 year-1]"),
                Variable::ER => Some("Ecosystem Respiration [gC m-2 year-1]"),
                Variable::EFLX_LH_TOT => Some("Latent Heat Flux [W m-2]"),
                Variable::FSH => Some("Sensible Heat Flux [W m-2]"),
                Variable::NEE => Some("Net Ecosystem Exchange [gC m-2 year-1]"),
                Variable::NCE => Some("Net Carbon Exchange [gC m-2 year-1]"),
                Variable::TER => Some("Terrestrial Ecosystem Respiration [gC m-2 year-1]"),
                Variable::DMYIELD => Some("Annual Grain Yield [t ha-1]"),
                Variable::PLANTDAY => Some("Planting day"),
                Variable::HARVESTDAY => Some("Harvest day"),
                _ => None,
            },
            TimeResolution::Monthly => match self {
                Variable::GPP => Some("Gross Primary Productivity [gC m-2 month-1]"),
                Variable::ER => Some("Ecosystem Respiration [gC m-2 month-1]"),
                Variable::EFLX_LH_TOT => Some("Latent Heat Flux [W m-2]"),
                Variable::FSH => Some("Sensible Heat Flux [W m-2]"),
                Variable::TLAI => Some("Total projected leaf area index"),
                Variable::LAI => Some("Leaf area index"),
                _ => None,
            },
        }
    }

    /// The bracketed units of [`Variable::label`], if it carries any.
    pub fn units(&self, resolution: TimeResolution) -> Option<&'static str> {
        let label = self.label(resolution)?;
        let (_, rest) = label.split_once('[')?;
        rest.strip_suffix(']')
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variable {
    type Err = CompositeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = match s {
            "GPP" => Variable::GPP,
            "ER" => Variable::ER,
            "NEE" => Variable::NEE,
            "NPP" => Variable::NPP,
            "NBP" => Variable::NBP,
            "TER" => Variable::TER,
            "NCE" | "NCEgCm2" => Variable::NCE,
            "EFLX_LH_TOT" => Variable::EFLX_LH_TOT,
            "FSH" => Variable::FSH,
            "TLAI" => Variable::TLAI,
            "LAI" => Variable::LAI,
            "DMYIELD" => Variable::DMYIELD,
            "PLANTDAY" => Variable::PLANTDAY,
            "HARVESTDAY" => Variable::HARVESTDAY,
            other => {
                return Err(CompositeError::InvalidConfig(format!(
                    "unknown variable '{}'",
                    other
                )))
            }
        };
        Ok(v)
    }
}

/// Flux-tower sites whose calibrated parameters produced each Set.
const SITE_SETS: &[(&str, u8)] = &[
    ("US-Ne3", 1),
    ("US-Ro1", 2),
    ("US-UiC", 3),
    ("US-Br1", 2),
    ("US-Bo1", 3),
    ("US-IB1", 3),
];

/// Set whose calibration represents a given site in the composite.
pub fn set_for_site(site_id: &str) -> Option<SetLabel> {
    SITE_SETS
        .iter()
        .find(|(id, _)| *id == site_id)
        .map(|(_, n)| SetLabel::set(*n))
}
