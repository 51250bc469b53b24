//! Alignment of reference fields onto a model grid.
//!
//! Observations arrive on their own grids and longitude conventions. Before
//! comparison they are put on 0–360 longitudes, optionally clipped to a box,
//! and interpolated onto the model's lat/lon axes.

use composite_common::{
    normalize_lon_360, BoundingBox, CompositeError, CompositeResult, ExtraAxis, GridAxes, GridField,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Slack when deciding whether a target coordinate lies on or inside the source axis.
const COORD_EPSILON: f64 = 1e-6;

/// Interpolation used when regridding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMethod {
    Nearest,
    #[default]
    Bilinear,
}

/// Put longitudes in the 0–360 convention, ascending, with the data
/// reordered to match.
pub fn normalize_longitudes(field: &GridField) -> GridField {
    let lons: Vec<f64> = field.axes.lon.iter().map(|&l| normalize_lon_360(l)).collect();
    let mut order: Vec<usize> = (0..lons.len()).collect();
    order.sort_by(|&a, &b| lons[a].total_cmp(&lons[b]));

    let axes = GridAxes {
        lat: field.axes.lat.clone(),
        lon: order.iter().map(|&i| lons[i]).collect(),
        extra: field.axes.extra.clone(),
    };

    let mut data = Vec::with_capacity(field.data.len());
    for layer in 0..field.nlayers() {
        for ilat in 0..field.axes.nlat() {
            data.extend(order.iter().map(|&ilon| field.get(layer, ilat, ilon)));
        }
    }

    GridField {
        name: field.name.clone(),
        units: field.units.clone(),
        axes,
        data,
    }
}

/// Subset `field` to the cells whose centres fall inside `bbox` (edges inclusive).
pub fn clip(field: &GridField, bbox: &BoundingBox) -> CompositeResult<GridField> {
    let lat_idx: Vec<usize> = field
        .axes
        .lat
        .iter()
        .enumerate()
        .filter(|(_, &lat)| bbox.contains_lat(lat))
        .map(|(i, _)| i)
        .collect();
    let lon_idx: Vec<usize> = field
        .axes
        .lon
        .iter()
        .enumerate()
        .filter(|(_, &lon)| bbox.contains_lon(lon))
        .map(|(i, _)| i)
        .collect();

    if lat_idx.is_empty() || lon_idx.is_empty() {
        return Err(CompositeError::alignment(format!(
            "'{}' has no cells inside lon {}..{}, lat {}..{}",
            field.name, bbox.min_lon, bbox.max_lon, bbox.min_lat, bbox.max_lat
        )));
    }

    let axes = GridAxes {
        lat: lat_idx.iter().map(|&i| field.axes.lat[i]).collect(),
        lon: lon_idx.iter().map(|&i| field.axes.lon[i]).collect(),
        extra: field.axes.extra.clone(),
    };

    let mut data = Vec::with_capacity(axes.len());
    for layer in 0..field.nlayers() {
        for &ilat in &lat_idx {
            data.extend(lon_idx.iter().map(|&ilon| field.get(layer, ilat, ilon)));
        }
    }

    debug!(
        field = %field.name,
        nlat = axes.nlat(),
        nlon = axes.nlon(),
        "Clipped field"
    );

    Ok(GridField {
        name: field.name.clone(),
        units: field.units.clone(),
        axes,
        data,
    })
}

/// Interpolate `field` onto `target`'s lat/lon.
///
/// Works in coordinate space with both longitude axes in 0–360. Target
/// points outside the source extent are NaN, and a bilinear result with a
/// NaN corner is NaN. When `target` carries an extra axis it must equal the
/// field's; otherwise the field's extra axis is kept.
pub fn regrid(field: &GridField, target: &GridAxes, method: InterpolationMethod) -> CompositeResult<GridField> {
    let extra = resolve_extra(field, target)?;

    let src_lon: Vec<f64> = field.axes.lon.iter().map(|&l| normalize_lon_360(l)).collect();
    let lat_brackets: Vec<Option<Bracket>> = target.lat.iter().map(|&y| bracket(&field.axes.lat, y)).collect();
    let lon_brackets: Vec<Option<Bracket>> = target
        .lon
        .iter()
        .map(|&x| bracket(&src_lon, normalize_lon_360(x)))
        .collect();

    let axes = GridAxes {
        lat: target.lat.clone(),
        lon: target.lon.clone(),
        extra,
    };

    let mut data = Vec::with_capacity(axes.len());
    for layer in 0..field.nlayers() {
        for lat_b in &lat_brackets {
            for lon_b in &lon_brackets {
                let value = match (lat_b, lon_b) {
                    (Some(yb), Some(xb)) => sample(field, layer, yb, xb, method),
                    _ => f32::NAN,
                };
                data.push(value);
            }
        }
    }

    Ok(GridField {
        name: field.name.clone(),
        units: field.units.clone(),
        axes,
        data,
    })
}

fn resolve_extra(field: &GridField, target: &GridAxes) -> CompositeResult<Option<ExtraAxis>> {
    match &target.extra {
        None => Ok(field.axes.extra.clone()),
        Some(extra) if field.axes.extra.as_ref() == Some(extra) => Ok(Some(extra.clone())),
        Some(extra) => Err(CompositeError::alignment(format!(
            "'{}' extra axis {:?} does not match target {} {:?}",
            field.name,
            field.axes.extra.as_ref().map(|e| &e.labels),
            extra.name,
            extra.labels
        ))),
    }
}

/// Neighbouring source indices around a target coordinate and the weight of `hi`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bracket {
    lo: usize,
    hi: usize,
    t: f64,
}

/// Locate `x` on a monotonic (ascending or descending) axis.
fn bracket(coords: &[f64], x: f64) -> Option<Bracket> {
    if !x.is_finite() {
        return None;
    }
    if let Some(i) = coords.iter().position(|&c| (c - x).abs() <= COORD_EPSILON) {
        return Some(Bracket { lo: i, hi: i, t: 0.0 });
    }
    coords.windows(2).enumerate().find_map(|(i, w)| {
        let (a, b) = (w[0], w[1]);
        let inside = (a < x && x < b) || (b < x && x < a);
        inside.then(|| Bracket {
            lo: i,
            hi: i + 1,
            t: (x - a) / (b - a),
        })
    })
}

fn sample(field: &GridField, layer: usize, yb: &Bracket, xb: &Bracket, method: InterpolationMethod) -> f32 {
    match method {
        InterpolationMethod::Nearest => {
            let ilat = if yb.t <= 0.5 { yb.lo } else { yb.hi };
            let ilon = if xb.t <= 0.5 { xb.lo } else { xb.hi };
            field.get(layer, ilat, ilon)
        }
        InterpolationMethod::Bilinear => {
            let v00 = field.get(layer, yb.lo, xb.lo) as f64;
            let v01 = field.get(layer, yb.lo, xb.hi) as f64;
            let v10 = field.get(layer, yb.hi, xb.lo) as f64;
            let v11 = field.get(layer, yb.hi, xb.hi) as f64;
            if [v00, v01, v10, v11].iter().any(|v| v.is_nan()) {
                return f32::NAN;
            }
            let top = v00 * (1.0 - xb.t) + v01 * xb.t;
            let bottom = v10 * (1.0 - xb.t) + v11 * xb.t;
            (top * (1.0 - yb.t) + bottom * yb.t) as f32
        }
    }
}

/// Bring an observation field onto the model grid.
///
/// Longitudes are normalized, the optional clip box applied, and the field
/// is regridded unless it already sits on `model_axes`. The result carries
/// `model_axes`' lat/lon exactly. A field that does not overlap the model
/// grid at all is an `AlignmentError`.
pub fn align_to(
    obs: &GridField,
    model_axes: &GridAxes,
    method: InterpolationMethod,
    clip_box: Option<&BoundingBox>,
) -> CompositeResult<GridField> {
    let normalized = normalize_longitudes(obs);
    let source = match clip_box {
        Some(bbox) => clip(&normalized, bbox)?,
        None => normalized,
    };

    if source.axes.spatially_matches(model_axes, COORD_EPSILON) {
        let extra = resolve_extra(&source, model_axes)?;
        debug!(field = %obs.name, "Observation already on model grid");
        return Ok(GridField {
            axes: GridAxes {
                lat: model_axes.lat.clone(),
                lon: model_axes.lon.clone(),
                extra,
            },
            ..source
        });
    }

    if !extents_overlap(&source.axes, model_axes) {
        return Err(CompositeError::alignment(format!(
            "'{}' does not overlap the model grid",
            obs.name
        )));
    }

    let aligned = regrid(&source, model_axes, method)?;
    debug!(
        field = %obs.name,
        method = ?method,
        finite_cells = aligned.finite_count(),
        "Regridded observation onto model grid"
    );
    Ok(aligned)
}

fn extents_overlap(source: &GridAxes, target: &GridAxes) -> bool {
    let to_360 = |axes: &GridAxes| GridAxes {
        lat: axes.lat.clone(),
        lon: axes.lon.iter().map(|&l| normalize_lon_360(l)).collect(),
        extra: None,
    };
    match (to_360(source).bbox(), to_360(target).bbox()) {
        (Some(a), Some(b)) => a.intersects(&b),
        _ => false,
    }
}
