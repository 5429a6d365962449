//! Great-circle distances between trip locations and optional zone
//! assignment. Missing geography is common, so nothing here raises on absent
//! or null coordinates.

use super::SurveyTransform;
use crate::config::{LocationPair, PipelineConfig, ZoneTarget};
use crate::dependencies::{FieldDependencies, TransformKind};
use crate::error::Result;
use crate::frame;
use crate::reference::ZoneLookup;
use crate::schema::{lat_column, lon_column};
use polars::prelude::*;
use std::collections::BTreeSet;

/// Mean earth radius (IUGG) in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

pub fn dependencies(config: &PipelineConfig) -> FieldDependencies {
    let locations: BTreeSet<&str> = config
        .distance_pairs
        .iter()
        .flat_map(|pair| [pair.from.as_str(), pair.to.as_str()])
        .chain(config.zone_targets.iter().map(|t| t.location.as_str()))
        .collect();

    let mut deps = FieldDependencies::new(TransformKind::Geocoding);
    for location in locations {
        let (lat, lon) = (lat_column(location), lon_column(location));
        deps = deps.reads(&[lat.as_str(), lon.as_str()]);
    }
    for pair in &config.distance_pairs {
        deps = deps.writes(&[pair.output_column().as_str()]);
    }
    for target in &config.zone_targets {
        deps = deps.writes(&[target.output_column().as_str()]);
    }
    deps
}

pub struct GeocodingTransform<'a> {
    config: PipelineConfig,
    zones: Option<&'a dyn ZoneLookup>,
}

impl<'a> GeocodingTransform<'a> {
    pub fn new(config: &PipelineConfig, zones: Option<&'a dyn ZoneLookup>) -> Self {
        Self {
            config: config.clone(),
            zones,
        }
    }
}

impl SurveyTransform for GeocodingTransform<'_> {
    fn kind(&self) -> TransformKind {
        TransformKind::Geocoding
    }

    fn dependencies(&self) -> FieldDependencies {
        dependencies(&self.config)
    }

    fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        let mut df = df;

        for pair in &self.config.distance_pairs {
            let distances = pair_distances(&df, pair)?;
            frame::put_floats(&mut df, &pair.output_column(), distances)?;
        }

        match self.zones {
            Some(zones) => {
                for target in &self.config.zone_targets {
                    let ids = zone_ids(&df, target, zones)?;
                    frame::put_strings(&mut df, &target.output_column(), ids)?;
                }
            }
            None if !self.config.zone_targets.is_empty() => {
                tracing::debug!(
                    targets = self.config.zone_targets.len(),
                    "No zone lookup supplied, zone columns not produced"
                );
            }
            None => {}
        }

        Ok(df)
    }
}

/// Coordinates of one location, all null when its columns are absent.
fn coordinates(df: &DataFrame, location: &str) -> Result<(Vec<Option<f64>>, Vec<Option<f64>>)> {
    Ok((
        frame::optional_floats(df, &lat_column(location))?,
        frame::optional_floats(df, &lon_column(location))?,
    ))
}

fn pair_distances(df: &DataFrame, pair: &LocationPair) -> Result<Vec<Option<f64>>> {
    let (from_lat, from_lon) = coordinates(df, &pair.from)?;
    let (to_lat, to_lon) = coordinates(df, &pair.to)?;

    Ok((0..df.height())
        .map(|row| distance_km(from_lat[row], from_lon[row], to_lat[row], to_lon[row]))
        .collect())
}

fn zone_ids(
    df: &DataFrame,
    target: &ZoneTarget,
    zones: &dyn ZoneLookup,
) -> Result<Vec<Option<String>>> {
    let (lats, lons) = coordinates(df, &target.location)?;
    Ok(lats
        .into_iter()
        .zip(lons)
        .map(|(lat, lon)| {
            let (lat, lon) = (lat?, lon?);
            if !lat.is_finite() || !lon.is_finite() {
                return None;
            }
            zones.zone_id(lat, lon, &target.zone_type)
        })
        .collect())
}

/// Haversine distance in kilometres, `None` when any coordinate is missing or
/// not finite.
pub fn distance_km(
    lat1: Option<f64>,
    lon1: Option<f64>,
    lat2: Option<f64>,
    lon2: Option<f64>,
) -> Option<f64> {
    let (lat1, lon1, lat2, lon2) = (lat1?, lon1?, lat2?, lon2?);
    if ![lat1, lon1, lat2, lon2].iter().all(|v| v.is_finite()) {
        return None;
    }

    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    Some(2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin())
}
