//! Spherical geodesy over positions.
//!
//! Every computation returns `None` when one of its inputs lacks the data it
//! needs (coordinates, elevation, time) or would divide by zero, so callers
//! can skip gaps while aggregating.

use chrono::Duration;

use crate::model::{Position, Timestamp};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Great-circle distance in meters between two WGS84 coordinates.
pub fn haversine_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS * c
}

/// Initial great-circle bearing in degrees, normalized to `[0, 360)`.
pub fn initial_bearing(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let y = d_lon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lon.cos();
    let bearing = y.atan2(x).to_degrees();
    (bearing + 360.0) % 360.0
}

pub fn distance(from: &Position, to: &Position) -> Option<f64> {
    let (a, b) = (from.coordinates?, to.coordinates?);
    Some(haversine_distance(a.longitude, a.latitude, b.longitude, b.latitude))
}

pub fn bearing(from: &Position, to: &Position) -> Option<f64> {
    let (a, b) = (from.coordinates?, to.coordinates?);
    Some(initial_bearing(a.longitude, a.latitude, b.longitude, b.latitude))
}

/// Perpendicular distance in meters from `point` to the great circle
/// through `start` and `end`.
pub fn cross_track_distance(start: &Position, end: &Position, point: &Position) -> Option<f64> {
    let start_to_point = distance(start, point)?;
    if start.coordinates == end.coordinates {
        return Some(start_to_point);
    }
    let bearing_to_point = bearing(start, point)?;
    let bearing_to_end = bearing(start, end)?;

    let angular = start_to_point / EARTH_RADIUS;
    let delta = (bearing_to_point - bearing_to_end).to_radians();
    let cross = (angular.sin() * delta.sin()).clamp(-1.0, 1.0).asin() * EARTH_RADIUS;
    Some(cross.abs())
}

/// Sum of distances between consecutive positions that have coordinates.
pub fn length(positions: &[Position]) -> f64 {
    let located: Vec<&Position> = positions.iter().filter(|p| p.has_coordinates()).collect();
    located
        .windows(2)
        .filter_map(|pair| distance(pair[0], pair[1]))
        .sum()
}

/// Timestamp for `position` proportional to its distance between two timed
/// neighbours.
pub fn interpolate_time(
    position: &Position,
    predecessor: &Position,
    successor: &Position,
) -> Option<Timestamp> {
    let start = predecessor.time.as_ref()?;
    let end = successor.time.as_ref()?;

    let covered = distance(predecessor, position)?;
    let total = distance(predecessor, successor)?;
    let elapsed = end.instant - start.instant;
    if covered == 0.0 || total == 0.0 || elapsed.is_zero() {
        return None;
    }

    Some(offset_by(start, elapsed, covered / total))
}

/// Timestamp for `position` following two timed predecessors, assuming the
/// speed between them continues.
pub fn extrapolate_time(
    position: &Position,
    pre_predecessor: &Position,
    predecessor: &Position,
) -> Option<Timestamp> {
    let earlier = pre_predecessor.time.as_ref()?;
    let later = predecessor.time.as_ref()?;

    let known = distance(pre_predecessor, predecessor)?;
    let ahead = distance(predecessor, position)?;
    let elapsed = later.instant - earlier.instant;
    if known == 0.0 || ahead == 0.0 || elapsed.is_zero() {
        return None;
    }

    Some(offset_by(later, elapsed, ahead / known))
}

fn offset_by(base: &Timestamp, elapsed: Duration, ratio: f64) -> Timestamp {
    let millis = (elapsed.num_milliseconds() as f64 * ratio).round() as i64;
    Timestamp {
        instant: base.instant + Duration::milliseconds(millis),
        time_zone: base.time_zone.clone(),
    }
}

fn elevation_deltas(positions: &[Position], start: usize, end: usize) -> impl Iterator<Item = f64> + '_ {
    let end = end.min(positions.len().saturating_sub(1));
    let range = if start < end { &positions[start..=end] } else { &[][..] };
    range
        .windows(2)
        .filter_map(|pair| Some(pair[1].elevation? - pair[0].elevation?))
}

/// Total climb in meters between consecutive positions of `[start, end]`.
pub fn elevation_ascend(positions: &[Position], start: usize, end: usize) -> f64 {
    elevation_deltas(positions, start, end).filter(|d| *d > 0.0).sum()
}

/// Total descent in meters, reported as a positive value.
pub fn elevation_descend(positions: &[Position], start: usize, end: usize) -> f64 {
    -elevation_deltas(positions, start, end)
        .filter(|d| *d < 0.0)
        .sum::<f64>()
}

/// Speed in km/h needed to travel from `from` to `to` in the time between them.
pub fn speed(from: &Position, to: &Position) -> Option<f64> {
    let meters = distance(from, to)?;
    let millis = (to.time.as_ref()?.instant - from.time.as_ref()?.instant).num_milliseconds();
    kilometers_per_hour(meters, millis)
}

/// Average speed in km/h over the whole sequence, from its length and the
/// time between the first and last timed position.
pub fn average_speed(positions: &[Position]) -> Option<f64> {
    let first = positions.iter().find_map(|p| p.time.as_ref())?;
    let last = positions.iter().rev().find_map(|p| p.time.as_ref())?;
    let millis = (last.instant - first.instant).num_milliseconds();
    kilometers_per_hour(length(positions), millis)
}

fn kilometers_per_hour(meters: f64, millis: i64) -> Option<f64> {
    if millis <= 0 {
        return None;
    }
    Some(meters / (millis as f64 / 1000.0) * 3.6)
}
