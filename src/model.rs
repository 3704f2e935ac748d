use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::Serialize;

use crate::format::FormatRef;
use crate::geometry;
use crate::simplify;

/// WGS84 longitude/latitude in degrees. A position has both or neither.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Bitwise key for grouping positions sharing exactly the same coordinates.
    pub(crate) fn key(&self) -> (u64, u64) {
        (self.longitude.to_bits(), self.latitude.to_bits())
    }
}

/// A UTC instant together with the time zone it was recorded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    pub instant: DateTime<Utc>,
    pub time_zone: String,
}

impl Timestamp {
    pub fn utc(instant: DateTime<Utc>) -> Self {
        Self {
            instant,
            time_zone: "UTC".to_string(),
        }
    }

    /// Parse an RFC 3339 / ISO 8601 timestamp, keeping its offset as the zone id.
    pub fn parse_rfc3339(text: &str) -> Option<Self> {
        let parsed = DateTime::parse_from_rfc3339(text.trim()).ok()?;
        Some(Self::from_fixed(parsed))
    }

    pub fn from_fixed(time: DateTime<FixedOffset>) -> Self {
        let offset = time.offset().local_minus_utc();
        let time_zone = if offset == 0 {
            "UTC".to_string()
        } else {
            time.offset().to_string()
        };
        Self {
            instant: time.with_timezone(&Utc),
            time_zone,
        }
    }

    pub fn to_rfc3339(&self) -> String {
        self.instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

/// The semantic role of a route; drives default processing policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Characteristic {
    Route,
    Track,
    Waypoints,
}

impl Characteristic {
    pub fn removes_adjacent_duplicates(&self) -> bool {
        matches!(self, Self::Route | Self::Track)
    }

    pub fn repairs_time(&self) -> bool {
        matches!(self, Self::Track)
    }
}

/// Receiver quality and motion data recorded by GPS devices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorData {
    /// Course over ground in degrees.
    pub heading: Option<f64>,
    pub hdop: Option<f64>,
    pub vdop: Option<f64>,
    pub pdop: Option<f64>,
    pub satellites: Option<u32>,
}

/// Spherical Mercator (EPSG:3857) coordinates in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCoordinates {
    pub easting: f64,
    pub northing: f64,
}

/// Fields that only some position families carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PositionExtension {
    #[default]
    None,
    Sensor(SensorData),
    Grid(GridCoordinates),
    Waypoint { symbol: Option<String> },
}

/// A single point of a route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Position {
    pub coordinates: Option<Coordinates>,
    /// Meters above sea level.
    pub elevation: Option<f64>,
    /// Kilometers per hour.
    pub speed: Option<f64>,
    pub time: Option<Timestamp>,
    pub comment: Option<String>,
    pub extension: PositionExtension,
}

impl Position {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            coordinates: Some(Coordinates::new(longitude, latitude)),
            ..Default::default()
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_time(mut self, time: Timestamp) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn longitude(&self) -> Option<f64> {
        self.coordinates.map(|c| c.longitude)
    }

    pub fn latitude(&self) -> Option<f64> {
        self.coordinates.map(|c| c.latitude)
    }

    pub fn has_coordinates(&self) -> bool {
        self.coordinates.is_some()
    }

    pub fn sensor(&self) -> Option<&SensorData> {
        match &self.extension {
            PositionExtension::Sensor(data) => Some(data),
            _ => None,
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        match &self.extension {
            PositionExtension::Waypoint { symbol } => symbol.as_deref(),
            _ => None,
        }
    }

    /// Human readable label: the comment if any, otherwise the coordinates.
    pub fn description(&self) -> String {
        match (&self.comment, self.coordinates) {
            (Some(comment), _) => comment.clone(),
            (None, Some(c)) => format!("{:.6}, {:.6}", c.latitude, c.longitude),
            (None, None) => "?".to_string(),
        }
    }

    pub fn distance(&self, other: &Position) -> Option<f64> {
        geometry::distance(self, other)
    }

    pub fn bearing(&self, other: &Position) -> Option<f64> {
        geometry::bearing(self, other)
    }

    /// Same coordinates and elevation, used for adjacent duplicate removal.
    fn same_place(&self, other: &Position) -> bool {
        self.coordinates == other.coordinates && self.elevation == other.elevation
    }
}

/// An ordered sequence of positions read from or written to one format.
#[derive(Debug, Clone)]
pub struct Route {
    pub format: FormatRef,
    pub characteristic: Characteristic,
    pub name: Option<String>,
    pub description: Vec<String>,
    pub positions: Vec<Position>,
}

impl Route {
    pub fn new(format: FormatRef, characteristic: Characteristic, positions: Vec<Position>) -> Self {
        Self {
            format,
            characteristic,
            name: None,
            description: Vec::new(),
            positions,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Total length in meters over positions with coordinates.
    pub fn length(&self) -> f64 {
        geometry::length(&self.positions)
    }

    /// Seconds between the first and last timed position.
    pub fn duration(&self) -> Option<i64> {
        let first = self.positions.iter().find_map(|p| p.time.as_ref())?;
        let last = self.positions.iter().rev().find_map(|p| p.time.as_ref())?;
        Some((last.instant - first.instant).num_seconds())
    }

    pub fn elevation_ascend(&self) -> f64 {
        match self.positions.len() {
            0 => 0.0,
            n => geometry::elevation_ascend(&self.positions, 0, n - 1),
        }
    }

    pub fn elevation_descend(&self) -> f64 {
        match self.positions.len() {
            0 => 0.0,
            n => geometry::elevation_descend(&self.positions, 0, n - 1),
        }
    }

    pub fn average_speed(&self) -> Option<f64> {
        geometry::average_speed(&self.positions)
    }

    /// Drop positions repeating their predecessor's place, when the
    /// characteristic asks for it. Returns the number of removed positions.
    pub fn remove_adjacent_duplicates(&mut self) -> usize {
        if !self.characteristic.removes_adjacent_duplicates() {
            return 0;
        }
        let before = self.positions.len();
        self.positions.dedup_by(|current, previous| current.same_place(previous));
        before - self.positions.len()
    }

    /// Fill missing timestamps of tracks from timed neighbours.
    /// Returns the number of positions that received a time.
    pub fn interpolate_missing_times(&mut self) -> usize {
        if !self.characteristic.repairs_time() {
            return 0;
        }
        let mut filled = 0;
        for index in 0..self.positions.len() {
            if self.positions[index].time.is_some() {
                continue;
            }
            let time = self.interpolated_time_at(index);
            if let Some(time) = time {
                self.positions[index].time = Some(time);
                filled += 1;
            }
        }
        filled
    }

    fn interpolated_time_at(&self, index: usize) -> Option<Timestamp> {
        let positions = &self.positions;
        let predecessor = positions[..index].iter().rposition(|p| p.time.is_some());
        let successor = positions[index + 1..]
            .iter()
            .position(|p| p.time.is_some())
            .map(|offset| index + 1 + offset);

        match (predecessor, successor) {
            (Some(before), Some(after)) => {
                geometry::interpolate_time(&positions[index], &positions[before], &positions[after])
            }
            (Some(before), None) => {
                let earlier = positions[..before].iter().rposition(|p| p.time.is_some())?;
                geometry::extrapolate_time(&positions[index], &positions[earlier], &positions[before])
            }
            _ => None,
        }
    }

    /// Keep only the positions Douglas-Peucker considers significant for
    /// the given threshold in meters.
    pub fn simplify(&mut self, threshold: f64) {
        let keep = simplify::significant_positions(&self.positions, threshold);
        let mut keep = keep.into_iter().peekable();
        let mut index = 0;
        self.positions.retain(|_| {
            let retained = keep.next_if_eq(&index).is_some();
            index += 1;
            retained
        });
    }
}
