//! Plain text lists of Spherical Mercator (EPSG:3857) grid coordinates:
//!
//! ```text
//! # EPSG:3857
//! 1491538.125 6894016.031 34.0 Berlin
//! 1492000.000 6894100.000 - unnamed
//! ```

use std::f64::consts::PI;
use std::io::{Read, Write};

use crate::context::ParseContext;
use crate::error::{Result, RouteError};
use crate::format::{Capabilities, NavigationFormat, PositionFamily};
use crate::formats::{GRID, read_text, sanitize};
use crate::model::{Characteristic, Coordinates, GridCoordinates, Position, PositionExtension, Route};

const NAME: &str = "Spherical Mercator grid";
const HEADER: &str = "# EPSG:3857";
const NO_VALUE: &str = "-";

/// Semi-major axis of WGS84, the sphere radius of EPSG:3857.
const RADIUS: f64 = 6_378_137.0;
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy, Default)]
pub struct GridFormat;

impl NavigationFormat for GridFormat {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extension(&self) -> &'static str {
        ".grd"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::reader_writer()
    }

    fn family(&self) -> PositionFamily {
        PositionFamily::Grid
    }

    fn read(&self, source: &mut dyn Read, context: &mut ParseContext<'_>) -> Result<()> {
        let text = read_text(source, NAME)?;
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

        match lines.next() {
            Some(header) if header.eq_ignore_ascii_case(HEADER) => {}
            _ => return Err(RouteError::format(NAME, "missing EPSG:3857 header")),
        }

        let mut positions = Vec::new();
        for line in lines {
            if line.starts_with('#') {
                continue;
            }
            let position = parse_line(line)
                .ok_or_else(|| RouteError::format(NAME, format!("invalid grid line '{line}'")))?;
            positions.push(position);
        }

        if !positions.is_empty() {
            context.append_route(Route::new(&GRID, Characteristic::Track, positions));
        }
        Ok(())
    }

    fn write(&self, route: &Route, target: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        writeln!(target, "{HEADER}")?;
        for position in &route.positions[start..end] {
            let grid = match (&position.extension, position.coordinates) {
                (PositionExtension::Grid(grid), _) => *grid,
                (_, Some(coordinates)) => to_grid(coordinates),
                (_, None) => continue,
            };
            let elevation = position
                .elevation
                .map(|e| e.to_string())
                .unwrap_or_else(|| NO_VALUE.to_string());
            let comment = sanitize(position.comment.as_deref().unwrap_or_default(), '\n');
            writeln!(
                target,
                "{:.3} {:.3} {} {}",
                grid.easting, grid.northing, elevation, comment
            )?;
        }
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<Position> {
    let (easting, rest) = next_token(line)?;
    let (northing, rest) = next_token(rest)?;
    let easting: f64 = easting.parse().ok()?;
    let northing: f64 = northing.parse().ok()?;
    let (elevation, comment) = match next_token(rest) {
        None => (None, ""),
        Some((NO_VALUE, comment)) => (None, comment),
        Some((token, comment)) => (Some(token.parse::<f64>().ok()?), comment),
    };
    let comment = comment.trim();

    let grid = GridCoordinates { easting, northing };
    Some(Position {
        coordinates: Some(from_grid(grid)),
        elevation,
        comment: (!comment.is_empty()).then(|| comment.to_string()),
        extension: PositionExtension::Grid(grid),
        ..Default::default()
    })
}

/// Split off the first whitespace separated token.
fn next_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    Some(text.split_at(text.find(char::is_whitespace).unwrap_or(text.len())))
}

/// Forward Spherical Mercator projection. Latitudes are clamped to the
/// square world of EPSG:3857.
pub fn to_grid(coordinates: Coordinates) -> GridCoordinates {
    let latitude = coordinates.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    GridCoordinates {
        easting: RADIUS * coordinates.longitude.to_radians(),
        northing: RADIUS * (PI / 4.0 + latitude.to_radians() / 2.0).tan().ln(),
    }
}

pub fn from_grid(grid: GridCoordinates) -> Coordinates {
    let longitude = (grid.easting / RADIUS).to_degrees();
    let latitude = (2.0 * (grid.northing / RADIUS).exp().atan() - PI / 2.0).to_degrees();
    Coordinates::new(longitude, latitude)
}
