//! Comma separated waypoint lists, `latitude,longitude[,name[,symbol]]`.
//!
//! Lines that do not parse are skipped, so this format accepts almost any
//! text with a coordinate pair in it and belongs at the end of the catalog.

use std::io::{Read, Write};

use crate::context::ParseContext;
use crate::error::{Result, RouteError};
use crate::format::{Capabilities, NavigationFormat, PositionFamily};
use crate::formats::{WAYPOINT_LIST, read_text, sanitize};
use crate::model::{Characteristic, Coordinates, Position, PositionExtension, Route};

const NAME: &str = "Waypoint list";

#[derive(Debug, Clone, Copy, Default)]
pub struct WaypointListFormat;

impl NavigationFormat for WaypointListFormat {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extension(&self) -> &'static str {
        ".csv"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::reader_writer()
    }

    fn family(&self) -> PositionFamily {
        PositionFamily::TypedWaypoint
    }

    fn read(&self, source: &mut dyn Read, context: &mut ParseContext<'_>) -> Result<()> {
        let text = read_text(source, NAME)?;
        let positions: Vec<Position> = text.lines().filter_map(parse_line).collect();
        if positions.is_empty() {
            return Err(RouteError::format(NAME, "no waypoint lines"));
        }
        context.append_route(Route::new(&WAYPOINT_LIST, Characteristic::Waypoints, positions));
        Ok(())
    }

    fn write(&self, route: &Route, target: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        for position in &route.positions[start..end] {
            let Some(coordinates) = position.coordinates else {
                continue;
            };
            let name = sanitize(position.comment.as_deref().unwrap_or_default(), ',');
            match position.symbol() {
                Some(symbol) => writeln!(
                    target,
                    "{},{},{},{}",
                    coordinates.latitude,
                    coordinates.longitude,
                    name,
                    sanitize(symbol, ',')
                )?,
                None => writeln!(
                    target,
                    "{},{},{}",
                    coordinates.latitude, coordinates.longitude, name
                )?,
            }
        }
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<Position> {
    let mut fields = line.split(',').map(str::trim);
    let latitude: f64 = fields.next()?.parse().ok()?;
    let longitude: f64 = fields.next()?.parse().ok()?;
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
        return None;
    }
    let name = fields.next().filter(|n| !n.is_empty());
    let symbol = fields.next().filter(|s| !s.is_empty());

    Some(Position {
        coordinates: Some(Coordinates::new(longitude, latitude)),
        comment: name.map(str::to_string),
        extension: PositionExtension::Waypoint {
            symbol: symbol.map(str::to_string),
        },
        ..Default::default()
    })
}
