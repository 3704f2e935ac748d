//! Conversion of routes between position families. Fields both families
//! share are copied; family specific fields of the source are dropped.

use crate::format::{FormatRef, PositionFamily};
use crate::formats::to_grid;
use crate::model::{Position, PositionExtension, Route};

/// Builds positions of one family from positions of any family.
pub trait PositionConverter: Send + Sync {
    fn family(&self) -> PositionFamily;

    fn extension_for(&self, source: &Position) -> PositionExtension;

    fn convert(&self, source: &Position) -> Position {
        Position {
            coordinates: source.coordinates,
            elevation: source.elevation,
            speed: source.speed,
            time: source.time.clone(),
            comment: source.comment.clone(),
            extension: self.extension_for(source),
        }
    }
}

struct Wgs84Converter;
struct SensorConverter;
struct GridConverter;
struct TypedWaypointConverter;

impl PositionConverter for Wgs84Converter {
    fn family(&self) -> PositionFamily {
        PositionFamily::Wgs84
    }

    fn extension_for(&self, _source: &Position) -> PositionExtension {
        PositionExtension::None
    }
}

impl PositionConverter for SensorConverter {
    fn family(&self) -> PositionFamily {
        PositionFamily::Sensor
    }

    fn extension_for(&self, source: &Position) -> PositionExtension {
        PositionExtension::Sensor(source.sensor().cloned().unwrap_or_default())
    }
}

impl PositionConverter for GridConverter {
    fn family(&self) -> PositionFamily {
        PositionFamily::Grid
    }

    fn extension_for(&self, source: &Position) -> PositionExtension {
        match (&source.extension, source.coordinates) {
            (PositionExtension::Grid(grid), _) => PositionExtension::Grid(*grid),
            (_, Some(coordinates)) => PositionExtension::Grid(to_grid(coordinates)),
            (_, None) => PositionExtension::None,
        }
    }
}

impl PositionConverter for TypedWaypointConverter {
    fn family(&self) -> PositionFamily {
        PositionFamily::TypedWaypoint
    }

    fn extension_for(&self, source: &Position) -> PositionExtension {
        PositionExtension::Waypoint {
            symbol: source.symbol().map(str::to_string),
        }
    }
}

static WGS84: Wgs84Converter = Wgs84Converter;
static SENSOR: SensorConverter = SensorConverter;
static GRID: GridConverter = GridConverter;
static TYPED_WAYPOINT: TypedWaypointConverter = TypedWaypointConverter;

pub fn converter_for(family: PositionFamily) -> &'static dyn PositionConverter {
    match family {
        PositionFamily::Wgs84 => &WGS84,
        PositionFamily::Sensor => &SENSOR,
        PositionFamily::Grid => &GRID,
        PositionFamily::TypedWaypoint => &TYPED_WAYPOINT,
    }
}

/// A copy of `route` whose positions belong to the family of `target`.
pub fn convert_route(route: &Route, target: FormatRef) -> Route {
    let converter = converter_for(target.family());
    Route {
        format: target,
        characteristic: route.characteristic,
        name: route.name.clone(),
        description: route.description.clone(),
        positions: route.positions.iter().map(|p| converter.convert(p)).collect(),
    }
}

pub fn convert_routes(routes: &[Route], target: FormatRef) -> Vec<Route> {
    routes.iter().map(|route| convert_route(route, target)).collect()
}
