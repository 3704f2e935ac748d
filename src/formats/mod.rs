//! Concrete formats known to the default catalog.

mod archive;
mod geojson;
mod gpx;
mod grid;
mod itn;
mod nmea;
mod waypoints;

use std::io::Read;

pub use self::archive::ZipFormat;
pub use self::geojson::GeoJsonFormat;
pub use self::gpx::GpxFormat;
pub use self::grid::{GridFormat, from_grid, to_grid};
pub use self::itn::ItnFormat;
pub use self::nmea::NmeaFormat;
pub use self::waypoints::WaypointListFormat;

use crate::error::{Result, RouteError};

pub static ZIP: ZipFormat = ZipFormat;
pub static GPX: GpxFormat = GpxFormat;
pub static GEOJSON: GeoJsonFormat = GeoJsonFormat;
pub static NMEA: NmeaFormat = NmeaFormat::strict();
pub static ITN: ItnFormat = ItnFormat;
pub static GRID: GridFormat = GridFormat;
pub static BROKEN_NMEA: NmeaFormat = NmeaFormat::broken();
pub static WAYPOINT_LIST: WaypointListFormat = WaypointListFormat;

/// Read the whole source as UTF-8 text, dropping a byte order mark.
pub(crate) fn read_text(source: &mut dyn Read, format: &'static str) -> Result<String> {
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    let text = String::from_utf8(bytes)
        .map_err(|_| RouteError::format(format, "content is not UTF-8 text"))?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

/// Replace characters that would break a delimited line.
pub(crate) fn sanitize(text: &str, delimiter: char) -> String {
    text.chars()
        .map(|c| if c == delimiter || c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}
