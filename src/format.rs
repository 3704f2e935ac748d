use std::fmt;
use std::io::{Read, Write};

use serde::Serialize;

use crate::context::ParseContext;
use crate::error::{Result, RouteError};
use crate::model::Route;

/// The position model a format reads into and writes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionFamily {
    /// Plain WGS84 positions without extra fields.
    Wgs84,
    /// WGS84 positions with receiver data (heading, dilution of precision, satellites).
    Sensor,
    /// Projected grid coordinates alongside WGS84.
    Grid,
    /// Waypoints carrying a symbol/type.
    TypedWaypoint,
}

/// Static description of what a format can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub reading: bool,
    pub writing: bool,
    pub multiple_routes: bool,
    pub writes_characteristics: bool,
    /// Hard ceiling of positions per file, `None` for unlimited.
    pub maximum_position_count: Option<usize>,
    /// The first position is written twice, as a "you are here" start.
    pub duplicates_first_position: bool,
}

impl Capabilities {
    pub const fn reader_writer() -> Self {
        Self {
            reading: true,
            writing: true,
            multiple_routes: false,
            writes_characteristics: false,
            maximum_position_count: None,
            duplicates_first_position: false,
        }
    }

    pub const fn reader() -> Self {
        Self {
            writing: false,
            ..Self::reader_writer()
        }
    }
}

/// One concrete file format. Implementations are stateless statics.
pub trait NavigationFormat: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// File extension including the leading dot.
    fn extension(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    fn family(&self) -> PositionFamily;

    /// Append the routes found in `source` to `context`, or fail if the
    /// content is not this format.
    fn read(&self, source: &mut dyn Read, context: &mut ParseContext<'_>) -> Result<()>;

    /// Write positions `start..end` of `route`.
    fn write(&self, _route: &Route, _target: &mut dyn Write, _start: usize, _end: usize) -> Result<()> {
        Err(RouteError::Unsupported {
            format: self.name(),
            operation: "writing",
        })
    }

    /// Write several routes into one file.
    fn write_routes(&self, _routes: &[Route], _target: &mut dyn Write) -> Result<()> {
        Err(RouteError::Unsupported {
            format: self.name(),
            operation: "writing multiple routes",
        })
    }
}

pub type FormatRef = &'static dyn NavigationFormat;

impl fmt::Debug for dyn NavigationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn same_format(a: FormatRef, b: FormatRef) -> bool {
    a.name() == b.name()
}

/// Extension of a file name, lower-cased and with its leading dot.
pub fn extension_of(file_name: &str) -> Option<String> {
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() || extension.contains(['/', '\\']) {
        return None;
    }
    Some(format!(".{}", extension.to_lowercase()))
}
