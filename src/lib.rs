pub mod catalog;
pub mod comments;
pub mod context;
pub mod converter;
pub mod error;
pub mod format;
pub mod formats;
pub mod geometry;
pub mod model;
pub mod options;
pub mod parser;
pub mod simplify;
pub mod source;
pub mod writer;

use serde::Serialize;
use wasm_bindgen::prelude::*;

pub use crate::catalog::FormatCatalog;
pub use crate::context::{ParseContext, ParserListener, ParserResult};
pub use crate::error::RouteError;
pub use crate::format::{Capabilities, FormatRef, NavigationFormat, PositionFamily};
pub use crate::model::{Characteristic, Coordinates, Position, Route, Timestamp};
pub use crate::options::{ConvertOptions, ParserOptions, WriteOptions};
pub use crate::parser::NavigationFormatParser;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub name: Option<String>,
    pub characteristic: Characteristic,
    pub position_count: usize,
    /// Meters.
    pub length: f64,
    /// Seconds.
    pub duration: Option<i64>,
    pub elevation_ascend: f64,
    pub elevation_descend: f64,
}

impl From<&Route> for RouteSummary {
    fn from(route: &Route) -> Self {
        Self {
            name: route.name.clone(),
            characteristic: route.characteristic,
            position_count: route.position_count(),
            length: route.length(),
            duration: route.duration(),
            elevation_ascend: route.elevation_ascend(),
            elevation_descend: route.elevation_descend(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadSummary {
    pub successful: bool,
    pub format: Option<&'static str>,
    pub formats: Vec<&'static str>,
    pub routes: Vec<RouteSummary>,
}

impl From<&ParserResult> for ReadSummary {
    fn from(result: &ParserResult) -> Self {
        Self {
            successful: result.is_successful(),
            format: result.format.map(|f| f.name()),
            formats: result.formats.iter().map(|f| f.name()).collect(),
            routes: result.routes.iter().map(RouteSummary::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatInfo {
    pub name: &'static str,
    pub extension: &'static str,
    pub capabilities: Capabilities,
}

/// Detect the format of `bytes` and convert the selected route, or all
/// routes when combining is requested, into `target_format`. Returns the
/// contents of each written file.
pub fn convert(
    bytes: &[u8],
    file_name: Option<&str>,
    target_format: &str,
    opts: &ConvertOptions,
) -> error::Result<Vec<String>> {
    let parser = NavigationFormatParser::new(FormatCatalog::default(), opts.parser.clone());
    let format = parser
        .catalog()
        .find(target_format)
        .filter(|f| f.capabilities().writing)
        .ok_or_else(|| RouteError::UnknownFormat(target_format.to_string()))?;

    let mut routes = parser.read_bytes(bytes, file_name).into_routes()?;
    for route in routes.iter_mut() {
        if opts.remove_duplicates {
            route.remove_adjacent_duplicates();
        }
        if opts.repair_times {
            route.interpolate_missing_times();
        }
        if let Some(threshold) = opts.simplify_threshold {
            route.simplify(threshold);
        }
    }

    if opts.combine_routes && format.capabilities().multiple_routes {
        let mut buffer = Vec::new();
        writer::write_all(&routes, format, &mut buffer)?;
        return Ok(vec![String::from_utf8_lossy(&buffer).into_owned()]);
    }

    let count = routes.len();
    if opts.route_index >= count {
        return Err(RouteError::NoSuchRoute {
            index: opts.route_index,
            count,
        });
    }
    let route = routes.swap_remove(opts.route_index);

    let mut buffers = vec![Vec::new(); writer::files_required(&route, format)];
    {
        let mut targets: Vec<&mut dyn std::io::Write> = buffers
            .iter_mut()
            .map(|b| b as &mut dyn std::io::Write)
            .collect();
        writer::write(&route, format, &mut targets, &opts.write)?;
    }
    Ok(buffers
        .iter()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .collect())
}

/// Detect the format of a file and summarize its routes, returned as a JS object.
#[wasm_bindgen(js_name = readRoutes)]
pub fn read_routes(
    bytes: &[u8],
    file_name: Option<String>,
    options: JsValue,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts: ParserOptions = parse_options(options)?;
    let parser = NavigationFormatParser::new(FormatCatalog::default(), opts);
    let result = parser.read_bytes(bytes, file_name.as_deref());
    serde_wasm_bindgen::to_value(&ReadSummary::from(&result))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Convert a file into another format, returned as an array of file contents.
#[wasm_bindgen(js_name = convertRoutes)]
pub fn convert_routes(
    bytes: &[u8],
    file_name: Option<String>,
    target_format: &str,
    options: JsValue,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts: ConvertOptions = parse_options(options)?;
    let files = convert(bytes, file_name.as_deref(), target_format, &opts)?;
    serde_wasm_bindgen::to_value(&files).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Known formats in detection order.
#[wasm_bindgen(js_name = formats)]
pub fn list_formats() -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&format_infos()).map_err(|e| JsValue::from_str(&e.to_string()))
}

pub fn format_infos() -> Vec<FormatInfo> {
    FormatCatalog::default()
        .formats()
        .iter()
        .map(|f| FormatInfo {
            name: f.name(),
            extension: f.extension(),
            capabilities: f.capabilities(),
        })
        .collect()
}

fn parse_options<T>(options: JsValue) -> Result<T, JsValue>
where
    T: Default + serde::de::DeserializeOwned,
{
    if options.is_undefined() || options.is_null() {
        Ok(T::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
