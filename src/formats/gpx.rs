//! GPS Exchange Format 1.1 (`<wpt>`, `<rte>` and `<trk>`).

use std::io::{Read, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::context::ParseContext;
use crate::error::{Result, RouteError};
use crate::format::{Capabilities, NavigationFormat, PositionFamily};
use crate::formats::{GPX, read_text};
use crate::model::{
    Characteristic, Coordinates, Position, PositionExtension, Route, SensorData, Timestamp,
};

const NAME: &str = "GPX 1.1";
const NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";

#[derive(Debug, Clone, Copy, Default)]
pub struct GpxFormat;

impl NavigationFormat for GpxFormat {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extension(&self) -> &'static str {
        ".gpx"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            multiple_routes: true,
            writes_characteristics: true,
            ..Capabilities::reader_writer()
        }
    }

    fn family(&self) -> PositionFamily {
        PositionFamily::Sensor
    }

    fn read(&self, source: &mut dyn Read, context: &mut ParseContext<'_>) -> Result<()> {
        let xml = read_text(source, NAME)?;
        context.append_routes(parse_gpx(&xml)?);
        Ok(())
    }

    fn write(&self, route: &Route, target: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        write_gpx(target, &[(route, start, end)])
    }

    fn write_routes(&self, routes: &[Route], target: &mut dyn Write) -> Result<()> {
        let chunks: Vec<(&Route, usize, usize)> =
            routes.iter().map(|r| (r, 0, r.positions.len())).collect();
        write_gpx(target, &chunks)
    }
}

type XmlReader<'a> = Reader<&'a [u8]>;

/// Parse a GPX document into one route per `<rte>` and `<trk>`, plus one
/// waypoint list in front holding all `<wpt>` elements.
pub fn parse_gpx(xml: &str) -> Result<Vec<Route>> {
    let mut reader = Reader::from_str(xml);
    let mut seen_root = false;
    let mut document_name = None;
    let mut waypoints = Vec::new();
    let mut routes = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"gpx" => seen_root = true,
                b"metadata" => document_name = parse_metadata(&mut reader)?,
                b"wpt" => {
                    if let Some(position) = parse_point(&e, &mut reader)? {
                        waypoints.push(position);
                    }
                }
                b"rte" => routes.push(parse_route(&mut reader)?),
                b"trk" => routes.push(parse_track(&mut reader)?),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"gpx" => seen_root = true,
                b"wpt" => {
                    if let Ok(coordinates) = parse_lat_lon(&e) {
                        waypoints.push(located(coordinates));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(RouteError::Xml(e)),
            _ => {}
        }
    }

    if !seen_root {
        return Err(RouteError::format(NAME, "no <gpx> root element"));
    }

    if !waypoints.is_empty() {
        let mut list = Route::new(&GPX, Characteristic::Waypoints, waypoints);
        list.name = document_name;
        routes.insert(0, list);
    }
    Ok(routes)
}

fn located(coordinates: Coordinates) -> Position {
    Position {
        coordinates: Some(coordinates),
        extension: PositionExtension::Sensor(SensorData::default()),
        ..Default::default()
    }
}

fn parse_coordinate(attribute: &'static str, value: &str, range: f64) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.abs() <= range)
        .ok_or_else(|| RouteError::InvalidAttribute {
            element: "point",
            attribute,
            value: value.to_string(),
        })
}

/// Parse lat/lon attributes from a point element's start tag.
fn parse_lat_lon(e: &BytesStart<'_>) -> Result<Coordinates> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr_result in e.attributes() {
        let attr = attr_result?;
        let val = std::str::from_utf8(&attr.value).unwrap_or_default();
        match attr.key.local_name().as_ref() {
            b"lat" => lat = Some(parse_coordinate("lat", val, 90.0)?),
            b"lon" => lon = Some(parse_coordinate("lon", val, 180.0)?),
            _ => {}
        }
    }

    let latitude = lat.ok_or(RouteError::MissingAttribute {
        element: "point",
        attribute: "lat",
    })?;
    let longitude = lon.ok_or(RouteError::MissingAttribute {
        element: "point",
        attribute: "lon",
    })?;

    Ok(Coordinates::new(longitude, latitude))
}

fn parse_metadata(reader: &mut XmlReader<'_>) -> Result<Option<String>> {
    let mut name = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"name" => name = Some(read_text_owned(reader, &e)?),
                _ => skip(reader, &e)?,
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"metadata" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(RouteError::Xml(e)),
            _ => {}
        }
    }
    Ok(name)
}

/// Parse a point element (wpt, rtept, trkpt) and its children.
/// Called after receiving Event::Start for the point element.
fn parse_point(start: &BytesStart<'_>, reader: &mut XmlReader<'_>) -> Result<Option<Position>> {
    let coordinates = match parse_lat_lon(start) {
        Ok(coordinates) => coordinates,
        Err(_) => {
            skip(reader, start)?;
            return Ok(None);
        }
    };

    let mut position = Position {
        coordinates: Some(coordinates),
        ..Default::default()
    };
    let mut sensor = SensorData::default();
    let mut name = None;
    let mut desc = None;
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ele" => position.elevation = read_number(reader, &e)?,
                b"time" => position.time = Timestamp::parse_rfc3339(&read_text_owned(reader, &e)?),
                b"name" => name = Some(read_text_owned(reader, &e)?),
                b"desc" => desc = Some(read_text_owned(reader, &e)?),
                b"sat" => sensor.satellites = read_number(reader, &e)?.map(|n| n as u32),
                b"hdop" => sensor.hdop = read_number(reader, &e)?,
                b"vdop" => sensor.vdop = read_number(reader, &e)?,
                b"pdop" => sensor.pdop = read_number(reader, &e)?,
                // GPX 1.0 carries these inline, in meters per second.
                b"speed" => position.speed = read_number(reader, &e)?.map(|ms| ms * 3.6),
                b"course" => sensor.heading = read_number(reader, &e)?,
                b"extensions" => parse_extensions(reader, &mut position, &mut sensor)?,
                _ => skip(reader, &e)?,
            },
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(RouteError::Xml(e)),
            _ => {}
        }
    }

    position.comment = name.or(desc);
    position.extension = PositionExtension::Sensor(sensor);
    Ok(Some(position))
}

/// Pick speed and course out of vendor extensions at any depth.
fn parse_extensions(
    reader: &mut XmlReader<'_>,
    position: &mut Position,
    sensor: &mut SensorData,
) -> Result<()> {
    let mut depth = 1usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"speed" => position.speed = read_number(reader, &e)?.map(|ms| ms * 3.6),
                b"course" => sensor.heading = read_number(reader, &e)?,
                _ => depth += 1,
            },
            Ok(Event::End(_)) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(RouteError::Xml(e)),
            _ => {}
        }
    }
    Ok(())
}

/// Parse the children of a `<rte>` or `<trk>` element. Track segments are
/// joined into one sequence.
fn parse_sequence(
    reader: &mut XmlReader<'_>,
    characteristic: Characteristic,
    element: &[u8],
) -> Result<Route> {
    let mut route = Route::new(&GPX, characteristic, Vec::new());
    let point = match characteristic {
        Characteristic::Track => b"trkpt".as_slice(),
        _ => b"rtept".as_slice(),
    };

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"name" => route.name = Some(read_text_owned(reader, &e)?),
                    b"desc" | b"cmt" => {
                        let text = read_text_owned(reader, &e)?;
                        route.description.extend(text.lines().map(str::to_string));
                    }
                    b"trkseg" => {}
                    name if name == point => {
                        if let Some(position) = parse_point(&e, reader)? {
                            route.positions.push(position);
                        }
                    }
                    _ => skip(reader, &e)?,
                }
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == point => {
                if let Ok(coordinates) = parse_lat_lon(&e) {
                    route.positions.push(located(coordinates));
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == element => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(RouteError::Xml(e)),
            _ => {}
        }
    }

    Ok(route)
}

fn parse_route(reader: &mut XmlReader<'_>) -> Result<Route> {
    parse_sequence(reader, Characteristic::Route, b"rte")
}

fn parse_track(reader: &mut XmlReader<'_>) -> Result<Route> {
    parse_sequence(reader, Characteristic::Track, b"trk")
}

fn skip(reader: &mut XmlReader<'_>, start: &BytesStart<'_>) -> Result<()> {
    reader.read_to_end(start.name()).map_err(RouteError::Xml)?;
    Ok(())
}

fn read_number(reader: &mut XmlReader<'_>, start: &BytesStart<'_>) -> Result<Option<f64>> {
    Ok(read_text_owned(reader, start)?.trim().parse::<f64>().ok())
}

/// Read text content of an element as an owned String.
/// Handles regular text, CDATA sections, and entity references.
fn read_text_owned(reader: &mut XmlReader<'_>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Ok(Event::CData(e)) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Ok(Event::GeneralRef(e)) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                } else {
                    match std::str::from_utf8(e.as_ref()).unwrap_or_default() {
                        "amp" => text.push('&'),
                        "lt" => text.push('<'),
                        "gt" => text.push('>'),
                        "quot" => text.push('"'),
                        "apos" => text.push('\''),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(RouteError::Xml(e)),
            _ => {}
        }
    }

    Ok(text.trim().to_string())
}

type XmlWriter<'w> = Writer<&'w mut dyn Write>;

fn write_gpx(target: &mut dyn Write, chunks: &[(&Route, usize, usize)]) -> Result<()> {
    let mut writer = Writer::new_with_indent(target, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("gpx");
    root.push_attribute(("version", "1.1"));
    root.push_attribute(("creator", env!("CARGO_PKG_NAME")));
    root.push_attribute(("xmlns", NAMESPACE));
    writer.write_event(Event::Start(root))?;

    for &(route, start, end) in chunks {
        let positions = &route.positions[start..end];
        match route.characteristic {
            Characteristic::Waypoints => {
                for position in positions {
                    write_point(&mut writer, "wpt", position)?;
                }
            }
            Characteristic::Route => {
                open(&mut writer, "rte")?;
                write_route_header(&mut writer, route)?;
                for position in positions {
                    write_point(&mut writer, "rtept", position)?;
                }
                close(&mut writer, "rte")?;
            }
            Characteristic::Track => {
                open(&mut writer, "trk")?;
                write_route_header(&mut writer, route)?;
                open(&mut writer, "trkseg")?;
                for position in positions {
                    write_point(&mut writer, "trkpt", position)?;
                }
                close(&mut writer, "trkseg")?;
                close(&mut writer, "trk")?;
            }
        }
    }

    close(&mut writer, "gpx")?;
    writer.into_inner().write_all(b"\n")?;
    Ok(())
}

fn open(writer: &mut XmlWriter<'_>, tag: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    Ok(())
}

fn close(writer: &mut XmlWriter<'_>, tag: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_text(writer: &mut XmlWriter<'_>, tag: &str, text: &str) -> Result<()> {
    open(writer, tag)?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    close(writer, tag)
}

fn write_route_header(writer: &mut XmlWriter<'_>, route: &Route) -> Result<()> {
    if let Some(name) = &route.name {
        write_text(writer, "name", name)?;
    }
    if !route.description.is_empty() {
        write_text(writer, "desc", &route.description.join("\n"))?;
    }
    Ok(())
}

fn write_point(writer: &mut XmlWriter<'_>, tag: &str, position: &Position) -> Result<()> {
    let Some(coordinates) = position.coordinates else {
        return Ok(());
    };

    let mut element = BytesStart::new(tag);
    element.push_attribute(("lat", coordinates.latitude.to_string().as_str()));
    element.push_attribute(("lon", coordinates.longitude.to_string().as_str()));
    writer.write_event(Event::Start(element))?;

    if let Some(elevation) = position.elevation {
        write_text(writer, "ele", &elevation.to_string())?;
    }
    if let Some(time) = &position.time {
        write_text(writer, "time", &time.to_rfc3339())?;
    }
    if let Some(comment) = &position.comment {
        write_text(writer, "name", comment)?;
    }

    let sensor = position.sensor();
    if let Some(satellites) = sensor.and_then(|s| s.satellites) {
        write_text(writer, "sat", &satellites.to_string())?;
    }
    for (name, value) in [
        ("hdop", sensor.and_then(|s| s.hdop)),
        ("vdop", sensor.and_then(|s| s.vdop)),
        ("pdop", sensor.and_then(|s| s.pdop)),
    ] {
        if let Some(value) = value {
            write_text(writer, name, &value.to_string())?;
        }
    }

    let heading = sensor.and_then(|s| s.heading);
    if position.speed.is_some() || heading.is_some() {
        open(writer, "extensions")?;
        if let Some(speed) = position.speed {
            write_text(writer, "speed", &(speed / 3.6).to_string())?;
        }
        if let Some(heading) = heading {
            write_text(writer, "course", &heading.to_string())?;
        }
        close(writer, "extensions")?;
    }

    close(writer, tag)
}
