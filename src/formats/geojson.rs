//! GeoJSON FeatureCollections in the layout produced by GPX converters:
//! waypoints as `Point` features, routes and tracks as `LineString`s with a
//! `gpxType` property and per-coordinate times.

use std::io::{Read, Write};

use ::geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::context::ParseContext;
use crate::error::Result;
use crate::format::{Capabilities, NavigationFormat, PositionFamily};
use crate::formats::{GEOJSON, read_text};
use crate::model::{Characteristic, Coordinates, Position, Route, Timestamp};

const NAME: &str = "GeoJSON";

#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonFormat;

impl NavigationFormat for GeoJsonFormat {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extension(&self) -> &'static str {
        ".geojson"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            multiple_routes: true,
            writes_characteristics: true,
            ..Capabilities::reader_writer()
        }
    }

    fn family(&self) -> PositionFamily {
        PositionFamily::Wgs84
    }

    fn read(&self, source: &mut dyn Read, context: &mut ParseContext<'_>) -> Result<()> {
        let text = read_text(source, NAME)?;
        let geojson = text.parse::<GeoJson>()?;
        context.append_routes(from_geojson(geojson));
        Ok(())
    }

    fn write(&self, route: &Route, target: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        let fc = to_feature_collection(&[(route, start, end)]);
        serde_json::to_writer_pretty(target, &fc)?;
        Ok(())
    }

    fn write_routes(&self, routes: &[Route], target: &mut dyn Write) -> Result<()> {
        let chunks: Vec<(&Route, usize, usize)> =
            routes.iter().map(|r| (r, 0, r.positions.len())).collect();
        serde_json::to_writer_pretty(target, &to_feature_collection(&chunks))?;
        Ok(())
    }
}

/// Build a FeatureCollection from route ranges.
pub fn to_feature_collection(chunks: &[(&Route, usize, usize)]) -> FeatureCollection {
    let mut features = Vec::new();

    for &(route, start, end) in chunks {
        let positions: Vec<&Position> = route.positions[start..end]
            .iter()
            .filter(|p| p.has_coordinates())
            .collect();

        match route.characteristic {
            Characteristic::Waypoints => {
                features.extend(positions.iter().map(|p| point_feature(p, "waypoint")));
            }
            characteristic => {
                let gpx_type = gpx_type(characteristic);
                if positions.len() >= 2 {
                    features.push(line_feature(route, &positions, gpx_type));
                } else if let [only] = positions.as_slice() {
                    let mut feature = point_feature(only, gpx_type);
                    if let Some(props) = feature.properties.as_mut() {
                        insert_optional(props, "routeName", &route.name);
                    }
                    features.push(feature);
                }
            }
        }
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn gpx_type(characteristic: Characteristic) -> &'static str {
    match characteristic {
        Characteristic::Route => "route",
        Characteristic::Track => "track",
        Characteristic::Waypoints => "waypoint",
    }
}

fn point_feature(position: &Position, gpx_type: &str) -> Feature {
    let geometry = Geometry::new(Value::Point(position_coords(position)));

    let mut props = Map::new();
    props.insert(
        "gpxType".to_string(),
        JsonValue::String(gpx_type.to_string()),
    );
    insert_optional(&mut props, "name", &position.comment);
    if let Some(ele) = position.elevation.and_then(serde_json::Number::from_f64) {
        props.insert("ele".to_string(), JsonValue::Number(ele));
    }
    if let Some(time) = &position.time {
        props.insert("time".to_string(), JsonValue::String(time.to_rfc3339()));
    }

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn line_feature(route: &Route, positions: &[&Position], gpx_type: &str) -> Feature {
    let coords: Vec<Vec<f64>> = positions.iter().map(|p| position_coords(p)).collect();
    let geometry = Geometry::new(Value::LineString(coords));

    let mut props = Map::new();
    props.insert(
        "gpxType".to_string(),
        JsonValue::String(gpx_type.to_string()),
    );
    insert_optional(&mut props, "name", &route.name);
    if !route.description.is_empty() {
        props.insert(
            "desc".to_string(),
            JsonValue::String(route.description.join("\n")),
        );
    }
    insert_coordinate_times(&mut props, positions);

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

/// Build [lon, lat] or [lon, lat, ele] coordinate array.
fn position_coords(position: &Position) -> Vec<f64> {
    let Some(c) = position.coordinates else {
        return Vec::new();
    };
    match position.elevation {
        Some(ele) => vec![c.longitude, c.latitude, ele],
        None => vec![c.longitude, c.latitude],
    }
}

fn insert_optional(props: &mut Map<String, JsonValue>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        props.insert(key.to_string(), JsonValue::String(v.clone()));
    }
}

fn insert_coordinate_times(props: &mut Map<String, JsonValue>, positions: &[&Position]) {
    let times: Vec<JsonValue> = positions
        .iter()
        .map(|p| match &p.time {
            Some(t) => JsonValue::String(t.to_rfc3339()),
            None => JsonValue::Null,
        })
        .collect();

    // Only include if at least one time is present
    if times.iter().any(|t| !t.is_null()) {
        let mut coord_props = Map::new();
        coord_props.insert("times".to_string(), JsonValue::Array(times));
        props.insert(
            "coordinateProperties".to_string(),
            JsonValue::Object(coord_props),
        );
    }
}

/// Turn any GeoJSON document into routes. Point features without a route
/// type are gathered into one waypoint list placed first.
pub fn from_geojson(geojson: GeoJson) -> Vec<Route> {
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![Feature::from(geometry)],
    };

    let mut waypoints = Vec::new();
    let mut routes = Vec::new();

    for feature in features {
        let props = feature.properties.unwrap_or_default();
        let Some(geometry) = feature.geometry else {
            continue;
        };
        let characteristic = match props.get("gpxType").and_then(JsonValue::as_str) {
            Some("route") => Characteristic::Route,
            Some("waypoint") => Characteristic::Waypoints,
            Some("track") => Characteristic::Track,
            _ => match geometry.value {
                Value::Point(_) | Value::MultiPoint(_) => Characteristic::Waypoints,
                _ => Characteristic::Track,
            },
        };

        let positions = match &geometry.value {
            Value::Point(coords) => read_point(coords, &props).into_iter().collect(),
            Value::MultiPoint(points) => points.iter().filter_map(|c| read_position(c)).collect(),
            Value::LineString(line) => read_line(line, times_at(&props, None)),
            Value::MultiLineString(lines) => lines
                .iter()
                .enumerate()
                .flat_map(|(index, line)| read_line(line, times_at(&props, Some(index))))
                .collect(),
            _ => Vec::new(),
        };
        if positions.is_empty() {
            continue;
        }

        if characteristic == Characteristic::Waypoints {
            waypoints.extend(positions);
            continue;
        }

        let mut route = Route::new(&GEOJSON, characteristic, positions);
        route.name = string_prop(&props, "name").or_else(|| string_prop(&props, "routeName"));
        if let Some(desc) = string_prop(&props, "desc") {
            route.description = desc.lines().map(str::to_string).collect();
        }
        if matches!(geometry.value, Value::Point(_)) {
            // A lone point stands for the whole route; its name labels the position.
            route.name = string_prop(&props, "routeName");
        }
        routes.push(route);
    }

    if !waypoints.is_empty() {
        routes.insert(0, Route::new(&GEOJSON, Characteristic::Waypoints, waypoints));
    }
    routes
}

fn string_prop(props: &Map<String, JsonValue>, key: &str) -> Option<String> {
    props.get(key).and_then(JsonValue::as_str).map(str::to_string)
}

fn read_position(coords: &[f64]) -> Option<Position> {
    match coords {
        [lon, lat] => Some(Position {
            coordinates: Some(Coordinates::new(*lon, *lat)),
            ..Default::default()
        }),
        [lon, lat, ele, ..] => Some(Position {
            coordinates: Some(Coordinates::new(*lon, *lat)),
            elevation: Some(*ele),
            ..Default::default()
        }),
        _ => None,
    }
}

fn read_point(coords: &[f64], props: &Map<String, JsonValue>) -> Option<Position> {
    let mut position = read_position(coords)?;
    position.comment = string_prop(props, "name");
    if position.elevation.is_none() {
        position.elevation = props.get("ele").and_then(JsonValue::as_f64);
    }
    position.time = props
        .get("time")
        .and_then(JsonValue::as_str)
        .and_then(Timestamp::parse_rfc3339);
    Some(position)
}

/// `coordinateProperties.times`, a flat array for LineStrings and an array
/// per line for MultiLineStrings.
fn times_at(props: &Map<String, JsonValue>, line: Option<usize>) -> Vec<Option<Timestamp>> {
    let times = props
        .get("coordinateProperties")
        .and_then(|c| c.get("times"))
        .and_then(JsonValue::as_array);
    let times = match (times, line) {
        (Some(times), Some(index)) => times.get(index).and_then(JsonValue::as_array),
        (times, None) => times,
        (None, _) => None,
    };
    times
        .map(|times| {
            times
                .iter()
                .map(|t| t.as_str().and_then(Timestamp::parse_rfc3339))
                .collect()
        })
        .unwrap_or_default()
}

fn read_line(line: &[Vec<f64>], times: Vec<Option<Timestamp>>) -> Vec<Position> {
    let mut times = times.into_iter();
    line.iter()
        .filter_map(|coords| {
            let time = times.next().flatten();
            let mut position = read_position(coords)?;
            position.time = time;
            Some(position)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::GPX;

    fn parse(json: &str) -> Vec<Route> {
        from_geojson(json.parse::<GeoJson>().unwrap())
    }

    #[test]
    fn test_waypoint_conversion() {
        let route = Route::new(
            &GPX,
            Characteristic::Waypoints,
            vec![Position::new(139.6503, 35.6762).with_elevation(40.5).with_comment("Tokyo")],
        );
        let fc = to_feature_collection(&[(&route, 0, 1)]);

        assert_eq!(fc.features.len(), 1);
        let f = &fc.features[0];
        let geom = f.geometry.as_ref().unwrap();

        // Check [lon, lat, ele] order
        if let Value::Point(coords) = &geom.value {
            assert!((coords[0] - 139.6503).abs() < 1e-10); // lon
            assert!((coords[1] - 35.6762).abs() < 1e-10); // lat
            assert!((coords[2] - 40.5).abs() < 1e-10); // ele
        } else {
            panic!("Expected Point geometry");
        }

        let props = f.properties.as_ref().unwrap();
        assert_eq!(props["gpxType"], "waypoint");
        assert_eq!(props["name"], "Tokyo");
        assert_eq!(props["ele"], 40.5);
    }

    #[test]
    fn test_track_with_times() {
        let start = Timestamp::parse_rfc3339("2025-01-01T00:00:00Z").unwrap();
        let route = Route::new(
            &GPX,
            Characteristic::Track,
            vec![
                Position::new(139.0, 35.0).with_time(start),
                Position::new(139.001, 35.001),
            ],
        )
        .with_name("Run");
        let fc = to_feature_collection(&[(&route, 0, 2)]);

        assert_eq!(fc.features.len(), 1);
        let props = fc.features[0].properties.as_ref().unwrap();
        assert_eq!(props["gpxType"], "track");
        assert_eq!(props["name"], "Run");

        let coord_props = props["coordinateProperties"].as_object().unwrap();
        let times = coord_props["times"].as_array().unwrap();
        assert_eq!(times.len(), 2);
        assert_eq!(times[0], "2025-01-01T00:00:00Z");
        assert!(times[1].is_null());
    }

    #[test]
    fn test_positions_without_coordinates_are_skipped() {
        let route = Route::new(
            &GPX,
            Characteristic::Route,
            vec![
                Position::new(1.0, 1.0),
                Position::default(),
                Position::new(2.0, 2.0),
            ],
        );
        let fc = to_feature_collection(&[(&route, 0, 3)]);
        match &fc.features[0].geometry.as_ref().unwrap().value {
            Value::LineString(coords) => assert_eq!(coords.len(), 2),
            other => panic!("Expected LineString, got {other:?}"),
        }
    }

    #[test]
    fn test_read_feature_collection() {
        let routes = parse(
            r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[139.0, 35.0, 12.0], [139.1, 35.1]]},
     "properties": {"gpxType": "route", "name": "Coast", "coordinateProperties": {"times": ["2025-01-01T00:00:00Z", null]}}},
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [13.4, 52.5]},
     "properties": {"name": "Berlin", "ele": 34.0}},
    {"type": "Feature", "geometry": {"type": "MultiLineString", "coordinates": [[[1.0, 1.0], [2.0, 2.0]], [[3.0, 3.0], [4.0, 4.0]]]},
     "properties": {"gpxType": "track"}}
  ]
}"#,
        );
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[0].characteristic, Characteristic::Waypoints);
        assert_eq!(routes[0].positions[0].comment.as_deref(), Some("Berlin"));
        assert_eq!(routes[0].positions[0].elevation, Some(34.0));

        assert_eq!(routes[1].characteristic, Characteristic::Route);
        assert_eq!(routes[1].name.as_deref(), Some("Coast"));
        assert_eq!(routes[1].positions[0].elevation, Some(12.0));
        assert!(routes[1].positions[0].time.is_some());
        assert!(routes[1].positions[1].time.is_none());

        assert_eq!(routes[2].characteristic, Characteristic::Track);
        assert_eq!(routes[2].position_count(), 4);
    }

    #[test]
    fn test_empty_collection_has_no_routes() {
        assert!(parse(r#"{"type": "FeatureCollection", "features": []}"#).is_empty());
    }

    #[test]
    fn test_write_and_read_back() {
        let route = Route::new(
            &GPX,
            Characteristic::Route,
            vec![
                Position::new(8.5, 47.3).with_comment("Zurich"),
                Position::new(7.4, 46.9).with_elevation(540.0),
            ],
        )
        .with_name("Zurich to Bern");
        let mut out = Vec::new();
        GEOJSON.write(&route, &mut out, 0, 2).unwrap();

        let routes = parse(std::str::from_utf8(&out).unwrap());
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].name.as_deref(), Some("Zurich to Bern"));
        assert_eq!(routes[0].positions[0].coordinates, route.positions[0].coordinates);
        assert_eq!(routes[0].positions[1].elevation, Some(540.0));
    }
}
