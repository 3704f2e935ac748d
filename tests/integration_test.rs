use std::io::{Cursor, Write};

use route_converter_wasm::formats::ITN;
use route_converter_wasm::{
    Characteristic, ConvertOptions, FormatRef, NavigationFormat, NavigationFormatParser, ParserResult,
    RouteError, WriteOptions, convert, format_infos, writer,
};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

fn load_fixture(path: &str) -> Vec<u8> {
    std::fs::read(format!("tests/fixtures/{path}")).unwrap()
}

fn read(bytes: &[u8], file_name: Option<&str>) -> ParserResult {
    NavigationFormatParser::default().read_bytes(bytes, file_name)
}

fn format_name(format: Option<FormatRef>) -> Option<&'static str> {
    format.map(|f| f.name())
}

fn track_gpx(count: usize) -> String {
    let mut gpx = String::from(r#"<?xml version="1.0"?><gpx version="1.1"><trk><trkseg>"#);
    for i in 0..count {
        gpx.push_str(&format!(r#"<trkpt lat="{}" lon="13.0"/>"#, 52.0 + i as f64 * 0.001));
    }
    gpx.push_str("</trkseg></trk></gpx>");
    gpx
}

// ---- detection ----

#[test]
fn test_detects_every_fixture_with_and_without_name() {
    let cases = [
        ("gpx/trip.gpx", "GPX 1.1", vec![2, 3, 4]),
        ("nmea/logger.nmea", "NMEA 0183", vec![3]),
        ("nmea/broken.nmea", "NMEA 0183 (broken)", vec![2]),
        ("itn/berlin.itn", "TomTom itinerary", vec![3]),
        ("grid/berlin.grd", "Spherical Mercator grid", vec![3]),
        ("csv/places.csv", "Waypoint list", vec![2]),
        ("geojson/walk.geojson", "GeoJSON", vec![3]),
    ];

    for (fixture, format, counts) in cases {
        let bytes = load_fixture(fixture);
        for name in [Some(fixture), None] {
            let result = read(&bytes, name);
            assert!(result.is_successful(), "{fixture} not recognized");
            assert_eq!(format_name(result.format), Some(format), "{fixture} with name {name:?}");
            assert_eq!(result.position_counts(), counts, "{fixture}");
        }
    }
}

#[test]
fn test_gpx_post_processing() {
    let result = read(&load_fixture("gpx/trip.gpx"), Some("trip.gpx"));
    let routes = result.into_routes().unwrap();

    assert_eq!(routes[0].characteristic, Characteristic::Waypoints);
    assert_eq!(routes[0].name.as_deref(), Some("Alps"));

    // Shared coordinates fill what the route left out.
    let ascent = &routes[1];
    assert_eq!(ascent.name.as_deref(), Some("Ascent"));
    assert_eq!(ascent.positions[0].comment.as_deref(), Some("Garmisch"));
    assert_eq!(ascent.positions[0].elevation, Some(708.0));
    assert_eq!(ascent.positions[1].elevation, Some(1400.0));
    assert!(ascent.positions[1].time.is_some());
    assert_eq!(ascent.positions[1].comment.as_deref(), Some("Position 2"));
    assert_eq!(ascent.positions[2].comment.as_deref(), Some("Zugspitze"));

    let track = &routes[2];
    assert_eq!(track.characteristic, Characteristic::Track);
    assert_eq!(track.duration(), Some(5 * 3600));
    assert!((track.elevation_ascend() - 2254.0).abs() < 1e-9);
    assert_eq!(track.elevation_descend(), 0.0);
    assert!(track.length() > 10_000.0);
}

#[test]
fn test_recognized_but_empty_is_reported() {
    let result = read(&load_fixture("gpx/empty.gpx"), Some("empty.gpx"));
    assert!(!result.is_successful());
    assert!(matches!(
        result.into_routes(),
        Err(RouteError::UnrecognizedFormat {
            attempted: Some("GPX 1.1")
        })
    ));
}

#[test]
fn test_unrecognized_input() {
    for input in [&b"hello world"[..], &b""[..]] {
        let result = read(input, None);
        assert!(result.format.is_none());
        assert!(result.formats.is_empty());
    }
    let err = convert(b"hello world", None, "gpx", &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, RouteError::UnrecognizedFormat { attempted: None }));
}

#[test]
fn test_zip_members_are_read_recursively() {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("trip/alps.gpx", options).unwrap();
    zip.write_all(&load_fixture("gpx/trip.gpx")).unwrap();
    zip.start_file("logs/logger.nmea", options).unwrap();
    zip.write_all(&load_fixture("nmea/logger.nmea")).unwrap();
    let bytes = zip.finish().unwrap().into_inner();

    let result = read(&bytes, Some("bundle.zip"));
    assert_eq!(result.position_counts(), vec![2, 3, 4, 3]);
    let formats: Vec<_> = result.formats.iter().map(|f| f.name()).collect();
    assert_eq!(formats, vec!["NMEA 0183", "GPX 1.1", "Zip archive"]);
    assert_eq!(format_name(result.format), Some("NMEA 0183"));
}

// ---- conversion ----

#[test]
fn test_gpx_to_itn_and_back_drops_sensor_data() {
    let opts = ConvertOptions {
        route_index: 2,
        ..Default::default()
    };
    let gpx = convert(&load_fixture("gpx/trip.gpx"), Some("trip.gpx"), "gpx", &opts).unwrap();
    assert_eq!(gpx.len(), 1);
    assert!(gpx[0].contains("<trk>"));
    assert!(gpx[0].contains("<sat>9</sat>"));
    assert!(gpx[0].contains("<hdop>0.9</hdop>"));

    let itn = convert(&load_fixture("gpx/trip.gpx"), Some("trip.gpx"), "itn", &opts).unwrap();
    assert_eq!(itn.len(), 1);
    let lines: Vec<_> = itn[0].lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "1109550|4749250|Garmisch|4|");
    assert_eq!(lines[1], "1109550|4749250|Garmisch|0|");
    assert_eq!(lines[4], "1098630|4742110|Zugspitze|2|");

    let back = convert(itn[0].as_bytes(), Some("trip.itn"), "gpx", &ConvertOptions::default()).unwrap();
    assert!(back[0].contains("<rte>"));
    assert!(back[0].contains("<name>Zugspitze</name>"));
    assert!(!back[0].contains("<sat>"));
    assert!(!back[0].contains("<hdop>"));
    assert!(!back[0].contains("<time>"));
}

#[test]
fn test_nmea_to_gpx_keeps_receiver_data() {
    let files = convert(&load_fixture("nmea/logger.nmea"), Some("logger.nmea"), "GPX 1.1", &ConvertOptions::default())
        .unwrap();
    let gpx = &files[0];
    assert_eq!(gpx.matches("<trkpt").count(), 3);
    assert!(gpx.contains("<time>2025-06-01T08:15:00Z</time>"));
    assert!(gpx.contains("<sat>9</sat>"));
    assert!(gpx.contains("<ele>410</ele>"));
}

#[test]
fn test_grid_to_geojson() {
    let files = convert(&load_fixture("grid/berlin.grd"), None, ".geojson", &ConvertOptions::default()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&files[0]).unwrap();
    let coords = json["features"][0]["geometry"]["coordinates"].as_array().unwrap();
    assert_eq!(coords.len(), 3);
    let lat = coords[0][1].as_f64().unwrap();
    let lon = coords[0][0].as_f64().unwrap();
    assert!((lat - 52.52).abs() < 0.05, "latitude {lat}");
    assert!((lon - 13.40).abs() < 0.05, "longitude {lon}");
    assert_eq!(coords[0][2].as_f64(), Some(34.0));
}

#[test]
fn test_long_track_is_split_into_itineraries() {
    let gpx = track_gpx(100);
    let files = convert(gpx.as_bytes(), Some("long.gpx"), "itn", &ConvertOptions::default()).unwrap();
    let counts: Vec<_> = files.iter().map(|f| f.lines().count()).collect();
    assert_eq!(counts, vec![48, 48, 5]);
    assert!(files[1].lines().next().unwrap().ends_with("|4|"));
    assert!(files[2].lines().last().unwrap().ends_with("|2|"));
}

#[test]
fn test_too_few_destinations_fail_before_writing() {
    let gpx = track_gpx(100);
    let route = read(gpx.as_bytes(), Some("long.gpx")).into_routes().unwrap().remove(0);

    let mut first = Vec::new();
    let mut second = Vec::new();
    let mut targets: Vec<&mut dyn Write> = vec![&mut first, &mut second];
    let err = writer::write(&route, &ITN, &mut targets, &WriteOptions::default()).unwrap_err();
    match err {
        RouteError::CapacityExceeded {
            positions,
            maximum,
            required,
            available,
        } => assert_eq!((positions, maximum, required, available), (101, 48, 3, 2)),
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }
    assert!(first.is_empty());
    assert!(second.is_empty());
}

#[test]
fn test_conversion_errors() {
    let bytes = load_fixture("gpx/trip.gpx");
    assert!(matches!(
        convert(&bytes, None, "kml", &ConvertOptions::default()),
        Err(RouteError::UnknownFormat(name)) if name == "kml"
    ));
    assert!(matches!(
        convert(&bytes, None, "NMEA 0183 (broken)", &ConvertOptions::default()),
        Err(RouteError::UnknownFormat(_))
    ));

    let opts = ConvertOptions {
        route_index: 7,
        ..Default::default()
    };
    assert!(matches!(
        convert(&bytes, None, "gpx", &opts),
        Err(RouteError::NoSuchRoute { index: 7, count: 3 })
    ));
}

#[test]
fn test_simplify_before_writing() {
    let opts = ConvertOptions {
        simplify_threshold: Some(5.0),
        ..Default::default()
    };
    // All points lie on one meridian.
    let files = convert(track_gpx(20).as_bytes(), None, "csv", &opts).unwrap();
    assert_eq!(files[0].lines().count(), 2);
}

#[test]
fn test_repair_times_extrapolates_track_end() {
    let bytes = load_fixture("geojson/walk.geojson");
    let plain = convert(&bytes, Some("walk.geojson"), "gpx", &ConvertOptions::default()).unwrap();
    assert_eq!(plain[0].matches("<time>").count(), 2);

    let opts = ConvertOptions {
        repair_times: true,
        ..Default::default()
    };
    let repaired = convert(&bytes, Some("walk.geojson"), "gpx", &opts).unwrap();
    assert_eq!(repaired[0].matches("<time>").count(), 3);
}

#[test]
fn test_catalog_order() {
    let names: Vec<_> = format_infos().iter().map(|f| f.name).collect();
    assert_eq!(
        names,
        vec![
            "Zip archive",
            "GPX 1.1",
            "GeoJSON",
            "NMEA 0183",
            "TomTom itinerary",
            "Spherical Mercator grid",
            "NMEA 0183 (broken)",
            "Waypoint list",
        ]
    );
    let itn = format_infos().into_iter().find(|f| f.extension == ".itn").unwrap();
    assert_eq!(itn.capabilities.maximum_position_count, Some(48));
}
