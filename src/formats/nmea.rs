//! NMEA 0183 GGA and RMC sentences as written by GPS receivers.
//!
//! The strict variant rejects any line that is not a checksummed sentence.
//! The broken variant tolerates garbage lines and wrong or missing
//! checksums, which is what many loggers produce after a power loss.

use std::io::{Read, Write};

use chrono::{NaiveDate, NaiveTime};
use log::debug;

use crate::context::ParseContext;
use crate::error::{Result, RouteError};
use crate::format::{Capabilities, NavigationFormat, PositionFamily};
use crate::formats::{BROKEN_NMEA, NMEA, read_text};
use crate::model::{
    Characteristic, Coordinates, Position, PositionExtension, Route, SensorData, Timestamp,
};

const KNOTS_TO_KMH: f64 = 1.852;

#[derive(Debug, Clone, Copy)]
pub struct NmeaFormat {
    strict: bool,
}

impl NmeaFormat {
    pub const fn strict() -> Self {
        Self { strict: true }
    }

    pub const fn broken() -> Self {
        Self { strict: false }
    }

    fn format_name(&self) -> &'static str {
        if self.strict {
            "NMEA 0183"
        } else {
            "NMEA 0183 (broken)"
        }
    }
}

impl NavigationFormat for NmeaFormat {
    fn name(&self) -> &'static str {
        self.format_name()
    }

    fn extension(&self) -> &'static str {
        ".nmea"
    }

    fn capabilities(&self) -> Capabilities {
        if self.strict {
            Capabilities::reader_writer()
        } else {
            Capabilities::reader()
        }
    }

    fn family(&self) -> PositionFamily {
        PositionFamily::Sensor
    }

    fn read(&self, source: &mut dyn Read, context: &mut ParseContext<'_>) -> Result<()> {
        let text = read_text(source, self.name())?;
        let mut reader = SentenceReader::new(self, context.start_date());

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match checked_body(line) {
                Ok(body) => reader.sentence(body),
                Err(problem) if self.strict => {
                    return Err(RouteError::format(
                        self.name(),
                        format!("line {}: {problem}", number + 1),
                    ));
                }
                Err(problem) => {
                    // The broken variant keeps whatever looks like a sentence.
                    debug!("line {}: {problem}", number + 1);
                    if let Some(body) = line.strip_prefix('$') {
                        reader.sentence(body.split('*').next().unwrap_or(body));
                    }
                }
            }
        }

        if reader.recognized == 0 {
            return Err(RouteError::format(self.name(), "no GGA or RMC sentences"));
        }
        if let Some(date) = reader.date {
            context.set_start_date(Some(date));
        }
        let format: &'static NmeaFormat = if self.strict { &NMEA } else { &BROKEN_NMEA };
        context.append_route(Route::new(format, Characteristic::Track, reader.positions));
        Ok(())
    }

    fn write(&self, route: &Route, target: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        if !self.strict {
            return Err(RouteError::Unsupported {
                format: self.name(),
                operation: "writing",
            });
        }
        for position in &route.positions[start..end] {
            let Some(coordinates) = position.coordinates else {
                continue;
            };
            let (time, date) = match &position.time {
                Some(t) => (
                    t.instant.format("%H%M%S%.3f").to_string(),
                    t.instant.format("%d%m%y").to_string(),
                ),
                None => (String::new(), String::new()),
            };
            let (lat, ns) = format_angle(coordinates.latitude, 2, 'N', 'S');
            let (lon, ew) = format_angle(coordinates.longitude, 3, 'E', 'W');
            let sensor = position.sensor();
            let speed = optional(position.speed.map(|kmh| kmh / KNOTS_TO_KMH), 1);
            let course = optional(sensor.and_then(|s| s.heading), 1);
            let satellites = sensor
                .and_then(|s| s.satellites)
                .map(|n| format!("{n:02}"))
                .unwrap_or_default();
            let hdop = optional(sensor.and_then(|s| s.hdop), 1);
            let elevation = optional(position.elevation, 1);

            write_sentence(
                target,
                &format!("GPRMC,{time},A,{lat},{ns},{lon},{ew},{speed},{course},{date},,"),
            )?;
            write_sentence(
                target,
                &format!("GPGGA,{time},{lat},{ns},{lon},{ew},1,{satellites},{hdop},{elevation},M,,M,,"),
            )?;
        }
        Ok(())
    }
}

/// Accumulates positions, merging consecutive sentences for the same fix.
struct SentenceReader {
    strict: bool,
    date: Option<NaiveDate>,
    positions: Vec<Position>,
    last_time: Option<String>,
    recognized: usize,
}

impl SentenceReader {
    fn new(format: &NmeaFormat, start_date: Option<NaiveDate>) -> Self {
        Self {
            strict: format.strict,
            date: start_date,
            positions: Vec::new(),
            last_time: None,
            recognized: 0,
        }
    }

    fn sentence(&mut self, body: &str) {
        let fields: Vec<&str> = body.split(',').collect();
        let kind = fields[0];
        if kind.len() != 5 {
            return;
        }
        match kind.get(2..) {
            Some("GGA") => self.gga(&fields),
            Some("RMC") => self.rmc(&fields),
            _ => {}
        }
    }

    fn gga(&mut self, fields: &[&str]) {
        if fields.len() < 10 {
            return;
        }
        self.recognized += 1;
        let Some(coordinates) = parse_coordinates(fields[2], fields[3], fields[4], fields[5]) else {
            return;
        };
        let time = fields[1];
        let position = self.position_at(time, coordinates);
        position.elevation = fields[9].parse().ok().or(position.elevation);
        if let PositionExtension::Sensor(sensor) = &mut position.extension {
            sensor.satellites = fields[7].parse().ok().or(sensor.satellites);
            sensor.hdop = fields[8].parse().ok().or(sensor.hdop);
        }
    }

    fn rmc(&mut self, fields: &[&str]) {
        if fields.len() < 10 {
            return;
        }
        self.recognized += 1;
        if let Ok(date) = NaiveDate::parse_from_str(fields[9], "%d%m%y") {
            self.date = Some(date);
        }
        if self.strict && fields[2] == "V" {
            return;
        }
        let Some(coordinates) = parse_coordinates(fields[3], fields[4], fields[5], fields[6]) else {
            return;
        };
        let time = fields[1];
        let position = self.position_at(time, coordinates);
        if let Ok(knots) = fields[7].parse::<f64>() {
            position.speed = Some(knots * KNOTS_TO_KMH);
        }
        if let PositionExtension::Sensor(sensor) = &mut position.extension {
            sensor.heading = fields[8].parse().ok().or(sensor.heading);
        }
    }

    /// The position of the previous sentence when both carry the same time
    /// of day (or, without time, the same coordinates), otherwise a new one.
    fn position_at(&mut self, time: &str, coordinates: Coordinates) -> &mut Position {
        let same_fix = self.last_time.as_deref() == Some(time)
            && (!time.is_empty()
                || self.positions.last().and_then(|p| p.coordinates) == Some(coordinates));
        if !same_fix || self.positions.is_empty() {
            self.positions.push(Position {
                coordinates: Some(coordinates),
                extension: PositionExtension::Sensor(SensorData::default()),
                ..Default::default()
            });
        }
        self.last_time = Some(time.to_string());
        let date = self.date;
        let index = self.positions.len() - 1;
        let position = &mut self.positions[index];
        if let (Some(date), Ok(time)) = (date, NaiveTime::parse_from_str(time, "%H%M%S%.f")) {
            position.time = Some(Timestamp::utc(date.and_time(time).and_utc()));
        }
        position
    }
}

/// Body between `$` and `*` of a sentence whose checksum matches.
fn checked_body(line: &str) -> std::result::Result<&str, String> {
    let Some(rest) = line.strip_prefix('$') else {
        return Err("not a sentence".to_string());
    };
    let Some((body, checksum)) = rest.split_once('*') else {
        return Err("missing checksum".to_string());
    };
    let expected = u8::from_str_radix(checksum.trim(), 16)
        .map_err(|_| format!("invalid checksum '{checksum}'"))?;
    let actual = checksum_of(body);
    if expected != actual {
        return Err(format!("checksum {expected:02X} does not match {actual:02X}"));
    }
    Ok(body)
}

fn checksum_of(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

fn write_sentence(target: &mut dyn Write, body: &str) -> Result<()> {
    write!(target, "${body}*{:02X}\r\n", checksum_of(body))?;
    Ok(())
}

/// `ddmm.mmmm` / `dddmm.mmmm` with hemisphere.
fn parse_angle(value: &str, hemisphere: &str, negative: &str) -> Option<f64> {
    let raw: f64 = value.parse().ok()?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let angle = degrees + minutes / 60.0;
    Some(if hemisphere == negative { -angle } else { angle })
}

fn parse_coordinates(lat: &str, ns: &str, lon: &str, ew: &str) -> Option<Coordinates> {
    let latitude = parse_angle(lat, ns, "S")?;
    let longitude = parse_angle(lon, ew, "W")?;
    (latitude.abs() <= 90.0 && longitude.abs() <= 180.0)
        .then(|| Coordinates::new(longitude, latitude))
}

fn format_angle(angle: f64, width: usize, positive: char, negative: char) -> (String, char) {
    let hemisphere = if angle < 0.0 { negative } else { positive };
    let total_minutes = (angle.abs() * 60.0 * 10_000.0).round() / 10_000.0;
    let degrees = (total_minutes / 60.0).trunc();
    let minutes = total_minutes - degrees * 60.0;
    (
        format!("{:0width$}{:07.4}", degrees as u32, minutes, width = width),
        hemisphere,
    )
}

fn optional(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{v:.decimals$}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FormatCatalog;
    use crate::format::FormatRef;
    use crate::options::ParserOptions;
    use crate::parser::NavigationFormatParser;

    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";

    fn read(format: FormatRef, text: &str) -> crate::context::ParserResult {
        let parser = NavigationFormatParser::new(FormatCatalog::new(vec![]), ParserOptions::default());
        parser.read(text.as_bytes(), &[format])
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checked_body(GGA).unwrap(), &GGA[1..GGA.len() - 3]);
        assert!(checked_body("$GPGGA,123519*00").is_err());
        assert!(checked_body("GPGGA,123519").is_err());
    }

    #[test]
    fn test_rmc_and_gga_of_same_fix_merge() {
        let result = read(&NMEA, &format!("{RMC}\r\n{GGA}\r\n"));
        let route = &result.routes[0];
        assert_eq!(route.position_count(), 1);

        let pos = &route.positions[0];
        assert!((pos.latitude().unwrap() - 48.1173).abs() < 1e-9);
        assert!((pos.longitude().unwrap() - 11.516_666_666).abs() < 1e-6);
        assert_eq!(pos.elevation, Some(545.4));
        assert!((pos.speed.unwrap() - 22.4 * 1.852).abs() < 1e-9);
        assert_eq!(
            pos.time.as_ref().unwrap().to_rfc3339(),
            "1994-03-23T12:35:19Z"
        );
        let sensor = pos.sensor().unwrap();
        assert_eq!(sensor.heading, Some(84.4));
        assert_eq!(sensor.satellites, Some(8));
        assert_eq!(sensor.hdop, Some(0.9));
    }

    #[test]
    fn test_strict_rejects_bad_checksum_broken_accepts() {
        let text = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*00\n";
        assert!(!read(&NMEA, text).is_successful());

        let result = read(&BROKEN_NMEA, &format!("garbage\n{text}"));
        assert!(result.is_successful());
        assert_eq!(result.format.unwrap().name(), "NMEA 0183 (broken)");
        assert_eq!(result.routes[0].positions[0].elevation, Some(545.4));
    }

    #[test]
    fn test_no_sentences_is_an_error() {
        assert!(read(&BROKEN_NMEA, "hello\nworld\n").format.is_none());
    }

    #[test]
    fn test_write_and_read_back() {
        let time = Timestamp::parse_rfc3339("2024-05-01T08:30:15Z").unwrap();
        let mut position = Position::new(-0.1276, 51.5072).with_elevation(35.0).with_time(time);
        position.speed = Some(18.52);
        position.extension = PositionExtension::Sensor(SensorData {
            heading: Some(270.0),
            satellites: Some(9),
            hdop: Some(1.1),
            ..Default::default()
        });
        let route = Route::new(&NMEA, Characteristic::Track, vec![position.clone()]);

        let mut out = Vec::new();
        NMEA.write(&route, &mut out, 0, 1).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("$GPRMC,083015.000,A,5130.4320,N,00007.6560,W,10.0,270.0,010524,,*"));

        let result = read(&NMEA, &text);
        let read_back = &result.routes[0].positions[0];
        assert!((read_back.latitude().unwrap() - 51.5072).abs() < 1e-6);
        assert!((read_back.longitude().unwrap() + 0.1276).abs() < 1e-6);
        assert_eq!(read_back.time, position.time);
        assert_eq!(read_back.sensor().unwrap().satellites, Some(9));
    }

    #[test]
    fn test_broken_variant_does_not_write() {
        let route = Route::new(&NMEA, Characteristic::Track, vec![Position::new(0.0, 0.0)]);
        let mut out = Vec::new();
        assert!(matches!(
            BROKEN_NMEA.write(&route, &mut out, 0, 1),
            Err(RouteError::Unsupported { .. })
        ));
    }
}
