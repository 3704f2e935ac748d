//! TomTom itineraries: one `longitude|latitude|name|flag|` line per stop,
//! coordinates in 1e-5 degrees. Devices accept at most 48 stops and treat
//! the first entry as the current location.

use std::io::{Read, Write};

use crate::context::ParseContext;
use crate::error::{Result, RouteError};
use crate::format::{Capabilities, NavigationFormat, PositionFamily};
use crate::formats::{ITN, read_text, sanitize};
use crate::model::{Characteristic, Position, Route};

const NAME: &str = "TomTom itinerary";
pub const MAXIMUM_POSITION_COUNT: usize = 48;
const SCALE: f64 = 100_000.0;

const START_FLAG: u8 = 4;
const END_FLAG: u8 = 2;
const STOP_FLAG: u8 = 0;

#[derive(Debug, Clone, Copy, Default)]
pub struct ItnFormat;

impl NavigationFormat for ItnFormat {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extension(&self) -> &'static str {
        ".itn"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            maximum_position_count: Some(MAXIMUM_POSITION_COUNT),
            duplicates_first_position: true,
            ..Capabilities::reader_writer()
        }
    }

    fn family(&self) -> PositionFamily {
        PositionFamily::Wgs84
    }

    fn read(&self, source: &mut dyn Read, context: &mut ParseContext<'_>) -> Result<()> {
        let text = read_text(source, NAME)?;
        let mut positions = Vec::new();

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let position = parse_line(line).ok_or_else(|| {
                RouteError::format(NAME, format!("line {} is not an itinerary entry", number + 1))
            })?;
            positions.push(position);
        }

        if positions.is_empty() {
            return Err(RouteError::format(NAME, "no itinerary entries"));
        }
        context.append_route(Route::new(&ITN, Characteristic::Route, positions));
        Ok(())
    }

    fn write(&self, route: &Route, target: &mut dyn Write, start: usize, end: usize) -> Result<()> {
        let last = end.saturating_sub(1);
        for (index, position) in route.positions[start..end].iter().enumerate() {
            let Some(coordinates) = position.coordinates else {
                continue;
            };
            let flag = match start + index {
                i if i == start => START_FLAG,
                i if i == last => END_FLAG,
                _ => STOP_FLAG,
            };
            let name = sanitize(position.comment.as_deref().unwrap_or_default(), '|');
            write!(
                target,
                "{}|{}|{}|{}|\r\n",
                (coordinates.longitude * SCALE).round() as i64,
                (coordinates.latitude * SCALE).round() as i64,
                name,
                flag
            )?;
        }
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<Position> {
    let mut fields = line.split('|');
    let longitude: i64 = fields.next()?.trim().parse().ok()?;
    let latitude: i64 = fields.next()?.trim().parse().ok()?;
    let name = fields.next()?.trim();
    fields.next()?.trim().parse::<u8>().ok()?;

    let position = Position::new(longitude as f64 / SCALE, latitude as f64 / SCALE);
    Some(if name.is_empty() {
        position
    } else {
        position.with_comment(name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let position = parse_line("1339452|5251582|Berlin Hbf|4|").unwrap();
        assert_eq!(position.longitude(), Some(13.39452));
        assert_eq!(position.latitude(), Some(52.51582));
        assert_eq!(position.comment.as_deref(), Some("Berlin Hbf"));

        assert!(parse_line("-12345|678||0|").unwrap().comment.is_none());
        assert!(parse_line("52.5,13.4,Berlin").is_none());
        assert!(parse_line("1|2|no flag").is_none());
    }

    #[test]
    fn test_write_flags_and_sanitized_names() {
        let route = Route::new(
            &ITN,
            Characteristic::Route,
            vec![
                Position::new(13.39452, 52.51582).with_comment("A|B"),
                Position::new(13.0, 52.0),
                Position::new(12.0, 51.0).with_comment("End"),
            ],
        );
        let mut out = Vec::new();
        ITN.write(&route, &mut out, 0, 3).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec!["1339452|5251582|A B|4|", "1300000|5200000||0|", "1200000|5100000|End|2|"]
        );
    }

    #[test]
    fn test_capabilities() {
        let capabilities = ITN.capabilities();
        assert_eq!(capabilities.maximum_position_count, Some(48));
        assert!(capabilities.duplicates_first_position);
        assert!(!capabilities.multiple_routes);
    }
}
