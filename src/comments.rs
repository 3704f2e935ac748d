//! Post-processing of freshly read routes: shared-coordinate back-fill,
//! generated position labels and route names.

use std::collections::HashMap;

use crate::model::{Position, Route, Timestamp};
use crate::options::ParserOptions;

const POSITION_LABEL: &str = "Position ";

pub fn finalize(routes: &mut [Route], options: &ParserOptions) {
    if routes.len() > 1 {
        backfill_shared_coordinates(routes);
    }
    if options.number_positions {
        for route in routes.iter_mut() {
            number_positions(&mut route.positions);
        }
    }
    for (index, route) in routes.iter_mut().enumerate() {
        if route.name.is_none() {
            let name = route_name(&route.positions, options.max_label_length)
                .unwrap_or_else(|| format!("Route {}", index + 1));
            route.name = Some(name);
        }
    }
}

/// Whether `comment` is a label produced by [`number_positions`].
pub fn is_generated_label(comment: &str) -> bool {
    comment
        .strip_prefix(POSITION_LABEL)
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Label positions without comment, and renumber previously generated
/// labels so they follow the current order.
pub fn number_positions(positions: &mut [Position]) {
    for (index, position) in positions.iter_mut().enumerate() {
        let generated = match &position.comment {
            None => true,
            Some(comment) => is_generated_label(comment),
        };
        if generated {
            position.comment = Some(format!("{POSITION_LABEL}{}", index + 1));
        }
    }
}

/// "first to last" from the descriptions of the outer positions.
pub fn route_name(positions: &[Position], max_length: usize) -> Option<String> {
    let name = match positions {
        [] => return None,
        [only] => only.description(),
        [first, .., last] => format!("{} to {}", first.description(), last.description()),
    };
    Some(name.chars().take(max_length).collect())
}

#[derive(Default)]
struct SharedFields {
    comment: Option<String>,
    elevation: Option<f64>,
    speed: Option<f64>,
    time: Option<Timestamp>,
}

/// Positions at exactly the same coordinates in different routes usually
/// describe the same place. Fill their missing fields from the first
/// position (first route first) that has them; never overwrite.
pub fn backfill_shared_coordinates(routes: &mut [Route]) {
    let mut shared: HashMap<(u64, u64), SharedFields> = HashMap::new();

    for position in routes.iter().flat_map(|r| r.positions.iter()) {
        let Some(coordinates) = position.coordinates else {
            continue;
        };
        let fields = shared.entry(coordinates.key()).or_default();
        if fields.comment.is_none() {
            fields.comment = position.comment.clone();
        }
        if fields.elevation.is_none() {
            fields.elevation = position.elevation;
        }
        if fields.speed.is_none() {
            fields.speed = position.speed;
        }
        if fields.time.is_none() {
            fields.time = position.time.clone();
        }
    }

    for position in routes.iter_mut().flat_map(|r| r.positions.iter_mut()) {
        let Some(fields) = position.coordinates.and_then(|c| shared.get(&c.key())) else {
            continue;
        };
        if position.comment.is_none() {
            position.comment = fields.comment.clone();
        }
        if position.elevation.is_none() {
            position.elevation = fields.elevation;
        }
        if position.speed.is_none() {
            position.speed = fields.speed;
        }
        if position.time.is_none() {
            position.time = fields.time.clone();
        }
    }
}
