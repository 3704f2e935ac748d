//! Douglas-Peucker line simplification using cross-track distances.

use crate::geometry::cross_track_distance;
use crate::model::Position;

/// Indices of the positions that must be kept so that no dropped position
/// lies further than `threshold` meters from the simplified line.
pub fn significant_positions(positions: &[Position], threshold: f64) -> Vec<usize> {
    match positions.len() {
        0 => Vec::new(),
        1 => vec![0],
        n => douglas_peucker(positions, 0, n - 1, threshold),
    }
}

fn douglas_peucker(positions: &[Position], from: usize, to: usize, threshold: f64) -> Vec<usize> {
    let start = &positions[from];
    let end = &positions[to];

    let mut max_distance = 0.0;
    let mut split = None;
    for index in from + 1..to {
        let Some(distance) = cross_track_distance(start, end, &positions[index]) else {
            continue;
        };
        if distance > max_distance {
            max_distance = distance;
            split = Some(index);
        }
    }

    match split {
        Some(index) if max_distance > threshold => {
            let mut left = douglas_peucker(positions, from, index, threshold);
            let right = douglas_peucker(positions, index, to, threshold);
            left.pop();
            left.extend(right);
            left
        }
        _ => vec![from, to],
    }
}
