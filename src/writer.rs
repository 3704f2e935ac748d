//! Writing a route into one or more destinations. Formats with a position
//! limit get the route split into consecutive chunks, one per destination.

use std::io::Write;

use log::{debug, info};

use crate::comments;
use crate::converter::{convert_route, convert_routes};
use crate::error::{Result, RouteError};
use crate::format::FormatRef;
use crate::model::Route;
use crate::options::WriteOptions;

/// Number of files `route` needs in `format`, counting the duplicated first
/// position of formats that write it twice. At least one.
pub fn files_required(route: &Route, format: FormatRef) -> usize {
    let capabilities = format.capabilities();
    let mut count = route.positions.len();
    if capabilities.duplicates_first_position && count > 0 {
        count += 1;
    }
    match capabilities.maximum_position_count {
        Some(maximum) => count.div_ceil(maximum.max(1)).max(1),
        None => 1,
    }
}

/// Write `route` in `format` to `targets`, one chunk per target in order.
/// Fails before anything is written when there are fewer targets than
/// chunks, unless overflow is allowed; then the last target takes the rest.
/// Returns the number of positions written to each target.
pub fn write(
    route: &Route,
    format: FormatRef,
    targets: &mut [&mut dyn Write],
    options: &WriteOptions,
) -> Result<Vec<usize>> {
    let capabilities = format.capabilities();
    if !capabilities.writing {
        return Err(RouteError::Unsupported {
            format: format.name(),
            operation: "writing",
        });
    }

    let mut route = convert_route(route, format);
    if capabilities.duplicates_first_position {
        if let Some(first) = route.positions.first().cloned() {
            route.positions.insert(0, first);
        }
    }

    let count = route.positions.len();
    let maximum = capabilities.maximum_position_count.unwrap_or(usize::MAX).max(1);
    let required = count.div_ceil(maximum).max(1);
    if targets.is_empty() || (targets.len() < required && !options.allow_overflow) {
        return Err(RouteError::CapacityExceeded {
            positions: count,
            maximum,
            required,
            available: targets.len(),
        });
    }

    let files = required.min(targets.len());
    let original_name = route.name.clone();
    let mut written = Vec::with_capacity(files);

    for (index, target) in targets.iter_mut().take(files).enumerate() {
        let start = index * maximum;
        let end = if index + 1 == files {
            count
        } else {
            (start + maximum).min(count)
        };
        if options.name_fragments && required > 1 {
            route.name = comments::route_name(&route.positions[start..end], options.max_label_length)
                .or_else(|| original_name.clone());
        }

        debug!("Writing positions {start}..{end} as {}", format.name());
        format.write(&route, &mut **target, start, end)?;
        target.flush()?;
        written.push(end - start);
    }

    info!(
        "Wrote {count} positions as {} into {} file(s)",
        format.name(),
        written.len()
    );
    Ok(written)
}

/// Write all `routes` into a single destination of a format that holds
/// multiple routes.
pub fn write_all(routes: &[Route], format: FormatRef, target: &mut dyn Write) -> Result<()> {
    let capabilities = format.capabilities();
    if !capabilities.writing || !capabilities.multiple_routes {
        return Err(RouteError::Unsupported {
            format: format.name(),
            operation: "writing multiple routes",
        });
    }
    format.write_routes(&convert_routes(routes, format), target)?;
    target.flush()?;
    Ok(())
}
