//! Class path discovery from loading contexts.

use tracing::{debug, info, warn};

use crate::context::LoadingContext;
use crate::pool::ClassPool;

/// Makes `name` findable in `pool` by borrowing the search locations of
/// `context`.
///
/// Does nothing when the pool can already find the class, or when the
/// context cannot enumerate its locations. Every location the pool cannot
/// open is logged and skipped. Returns the number of locations registered.
pub fn ensure_discoverable<C>(context: &C, pool: &ClassPool, name: &str) -> usize
where
    C: LoadingContext + ?Sized,
{
    if let Some(location) = pool.find(name) {
        debug!(context = %context.label(), pool = %pool.name(), class = name, location = %location, "checkLibrary found");
        return 0;
    }
    let Some(locations) = context.resource_locations() else {
        return 0;
    };

    let mut registered = 0;
    for location in &locations {
        match pool.append_path(location) {
            Ok(()) => {
                registered += 1;
                info!(pool = %pool.name(), path = %location, "Loaded classPool");
            }
            Err(e) => warn!(
                context = %context.label(),
                pool = %pool.name(),
                path = %location,
                error = %e,
                "lib load fail"
            ),
        }
    }
    registered
}
