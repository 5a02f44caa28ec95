//! Bounded weight adjustment shared by the prober and the report API

use std::sync::atomic::{AtomicI32, Ordering};

/// Adds `delta` to `weight` and clamps the result into `[0, ceiling]`.
///
/// The add and the clamp happen inside one compare-and-swap loop, so
/// concurrent adjusters can never observe or store an out-of-range value
/// and no adjustment is lost. Returns the stored value.
pub fn adjust(weight: &AtomicI32, delta: i32, ceiling: i32) -> i32 {
    let ceiling = ceiling.max(0);
    let apply = |current: i32| current.saturating_add(delta).clamp(0, ceiling);

    let previous = match weight.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
        Some(apply(current))
    }) {
        Ok(previous) | Err(previous) => previous,
    };

    apply(previous)
}
