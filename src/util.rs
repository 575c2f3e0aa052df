use std::sync::{Mutex, MutexGuard, PoisonError};

pub fn normalize_rgba_color(color: &[u8; 4]) -> [f32; 4] {
    [
        color[0] as f32 / 255.0,
        color[1] as f32 / 255.0,
        color[2] as f32 / 255.0,
        color[3] as f32 / 255.0,
    ]
}

/// Relative float comparison; two values compare equal when they agree to about 12
/// significant digits. Like every relative comparison it is meaningless against zero,
/// use [`fuzzy_is_null`] for that.
#[inline]
pub fn fuzzy_compare(a: f64, b: f64) -> bool {
    (a - b).abs() * 1_000_000_000_000.0 <= a.abs().min(b.abs())
}

#[inline]
pub fn fuzzy_is_null(value: f64) -> bool {
    value.abs() <= 0.000_000_000_001
}

/// Property setters treat a value as unchanged when it is fuzzily equal to the old one.
/// Zero is handled separately since relative comparison never matches it.
#[inline]
pub fn fuzzy_eq(a: f64, b: f64) -> bool {
    if fuzzy_is_null(a) || fuzzy_is_null(b) {
        fuzzy_is_null(a - b)
    } else {
        fuzzy_compare(a, b)
    }
}

/// Locks a mutex shared with OS callback threads. A panic on another thread leaves the
/// guarded cache or registry structurally intact, so poisoning is ignored.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_eq_handles_zero() {
        assert!(fuzzy_eq(0.0, -0.0));
        assert!(fuzzy_eq(0.0, 1e-14));
        assert!(!fuzzy_eq(0.0, 0.1));
        assert!(fuzzy_eq(4.5, 4.5 + 1e-14));
        assert!(!fuzzy_compare(0.0, 0.0 + 1e-300));
    }
}
