//! Equality functions for signals and memos.
//!
//! A write is a no-op when the new value is equal to the current one, so the
//! equality used must be total and side-effect-free. `PartialEq` is the
//! default; floating point values need an explicit choice because
//! `NaN != NaN` would make every NaN write propagate.

/// Equality check used to decide whether a write changes a value.
pub type EqualsFn<T> = fn(&T, &T) -> bool;

/// Default equality using `PartialEq`.
pub fn equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Equality for `f64` where NaN equals NaN.
///
/// ```rust
/// use ripple_core::reactive::equality::total_eq_f64;
///
/// assert!(total_eq_f64(&f64::NAN, &f64::NAN));
/// assert!(total_eq_f64(&1.5, &1.5));
/// assert!(!total_eq_f64(&f64::NAN, &1.0));
/// ```
pub fn total_eq_f64(a: &f64, b: &f64) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b
}

/// Equality for `f32` where NaN equals NaN.
pub fn total_eq_f32(a: &f32, b: &f32) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b
}

/// Equality for `Option<f64>` where NaN equals NaN.
pub fn total_eq_option_f64(a: &Option<f64>, b: &Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => total_eq_f64(a, b),
        _ => false,
    }
}

/// Treat every write as a change.
pub fn never_equal<T>(_: &T, _: &T) -> bool {
    false
}
