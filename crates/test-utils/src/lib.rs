//! Shared test utilities for the elm-composite workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic multi-set grid generators
//! - Fixtures for the quadrant and Midwest test layouts
//! - Temporary directories and on-disk region masks
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, fixtures, quadrant_sets};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert that two slices have NaN in exactly the same positions and
/// approximately equal finite values elsewhere.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_slices_nan_eq;
///
/// assert_slices_nan_eq!(&[1.0, f32::NAN], &[1.0, f32::NAN], 1e-6);
/// ```
#[macro_export]
macro_rules! assert_slices_nan_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left = $left;
        let right = $right;
        assert_eq!(left.len(), right.len(), "slice lengths differ");
        for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            let (l, r) = (*l as f64, *r as f64);
            if l.is_nan() || r.is_nan() {
                assert!(
                    l.is_nan() && r.is_nan(),
                    "NaN mismatch at index {}: left={:?} right={:?}",
                    i,
                    l,
                    r
                );
            } else {
                assert!(
                    (l - r).abs() <= $epsilon as f64,
                    "value mismatch at index {}: left={:?} right={:?}",
                    i,
                    l,
                    r
                );
            }
        }
    }};
}
