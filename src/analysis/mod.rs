//! Analysis modules.
//!
//! Decides, from recorded and upstream versions, whether a release is due.

pub mod detector;

pub use detector::*;
