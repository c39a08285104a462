//! Breadth indicator engine.

pub mod breadth;
pub mod rolling;

pub use breadth::{compute_breadth, high_low_ratio, BreadthParams, EngineError, RATIO_SENTINEL};
pub use rolling::{forward_fill, rolling_max, rolling_min};
