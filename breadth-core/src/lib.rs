//! Breadth Core — acquisition layer and daily market-breadth indicator engine.
//!
//! This crate contains the heart of the breadth pipeline:
//! - Domain types (price observations, universe entries, breadth rows)
//! - Rate-limited acquisition scheduler with interchangeable planning strategies
//! - Upstream quote client with retry and quota breaker
//! - Wide-matrix assembly (dedup + pivot of long-form observations)
//! - Rolling-extrema engine producing new-high/new-low counts and ratios

pub mod data;
pub mod domain;
pub mod engine;
