//! Near-optimal paths on 2-D obstacle grids with ant colony optimization.
//!
//! The [`colony::Colony`] is the engine: callers step it with
//! [`colony::Colony::advance`] and read its state back between steps.
//! [`engine`], [`manager`] and [`analysis`] wrap it into batch runs driven by
//! a TOML configuration.

pub mod analysis;
pub mod ant;
pub mod colony;
pub mod config;
pub mod engine;
pub mod grid;
pub mod manager;
pub mod stats;
pub mod types;
