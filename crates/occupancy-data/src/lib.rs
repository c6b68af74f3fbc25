//! Counter reconciliation and occupancy estimation.
//!
//! Turns raw, occasionally resetting or glitching event counters into
//! per-bucket increments, merges equivalent lanes and derives a running
//! occupancy estimate.  Every stage is a pure function over owned tables.

pub mod bucket;
pub mod counter;
pub mod delta;
pub mod merge;
pub mod normalizer;
pub mod occupancy;
pub mod partition;
pub mod pipeline;
pub mod reader;
pub mod reset;

pub use occupancy_core as core;
