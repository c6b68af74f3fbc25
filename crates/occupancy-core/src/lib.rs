//! Shared types for the occupancy pipeline.
//!
//! Holds the error taxonomy, the table and record types exchanged between
//! stages, pipeline configuration and timezone handling.

pub mod error;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{OccupancyError, Result};
