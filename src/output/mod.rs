//! Output module for reporting on the store
//!
//! This module handles:
//! - Collecting bookmark and crawl statistics
//! - Rendering them for the command line

pub mod stats;

pub use stats::{load_statistics, print_statistics, StoreStatistics};
