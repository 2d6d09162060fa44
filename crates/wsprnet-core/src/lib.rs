//! Shared data model, grid decoding, line parsers, logging init, and the
//! error-severity taxonomy used by every WSPR ingestion service.

pub mod band;
pub mod error;
pub mod grid;
pub mod logging;
pub mod model;
pub mod parse;

pub use error::Severity;
pub use model::{ExtendedSpot, NoiseSample, Spot};
