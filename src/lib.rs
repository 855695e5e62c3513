//! Procedural city generation library
//!
//! Roads are traced as streamlines of a tensor field, merged into a planar
//! street graph and cut into blocks and lots. Re-exports modules for use by
//! binaries and tools.

pub mod city;
pub mod error;
pub mod export;
pub mod field;
pub mod geometry;
pub mod graph;
pub mod names;
pub mod params;
pub mod polygon;
pub mod polygon_finder;
pub mod seeds;
pub mod streamlines;

pub use city::{generate, CityGenerator, CityStage, GeneratedCity, Lot};
pub use error::{CityError, ErrorKind, Result};
pub use params::CityParams;
