//! Error type for city generation.

use std::fmt;
use std::io;

use crate::geometry::Vector;

/// Broad classification of a [`CityError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvariantViolation,
    ResourceExhausted,
    Configuration,
    Io,
}

/// Errors that can occur while generating, loading or saving a city
#[derive(Debug)]
pub enum CityError {
    /// Internal data structure left in an impossible state
    Invariant(String),
    /// Asked for the edge between two nodes that are not adjacent
    NotNeighbors { from: usize, to: usize },
    /// A projection was requested onto a segment of zero length
    ZeroLengthSegment { at: Vector },
    /// Every street name for a tier has been handed out
    NamePoolExhausted { capacity: usize, tier: String },
    InvalidParams(String),
    Io(io::Error),
    Serialization(String),
}

impl CityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CityError::Invariant(_)
            | CityError::NotNeighbors { .. }
            | CityError::ZeroLengthSegment { .. } => ErrorKind::InvariantViolation,
            CityError::NamePoolExhausted { .. } => ErrorKind::ResourceExhausted,
            CityError::InvalidParams(_) => ErrorKind::Configuration,
            CityError::Io(_) | CityError::Serialization(_) => ErrorKind::Io,
        }
    }
}

impl fmt::Display for CityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CityError::Invariant(msg) => write!(f, "Invariant violated: {}", msg),
            CityError::NotNeighbors { from, to } => {
                write!(f, "Nodes {} and {} are not neighbours", from, to)
            }
            CityError::ZeroLengthSegment { at } => {
                write!(f, "Zero-length segment at ({:.3}, {:.3})", at.x, at.y)
            }
            CityError::NamePoolExhausted { capacity, tier } => write!(
                f,
                "Street name pool exhausted after {} names while naming {} roads",
                capacity, tier
            ),
            CityError::InvalidParams(msg) => write!(f, "Invalid parameters: {}", msg),
            CityError::Io(e) => write!(f, "IO error: {}", e),
            CityError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for CityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CityError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CityError {
    fn from(e: io::Error) -> Self {
        CityError::Io(e)
    }
}

impl From<serde_json::Error> for CityError {
    fn from(e: serde_json::Error) -> Self {
        CityError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CityError>;
