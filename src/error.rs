//! Error types shared across the engine.
//!
//! Every variant here is an expected rule violation. None of them leave the
//! registry or the edit session in a different state than before the call.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::regions::PolygonId;

/// Why a candidate polygon was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictReason {
    /// The ring crosses or touches itself, or is degenerate
    #[error("invalid polygon: self-intersecting lines detected")]
    SelfIntersecting,

    /// The candidate overlaps, contains or is contained by a registered polygon
    #[error("polygon overlaps with existing polygon {0}")]
    SpatialConflict(PolygonId),

    /// The operation referenced an identity the registry does not hold
    #[error("polygon {0} not found")]
    NotFound(PolygonId),

    /// An insert reused an identity that is already registered
    #[error("polygon {0} is already registered")]
    DuplicateId(PolygonId),

    /// A ring was completed while no drawing session was active
    #[error("no polygon is being drawn")]
    NotDrawing,

    /// A reshape targeted a polygon that is not selected for editing
    #[error("polygon {0} is not selected for editing")]
    NotEditing(PolygonId),
}

/// A document that could not be read as a polygon collection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The XML itself is broken
    #[error("malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("document root is not a <kml> element")]
    NotKml,

    #[error("placemark {placemark} has no polygon coordinates")]
    MissingCoordinates { placemark: usize },

    #[error("placemark {placemark}: invalid coordinate '{token}'")]
    InvalidCoordinate { placemark: usize, token: String },

    #[error("placemark {placemark}: ring has {count} vertices, at least 3 are required")]
    TooFewVertices { placemark: usize, count: usize },

    #[error("placemark {placemark}: polygon holes are not supported")]
    UnsupportedHoles { placemark: usize },

    #[error("placemark {placemark}: more than one outer boundary")]
    MultipleRings { placemark: usize },
}

/// A polygon collection that cannot become a registry as a whole
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("polygon #{index} ({id}) rejected: {reason}")]
pub struct LoadError {
    /// Position of the offending polygon in the input sequence
    pub index: usize,
    pub id: PolygonId,
    pub reason: ConflictReason,
}

/// Failure while saving or restoring a JSON snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to access snapshot {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot contents are inconsistent: {0}")]
    Invalid(#[from] LoadError),
}
