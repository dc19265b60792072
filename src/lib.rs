//! Polygon validity and spatial-consistency engine.
//!
//! A registry of non-overlapping, simple polygons on a lat/lng map, a single
//! edit session that mutates it, and KML import and export. Every mutation is
//! checked before it is committed; a rejected change leaves the registry as
//! it was.

pub mod config;
pub mod control;
pub mod error;
pub mod geometry;
pub mod input;
pub mod kml;
pub mod logging;
pub mod mqtt;
pub mod regions;
pub mod shell;

pub use error::{ConflictReason, LoadError, ParseError, SnapshotError};
pub use input::{EditState, Editor};
pub use regions::{Point, Polygon, PolygonId, Registry, Ring};
pub use shell::{Outcome, Shell};
