use super::{Point, Polygon, PolygonId, Ring};
use crate::error::{ConflictReason, LoadError, SnapshotError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// All committed polygons, in insertion order.
///
/// No two members ever overlap. Every mutation checks the candidate against
/// the current contents before writing, so callers must not interleave
/// mutations from several threads.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    polygons: Vec<Polygon>,
}

/// On-disk JSON layout
#[derive(Serialize, Deserialize)]
struct Snapshot {
    polygons: Vec<Polygon>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a sequence, inserting each polygon in order.
    ///
    /// Fails on the first polygon that would break the registry invariant.
    pub fn from_polygons(polygons: Vec<Polygon>) -> Result<Self, LoadError> {
        let mut registry = Self::new();
        for (index, polygon) in polygons.into_iter().enumerate() {
            let id = polygon.id;
            registry
                .try_insert(polygon)
                .map_err(|reason| LoadError { index, id, reason })?;
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn get(&self, id: PolygonId) -> Option<&Polygon> {
        self.polygons.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PolygonId) -> bool {
        self.get(id).is_some()
    }

    /// Snapshot of every polygon in insertion order
    pub fn all(&self) -> Vec<Polygon> {
        self.polygons.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Polygon> {
        self.polygons.iter()
    }

    /// Validate a ring against every member except `skip`
    fn check(&self, ring: &Ring, skip: Option<PolygonId>) -> Result<(), ConflictReason> {
        if ring.is_self_intersecting() {
            return Err(ConflictReason::SelfIntersecting);
        }
        let conflict = self
            .polygons
            .iter()
            .filter(|p| Some(p.id) != skip)
            .find(|p| crate::geometry::overlaps(ring, &p.ring));
        match conflict {
            Some(existing) => Err(ConflictReason::SpatialConflict(existing.id)),
            None => Ok(()),
        }
    }

    /// Add a polygon if it is well-formed and conflicts with nothing
    pub fn try_insert(&mut self, polygon: Polygon) -> Result<(), ConflictReason> {
        if let Err(reason) = self.check(&polygon.ring, None) {
            warn!(id = %polygon.id, %reason, "Rejected new polygon");
            return Err(reason);
        }
        if self.contains(polygon.id) {
            warn!(id = %polygon.id, "Rejected duplicate polygon identity");
            return Err(ConflictReason::DuplicateId(polygon.id));
        }

        info!(id = %polygon.id, vertices = polygon.ring.len(), "Polygon committed");
        self.polygons.push(polygon);
        Ok(())
    }

    /// Swap the ring of an existing polygon.
    ///
    /// The polygon's own current shape is left out of the overlap check. On
    /// failure the old ring stays in place.
    pub fn try_replace(&mut self, id: PolygonId, ring: Ring) -> Result<(), ConflictReason> {
        let Some(index) = self.polygons.iter().position(|p| p.id == id) else {
            return Err(ConflictReason::NotFound(id));
        };
        if let Err(reason) = self.check(&ring, Some(id)) {
            warn!(%id, %reason, "Rejected reshape");
            return Err(reason);
        }

        info!(%id, vertices = ring.len(), "Polygon reshaped");
        self.polygons[index].ring = ring;
        Ok(())
    }

    /// Remove a polygon, returning whether it was present
    pub fn remove(&mut self, id: PolygonId) -> bool {
        let before = self.polygons.len();
        self.polygons.retain(|p| p.id != id);
        let removed = self.polygons.len() != before;
        if removed {
            info!(%id, "Polygon deleted");
        } else {
            debug!(%id, "Delete of unknown polygon ignored");
        }
        removed
    }

    /// Find which polygon contains a point (if any)
    pub fn polygon_at(&self, point: Point) -> Option<&Polygon> {
        // Members never overlap, so at most one can contain an interior point
        self.polygons.iter().find(|p| p.contains(point))
    }

    /// Resolve an abbreviated identity, if exactly one polygon matches
    pub fn find_by_prefix(&self, prefix: &str) -> Option<PolygonId> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return None;
        }
        let mut matches = self
            .polygons
            .iter()
            .filter(|p| p.id.to_string().starts_with(&prefix));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Some(only.id),
            _ => None,
        }
    }

    /// Save registry to a JSON file, identities included
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let snapshot = Snapshot {
            polygons: self.all(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(path, json).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), count = self.len(), "Snapshot saved");
        Ok(())
    }

    /// Load registry from a JSON file, re-validating every polygon
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: Snapshot = serde_json::from_str(&json)?;
        let registry = Self::from_polygons(snapshot.polygons)?;
        debug!(path = %path.display(), count = registry.len(), "Snapshot loaded");
        Ok(registry)
    }
}
