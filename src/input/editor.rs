use crate::error::{ConflictReason, LoadError, ParseError};
use crate::kml;
use crate::regions::{Point, Polygon, PolygonId, Registry, Ring};
use std::fmt;
use tracing::debug;

/// State machine for the single edit session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditState {
    /// Nothing selected, not drawing
    #[default]
    Idle,
    /// Drawing a new polygon; it has no identity until committed
    Drawing,
    /// A committed polygon is selected for reshaping
    Editing(PolygonId),
}

impl fmt::Display for EditState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditState::Idle => write!(f, "idle"),
            EditState::Drawing => write!(f, "drawing"),
            EditState::Editing(id) => write!(f, "editing {}", id),
        }
    }
}

/// Owns the registry and the edit session, and is the only way a shell
/// changes either. Every method that returns an error leaves both untouched.
#[derive(Debug)]
pub struct Editor {
    state: EditState,
    registry: Registry,
    precision: usize,
}

impl Editor {
    pub fn new(registry: Registry) -> Self {
        Self {
            state: EditState::Idle,
            registry,
            precision: kml::DEFAULT_COORDINATE_PRECISION,
        }
    }

    /// Decimal digits used by [`Editor::export_document`]
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision.max(kml::MIN_COORDINATE_PRECISION);
        self
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    /// The polygon currently being edited, if any
    pub fn selected(&self) -> Option<PolygonId> {
        match self.state {
            EditState::Editing(id) => Some(id),
            _ => None,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn transition(&mut self, next: EditState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Edit state change");
            self.state = next;
        }
    }

    /// Begin drawing a new polygon, dropping any selection
    pub fn start_drawing(&mut self) {
        self.transition(EditState::Drawing);
    }

    /// Commit the drawn ring.
    ///
    /// Whatever the verdict, the drawing session ends. A rejected draft is
    /// discarded and never enters the registry.
    pub fn complete_drawing(&mut self, ring: Ring) -> Result<PolygonId, ConflictReason> {
        if self.state != EditState::Drawing {
            return Err(ConflictReason::NotDrawing);
        }
        self.transition(EditState::Idle);

        let polygon = Polygon::new(ring);
        let id = polygon.id;
        self.registry.try_insert(polygon)?;
        Ok(id)
    }

    /// Toggle the selection of a committed polygon.
    ///
    /// Selecting the polygon already being edited deselects it. Selecting
    /// anything else while a session is active is refused. Returns whether
    /// `id` is selected afterwards.
    pub fn select(&mut self, id: PolygonId) -> bool {
        match self.state {
            EditState::Idle if self.registry.contains(id) => {
                self.transition(EditState::Editing(id));
                true
            }
            EditState::Editing(current) if current == id => {
                self.transition(EditState::Idle);
                false
            }
            _ => {
                debug!(%id, state = ?self.state, "Selection refused");
                false
            }
        }
    }

    /// Select whichever polygon lies under a map position
    pub fn select_at(&mut self, point: Point) -> Option<PolygonId> {
        let id = self.registry.polygon_at(point)?.id;
        self.select(id).then_some(id)
    }

    /// Leave editing without changing the shape
    pub fn deselect(&mut self) {
        if let EditState::Editing(_) = self.state {
            self.transition(EditState::Idle);
        }
    }

    /// Abandon whatever session is active
    pub fn cancel(&mut self) {
        self.transition(EditState::Idle);
    }

    /// Apply a completed reshape gesture to the polygon being edited.
    ///
    /// The edit session ends either way; on rejection the prior shape stays.
    pub fn replace_shape(&mut self, id: PolygonId, ring: Ring) -> Result<(), ConflictReason> {
        if !self.registry.contains(id) {
            return Err(ConflictReason::NotFound(id));
        }
        if self.state != EditState::Editing(id) {
            return Err(ConflictReason::NotEditing(id));
        }
        self.transition(EditState::Idle);
        self.registry.try_replace(id, ring)
    }

    /// Delete a polygon, ending its edit session if it had one
    pub fn delete(&mut self, id: PolygonId) -> bool {
        let removed = self.registry.remove(id);
        if self.state == EditState::Editing(id) {
            self.transition(EditState::Idle);
        }
        removed
    }

    /// Delete the currently selected polygon
    pub fn delete_selected(&mut self) -> Option<PolygonId> {
        let id = self.selected()?;
        self.delete(id).then_some(id)
    }

    pub fn list_all(&self) -> Vec<Polygon> {
        self.registry.all()
    }

    pub fn export_document(&self) -> String {
        kml::export(&self.registry.all(), self.precision)
    }

    /// Parse a document without touching the registry
    pub fn import_document(&self, document: &str) -> Result<Vec<Polygon>, ParseError> {
        kml::import(document)
    }

    /// Replace the whole collection, as a file import does.
    ///
    /// Every polygon must be valid and free of conflicts with the others; the
    /// current registry is kept unless all of them pass. Ends any session.
    pub fn load_polygons(&mut self, polygons: Vec<Polygon>) -> Result<usize, LoadError> {
        let registry = Registry::from_polygons(polygons)?;
        Ok(self.replace_registry(registry))
    }

    /// Swap in a registry that is already known to be consistent, such as a
    /// loaded snapshot. Ends any session and returns the new polygon count.
    pub fn replace_registry(&mut self, registry: Registry) -> usize {
        self.registry = registry;
        self.transition(EditState::Idle);
        self.registry.len()
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(Registry::new())
    }
}
