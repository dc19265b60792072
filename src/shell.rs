//! Line-protocol front end over the editor
//!
//! Turns parsed commands into editor calls and renders every verdict as a
//! single reply. File access for import, export and snapshots lives here so
//! the engine itself never touches the filesystem for KML.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::control::{parse_command, Command, HELP};
use crate::input::{EditState, Editor};
use crate::regions::{Point, PolygonId, Registry};

/// Reply to one command, and whether the loop should stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub reply: String,
    pub quit: bool,
}

impl Outcome {
    fn reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            quit: false,
        }
    }
}

pub struct Shell {
    editor: Editor,
    snapshot_path: PathBuf,
}

impl Shell {
    pub fn new(editor: Editor, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            editor,
            snapshot_path: snapshot_path.into(),
        }
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    /// Parse and run one command line
    pub fn handle_line(&mut self, line: &str) -> Outcome {
        debug!(line, "Command received");
        match parse_command(line) {
            Ok(command) => self.execute(command),
            Err(e) => Outcome::reply(format!("error: {}", e)),
        }
    }

    /// Map a full id or a unique id prefix to a registered polygon
    fn resolve(&self, text: &str) -> Result<PolygonId, String> {
        let registry = self.editor.registry();
        if let Ok(id) = text.parse::<PolygonId>() {
            if registry.contains(id) {
                return Ok(id);
            }
        }
        registry
            .find_by_prefix(text)
            .ok_or_else(|| format!("error: no polygon matches '{}'", text))
    }

    pub fn execute(&mut self, command: Command) -> Outcome {
        match command {
            Command::New => {
                self.editor.start_drawing();
                Outcome::reply("drawing")
            }
            Command::Complete(ring) => match self.editor.complete_drawing(ring) {
                Ok(id) => Outcome::reply(format!("committed {}", id)),
                Err(reason) => Outcome::reply(format!("rejected: {}", reason)),
            },
            Command::Select(text) => match self.resolve(&text) {
                Ok(id) => Outcome::reply(self.select(id)),
                Err(e) => Outcome::reply(e),
            },
            Command::SelectAt(point) => Outcome::reply(self.select_at(point)),
            Command::Deselect => {
                self.editor.deselect();
                Outcome::reply(self.editor.state().to_string())
            }
            Command::Cancel => {
                self.editor.cancel();
                Outcome::reply(self.editor.state().to_string())
            }
            Command::Reshape(text, ring) => {
                let id = match self.resolve(&text) {
                    Ok(id) => id,
                    Err(e) => return Outcome::reply(e),
                };
                match self.editor.replace_shape(id, ring) {
                    Ok(()) => Outcome::reply(format!("reshaped {}", id)),
                    Err(reason) => Outcome::reply(format!("rejected: {}", reason)),
                }
            }
            Command::Delete(None) => match self.editor.delete_selected() {
                Some(id) => Outcome::reply(format!("deleted {}", id)),
                None => Outcome::reply("warning: select a polygon to delete"),
            },
            Command::Delete(Some(text)) => match self.resolve(&text) {
                Ok(id) if self.editor.delete(id) => Outcome::reply(format!("deleted {}", id)),
                Ok(id) => Outcome::reply(format!("error: polygon {} not found", id)),
                Err(e) => Outcome::reply(e),
            },
            Command::List => Outcome::reply(self.list()),
            Command::Info(text) => match self.resolve(&text) {
                Ok(id) => Outcome::reply(self.info(id)),
                Err(e) => Outcome::reply(e),
            },
            Command::Export(path) => Outcome::reply(self.export(path.as_deref())),
            Command::Import(path) => Outcome::reply(self.import(&path)),
            Command::Save(path) => {
                let path = path.unwrap_or_else(|| self.snapshot_path.clone());
                Outcome::reply(self.save(&path))
            }
            Command::Load(path) => {
                let path = path.unwrap_or_else(|| self.snapshot_path.clone());
                Outcome::reply(self.load(&path))
            }
            Command::Status => Outcome::reply(format!(
                "{} ({} polygons)",
                self.editor.state(),
                self.editor.registry().len()
            )),
            Command::Help => Outcome::reply(HELP),
            Command::Quit => Outcome {
                reply: "bye".to_string(),
                quit: true,
            },
        }
    }

    fn select(&mut self, id: PolygonId) -> String {
        let before = self.editor.selected();
        if self.editor.select(id) {
            format!("editing {}", id)
        } else if before == Some(id) {
            format!("deselected {}", id)
        } else {
            format!("refused: finish the current session first ({})", self.editor.state())
        }
    }

    fn select_at(&mut self, point: Point) -> String {
        let before = self.editor.selected();
        if let Some(id) = self.editor.select_at(point) {
            return format!("editing {}", id);
        }
        match (before, self.editor.selected()) {
            (Some(id), None) => format!("deselected {}", id),
            (None, None) if self.editor.state() == EditState::Idle => {
                format!("no polygon at {}", point)
            }
            _ => format!(
                "refused: no selectable polygon at {} ({})",
                point,
                self.editor.state()
            ),
        }
    }

    fn list(&self) -> String {
        let registry = self.editor.registry();
        if registry.is_empty() {
            return "no polygons".to_string();
        }
        let selected = self.editor.selected();
        let mut out = String::new();
        for (i, polygon) in registry.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let marker = if selected == Some(polygon.id) { " *" } else { "" };
            let _ = write!(
                out,
                "{}. {} ({} vertices){}",
                i + 1,
                polygon.id,
                polygon.ring.len(),
                marker
            );
        }
        out
    }

    fn info(&self, id: PolygonId) -> String {
        let Some(polygon) = self.editor.registry().get(id) else {
            return format!("error: polygon {} not found", id);
        };
        let centroid = polygon
            .centroid()
            .map_or_else(|| "n/a".to_string(), |c| format!("{:.6},{:.6}", c.lat, c.lng));
        format!(
            "{}: {} vertices, area {:.1} m², centroid {}",
            id,
            polygon.ring.len(),
            polygon.area(),
            centroid
        )
    }

    fn export(&self, path: Option<&Path>) -> String {
        if self.editor.registry().is_empty() {
            return "warning: no polygons to export".to_string();
        }
        let document = self.editor.export_document();
        let Some(path) = path else {
            return document;
        };
        match fs::write(path, document) {
            Ok(()) => {
                info!(path = %path.display(), "KML exported");
                format!(
                    "exported {} polygons to {}",
                    self.editor.registry().len(),
                    path.display()
                )
            }
            Err(e) => format!("error: failed to write {}: {}", path.display(), e),
        }
    }

    fn import(&mut self, path: &Path) -> String {
        let document = match fs::read_to_string(path) {
            Ok(document) => document,
            Err(e) => return format!("error: failed to read {}: {}", path.display(), e),
        };
        let polygons = match self.editor.import_document(&document) {
            Ok(polygons) => polygons,
            Err(e) => return format!("error: {}", e),
        };
        match self.editor.load_polygons(polygons) {
            Ok(count) => {
                info!(path = %path.display(), count, "KML imported");
                format!("imported {} polygons", count)
            }
            Err(e) => format!("rejected: {}", e),
        }
    }

    fn save(&self, path: &Path) -> String {
        match self.editor.registry().save(path) {
            Ok(()) => format!(
                "saved {} polygons to {}",
                self.editor.registry().len(),
                path.display()
            ),
            Err(e) => format!("error: {}", e),
        }
    }

    fn load(&mut self, path: &Path) -> String {
        let registry = match Registry::load(path) {
            Ok(registry) => registry,
            Err(e) => return format!("error: {}", e),
        };
        let count = self.editor.replace_registry(registry);
        format!("loaded {} polygons", count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> Shell {
        Shell::new(Editor::default(), "polygons.json")
    }

    fn committed_id(outcome: &Outcome) -> String {
        outcome
            .reply
            .strip_prefix("committed ")
            .unwrap_or_else(|| panic!("not committed: {}", outcome.reply))
            .to_string()
    }

    #[test]
    fn test_draw_and_list() {
        let mut shell = shell();
        assert_eq!(shell.handle_line("new").reply, "drawing");
        let id = committed_id(&shell.handle_line("complete 0,0 0,1 1,1 1,0"));

        let listing = shell.handle_line("list").reply;
        assert_eq!(listing, format!("1. {} (4 vertices)", id));
    }

    #[test]
    fn test_rejections_are_reported() {
        let mut shell = shell();
        shell.handle_line("new");
        let reply = shell.handle_line("complete 0,0 1,1 1,0 0,1").reply;
        assert_eq!(reply, "rejected: invalid polygon: self-intersecting lines detected");

        let reply = shell.handle_line("complete 0,0 0,1 1,1").reply;
        assert_eq!(reply, "rejected: no polygon is being drawn");
    }

    #[test]
    fn test_select_by_prefix_and_toggle() {
        let mut shell = shell();
        shell.handle_line("new");
        let id = committed_id(&shell.handle_line("complete 0,0 0,1 1,1 1,0"));
        let prefix = &id[..6];

        assert_eq!(shell.handle_line(&format!("select {}", prefix)).reply, format!("editing {}", id));
        assert_eq!(shell.handle_line("list").reply, format!("1. {} (4 vertices) *", id));
        assert_eq!(shell.handle_line(&format!("select {}", id)).reply, format!("deselected {}", id));
        assert_eq!(shell.handle_line("select nothing").reply, "error: no polygon matches 'nothing'");
    }

    #[test]
    fn test_pick_and_reshape() {
        let mut shell = shell();
        shell.handle_line("new");
        let id = committed_id(&shell.handle_line("complete 0,0 0,1 1,1 1,0"));

        assert_eq!(shell.handle_line("pick 0.5,0.5").reply, format!("editing {}", id));
        let reply = shell.handle_line(&format!("reshape {} 0,0 0,2 2,2 2,0", id)).reply;
        assert_eq!(reply, format!("reshaped {}", id));
        assert_eq!(shell.handle_line("status").reply, "idle (1 polygons)");
    }

    #[test]
    fn test_pick_toggles_and_reports_misses() {
        let mut shell = shell();
        assert_eq!(shell.handle_line("pick 0.5,0.5").reply, "no polygon at 0.5,0.5");

        shell.handle_line("new");
        let id = committed_id(&shell.handle_line("complete 0,0 0,1 1,1 1,0"));
        assert_eq!(shell.handle_line("pick 0.5,0.5").reply, format!("editing {}", id));
        assert_eq!(shell.handle_line("pick 0.25,0.25").reply, format!("deselected {}", id));

        shell.handle_line("new");
        let reply = shell.handle_line("pick 0.5,0.5").reply;
        assert!(reply.starts_with("refused:"), "{}", reply);
        assert_eq!(shell.editor().state(), EditState::Drawing);
    }

    #[test]
    fn test_delete_selected_warns_without_selection() {
        let mut shell = shell();
        assert_eq!(shell.handle_line("delete").reply, "warning: select a polygon to delete");
    }

    #[test]
    fn test_info_reports_area_and_centroid() {
        let mut shell = shell();
        shell.handle_line("new");
        let id = committed_id(&shell.handle_line("complete 0,0 0,1 1,1 1,0"));
        let reply = shell.handle_line(&format!("info {}", id)).reply;
        assert!(reply.contains("4 vertices"));
        assert!(reply.contains("centroid 0.500000,0.500000"));
    }

    #[test]
    fn test_export_empty_warns() {
        let mut shell = shell();
        assert_eq!(shell.handle_line("export").reply, "warning: no polygons to export");
    }

    #[test]
    fn test_export_import_files() {
        let dir = tempfile::tempdir().unwrap();
        let kml_path = dir.path().join("polygons.kml");

        let mut shell = shell();
        shell.handle_line("new");
        shell.handle_line("complete 0,0 0,1 1,1 1,0");
        shell.handle_line("new");
        shell.handle_line("complete 5,5 5,6 6,6 6,5");

        let reply = shell.handle_line(&format!("export {}", kml_path.display())).reply;
        assert!(reply.starts_with("exported 2 polygons"));

        let mut other = Shell::new(Editor::default(), dir.path().join("snap.json"));
        let reply = other.handle_line(&format!("import {}", kml_path.display())).reply;
        assert_eq!(reply, "imported 2 polygons");
        assert_eq!(other.editor().list_all().len(), 2);
    }

    #[test]
    fn test_import_bad_file_leaves_polygons() {
        let dir = tempfile::tempdir().unwrap();
        let kml_path = dir.path().join("broken.kml");
        fs::write(&kml_path, "<kml><Document><Placemark>").unwrap();

        let mut shell = shell();
        shell.handle_line("new");
        shell.handle_line("complete 0,0 0,1 1,1 1,0");

        let reply = shell.handle_line(&format!("import {}", kml_path.display())).reply;
        assert!(reply.starts_with("error: malformed XML"), "{}", reply);
        assert_eq!(shell.editor().list_all().len(), 1);
    }

    #[test]
    fn test_save_and_load_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("snap.json");

        let mut shell = Shell::new(Editor::default(), &snapshot);
        shell.handle_line("new");
        let id = committed_id(&shell.handle_line("complete 0,0 0,1 1,1 1,0"));
        assert!(shell.handle_line("save").reply.starts_with("saved 1 polygons"));

        let mut restored = Shell::new(Editor::default(), &snapshot);
        assert_eq!(restored.handle_line("load").reply, "loaded 1 polygons");
        let ids: Vec<String> = restored
            .editor()
            .list_all()
            .iter()
            .map(|p| p.id.to_string())
            .collect();
        assert_eq!(ids, vec![id]);
    }

    #[test]
    fn test_quit() {
        let mut shell = shell();
        let outcome = shell.handle_line("quit");
        assert!(outcome.quit);
        assert!(!shell.handle_line("status").quit);
    }

    #[test]
    fn test_parse_errors_become_replies() {
        let mut shell = shell();
        assert_eq!(
            shell.handle_line("frobnicate").reply,
            "error: unknown command 'frobnicate' (try 'help')"
        );
    }
}
