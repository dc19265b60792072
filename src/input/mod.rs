mod editor;

pub use editor::{EditState, Editor};
