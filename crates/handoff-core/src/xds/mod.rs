//! XDND Direct Save: saving by dragging out of a dialog.
//!
//! [`engine`] holds the drag-source state machine, [`uri`] the URI/path
//! rules for deciding whether a drop target is local, and [`write`] the
//! atomic file write underneath a successful handshake.

pub mod engine;
pub mod uri;
pub mod write;

pub use engine::{
    DragData, SaveCapability, SaveDialog, SavePrompter, SaveSource, Saveable, XdsReply,
};
pub use write::TmpDisposition;
