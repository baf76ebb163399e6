//! The drag-save state machine (XdndDirectSave0 source side).
//!
//! A [`SaveSource`] wraps a [`Saveable`] document for one save dialog.
//! During a drag it advertises targets in precedence order, answers the
//! target's data request, and keeps the dialog honest: insensitive while
//! a save is in flight, closed once the data is delivered, and at most
//! one error alert per attempt.
//!
//! The XDS handshake runs over the drag-source window's
//! `XdndDirectSave0` property. We write the proposed leafname before the
//! drag; a direct-save-capable target replaces it with the full
//! destination URI and asks for the `XdndDirectSave0` target; our answer
//! is a single status byte. The property is cleared on every exit path.

use super::uri;
use super::write::{self, TmpDisposition};
use crate::config::XdsConfig;
use crate::error::SaveAbortReason;
use crate::xrpc::display::{Display, PropertyMode, PropertyValue, WindowId};
use crate::{HandoffError, Result};
use bitflags::bitflags;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

bitflags! {
    /// How a document can deliver its bytes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SaveCapability: u8 {
        /// Can stream straight to a local file (direct save).
        const SAVE_TO_FILE = 1 << 0;
        /// Can hand the bytes over as selection data.
        const SAVE_TO_SELECTION = 1 << 1;
    }
}

/// A document that can be dragged out of a save dialog.
pub trait Saveable: Send + Sync {
    /// The suggested destination, shown as the default name. Often just
    /// a leafname like `Unnamed`.
    fn initial_uri(&self) -> &str;

    fn mime_type(&self) -> &str;

    fn capabilities(&self) -> SaveCapability;

    /// Produce the document's bytes.
    fn save_to_stream(&self, out: &mut dyn Write) -> Result<()>;

    /// The same bytes as selection data.
    fn save_to_selection(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.save_to_stream(&mut buf)?;
        Ok(buf)
    }

    /// Final file permissions, when the document insists on specific
    /// ones (an executable script, say).
    fn explicit_mode(&self) -> Option<u32> {
        None
    }

    /// Called when the user aborts a save in flight.
    fn cancel_save(&self) {}
}

/// The questions a save may need to ask the user.
pub trait SavePrompter: Send + Sync {
    fn confirm_overwrite(&self, path: &Path) -> bool;
    fn confirm_delete_tmp(&self, path: &Path) -> bool;
    fn report_error(&self, message: &str);
}

/// The dialog hosting the drag source.
pub trait SaveDialog: Send + Sync {
    /// Lock or unlock the dialog's controls.
    fn set_sensitive(&self, sensitive: bool);

    /// The save went through; dismiss the dialog.
    fn close(&self);

    /// A file appeared or changed at `path`; let the ambient file
    /// manager know.
    fn examine(&self, _path: &Path) {}
}

/// The status byte sent back on the XDS target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XdsReply {
    /// `S`: saved to the target's URI.
    Saved,
    /// `F`: not a local path; the target must fetch the raw data itself.
    Remote,
    /// `E`: the save failed.
    Error,
}

impl XdsReply {
    pub fn byte(self) -> u8 {
        match self {
            XdsReply::Saved => b'S',
            XdsReply::Remote => b'F',
            XdsReply::Error => b'E',
        }
    }
}

/// What to hand the drop target for one data request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragData {
    /// Reply on the `XdndDirectSave0` target.
    Xds(XdsReply),
    /// Raw bytes on a MIME or octet-stream target.
    Selection(Vec<u8>),
}

struct Session {
    in_progress: bool,
    destroy_on_end: bool,
    data_sent: bool,
    using_xds: bool,
    alert_shown: bool,
}

/// A drag source bound to one document, one dialog, and one window.
pub struct SaveSource {
    doc: Arc<dyn Saveable>,
    display: Arc<dyn Display>,
    window: WindowId,
    prompter: Arc<dyn SavePrompter>,
    dialog: Arc<dyn SaveDialog>,
    session: Session,
}

impl SaveSource {
    /// Bind `doc` to the dialog's drag-source window.
    ///
    /// A document with no capabilities cannot be saved at all, so
    /// construction fails rather than producing a source with no
    /// targets.
    pub fn new(
        doc: Arc<dyn Saveable>,
        display: Arc<dyn Display>,
        window: WindowId,
        prompter: Arc<dyn SavePrompter>,
        dialog: Arc<dyn SaveDialog>,
    ) -> Result<Self> {
        if doc.capabilities().is_empty() {
            return Err(HandoffError::Validation {
                field: "capabilities".to_string(),
                message: "document can neither save to file nor to selection".to_string(),
            });
        }
        Ok(Self {
            doc,
            display,
            window,
            prompter,
            dialog,
            session: Session {
                in_progress: false,
                destroy_on_end: false,
                data_sent: false,
                using_xds: false,
                alert_shown: false,
            },
        })
    }

    /// Drag targets in precedence order, filtered by capability.
    pub fn drag_targets(&self) -> Vec<String> {
        let caps = self.doc.capabilities();
        let mut targets = Vec::new();
        if caps.contains(SaveCapability::SAVE_TO_FILE) {
            targets.push(XdsConfig::PROPERTY.to_string());
        }
        if caps.contains(SaveCapability::SAVE_TO_SELECTION) {
            targets.push(self.doc.mime_type().to_string());
            targets.push(XdsConfig::OCTET_STREAM.to_string());
        }
        targets
    }

    /// The drag started: propose our leafname to whoever we land on.
    pub fn drag_begin(&mut self) -> Result<()> {
        self.session = Session {
            in_progress: true,
            destroy_on_end: false,
            data_sent: false,
            using_xds: false,
            alert_shown: false,
        };
        let leaf = uri::leafname(self.doc.initial_uri());
        debug!(leafname = leaf, "drag started");
        self.display.set_property(
            self.window,
            XdsConfig::PROPERTY,
            PropertyValue::Bytes(leaf.as_bytes().to_vec()),
            PropertyMode::Replace,
        )
    }

    /// The drop target asked for data on `target`.
    pub fn drag_data_get(&mut self, target: &str) -> Result<DragData> {
        self.session.alert_shown = false;
        if target == XdsConfig::PROPERTY {
            // Never advertised to targets that cannot save to a file; a
            // target asking anyway gets a failure byte, not a save attempt.
            if !self.doc.capabilities().contains(SaveCapability::SAVE_TO_FILE) {
                warn!("direct-save requested but the document cannot save to a file");
                return Ok(DragData::Xds(XdsReply::Error));
            }
            self.session.using_xds = true;
            return Ok(DragData::Xds(self.direct_save()));
        }
        if target == self.doc.mime_type() || target == XdsConfig::OCTET_STREAM {
            let bytes = match self.doc.save_to_selection() {
                Ok(bytes) => bytes,
                Err(err) => {
                    self.report(&err);
                    return Err(err);
                }
            };
            self.set_saved();
            return Ok(DragData::Selection(bytes));
        }
        Err(HandoffError::Validation {
            field: "target".to_string(),
            message: format!("unknown drag target {target:?}"),
        })
    }

    /// The drag finished, successfully or not.
    pub fn drag_end(&mut self) {
        self.session.in_progress = false;
        if let Err(err) = self
            .display
            .delete_property(self.window, XdsConfig::PROPERTY)
        {
            warn!(%err, "could not clear direct-save property");
        }
        if self.session.destroy_on_end {
            self.dialog.close();
        }
    }

    /// The user backed out; give the document a chance to stop work.
    pub fn cancel(&self) {
        self.doc.cancel_save();
    }

    /// Run the direct-save handshake. The property is consumed up front
    /// so every branch leaves it clear.
    fn direct_save(&mut self) -> XdsReply {
        let property = match self
            .display
            .take_property(self.window, XdsConfig::PROPERTY)
        {
            Ok(value) => value,
            Err(err) => {
                self.report(&err);
                return XdsReply::Error;
            }
        };
        let uri = match property.as_ref().map(PropertyValue::as_text) {
            Some(Ok(uri)) => uri.to_string(),
            Some(Err(err)) => {
                self.report(&err);
                return XdsReply::Error;
            }
            None => {
                let err = HandoffError::SaveAborted {
                    reason: SaveAbortReason::XdsPropertyMissing,
                };
                self.report(&err);
                return XdsReply::Error;
            }
        };

        let path = match uri::uri_to_path(&uri) {
            Ok(Some(path)) => path,
            // Not a local path: decline and let the target pull the raw
            // data through a selection target instead.
            Ok(None) => {
                debug!(%uri, "target is remote");
                return XdsReply::Remote;
            }
            Err(err) => {
                self.report(&err);
                return XdsReply::Error;
            }
        };

        match self.save_local(&path) {
            Ok(()) => {
                self.set_saved();
                self.dialog.examine(&path);
                XdsReply::Saved
            }
            Err(err) => {
                self.report(&err);
                XdsReply::Error
            }
        }
    }

    fn save_local(&self, path: &Path) -> Result<()> {
        if path_changed(self.doc.initial_uri(), path)
            && path.exists()
            && !self.prompter.confirm_overwrite(path)
        {
            return Err(HandoffError::SaveAborted {
                reason: SaveAbortReason::OverwriteDeclined,
            });
        }

        self.dialog.set_sensitive(false);
        let doc = &self.doc;
        let result = write::save_atomically(
            path,
            doc.explicit_mode(),
            &PrompterTmp(self.prompter.as_ref()),
            |out| doc.save_to_stream(out),
        );
        self.dialog.set_sensitive(true);
        result
    }

    fn set_saved(&mut self) {
        self.session.data_sent = true;
        if self.session.in_progress {
            self.session.destroy_on_end = true;
        } else {
            self.dialog.close();
        }
    }

    /// One alert per attempt; user-driven aborts are silent.
    fn report(&mut self, err: &HandoffError) {
        if let HandoffError::SaveAborted { reason } = err {
            match reason {
                SaveAbortReason::UserCancelled | SaveAbortReason::OverwriteDeclined => {
                    debug!(%reason, "save abandoned without alert");
                    return;
                }
                _ => {}
            }
        }
        if self.session.alert_shown {
            return;
        }
        self.session.alert_shown = true;
        self.prompter.report_error(&err.to_string());
    }
}

struct PrompterTmp<'a>(&'a dyn SavePrompter);

impl TmpDisposition for PrompterTmp<'_> {
    fn confirm_delete_tmp(&self, path: &Path) -> bool {
        self.0.confirm_delete_tmp(path)
    }
}

/// True when `chosen` names a different file than the dialog's initial
/// URI. A bare initial leafname never matches, so a save over any
/// existing file then needs confirmation.
fn path_changed(initial_uri: &str, chosen: &Path) -> bool {
    match uri::uri_to_path(initial_uri) {
        Ok(Some(initial)) => initial != PathBuf::from(chosen),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xrpc::display::MemDisplay;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Doc {
        name: String,
        bytes: Vec<u8>,
        caps: SaveCapability,
        fail_write: bool,
        mode: Option<u32>,
    }

    impl Doc {
        fn new(caps: SaveCapability) -> Self {
            Self {
                name: "Unnamed".to_string(),
                bytes: b"document body".to_vec(),
                caps,
                fail_write: false,
                mode: None,
            }
        }
    }

    impl Saveable for Doc {
        fn initial_uri(&self) -> &str {
            &self.name
        }
        fn mime_type(&self) -> &str {
            "text/plain"
        }
        fn capabilities(&self) -> SaveCapability {
            self.caps
        }
        fn save_to_stream(&self, out: &mut dyn Write) -> Result<()> {
            if self.fail_write {
                return Err(HandoffError::SaveAborted {
                    reason: SaveAbortReason::WriteFailed("stream died".to_string()),
                });
            }
            out.write_all(&self.bytes).map_err(HandoffError::from)
        }
        fn explicit_mode(&self) -> Option<u32> {
            self.mode
        }
    }

    #[derive(Default)]
    struct Prompter {
        overwrite_ok: bool,
        errors: Mutex<Vec<String>>,
    }

    impl SavePrompter for Prompter {
        fn confirm_overwrite(&self, _: &Path) -> bool {
            self.overwrite_ok
        }
        fn confirm_delete_tmp(&self, _: &Path) -> bool {
            true
        }
        fn report_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    #[derive(Default)]
    struct Dialog {
        sensitivity: Mutex<Vec<bool>>,
        closed: Mutex<bool>,
        examined: Mutex<Vec<PathBuf>>,
    }

    impl SaveDialog for Dialog {
        fn set_sensitive(&self, sensitive: bool) {
            self.sensitivity.lock().unwrap().push(sensitive);
        }
        fn close(&self) {
            *self.closed.lock().unwrap() = true;
        }
        fn examine(&self, path: &Path) {
            self.examined.lock().unwrap().push(path.to_path_buf());
        }
    }

    struct Rig {
        display: MemDisplay,
        window: WindowId,
        prompter: Arc<Prompter>,
        dialog: Arc<Dialog>,
        source: SaveSource,
    }

    fn rig_with(doc: Doc, prompter: Prompter) -> Rig {
        let display = MemDisplay::new();
        let window = display.create_window(false).unwrap().id;
        let prompter = Arc::new(prompter);
        let dialog = Arc::new(Dialog::default());
        let source = SaveSource::new(
            Arc::new(doc),
            Arc::new(display.clone()),
            window,
            prompter.clone(),
            dialog.clone(),
        )
        .unwrap();
        Rig {
            display,
            window,
            prompter,
            dialog,
            source,
        }
    }

    fn rig(doc: Doc) -> Rig {
        rig_with(doc, Prompter::default())
    }

    /// The drop target's half of the handshake: replace the leafname
    /// with the destination URI.
    fn target_sets_uri(rig: &Rig, uri: &str) {
        rig.display
            .set_property(
                rig.window,
                XdsConfig::PROPERTY,
                PropertyValue::Bytes(uri.as_bytes().to_vec()),
                PropertyMode::Replace,
            )
            .unwrap();
    }

    fn xds_property(rig: &Rig) -> Option<PropertyValue> {
        rig.display
            .read_property(rig.window, XdsConfig::PROPERTY)
            .unwrap()
    }

    #[test]
    fn test_no_capabilities_rejected() {
        let display = MemDisplay::new();
        let window = display.create_window(false).unwrap().id;
        let err = SaveSource::new(
            Arc::new(Doc::new(SaveCapability::empty())),
            Arc::new(display),
            window,
            Arc::new(Prompter::default()),
            Arc::new(Dialog::default()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, HandoffError::Validation { .. }));
    }

    #[test]
    fn test_target_precedence_full_capability() {
        let r = rig(Doc::new(
            SaveCapability::SAVE_TO_FILE | SaveCapability::SAVE_TO_SELECTION,
        ));
        assert_eq!(
            r.source.drag_targets(),
            vec!["XdndDirectSave0", "text/plain", "application/octet-stream"]
        );
    }

    #[test]
    fn test_target_precedence_file_only() {
        let r = rig(Doc::new(SaveCapability::SAVE_TO_FILE));
        assert_eq!(r.source.drag_targets(), vec!["XdndDirectSave0"]);
    }

    #[test]
    fn test_target_precedence_selection_only() {
        let r = rig(Doc::new(SaveCapability::SAVE_TO_SELECTION));
        assert_eq!(
            r.source.drag_targets(),
            vec!["text/plain", "application/octet-stream"]
        );
    }

    #[test]
    fn test_drag_begin_advertises_leafname() {
        let mut doc = Doc::new(SaveCapability::SAVE_TO_FILE);
        doc.name = "file:///home/user/report.odt".to_string();
        let mut r = rig(doc);
        r.source.drag_begin().unwrap();
        let value = xds_property(&r).unwrap();
        assert_eq!(value.as_text().unwrap(), "report.odt");
    }

    #[test]
    fn test_direct_save_happy_path() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("saved.txt");

        let mut r = rig(Doc::new(SaveCapability::SAVE_TO_FILE));
        r.source.drag_begin().unwrap();
        target_sets_uri(&r, &format!("file://{}", dest.display()));

        let data = r.source.drag_data_get("XdndDirectSave0").unwrap();
        assert_eq!(data, DragData::Xds(XdsReply::Saved));
        assert_eq!(XdsReply::Saved.byte(), b'S');
        assert_eq!(fs::read(&dest).unwrap(), b"document body");
        assert!(xds_property(&r).is_none());
        assert_eq!(*r.dialog.sensitivity.lock().unwrap(), vec![false, true]);
        assert_eq!(*r.dialog.examined.lock().unwrap(), vec![dest]);

        // The dialog stays up until the drag is over.
        assert!(!*r.dialog.closed.lock().unwrap());
        r.source.drag_end();
        assert!(*r.dialog.closed.lock().unwrap());
    }

    #[test]
    fn test_remote_target_declines_without_saving() {
        let mut r = rig(Doc::new(SaveCapability::SAVE_TO_FILE));
        r.source.drag_begin().unwrap();
        target_sets_uri(&r, "file://elsewhere.example/srv/out.txt");

        let data = r.source.drag_data_get("XdndDirectSave0").unwrap();
        assert_eq!(data, DragData::Xds(XdsReply::Remote));
        assert!(xds_property(&r).is_none());
        assert!(r.prompter.errors.lock().unwrap().is_empty());
        r.source.drag_end();
        assert!(!*r.dialog.closed.lock().unwrap());
    }

    #[test]
    fn test_missing_property_is_an_error() {
        let mut r = rig(Doc::new(SaveCapability::SAVE_TO_FILE));
        r.source.drag_begin().unwrap();
        // The target never wrote the URI back.
        r.display
            .delete_property(r.window, XdsConfig::PROPERTY)
            .unwrap();

        let data = r.source.drag_data_get("XdndDirectSave0").unwrap();
        assert_eq!(data, DragData::Xds(XdsReply::Error));
        assert_eq!(r.prompter.errors.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_overwrite_declined_leaves_file_and_stays_quiet() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("existing.txt");
        fs::write(&dest, b"keep me").unwrap();

        let mut r = rig(Doc::new(SaveCapability::SAVE_TO_FILE));
        r.source.drag_begin().unwrap();
        target_sets_uri(&r, &format!("file://{}", dest.display()));

        let data = r.source.drag_data_get("XdndDirectSave0").unwrap();
        assert_eq!(data, DragData::Xds(XdsReply::Error));
        assert_eq!(fs::read(&dest).unwrap(), b"keep me");
        assert!(r.prompter.errors.lock().unwrap().is_empty());
        assert!(xds_property(&r).is_none());
    }

    #[test]
    fn test_overwrite_confirmed_replaces_file() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("existing.txt");
        fs::write(&dest, b"old").unwrap();

        let prompter = Prompter {
            overwrite_ok: true,
            ..Prompter::default()
        };
        let mut r = rig_with(Doc::new(SaveCapability::SAVE_TO_FILE), prompter);
        r.source.drag_begin().unwrap();
        target_sets_uri(&r, &format!("file://{}", dest.display()));

        let data = r.source.drag_data_get("XdndDirectSave0").unwrap();
        assert_eq!(data, DragData::Xds(XdsReply::Saved));
        assert_eq!(fs::read(&dest).unwrap(), b"document body");
    }

    #[test]
    fn test_write_failure_alerts_once_and_reenables_dialog() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.txt");

        let mut doc = Doc::new(SaveCapability::SAVE_TO_FILE);
        doc.fail_write = true;
        let mut r = rig(doc);
        r.source.drag_begin().unwrap();
        target_sets_uri(&r, &format!("file://{}", dest.display()));

        let data = r.source.drag_data_get("XdndDirectSave0").unwrap();
        assert_eq!(data, DragData::Xds(XdsReply::Error));
        assert!(!dest.exists());
        assert_eq!(r.prompter.errors.lock().unwrap().len(), 1);
        assert_eq!(*r.dialog.sensitivity.lock().unwrap(), vec![false, true]);
    }

    #[test]
    fn test_user_cancellation_is_silent() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.txt");

        struct Cancelling {
            token: crate::cancel::CancellationToken,
        }
        impl Saveable for Cancelling {
            fn initial_uri(&self) -> &str {
                "Unnamed"
            }
            fn mime_type(&self) -> &str {
                "text/plain"
            }
            fn capabilities(&self) -> SaveCapability {
                SaveCapability::SAVE_TO_FILE
            }
            fn save_to_stream(&self, out: &mut dyn Write) -> Result<()> {
                // The user hits cancel after the first chunk.
                out.write_all(b"chunk").map_err(HandoffError::from)?;
                self.token.cancel();
                self.token.check()?;
                Ok(())
            }
            fn cancel_save(&self) {
                self.token.cancel();
            }
        }

        let display = MemDisplay::new();
        let window = display.create_window(false).unwrap().id;
        let prompter = Arc::new(Prompter::default());
        let dialog = Arc::new(Dialog::default());
        let mut source = SaveSource::new(
            Arc::new(Cancelling {
                token: crate::cancel::CancellationToken::new(),
            }),
            Arc::new(display.clone()),
            window,
            prompter.clone(),
            dialog,
        )
        .unwrap();
        source.drag_begin().unwrap();
        display
            .set_property(
                window,
                XdsConfig::PROPERTY,
                PropertyValue::Bytes(format!("file://{}", dest.display()).into_bytes()),
                PropertyMode::Replace,
            )
            .unwrap();

        let data = source.drag_data_get("XdndDirectSave0").unwrap();
        assert_eq!(data, DragData::Xds(XdsReply::Error));
        assert!(prompter.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_selection_save_delivers_bytes_and_closes() {
        let mut r = rig(Doc::new(SaveCapability::SAVE_TO_SELECTION));
        r.source.drag_begin().unwrap();

        let data = r.source.drag_data_get("text/plain").unwrap();
        assert_eq!(data, DragData::Selection(b"document body".to_vec()));

        r.source.drag_end();
        assert!(*r.dialog.closed.lock().unwrap());
        assert!(xds_property(&r).is_none());
    }

    #[test]
    fn test_octet_stream_target_accepted() {
        let mut r = rig(Doc::new(SaveCapability::SAVE_TO_SELECTION));
        r.source.drag_begin().unwrap();
        let data = r.source.drag_data_get("application/octet-stream").unwrap();
        assert_eq!(data, DragData::Selection(b"document body".to_vec()));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let mut r = rig(Doc::new(SaveCapability::SAVE_TO_SELECTION));
        r.source.drag_begin().unwrap();
        assert!(r.source.drag_data_get("image/png").is_err());
    }

    // A target that asks for direct save against a selection-only document
    // gets the failure byte and nothing touches the filesystem.
    #[test]
    fn test_direct_save_refused_without_file_capability() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("refused.txt");

        let mut r = rig(Doc::new(SaveCapability::SAVE_TO_SELECTION));
        r.source.drag_begin().unwrap();
        target_sets_uri(&r, &format!("file://{}", dest.display()));

        let data = r.source.drag_data_get("XdndDirectSave0").unwrap();
        assert_eq!(data, DragData::Xds(XdsReply::Error));
        assert!(!dest.exists());
        assert!(r.prompter.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_explicit_mode_reaches_the_file() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("run.sh");

        let mut doc = Doc::new(SaveCapability::SAVE_TO_FILE);
        doc.mode = Some(0o700);
        let mut r = rig(doc);
        r.source.drag_begin().unwrap();
        target_sets_uri(&r, &format!("file://{}", dest.display()));

        r.source.drag_data_get("XdndDirectSave0").unwrap();
        let mode = fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
    }
}
