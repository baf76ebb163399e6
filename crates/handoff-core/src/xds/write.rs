//! Atomic file writes for drag-saves.
//!
//! The document's bytes go to a randomly named sibling first and the
//! sibling is renamed over the destination, so a failed save never
//! leaves a half-written file under the target name. When the sibling
//! cannot be created (the directory may allow replacing the file but not
//! creating in it) the write falls back to the destination directly.

use crate::config::XdsConfig;
use crate::{HandoffError, Result};
use std::fs::{self, OpenOptions, Permissions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// What to do with a partially written temp file after a failure.
pub trait TmpDisposition {
    /// True to delete the non-empty temp file, false to keep it.
    fn confirm_delete_tmp(&self, path: &Path) -> bool;
}

/// The process umask, read once. `umask(2)` can only be read by writing,
/// so the value is cached to keep concurrent saves from racing the
/// read-restore pair.
pub fn process_umask() -> u32 {
    static UMASK: OnceLock<u32> = OnceLock::new();
    *UMASK.get_or_init(|| {
        let current = nix::sys::stat::umask(nix::sys::stat::Mode::empty());
        nix::sys::stat::umask(current);
        current.bits() as u32
    })
}

fn tmp_sibling(dest: &Path) -> PathBuf {
    let name = format!("{}{}", XdsConfig::TMP_PREFIX, Uuid::new_v4().simple());
    match dest.parent() {
        Some(dir) if dir != Path::new("") => dir.join(name),
        _ => PathBuf::from(name),
    }
}

fn apply_permissions(dest: &Path, explicit_mode: Option<u32>) {
    let mode = explicit_mode.unwrap_or(0o666 & !process_umask());
    // The file exists under its final name; permission trouble is not
    // worth failing the save over.
    if let Err(err) = fs::set_permissions(dest, Permissions::from_mode(mode)) {
        warn!(path = %dest.display(), mode = %format_args!("{mode:o}"), %err, "could not set permissions");
    }
}

/// Write `dest` atomically, producing the bytes through `produce`.
///
/// `explicit_mode` overrides the default final permissions of
/// `0666 & !umask`. After a mid-write failure the temp file is removed
/// if empty, otherwise `tmp` decides whether the partial data survives.
pub fn save_atomically(
    dest: &Path,
    explicit_mode: Option<u32>,
    tmp: &dyn TmpDisposition,
    produce: impl FnOnce(&mut dyn Write) -> Result<()>,
) -> Result<()> {
    let tmp_path = tmp_sibling(dest);
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(&tmp_path);

    let mut file = match file {
        Ok(file) => file,
        Err(err) => {
            debug!(path = %tmp_path.display(), %err, "temp sibling refused, writing destination directly");
            return save_directly(dest, explicit_mode, produce);
        }
    };

    let outcome = produce(&mut file).and_then(|()| {
        file.flush()
            .map_err(|e| HandoffError::io_with_path(e, &tmp_path))
    });
    drop(file);

    if let Err(err) = outcome {
        dispose_of_tmp(&tmp_path, tmp);
        return Err(err);
    }

    fs::rename(&tmp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        HandoffError::io_with_path(e, dest)
    })?;
    apply_permissions(dest, explicit_mode);
    debug!(path = %dest.display(), "saved");
    Ok(())
}

fn save_directly(
    dest: &Path,
    explicit_mode: Option<u32>,
    produce: impl FnOnce(&mut dyn Write) -> Result<()>,
) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dest)
        .map_err(|e| HandoffError::io_with_path(e, dest))?;
    produce(&mut file)?;
    file.flush().map_err(|e| HandoffError::io_with_path(e, dest))?;
    drop(file);
    apply_permissions(dest, explicit_mode);
    Ok(())
}

fn dispose_of_tmp(tmp_path: &Path, tmp: &dyn TmpDisposition) {
    let empty = fs::metadata(tmp_path).map(|m| m.len() == 0).unwrap_or(true);
    if empty || tmp.confirm_delete_tmp(tmp_path) {
        if let Err(err) = fs::remove_file(tmp_path) {
            warn!(path = %tmp_path.display(), %err, "could not remove temp file");
        }
    } else {
        debug!(path = %tmp_path.display(), "keeping partial temp file");
    }
}
