//! URI and path conversions for drag-save targets.
//!
//! Drop targets hand back either a bare path or a `file://` URI, possibly
//! with a hostname. Only URIs naming this machine (or no machine) convert
//! to local paths; anything else is a remote target and the caller must
//! fall back to sending raw data.

use crate::{HandoffError, Result};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::warn;

/// This machine's hostname, as drop targets would name it.
pub fn hostname() -> String {
    match nix::unistd::gethostname() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(err) => {
            warn!(%err, "hostname lookup failed");
            "localhost".to_string()
        }
    }
}

/// Percent-encode a path for use inside a URI.
///
/// Keeps alphanumerics, `-_.~` and `/`; everything else becomes `%XX`
/// on its UTF-8 bytes.
pub fn escape(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

/// Undo percent-encoding.
pub fn unescape(encoded: &str) -> Result<String> {
    match urlencoding::decode(encoded) {
        Ok(Cow::Borrowed(s)) => Ok(s.to_string()),
        Ok(Cow::Owned(s)) => Ok(s),
        Err(_) => Err(HandoffError::Validation {
            field: "uri".to_string(),
            message: format!("invalid percent-encoding in {encoded:?}"),
        }),
    }
}

/// Extract a local filesystem path from a drop-target URI.
///
/// Accepts bare paths (absolute or explicitly relative) as-is, and
/// `file://` URIs whose host is empty, `localhost`, or this machine.
/// Returns `None` for anything remote.
pub fn uri_to_path(uri: &str) -> Result<Option<PathBuf>> {
    if uri.starts_with('/') || uri.starts_with("./") || uri.starts_with("../") {
        return Ok(Some(PathBuf::from(uri)));
    }

    let Some(rest) = uri.strip_prefix("file://") else {
        return Ok(None);
    };
    let Some(slash) = rest.find('/') else {
        return Ok(None);
    };
    let (host, path) = rest.split_at(slash);
    if !host.is_empty() && host != "localhost" && host != hostname() {
        return Ok(None);
    }
    Ok(Some(PathBuf::from(unescape(path)?)))
}

/// Build a `file://` URI for a local path.
pub fn path_to_uri(path: &Path) -> Result<String> {
    let url = url::Url::from_file_path(path).map_err(|()| HandoffError::Validation {
        field: "path".to_string(),
        message: format!("cannot express {} as a file URI", path.display()),
    })?;
    Ok(url.to_string())
}

/// The display name for a save target: the part after the last slash.
pub fn leafname(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}
