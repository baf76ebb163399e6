//! The file-operation object exported over the pipe.
//!
//! Methods take plain JSON arguments and report failures as typed remote
//! errors, so the master can tell a missing file from a permission
//! problem without parsing message strings.

use async_trait::async_trait;
use handoff_core::piperpc::{RemoteError, SlaveDispatch};
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::debug;

pub struct FileOps;

fn io_error(err: std::io::Error, path: &str) -> RemoteError {
    let kind = match err.kind() {
        ErrorKind::NotFound => "NotFound",
        ErrorKind::PermissionDenied => "PermissionDenied",
        ErrorKind::AlreadyExists => "AlreadyExists",
        _ => "IoError",
    };
    RemoteError::new(kind, format!("{path}: {err}"))
}

fn bad_args(message: impl Into<String>) -> RemoteError {
    RemoteError::new("BadArguments", message)
}

fn arg_str<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a str, RemoteError> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| bad_args(format!("argument {index} ({name}) must be a string")))
}

fn arg_u32(args: &[Value], index: usize, name: &str) -> Result<u32, RemoteError> {
    args.get(index)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| bad_args(format!("argument {index} ({name}) must be an integer")))
}

impl FileOps {
    async fn write_file(&self, path: &str, contents: &str) -> Result<Value, RemoteError> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| io_error(e, path))?;
        Ok(json!(contents.len()))
    }

    async fn read_file(&self, path: &str) -> Result<Value, RemoteError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| io_error(e, path))?;
        Ok(Value::String(contents))
    }

    async fn remove(&self, path: &str) -> Result<Value, RemoteError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| io_error(e, path))?;
        if meta.is_dir() {
            tokio::fs::remove_dir(path).await
        } else {
            tokio::fs::remove_file(path).await
        }
        .map_err(|e| io_error(e, path))?;
        Ok(Value::Bool(true))
    }

    async fn chmod(&self, path: &str, mode: u32) -> Result<Value, RemoteError> {
        tokio::fs::set_permissions(Path::new(path), std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| io_error(e, path))?;
        Ok(Value::Bool(true))
    }
}

#[async_trait]
impl SlaveDispatch for FileOps {
    async fn dispatch(&self, method: &str, args: &[Value]) -> Result<Value, RemoteError> {
        debug!(method, args = args.len(), "request");
        match method {
            "ping" => Ok(Value::String("pong".to_string())),
            "write_file" => {
                let path = arg_str(args, 0, "path")?;
                let contents = arg_str(args, 1, "contents")?;
                self.write_file(path, contents).await
            }
            "read_file" => self.read_file(arg_str(args, 0, "path")?).await,
            "remove" => self.remove(arg_str(args, 0, "path")?).await,
            "chmod" => {
                let path = arg_str(args, 0, "path")?;
                let mode = arg_u32(args, 1, "mode")?;
                self.chmod(path, mode).await
            }
            other => Err(RemoteError::new(
                "NoSuchMethod",
                format!("no method {other}"),
            )),
        }
    }
}
