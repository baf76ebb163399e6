//! Serving side of the property transport.
//!
//! A service claims a name by writing its service window's ID to a
//! property of that name on the root window, and writing the same ID to
//! the service window itself. The self-pointer lets clients tell a live
//! service apart from a stale root entry whose window has been reused.
//!
//! Callers enqueue themselves by appending their window ID to the
//! service window's ID property. For each enqueued window the service
//! reads the request document from the caller's message property and
//! replaces it with the response document.

use super::display::{
    CreatedWindow, Display, PropertyEvent, PropertyMode, PropertyState, PropertyValue, WindowId,
};
use super::envelope;
use crate::config::ProtocolConfig;
use crate::{HandoffError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A callable object exposed over the property transport.
///
/// Only methods named by [`allowed_methods`](XObject::allowed_methods)
/// are reachable; everything else faults with `NoSuchMethod` before any
/// dispatch happens. Returning `Ok(None)` sends boolean true, so void
/// methods still produce a reply the caller can wait on.
#[async_trait]
pub trait XObject: Send + Sync {
    fn allowed_methods(&self) -> &[&str];

    async fn call(&self, method: &str, args: &[Value]) -> Result<Option<Value>>;
}

/// A named service bound to a display, dispatching to registered objects.
pub struct XService {
    display: Arc<dyn Display>,
    name: String,
    window: WindowId,
    events: mpsc::UnboundedReceiver<PropertyEvent>,
    objects: HashMap<String, Arc<dyn XObject>>,
}

impl XService {
    /// Claim `name` on the display and bind the given objects to it.
    ///
    /// Replaces any previous owner of the name.
    pub fn register(
        display: Arc<dyn Display>,
        name: &str,
        objects: HashMap<String, Arc<dyn XObject>>,
    ) -> Result<Self> {
        let CreatedWindow { id, events } = display.create_window(true)?;
        let events = events.ok_or_else(|| HandoffError::Validation {
            field: "window".to_string(),
            message: "service window has no event stream".to_string(),
        })?;

        // Self-pointer first, then the root advertisement, so a client
        // that sees the name never finds a window without the witness.
        display.set_property(
            id,
            name,
            PropertyValue::Windows(vec![id]),
            PropertyMode::Replace,
        )?;
        display.set_property(
            display.root(),
            name,
            PropertyValue::Windows(vec![id]),
            PropertyMode::Replace,
        )?;

        debug!(service = name, window = id, "service registered");
        Ok(Self {
            display,
            name: name.to_string(),
            window: id,
            events,
            objects,
        })
    }

    /// The service window's ID.
    pub fn window(&self) -> WindowId {
        self.window
    }

    /// Process requests until the event stream closes.
    pub async fn serve(mut self) -> Result<()> {
        while let Some(event) = self.events.recv().await {
            if event.atom != ProtocolConfig::ID_PROPERTY
                || event.state != PropertyState::NewValue
            {
                continue;
            }
            // Taking the property atomically drains every caller that
            // appended since the last wakeup.
            let Some(value) = self
                .display
                .take_property(self.window, ProtocolConfig::ID_PROPERTY)?
            else {
                continue;
            };
            let callers = match value.as_windows() {
                Ok(ids) => ids.to_vec(),
                Err(err) => {
                    warn!(%err, "ignoring malformed caller queue");
                    continue;
                }
            };
            for caller in callers {
                self.answer(caller).await;
            }
        }
        debug!(service = %self.name, "service event stream closed");
        Ok(())
    }

    /// Handle one caller window. Callers that vanished mid-call are
    /// logged and skipped; the queue must keep moving.
    async fn answer(&self, caller: WindowId) {
        let request = match self
            .display
            .read_property(caller, ProtocolConfig::MESSAGE_PROPERTY)
        {
            Ok(Some(value)) => value,
            Ok(None) => {
                warn!(caller, "caller enqueued without a request message");
                return;
            }
            Err(err) => {
                warn!(caller, %err, "caller window unreadable");
                return;
            }
        };

        let reply = match request {
            PropertyValue::Bytes(bytes) => self.dispatch(&bytes).await,
            PropertyValue::Windows(_) => {
                encode_error_fault(&malformed_request("request message is not text"))
            }
        };

        let reply = match reply {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(caller, %err, "failed to encode reply");
                return;
            }
        };
        if let Err(err) = self.display.set_property(
            caller,
            ProtocolConfig::MESSAGE_PROPERTY,
            PropertyValue::Bytes(reply),
            PropertyMode::Replace,
        ) {
            warn!(caller, %err, "caller window gone before reply");
        }
    }

    /// Decode, authorize, and run one request. Every failure becomes a
    /// fault document rather than an error.
    async fn dispatch(&self, request: &[u8]) -> Result<Vec<u8>> {
        let (method, params) = match envelope::decode_call(request) {
            Ok(decoded) => decoded,
            Err(err) => return encode_error_fault(&err),
        };

        // The first parameter routes to an object; the rest are the
        // method's own arguments.
        let Some((path_param, args)) = params.split_first() else {
            return encode_error_fault(&HandoffError::NoObjectPath);
        };
        let Some(path) = path_param.as_str() else {
            return encode_error_fault(&HandoffError::NoObjectPath);
        };
        let Some(object) = self.objects.get(path) else {
            return encode_error_fault(&HandoffError::UnknownObject {
                path: path.to_string(),
            });
        };
        if !object.allowed_methods().contains(&method.as_str()) {
            return encode_error_fault(&HandoffError::NoSuchMethod { method });
        }

        debug!(service = %self.name, path, method, "dispatching call");
        match object.call(&method, args).await {
            Ok(Some(value)) => envelope::encode_response(&value),
            Ok(None) => envelope::encode_response(&Value::Bool(true)),
            Err(err) => encode_error_fault(&err),
        }
    }
}

impl Drop for XService {
    fn drop(&mut self) {
        self.display.destroy_window(self.window);
    }
}

fn encode_error_fault(err: &HandoffError) -> Result<Vec<u8>> {
    envelope::encode_fault(&err.to_fault_code(), &err.to_string())
}

fn malformed_request(message: &str) -> HandoffError {
    HandoffError::Xml {
        message: message.to_string(),
    }
}
