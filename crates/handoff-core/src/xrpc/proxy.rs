//! Calling side of the property transport.
//!
//! A proxy resolves a service name through the root window, checks the
//! liveness witness on the advertised window, and then issues calls.
//! Each call gets its own short-lived window: the request document goes
//! on that window, the window ID is appended to the service's queue, and
//! the reply arrives as a replacement of the same property.

use super::display::{
    CreatedWindow, Display, PropertyEvent, PropertyMode, PropertyState, PropertyValue, WindowId,
};
use super::envelope::{self, Response};
use crate::config::ProtocolConfig;
use crate::{HandoffError, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A client handle on a named service.
pub struct XProxy {
    display: Arc<dyn Display>,
    service_name: String,
    service_window: WindowId,
}

impl XProxy {
    /// Resolve `name` and verify the advertised window is really the
    /// service's own. A reused window ID fails the witness check and the
    /// name counts as unclaimed.
    pub fn connect(display: Arc<dyn Display>, name: &str) -> Result<Self> {
        let not_found = || HandoffError::NoSuchService {
            name: name.to_string(),
        };

        let advertised = display
            .read_property(display.root(), name)?
            .ok_or_else(not_found)?;
        let candidate = *advertised.as_windows()?.first().ok_or_else(not_found)?;

        let witness = display
            .read_property(candidate, name)
            .map_err(|_| not_found())?
            .ok_or_else(not_found)?;
        if witness.as_windows()? != [candidate] {
            return Err(not_found());
        }

        debug!(service = name, window = candidate, "service resolved");
        Ok(Self {
            display,
            service_name: name.to_string(),
            service_window: candidate,
        })
    }

    /// The resolved service window.
    pub fn service_window(&self) -> WindowId {
        self.service_window
    }

    /// Send a call and return a handle for collecting the reply. The
    /// object path travels as the first call parameter.
    pub fn call(&self, path: &str, method: &str, args: &[Value]) -> Result<PendingCall> {
        let mut params = Vec::with_capacity(args.len() + 1);
        params.push(Value::String(path.to_string()));
        params.extend_from_slice(args);
        let request = envelope::encode_call(method, &params)?;

        let CreatedWindow { id, events } = self.display.create_window(true)?;
        let events = events.ok_or_else(|| HandoffError::Validation {
            field: "window".to_string(),
            message: "call window has no event stream".to_string(),
        })?;

        let outcome = self
            .display
            .set_property(
                id,
                ProtocolConfig::MESSAGE_PROPERTY,
                PropertyValue::Bytes(request),
                PropertyMode::Replace,
            )
            .and_then(|()| {
                self.display.set_property(
                    self.service_window,
                    ProtocolConfig::ID_PROPERTY,
                    PropertyValue::Windows(vec![id]),
                    PropertyMode::Append,
                )
            });
        if let Err(err) = outcome {
            self.display.destroy_window(id);
            // The service window going away means the service is gone.
            if matches!(err, HandoffError::WindowGone { .. }) {
                return Err(HandoffError::NoSuchService {
                    name: self.service_name.clone(),
                });
            }
            return Err(err);
        }

        debug!(service = %self.service_name, method, window = id, "call sent");
        Ok(PendingCall {
            display: Arc::clone(&self.display),
            window: id,
            events,
            // The first message event is our own request write.
            ignore_next: true,
            done: false,
        })
    }
}

/// An in-flight call. Await [`wait`](PendingCall::wait) for the reply;
/// dropping it abandons the call and releases its window.
pub struct PendingCall {
    display: Arc<dyn Display>,
    window: WindowId,
    events: mpsc::UnboundedReceiver<PropertyEvent>,
    ignore_next: bool,
    done: bool,
}

impl PendingCall {
    /// Block until the service replaces the request with a reply.
    ///
    /// Faults come back as [`HandoffError::RemoteFault`] or the specific
    /// error variant the fault code names.
    pub async fn wait(mut self) -> Result<Value> {
        loop {
            let event = self
                .events
                .recv()
                .await
                .ok_or(HandoffError::LostConnection)?;
            if event.atom != ProtocolConfig::MESSAGE_PROPERTY
                || event.state != PropertyState::NewValue
            {
                continue;
            }
            if self.ignore_next {
                self.ignore_next = false;
                continue;
            }
            break;
        }

        let reply = self
            .display
            .take_property(self.window, ProtocolConfig::MESSAGE_PROPERTY)?
            .ok_or_else(|| HandoffError::Validation {
                field: "reply".to_string(),
                message: "reply property vanished before it was read".to_string(),
            })?;
        let bytes = match reply {
            PropertyValue::Bytes(bytes) => bytes,
            PropertyValue::Windows(_) => {
                return Err(HandoffError::Xml {
                    message: "reply message is not text".to_string(),
                })
            }
        };

        self.display.destroy_window(self.window);
        self.done = true;

        match envelope::decode_response(&bytes)? {
            Response::Success(value) => Ok(value),
            Response::Fault(fault) => Err(HandoffError::from_fault(&fault.code, &fault.message)),
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if !self.done {
            warn!(window = self.window, "call abandoned before reply");
            self.display.destroy_window(self.window);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xrpc::display::MemDisplay;
    use crate::xrpc::service::{XObject, XService};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    struct Math;

    #[async_trait]
    impl XObject for Math {
        fn allowed_methods(&self) -> &[&str] {
            &["add", "fail"]
        }

        async fn call(&self, method: &str, args: &[Value]) -> Result<Option<Value>> {
            match method {
                "add" => {
                    let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
                    Ok(Some(json!(sum)))
                }
                "fail" => Err(HandoffError::Io {
                    message: "disk on fire".to_string(),
                    path: None,
                    source: None,
                }),
                other => Err(HandoffError::NoSuchMethod {
                    method: other.to_string(),
                }),
            }
        }
    }

    fn serve_math(display: &MemDisplay, name: &str) {
        let mut objects: HashMap<String, Arc<dyn XObject>> = HashMap::new();
        objects.insert("/math".to_string(), Arc::new(Math));
        let service = XService::register(Arc::new(display.clone()), name, objects).unwrap();
        tokio::spawn(service.serve());
    }

    #[tokio::test]
    async fn test_call_round_trip() {
        let display = MemDisplay::new();
        serve_math(&display, "_CALC");

        let proxy = XProxy::connect(Arc::new(display.clone()), "_CALC").unwrap();
        let pending = proxy.call("/math", "add", &[json!(2), json!(3)]).unwrap();
        assert_eq!(pending.wait().await.unwrap(), json!(5));
    }

    #[tokio::test]
    async fn test_fault_becomes_typed_error() {
        let display = MemDisplay::new();
        serve_math(&display, "_CALC");

        let proxy = XProxy::connect(Arc::new(display.clone()), "_CALC").unwrap();
        let err = proxy
            .call("/math", "fail", &[])
            .unwrap()
            .wait()
            .await
            .unwrap_err();
        match err {
            HandoffError::RemoteFault { code, message } => {
                assert_eq!(code, "InternalError");
                assert!(message.contains("disk on fire"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unlisted_method_maps_back() {
        let display = MemDisplay::new();
        serve_math(&display, "_CALC");

        let proxy = XProxy::connect(Arc::new(display.clone()), "_CALC").unwrap();
        let err = proxy
            .call("/math", "subtract", &[])
            .unwrap()
            .wait()
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::NoSuchMethod { method } if method.contains("subtract")));
    }

    #[tokio::test]
    async fn test_connect_unknown_name() {
        let display = MemDisplay::new();
        let err = XProxy::connect(Arc::new(display) as Arc<dyn Display>, "_NOBODY")
            .err()
            .unwrap();
        assert!(matches!(err, HandoffError::NoSuchService { name } if name == "_NOBODY"));
    }

    #[tokio::test]
    async fn test_connect_rejects_stale_advertisement() {
        let display = MemDisplay::new();
        // Advertise a window that never wrote its witness.
        let orphan = display.create_window(false).unwrap();
        display
            .set_property(
                display.root(),
                "_STALE",
                PropertyValue::Windows(vec![orphan.id]),
                PropertyMode::Replace,
            )
            .unwrap();

        let err = XProxy::connect(Arc::new(display), "_STALE").err().unwrap();
        assert!(matches!(err, HandoffError::NoSuchService { .. }));
    }

    #[tokio::test]
    async fn test_connect_rejects_destroyed_window() {
        let display = MemDisplay::new();
        let dead = display.create_window(false).unwrap();
        display
            .set_property(
                display.root(),
                "_GONE",
                PropertyValue::Windows(vec![dead.id]),
                PropertyMode::Replace,
            )
            .unwrap();
        display.destroy_window(dead.id);

        let err = XProxy::connect(Arc::new(display), "_GONE").err().unwrap();
        assert!(matches!(err, HandoffError::NoSuchService { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_calls_on_one_proxy() {
        let display = MemDisplay::new();
        serve_math(&display, "_CALC");
        let proxy = XProxy::connect(Arc::new(display.clone()), "_CALC").unwrap();

        let a = proxy.call("/math", "add", &[json!(1), json!(1)]).unwrap();
        let b = proxy.call("/math", "add", &[json!(10), json!(10)]).unwrap();
        let c = proxy.call("/math", "add", &[json!(100), json!(100)]).unwrap();

        assert_eq!(a.wait().await.unwrap(), json!(2));
        assert_eq!(b.wait().await.unwrap(), json!(20));
        assert_eq!(c.wait().await.unwrap(), json!(200));
    }

    #[tokio::test]
    async fn test_dropped_call_releases_window() {
        let display = MemDisplay::new();
        serve_math(&display, "_CALC");
        let proxy = XProxy::connect(Arc::new(display.clone()), "_CALC").unwrap();

        let pending = proxy.call("/math", "add", &[json!(1)]).unwrap();
        let window = pending.window;
        drop(pending);
        assert!(display.read_property(window, "ANY").is_err());
    }
}
