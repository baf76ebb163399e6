//! The windowing-system interface the property transports sit on.
//!
//! Property RPC and XDS need very little from the window system: invisible
//! windows that exist only to carry named properties, and change
//! notifications for those properties. The [`Display`] trait names exactly
//! those operations; [`MemDisplay`] is the in-process implementation used
//! as the loopback bus and by the tests. A real X11 backend would
//! implement the same trait.
//!
//! Semantics follow X: a property write notifies everyone watching the
//! window *including the writer*, appends are atomic with respect to
//! concurrent appenders, and operations on a destroyed window fail with
//! `WindowGone`.

use crate::{HandoffError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A 32-bit window identifier.
pub type WindowId = u32;

/// A typed property value: raw bytes (STRING-like) or a window-ID array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Bytes(Vec<u8>),
    Windows(Vec<WindowId>),
}

impl PropertyValue {
    /// Interpret the value as UTF-8 text.
    pub fn as_text(&self) -> Result<&str> {
        match self {
            PropertyValue::Bytes(bytes) => {
                std::str::from_utf8(bytes).map_err(|_| HandoffError::Validation {
                    field: "property".to_string(),
                    message: "property bytes are not UTF-8".to_string(),
                })
            }
            PropertyValue::Windows(_) => Err(HandoffError::Validation {
                field: "property".to_string(),
                message: "expected bytes, found window array".to_string(),
            }),
        }
    }

    /// Interpret the value as a window-ID array.
    pub fn as_windows(&self) -> Result<&[WindowId]> {
        match self {
            PropertyValue::Windows(ids) => Ok(ids),
            PropertyValue::Bytes(_) => Err(HandoffError::Validation {
                field: "property".to_string(),
                message: "expected window array, found bytes".to_string(),
            }),
        }
    }
}

/// How a property write combines with an existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyMode {
    /// Overwrite whatever is there.
    Replace,
    /// Extend the existing value; concurrent appenders coalesce.
    Append,
}

/// What happened to a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyState {
    NewValue,
    Deleted,
}

/// A property-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyEvent {
    pub window: WindowId,
    pub atom: String,
    pub state: PropertyState,
}

/// A window created through [`Display::create_window`], together with its
/// notification stream if one was requested.
pub struct CreatedWindow {
    pub id: WindowId,
    /// Present when the window was created with property tracking. The
    /// receiver sees every property change on this window, regardless of
    /// which client made it.
    pub events: Option<mpsc::UnboundedReceiver<PropertyEvent>>,
}

/// The operations the transports need from a window system.
pub trait Display: Send + Sync {
    /// The root window: the display-wide shared property namespace.
    fn root(&self) -> WindowId;

    /// Create an invisible window, optionally subscribed to its own
    /// property changes.
    fn create_window(&self, track_property_events: bool) -> Result<CreatedWindow>;

    /// Destroy a window. Later operations on it fail with `WindowGone`.
    fn destroy_window(&self, window: WindowId);

    /// Write a property.
    fn set_property(
        &self,
        window: WindowId,
        atom: &str,
        value: PropertyValue,
        mode: PropertyMode,
    ) -> Result<()>;

    /// Read a property without disturbing it.
    fn read_property(&self, window: WindowId, atom: &str) -> Result<Option<PropertyValue>>;

    /// Read and delete a property in one step.
    fn take_property(&self, window: WindowId, atom: &str) -> Result<Option<PropertyValue>>;

    /// Delete a property if present.
    fn delete_property(&self, window: WindowId, atom: &str) -> Result<()>;
}

struct WindowState {
    properties: HashMap<String, PropertyValue>,
    notify: Option<mpsc::UnboundedSender<PropertyEvent>>,
}

struct DisplayState {
    next_id: WindowId,
    windows: HashMap<WindowId, WindowState>,
}

/// In-process display: one shared property store behind a single lock,
/// which is what makes `Append` atomic.
#[derive(Clone)]
pub struct MemDisplay {
    state: Arc<Mutex<DisplayState>>,
}

const ROOT_WINDOW: WindowId = 1;

impl MemDisplay {
    /// Create a display with just the root window.
    pub fn new() -> Self {
        let mut windows = HashMap::new();
        windows.insert(
            ROOT_WINDOW,
            WindowState {
                properties: HashMap::new(),
                notify: None,
            },
        );
        Self {
            state: Arc::new(Mutex::new(DisplayState {
                next_id: ROOT_WINDOW + 1,
                windows,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DisplayState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemDisplay {
    fn default() -> Self {
        Self::new()
    }
}

fn gone(window: WindowId) -> HandoffError {
    HandoffError::WindowGone { window }
}

impl Display for MemDisplay {
    fn root(&self) -> WindowId {
        ROOT_WINDOW
    }

    fn create_window(&self, track_property_events: bool) -> Result<CreatedWindow> {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;

        let (notify, events) = if track_property_events {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        state.windows.insert(
            id,
            WindowState {
                properties: HashMap::new(),
                notify,
            },
        );
        Ok(CreatedWindow { id, events })
    }

    fn destroy_window(&self, window: WindowId) {
        if window == ROOT_WINDOW {
            return;
        }
        self.lock().windows.remove(&window);
    }

    fn set_property(
        &self,
        window: WindowId,
        atom: &str,
        value: PropertyValue,
        mode: PropertyMode,
    ) -> Result<()> {
        let mut state = self.lock();
        let win = state.windows.get_mut(&window).ok_or_else(|| gone(window))?;

        match mode {
            PropertyMode::Replace => {
                win.properties.insert(atom.to_string(), value);
            }
            PropertyMode::Append => match win.properties.get_mut(atom) {
                None => {
                    win.properties.insert(atom.to_string(), value);
                }
                Some(PropertyValue::Bytes(existing)) => match value {
                    PropertyValue::Bytes(more) => existing.extend_from_slice(&more),
                    PropertyValue::Windows(_) => {
                        return Err(HandoffError::Validation {
                            field: atom.to_string(),
                            message: "append type mismatch".to_string(),
                        })
                    }
                },
                Some(PropertyValue::Windows(existing)) => match value {
                    PropertyValue::Windows(more) => existing.extend_from_slice(&more),
                    PropertyValue::Bytes(_) => {
                        return Err(HandoffError::Validation {
                            field: atom.to_string(),
                            message: "append type mismatch".to_string(),
                        })
                    }
                },
            },
        }

        if let Some(tx) = &win.notify {
            let _ = tx.send(PropertyEvent {
                window,
                atom: atom.to_string(),
                state: PropertyState::NewValue,
            });
        }
        Ok(())
    }

    fn read_property(&self, window: WindowId, atom: &str) -> Result<Option<PropertyValue>> {
        let state = self.lock();
        let win = state.windows.get(&window).ok_or_else(|| gone(window))?;
        Ok(win.properties.get(atom).cloned())
    }

    fn take_property(&self, window: WindowId, atom: &str) -> Result<Option<PropertyValue>> {
        let mut state = self.lock();
        let win = state.windows.get_mut(&window).ok_or_else(|| gone(window))?;
        let value = win.properties.remove(atom);
        if value.is_some() {
            if let Some(tx) = &win.notify {
                let _ = tx.send(PropertyEvent {
                    window,
                    atom: atom.to_string(),
                    state: PropertyState::Deleted,
                });
            }
        }
        Ok(value)
    }

    fn delete_property(&self, window: WindowId, atom: &str) -> Result<()> {
        self.take_property(window, atom)?;
        Ok(())
    }
}
