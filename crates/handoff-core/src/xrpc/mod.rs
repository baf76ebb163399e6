//! XML-RPC over window properties.
//!
//! A peer-to-peer RPC bus that needs no broker process: the window
//! system's shared property namespace is the rendezvous. Services claim
//! names on the root window ([`service`]), clients resolve them and call
//! through per-call windows ([`proxy`]), and both sides speak XML-RPC
//! envelopes ([`envelope`]) over the [`display`] abstraction.

pub mod display;
pub mod envelope;
pub mod proxy;
pub mod service;

pub use display::{
    CreatedWindow, Display, MemDisplay, PropertyEvent, PropertyMode, PropertyState, PropertyValue,
    WindowId,
};
pub use envelope::{Fault, Response};
pub use proxy::{PendingCall, XProxy};
pub use service::{XObject, XService};
