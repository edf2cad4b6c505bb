//! External interfaces: control messages in, advisory notifications out.

pub mod message;

pub use message::{ControlMessage, EventSink, Notification, NotificationReceiver, UnitEvent};
