//! Lifecycle handlers registered with the host dispatcher.
//!
//! Each handler implements [`EventHandler`](crate::host::EventHandler) and is
//! registered under the identifier the add-in manifest declares for it.

pub mod action;
pub mod on_send;

pub use self::action::ActionCommand;
pub use self::on_send::{OnSendHandler, BODY_FETCH_FAILED};

/// Manifest identifier of the toolbar command.
pub const ACTION_ID: &str = "action";

/// Manifest identifier of the send interceptor.
pub const ON_SEND_ID: &str = "onMessageSendHandler";
