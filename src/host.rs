//! The seam between the add-in and the host mail runtime.
//!
//! The host owns the message item, renders notifications and decides what to
//! do with a completed event. Everything it exposes to handlers goes through
//! [`MailboxItem`]; everything handlers hand back goes through [`Event`].
//! Handlers are registered with a [`Dispatcher`] under the string identifiers
//! the add-in manifest declares.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Failures reported by host APIs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("body fetch failed: {0}")]
    BodyFetch(String),

    #[error("notification update failed: {0}")]
    Notification(String),
}

/// Failures raised while routing an event to a handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("no handler registered for '{0}'")]
    UnknownHandler(String),

    #[error("a handler is already registered for '{0}'")]
    AlreadyRegistered(String),

    #[error("handler '{0}' dropped its event without completing it")]
    Abandoned(String),
}

/// How the host should treat the user's send attempt after a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SendModeOverride {
    /// Let the user choose to send anyway.
    PromptUser,
}

/// Payload passed to the host when an event completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCompletion {
    pub allow_event: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Markdown rendition of `error_message` for hosts that can render it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message_markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_label: Option<String>,
    /// Command the host opens when the user picks `cancel_label`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_mode_override: Option<SendModeOverride>,
}

impl EventCompletion {
    pub fn allow() -> Self {
        Self {
            allow_event: true,
            ..Self::default()
        }
    }

    /// A block with only a plain-text message.
    pub fn block(message: impl Into<String>) -> Self {
        Self {
            allow_event: false,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    InformationalMessage,
    ProgressIndicator,
    ErrorMessage,
    InsightMessage,
}

/// A notification shown on the message item by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub icon: String,
    pub persistent: bool,
}

/// Attachment metadata as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDetails {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub is_inline: bool,
}

/// Host capabilities for the message item an event was raised on.
#[async_trait::async_trait]
pub trait MailboxItem: Send + Sync {
    /// Fetch the body as plain text. `Ok(None)` means the host returned no
    /// value.
    async fn body_text(&self) -> Result<Option<String>, HostError>;

    /// Show `message` under `key`, replacing whatever was shown under the
    /// same key before.
    async fn replace_notification(
        &self,
        key: &str,
        message: NotificationMessage,
    ) -> Result<(), HostError>;
}

/// One in-flight lifecycle invocation. Completing consumes the token, so an
/// event can be completed at most once.
#[derive(Debug)]
pub struct Event {
    handler: String,
    tx: oneshot::Sender<Option<EventCompletion>>,
}

impl Event {
    /// Create an event for `handler` together with the host's side of it.
    pub fn new(handler: impl Into<String>) -> (Self, PendingEvent) {
        let handler = handler.into();
        let (tx, rx) = oneshot::channel();
        (
            Event {
                handler: handler.clone(),
                tx,
            },
            PendingEvent { handler, rx },
        )
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Complete without a payload.
    pub fn completed(self) {
        self.finish(None);
    }

    pub fn completed_with(self, completion: EventCompletion) {
        self.finish(Some(completion));
    }

    fn finish(self, completion: Option<EventCompletion>) {
        if self.tx.send(completion).is_err() {
            tracing::debug!(handler = %self.handler, "host stopped waiting for event completion");
        }
    }
}

/// The host's view of an event until the handler completes it.
#[derive(Debug)]
pub struct PendingEvent {
    handler: String,
    rx: oneshot::Receiver<Option<EventCompletion>>,
}

impl PendingEvent {
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Wait for the handler to complete the event.
    pub async fn wait(self) -> Result<Option<EventCompletion>, DispatchError> {
        self.rx
            .await
            .map_err(|_| DispatchError::Abandoned(self.handler))
    }
}

/// Contract every registered lifecycle handler implements. The handler owns
/// the event from the moment it is invoked and must complete it on every
/// path, possibly after returning.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, item: Arc<dyn MailboxItem>, event: Event);
}

/// Maps manifest identifiers to handlers.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn associate(
        &mut self,
        id: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), DispatchError> {
        let id = id.into();
        if self.handlers.contains_key(&id) {
            return Err(DispatchError::AlreadyRegistered(id));
        }
        tracing::debug!(handler = %id, "handler registered");
        self.handlers.insert(id, handler);
        Ok(())
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Raise a new event for handler `id` on `item`. Returns once the
    /// handler has returned; the event itself may complete later.
    pub async fn dispatch(
        &self,
        id: &str,
        item: Arc<dyn MailboxItem>,
    ) -> Result<PendingEvent, DispatchError> {
        let handler = self
            .handlers
            .get(id)
            .ok_or_else(|| DispatchError::UnknownHandler(id.to_string()))?;
        let (event, pending) = Event::new(id);
        tracing::trace!(handler = %id, "dispatching event");
        handler.handle(item, event).await;
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    #[async_trait::async_trait]
    impl EventHandler for Silent {
        async fn handle(&self, _item: Arc<dyn MailboxItem>, _event: Event) {}
    }

    struct NoBody;

    #[async_trait::async_trait]
    impl MailboxItem for NoBody {
        async fn body_text(&self) -> Result<Option<String>, HostError> {
            Ok(None)
        }

        async fn replace_notification(
            &self,
            _key: &str,
            _message: NotificationMessage,
        ) -> Result<(), HostError> {
            Ok(())
        }
    }

    #[test]
    fn completion_serialises_camel_case_and_skips_absent_fields() {
        let allow = serde_json::to_value(EventCompletion::allow()).unwrap();
        assert_eq!(allow, serde_json::json!({ "allowEvent": true }));

        let block = EventCompletion {
            cancel_label: Some("Login".into()),
            send_mode_override: Some(SendModeOverride::PromptUser),
            ..EventCompletion::block("nope")
        };
        let v = serde_json::to_value(block).unwrap();
        assert_eq!(v["allowEvent"], false);
        assert_eq!(v["errorMessage"], "nope");
        assert_eq!(v["cancelLabel"], "Login");
        assert_eq!(v["sendModeOverride"], "promptUser");
        assert!(v.get("commandId").is_none());
    }

    #[test]
    fn notification_kind_serialises_as_type() {
        let msg = NotificationMessage {
            kind: NotificationKind::InformationalMessage,
            message: "hi".into(),
            icon: "Icon.80x80".into(),
            persistent: false,
        };
        let v = serde_json::to_value(msg).unwrap();
        assert_eq!(v["type"], "informationalMessage");
    }

    #[tokio::test]
    async fn completed_event_resolves_pending() {
        let (event, pending) = Event::new("x");
        assert_eq!(event.handler(), "x");
        event.completed_with(EventCompletion::allow());
        assert_eq!(pending.wait().await, Ok(Some(EventCompletion::allow())));
    }

    #[tokio::test]
    async fn dropped_event_is_abandoned() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.associate("silent", Arc::new(Silent)).unwrap();
        let pending = dispatcher.dispatch("silent", Arc::new(NoBody)).await.unwrap();
        assert_eq!(
            pending.wait().await,
            Err(DispatchError::Abandoned("silent".into()))
        );
    }

    #[tokio::test]
    async fn unknown_and_duplicate_ids_are_rejected() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.associate("a", Arc::new(Silent)).unwrap();
        assert_eq!(
            dispatcher.associate("a", Arc::new(Silent)),
            Err(DispatchError::AlreadyRegistered("a".into()))
        );
        let err = dispatcher.dispatch("b", Arc::new(NoBody)).await.unwrap_err();
        assert_eq!(err, DispatchError::UnknownHandler("b".into()));
        assert_eq!(dispatcher.ids(), vec!["a"]);
    }
}
