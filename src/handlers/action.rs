use std::sync::Arc;
use std::time::Instant;

use crate::host::{Event, EventHandler, MailboxItem, NotificationKind, NotificationMessage};
use crate::telemetry::{DecisionRecord, TelemetrySink};

use super::ACTION_ID;

/// Key the command's notification is stored under, so repeated runs replace
/// the previous one.
pub const NOTIFICATION_KEY: &str = "ActionPerformanceNotification";

/// Toolbar command: shows an informational notification and completes.
#[derive(Clone, Default)]
pub struct ActionCommand {
    telemetry: TelemetrySink,
}

impl ActionCommand {
    pub fn new(telemetry: TelemetrySink) -> Self {
        Self { telemetry }
    }

    pub fn notification() -> NotificationMessage {
        NotificationMessage {
            kind: NotificationKind::InformationalMessage,
            message: "Performed action.".to_owned(),
            icon: "Icon.80x80".to_owned(),
            persistent: true,
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for ActionCommand {
    async fn handle(&self, item: Arc<dyn MailboxItem>, event: Event) {
        let start = Instant::now();
        if let Err(err) = item
            .replace_notification(NOTIFICATION_KEY, Self::notification())
            .await
        {
            tracing::warn!(error = %err, key = NOTIFICATION_KEY, "host failed to show notification");
        }
        event.completed();
        self.telemetry.record(&DecisionRecord {
            handler: ACTION_ID,
            allow_event: None,
            rule: None,
            outcome: "done",
            delay_ms: None,
            latency_ms: start.elapsed().as_millis(),
        });
    }
}
