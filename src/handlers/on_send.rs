use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::host::{Event, EventCompletion, EventHandler, MailboxItem};
use crate::rules::RuleSet;
use crate::telemetry::{DecisionRecord, TelemetrySink};

use super::ON_SEND_ID;

/// Message shown when the body cannot be read. The send is blocked.
pub const BODY_FETCH_FAILED: &str = "Failed to get body text";

/// Send interceptor: reads the body, classifies it and completes the event
/// with the first matching rule's outcome.
#[derive(Clone, Default)]
pub struct OnSendHandler {
    rules: RuleSet,
    telemetry: TelemetrySink,
}

impl OnSendHandler {
    pub fn new(rules: RuleSet, telemetry: TelemetrySink) -> Self {
        Self { rules, telemetry }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    fn fail_closed(&self, event: Event, start: Instant) {
        event.completed_with(EventCompletion::block(BODY_FETCH_FAILED));
        self.telemetry.record(&DecisionRecord {
            handler: ON_SEND_ID,
            allow_event: Some(false),
            rule: None,
            outcome: "failClosed",
            delay_ms: None,
            latency_ms: start.elapsed().as_millis(),
        });
    }
}

#[async_trait::async_trait]
impl EventHandler for OnSendHandler {
    async fn handle(&self, item: Arc<dyn MailboxItem>, event: Event) {
        let start = Instant::now();
        tracing::info!("Scanning the message body");
        let body = match item.body_text().await {
            Ok(Some(body)) => body,
            Ok(None) => {
                tracing::error!("{}: host returned no body", BODY_FETCH_FAILED);
                return self.fail_closed(event, start);
            }
            Err(err) => {
                tracing::error!(error = %err, "{}", BODY_FETCH_FAILED);
                return self.fail_closed(event, start);
            }
        };

        let classification = self.rules.classify(Some(&body));
        let completion = classification.outcome.completion();
        let delay = classification.outcome.delay();
        self.telemetry.record(&DecisionRecord {
            handler: ON_SEND_ID,
            allow_event: Some(completion.allow_event),
            rule: classification.rule,
            outcome: classification.outcome.label(),
            delay_ms: delay.map(|d| d.as_millis() as u64),
            latency_ms: start.elapsed().as_millis(),
        });

        match delay {
            Some(delay) => {
                tracing::debug!(rule = ?classification.rule, delay_ms = delay.as_millis() as u64, "delaying send");
                schedule_completion(event, delay, completion);
            }
            None => event.completed_with(completion),
        }
    }
}

/// Complete `event` with `completion` once `delay` has elapsed. The task is
/// detached; there is no way to cancel it.
pub fn schedule_completion(
    event: Event,
    delay: Duration,
    completion: EventCompletion,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        tracing::debug!(handler = event.handler(), "delay elapsed, completing event");
        event.completed_with(completion);
    })
}
