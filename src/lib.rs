//! Core library for Sendguard.  This module wires the lifecycle handlers to
//! the host dispatcher, holds the shared application state and re-exports the
//! types a host integration needs.
//!
//! The host mail runtime raises two events: the toolbar command (`"action"`)
//! and the send interceptor (`"onMessageSendHandler"`).  Both are plain
//! [`EventHandler`] implementations registered explicitly at startup by
//! [`register_handlers`].

pub mod bridge;
mod config;
pub mod handlers;
pub mod host;
pub mod rules;
pub mod telemetry;
pub mod util;

use std::sync::Arc;

pub use config::{validate_rules, AppConfig, RotationConfig};

pub use crate::handlers::{ActionCommand, OnSendHandler, ACTION_ID, BODY_FETCH_FAILED, ON_SEND_ID};
pub use crate::host::{
    AttachmentDetails, DispatchError, Dispatcher, Event, EventCompletion, EventHandler, HostError,
    MailboxItem, NotificationKind, NotificationMessage, PendingEvent, SendModeOverride,
};
pub use crate::rules::attachments::classify_attachments;
pub use crate::rules::{BlockNotice, Classification, ClassificationRule, Outcome, RuleSet};
pub use crate::telemetry::TelemetrySink;
pub use crate::util::has_matches;

/// State shared by the registered handlers.
#[derive(Clone, Default)]
pub struct AppState {
    pub rules: RuleSet,
    pub telemetry: TelemetrySink,
}

/// Build state from an explicit configuration.
pub fn build_state(config: &AppConfig) -> AppState {
    let rules = RuleSet::new(&config.rules);
    tracing::info!(rules = ?rules.names(), "rule set loaded");
    let telemetry = TelemetrySink::open(
        config.log_file.as_deref(),
        &config.rotation,
        config.log_stdout,
    );
    AppState { rules, telemetry }
}

/// Build state from environment variables.  This function reads the
/// following variables:
///
/// * `SENDGUARD_RULES_CONFIG` (optional) – path to a JSON rule set replacing
///   the built-in rules.
/// * `LOG_FILE` (optional) – path to append newline‑delimited JSON decision
///   records, with `LOG_MAX_BYTES`, `LOG_ROTATE_KEEP` and
///   `LOG_ROTATE_COMPRESS` controlling rotation.
/// * `SENDGUARD_LOG_STDOUT` (optional) – mirror decisions as log events.
pub fn build_state_from_env() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;
    Ok(build_state(&config))
}

/// Register the command handler and the send interceptor under their
/// manifest identifiers.
pub fn register_handlers(state: &AppState) -> Result<Dispatcher, DispatchError> {
    let mut dispatcher = Dispatcher::new();
    dispatcher.associate(
        ACTION_ID,
        Arc::new(ActionCommand::new(state.telemetry.clone())),
    )?;
    dispatcher.associate(
        ON_SEND_ID,
        Arc::new(OnSendHandler::new(
            state.rules.clone(),
            state.telemetry.clone(),
        )),
    )?;
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_both_manifest_ids() {
        let dispatcher = register_handlers(&AppState::default()).unwrap();
        assert_eq!(dispatcher.ids(), vec![ACTION_ID, ON_SEND_ID]);
    }

    #[test]
    fn build_state_uses_configured_rules() {
        let config = AppConfig {
            rules: vec![ClassificationRule {
                name: "solo".into(),
                terms: vec!["x".into()],
                outcome: Outcome::Allow,
            }],
            ..AppConfig::default()
        };
        let state = build_state(&config);
        assert_eq!(state.rules.names(), vec!["solo"]);
        assert!(!state.telemetry.is_enabled());
    }
}
