use super::{BlockNotice, ClassificationRule, Outcome};
use crate::host::SendModeOverride;

/// Command the host opens when the user follows up on a blocked send.
pub const OPEN_PANE_COMMAND: &str = "msgComposeOpenPaneButton";

/// Delay before an "away" message is released.
pub const AWAY_DELAY_MS: u64 = 4_000;

/// Delay before a "long running" message is released.
pub const LONG_RUNNING_DELAY_MS: u64 = 10_000;

fn rule(name: &str, terms: &[&str], outcome: Outcome) -> ClassificationRule {
    ClassificationRule {
        name: name.to_owned(),
        terms: terms.iter().map(|t| (*t).to_owned()).collect(),
        outcome,
    }
}

fn notice(message: &str, markdown: &str, cancel_label: &str, flag: &str) -> BlockNotice {
    BlockNotice {
        message: message.to_owned(),
        markdown: Some(markdown.to_owned()),
        cancel_label: Some(cancel_label.to_owned()),
        command_id: Some(OPEN_PANE_COMMAND.to_owned()),
        context_flag: Some(flag.to_owned()),
        send_mode_override: None,
    }
}

fn block(message: &str, markdown: &str, cancel_label: &str, flag: &str) -> Outcome {
    Outcome::Block(notice(message, markdown, cancel_label, flag))
}

/// The default rules, in evaluation order.
pub fn builtin_rules() -> Vec<ClassificationRule> {
    // The user may still send after logging in.
    let login = Outcome::Block(BlockNotice {
        send_mode_override: Some(SendModeOverride::PromptUser),
        ..notice(
            "You need to be logged in with your account to protect your messages and files against possible data leaks",
            "You need to be logged in with your account to protect your messages and files against possible data leaks.",
            "Login",
            "autoLogin",
        )
    });

    vec![
        rule("login", &["login"], login),
        rule(
            "warning",
            &["warning"],
            block(
                "Warning — Email seems to contain a some sensitive data, for which your organization's policy recommends secure enable.",
                "**Warning** — Email seems to contain a some sensitive data, for which your organization's policy recommends secure enable.",
                "Resolve",
                "autoViolation",
            ),
        ),
        rule(
            "away",
            &["away"],
            Outcome::DelayThenAllow {
                delay_ms: AWAY_DELAY_MS,
            },
        ),
        rule(
            "long_running",
            &["long", "running"],
            Outcome::DelayThenAllow {
                delay_ms: LONG_RUNNING_DELAY_MS,
            },
        ),
        rule(
            "attachments",
            &["file"],
            block(
                "Your Attachments — Wait for your attachments to upload before sending this email. This might take a few minutes.",
                "**Your Attachments** — Wait for your attachments to upload before sending this email. This might take a few minutes.",
                "Check attachments",
                "autoAttachments",
            ),
        ),
        rule(
            "reuse",
            &["reuse"],
            block(
                "Validation issue — Please resolve all issue to send email",
                "**Validation issue** — Please resolve all issue to send email",
                "Resolve issues",
                "autoOnSendDialog",
            ),
        ),
    ]
}
