//! Send-time classification rules.
//!
//! A rule pairs a term list with an [`Outcome`]. The [`RuleSet`] evaluates
//! its rules in order and stops at the first rule whose terms match the
//! message body. Rules come from [`builtin_rules`] unless a rule config file
//! replaces them.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::host::{EventCompletion, SendModeOverride};
use crate::util::{matcher_for, TermMatcher};

pub mod attachments;
mod builtin;

pub use self::builtin::{builtin_rules, AWAY_DELAY_MS, LONG_RUNNING_DELAY_MS, OPEN_PANE_COMMAND};

/// What to do with a send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Outcome {
    Allow,
    Block(BlockNotice),
    /// Allow, but only once the delay has elapsed. The delay is never
    /// cancelled.
    #[serde(rename = "delay")]
    DelayThenAllow {
        #[serde(rename = "delayMs")]
        delay_ms: u64,
    },
}

impl Outcome {
    /// Short label used in telemetry records.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Allow => "allow",
            Outcome::Block(_) => "block",
            Outcome::DelayThenAllow { .. } => "delay",
        }
    }

    pub fn delay(&self) -> Option<Duration> {
        match self {
            Outcome::DelayThenAllow { delay_ms } => Some(Duration::from_millis(*delay_ms)),
            _ => None,
        }
    }

    /// The completion the host eventually receives for this outcome.
    pub fn completion(&self) -> EventCompletion {
        match self {
            Outcome::Allow | Outcome::DelayThenAllow { .. } => EventCompletion::allow(),
            Outcome::Block(notice) => notice.completion(),
        }
    }
}

/// User-facing details of a blocked send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockNotice {
    pub message: String,
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub cancel_label: Option<String>,
    #[serde(default)]
    pub command_id: Option<String>,
    /// Name of the flag passed to the follow-up command as `{ flag: true }`.
    #[serde(default)]
    pub context_flag: Option<String>,
    #[serde(default)]
    pub send_mode_override: Option<SendModeOverride>,
}

impl BlockNotice {
    pub fn completion(&self) -> EventCompletion {
        let context_data = self.context_flag.as_ref().map(|flag| {
            let mut map = serde_json::Map::new();
            map.insert(flag.clone(), serde_json::Value::Bool(true));
            serde_json::Value::Object(map)
        });
        EventCompletion {
            allow_event: false,
            error_message: Some(self.message.clone()),
            error_message_markdown: self.markdown.clone(),
            cancel_label: self.cancel_label.clone(),
            command_id: self.command_id.clone(),
            context_data,
            send_mode_override: self.send_mode_override,
        }
    }
}

/// A named term list and the outcome it triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub name: String,
    pub terms: Vec<String>,
    pub outcome: Outcome,
}

/// Shape of the optional rule config file.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    pub rules: Vec<ClassificationRule>,
}

struct CompiledRule {
    name: String,
    matcher: Arc<TermMatcher>,
    outcome: Outcome,
}

/// Result of classifying one message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification<'a> {
    /// Name of the rule that matched, if any.
    pub rule: Option<&'a str>,
    pub outcome: Outcome,
}

/// Ordered rules, evaluated first match wins.
#[derive(Clone)]
pub struct RuleSet {
    rules: Arc<Vec<CompiledRule>>,
}

impl RuleSet {
    pub fn new(rules: &[ClassificationRule]) -> Self {
        let compiled = rules
            .iter()
            .map(|r| CompiledRule {
                name: r.name.clone(),
                matcher: matcher_for(r.terms.as_slice()),
                outcome: r.outcome.clone(),
            })
            .collect();
        Self {
            rules: Arc::new(compiled),
        }
    }

    pub fn builtin() -> Self {
        Self::new(&builtin_rules())
    }

    /// Classify `body`. A missing or empty body matches no rule.
    pub fn classify(&self, body: Option<&str>) -> Classification<'_> {
        let text = match body {
            Some(text) if !text.is_empty() => text,
            _ => {
                return Classification {
                    rule: None,
                    outcome: Outcome::Allow,
                }
            }
        };
        for rule in self.rules.iter() {
            if rule.matcher.is_match(text) {
                tracing::debug!(rule = %rule.name, outcome = rule.outcome.label(), "rule matched");
                return Classification {
                    rule: Some(rule.name.as_str()),
                    outcome: rule.outcome.clone(),
                };
            }
        }
        Classification {
            rule: None,
            outcome: Outcome::Allow,
        }
    }

    /// Rule names in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}
