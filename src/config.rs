use std::env;
use std::fs;

use anyhow::{anyhow, bail, Context, Result};

use crate::rules::{builtin_rules, ClassificationRule, Outcome, RuleConfig};

#[derive(Debug, Clone)]
pub struct RotationConfig {
    pub max_bytes: Option<u64>,
    pub keep: usize,
    pub compress: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_bytes: None,
            keep: 1,
            compress: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rules: Vec<ClassificationRule>,
    pub log_file: Option<String>,
    pub rotation: RotationConfig,
    pub log_stdout: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules: builtin_rules(),
            log_file: None,
            rotation: RotationConfig::default(),
            log_stdout: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let rules = if let Ok(path) = env::var("SENDGUARD_RULES_CONFIG") {
            let content = fs::read_to_string(&path).with_context(|| {
                format!(
                    "Failed to read SENDGUARD_RULES_CONFIG '{}': file unreadable",
                    path
                )
            })?;
            let parsed = serde_json::from_str::<RuleConfig>(&content).with_context(|| {
                format!(
                    "Failed to parse SENDGUARD_RULES_CONFIG '{}': invalid JSON rule set",
                    path
                )
            })?;
            validate_rules(&parsed.rules)
                .with_context(|| format!("Invalid rule set in '{}'", path))?;
            parsed.rules
        } else {
            builtin_rules()
        };

        let log_file = env::var("LOG_FILE").ok().filter(|s| !s.trim().is_empty());

        let rotation = RotationConfig {
            max_bytes: parse_optional_u64("LOG_MAX_BYTES")?,
            keep: parse_optional_u64("LOG_ROTATE_KEEP")?.unwrap_or(1) as usize,
            compress: parse_bool_env("LOG_ROTATE_COMPRESS")?.unwrap_or(false),
        };

        let log_stdout = parse_bool_env("SENDGUARD_LOG_STDOUT")?.unwrap_or(false);

        Ok(Self {
            rules,
            log_file,
            rotation,
            log_stdout,
        })
    }
}

/// Every rule needs a unique name and at least one term; block outcomes need
/// a message.
pub fn validate_rules(rules: &[ClassificationRule]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for rule in rules {
        if rule.name.trim().is_empty() {
            bail!("rule names must not be empty");
        }
        if !seen.insert(rule.name.as_str()) {
            bail!("duplicate rule name '{}'", rule.name);
        }
        if rule.terms.is_empty() {
            bail!("rule '{}' has no terms", rule.name);
        }
        if let Outcome::Block(notice) = &rule.outcome {
            if notice.message.trim().is_empty() {
                bail!("rule '{}' blocks without a message", rule.name);
            }
        }
    }
    Ok(())
}

fn parse_optional_u64(var: &str) -> Result<Option<u64>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a positive integer", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_bool_env(var: &str) -> Result<Option<bool>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value)
            .map(Some)
            .ok_or_else(|| anyhow!("{} must be a boolean (true/false/1/0)", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
