//! Monitor configuration.
//!
//! TOML is the native format. Files ending in `.properties` are read in the
//! Java properties line format so existing deployments keep working.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::api::notifier::DEFAULT_SNS_REGION;
use crate::api::sampler::Credentials;
use crate::error::MonitorError;
use crate::monitor::decision::ThresholdPolicy;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Ledger file path.
    pub history: PathBuf,
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    /// Notification destination (phone number, chat id, ...).
    pub dest: String,
    #[serde(default)]
    pub policy: ThresholdPolicy,
    #[serde(default)]
    pub sampler: Option<SamplerConfig>,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SamplerConfig {
    Ws {
        url: String,
        #[serde(default)]
        subscribe: Option<String>,
        #[serde(default)]
        pointer: Option<String>,
        #[serde(default = "default_currency_symbol")]
        currency_symbol: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    Http {
        url: String,
        pointer: String,
        #[serde(default = "default_currency_symbol")]
        currency_symbol: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    Fixed {
        price: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotifierConfig {
    #[default]
    Log,
    Webhook {
        url: String,
    },
    Telegram {
        token: String,
    },
    Sns {
        #[serde(default = "default_sns_region")]
        region: String,
    },
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

fn default_sns_region() -> String {
    DEFAULT_SNS_REGION.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl MonitorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = if path.extension().map_or(false, |ext| ext == "properties") {
            Self::from_properties(&content)?
        } else {
            Self::from_toml(&content)?
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, MonitorError> {
        toml::from_str(content)
            .map_err(|e| MonitorError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn from_properties(content: &str) -> Result<Self, MonitorError> {
        let props = parse_properties(content);
        let required = |name: &str| {
            props
                .get(name)
                .cloned()
                .ok_or_else(|| MonitorError::Config(format!("Missing property '{}'", name)))
        };
        let threshold = |name: &str, fallback: u64| match props.get(name) {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                MonitorError::Config(format!("Invalid {} '{}': {}", name, raw, e))
            }),
            None => Ok(fallback),
        };

        let defaults = ThresholdPolicy::default();
        let policy = ThresholdPolicy {
            change_threshold: threshold("policy.change_threshold", defaults.change_threshold)?,
            settle_threshold: threshold("policy.settle_threshold", defaults.settle_threshold)?,
        };

        let symbol = props
            .get("sampler.currency_symbol")
            .cloned()
            .unwrap_or_else(default_currency_symbol);
        let timeout_secs = threshold("sampler.timeout_secs", DEFAULT_TIMEOUT_SECS)?;
        let sampler = match (props.get("sampler.url"), props.get("sampler.kind")) {
            (Some(url), kind) => {
                let websocket = match kind.map(String::as_str) {
                    Some("ws") => true,
                    Some("http") => false,
                    Some(other) => {
                        return Err(MonitorError::Config(format!(
                            "Unknown sampler kind '{}'",
                            other
                        )))
                    }
                    None => url.starts_with("ws://") || url.starts_with("wss://"),
                };
                if websocket {
                    Some(SamplerConfig::Ws {
                        url: url.clone(),
                        subscribe: props.get("sampler.subscribe").cloned(),
                        pointer: props.get("sampler.pointer").cloned(),
                        currency_symbol: symbol,
                        timeout_secs,
                    })
                } else {
                    Some(SamplerConfig::Http {
                        url: url.clone(),
                        pointer: required("sampler.pointer")?,
                        currency_symbol: symbol,
                        timeout_secs,
                    })
                }
            }
            (None, _) => None,
        };

        // Legacy deployments alerted by SMS, so that stays the default here.
        let notifier = match props.get("notifier.kind").map(String::as_str) {
            None | Some("sns") => NotifierConfig::Sns {
                region: props
                    .get("notifier.region")
                    .cloned()
                    .unwrap_or_else(default_sns_region),
            },
            Some("log") => NotifierConfig::Log,
            Some("webhook") => NotifierConfig::Webhook {
                url: required("notifier.url")?,
            },
            Some("telegram") => NotifierConfig::Telegram {
                token: required("notifier.token")?,
            },
            Some(other) => {
                return Err(MonitorError::Config(format!(
                    "Unknown notifier kind '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            history: PathBuf::from(required("history")?),
            access: props.get("access").cloned(),
            key: props.get("key").cloned(),
            dest: required("dest")?,
            policy,
            sampler,
            notifier,
        })
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.history.as_os_str().is_empty() {
            return Err(MonitorError::Config("'history' must not be empty".to_string()));
        }
        if self.dest.trim().is_empty() {
            return Err(MonitorError::Config("'dest' must not be empty".to_string()));
        }
        if self.policy.change_threshold == 0 {
            return Err(MonitorError::Config(
                "change_threshold must be greater than zero".to_string(),
            ));
        }
        if self.policy.settle_threshold > self.policy.change_threshold {
            return Err(MonitorError::Config(format!(
                "settle_threshold ({}) exceeds change_threshold ({})",
                self.policy.settle_threshold, self.policy.change_threshold
            )));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            access: self.access.clone(),
            key: self.key.clone(),
        }
    }
}

/// Reads the `java.util.Properties` line format: `=`, `:` or whitespace
/// separators, `#`/`!` comments, `\` line continuations and `\t`, `\n`,
/// `\uXXXX` style escapes. Trailing whitespace on values is dropped.
fn parse_properties(content: &str) -> HashMap<String, String> {
    logical_lines(content)
        .iter()
        .map(|line| split_property(line))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut continuing = false;

    for raw in content.lines() {
        let line = raw.trim_start();
        if !continuing && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }

        let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            current.push_str(&line[..line.len() - 1]);
            continuing = true;
        } else {
            current.push_str(line);
            lines.push(std::mem::take(&mut current));
            continuing = false;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn split_property(line: &str) -> (String, String) {
    let mut chars = line.chars().peekable();
    let mut key = String::new();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                key.push(c);
                if let Some(escaped) = chars.next() {
                    key.push(escaped);
                }
            }
            '=' | ':' => break,
            c if c.is_whitespace() => {
                while chars.peek().map_or(false, |c| c.is_whitespace()) {
                    chars.next();
                }
                if matches!(chars.peek(), Some('=') | Some(':')) {
                    chars.next();
                }
                break;
            }
            c => key.push(c),
        }
    }

    let value: String = chars.collect();
    (unescape(&key), unescape(value.trim()))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('u');
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
