use std::time::Duration;

use serde::Deserialize;

use crate::error::{LumenError, Result};

pub const DEBUG_ENV: &str = "LUMEN_DEBUG";
pub const STATEMENT_TIMEOUT_ENV: &str = "LUMEN_STATEMENT_TIMEOUT_MS";

/// Client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log every statement with its arguments at debug level
    pub debug: bool,
    /// Upper bound for a single driver call, in milliseconds
    pub statement_timeout_ms: Option<u64>,
}

impl Config {
    /// Reads `LUMEN_DEBUG` and `LUMEN_STATEMENT_TIMEOUT_MS`; unset variables keep defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(DEBUG_ENV) {
            config.debug = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "" | "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(LumenError::validation(
                        DEBUG_ENV,
                        format!("invalid boolean {:?} for {}", raw, DEBUG_ENV),
                    ))
                }
            };
        }
        if let Some(raw) = lookup(STATEMENT_TIMEOUT_ENV) {
            let ms = raw.trim().parse::<u64>().map_err(|e| {
                LumenError::validation(
                    STATEMENT_TIMEOUT_ENV,
                    format!("invalid value {:?} for {}: {}", raw, STATEMENT_TIMEOUT_ENV, e),
                )
            })?;
            config.statement_timeout_ms = Some(ms);
        }
        Ok(config)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_ms.map(Duration::from_millis)
    }
}
