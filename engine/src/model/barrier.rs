//! Barrier configuration and result types shared by the barrier framework.

use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// A duration expressed either as an integer count of milliseconds or as a
/// suffixed string (`"5s"`, `"500ms"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlexDuration(pub u64);

impl FlexDuration {
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.0)
    }

    pub fn parse_str(s: &str) -> Option<u64> {
        if let Some(value) = s.strip_suffix("ms") {
            value.trim().parse().ok()
        } else if let Some(value) = s.strip_suffix('s') {
            value.trim().parse::<u64>().ok().map(|v| v * 1000)
        } else {
            s.trim().parse().ok()
        }
    }
}

impl<'de> Deserialize<'de> for FlexDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(ms) => Ok(FlexDuration(ms)),
            Raw::Str(s) => FlexDuration::parse_str(&s)
                .map(FlexDuration)
                .ok_or_else(|| de::Error::custom(format!("invalid duration: {s:?}"))),
        }
    }
}

impl Serialize for FlexDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

fn default_timeout_ms() -> FlexDuration {
    FlexDuration(5000)
}

fn default_consecutive_matches() -> u32 {
    3
}

fn default_polling_interval_ms() -> FlexDuration {
    FlexDuration(100)
}

/// Configuration for a single named barrier, as carried in a scene's barrier map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarrierConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: FlexDuration,
    #[serde(default = "default_consecutive_matches")]
    pub consecutive_matches: u32,
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: FlexDuration,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            consecutive_matches: default_consecutive_matches(),
            polling_interval_ms: default_polling_interval_ms(),
        }
    }
}

/// Outcome of waiting on any barrier.
#[derive(Debug, Clone)]
pub enum BarrierResult<T> {
    Success {
        value: Option<T>,
        elapsed: Duration,
    },
    Timeout {
        elapsed: Duration,
        diagnostics: String,
    },
    Failure {
        elapsed: Duration,
        error: String,
        diagnostics: String,
    },
}

impl<T> BarrierResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, BarrierResult::Success { .. })
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            BarrierResult::Success { elapsed, .. } => *elapsed,
            BarrierResult::Timeout { elapsed, .. } => *elapsed,
            BarrierResult::Failure { elapsed, .. } => *elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = BarrierConfig::default();
        assert_eq!(config.timeout_ms.0, 5000);
        assert_eq!(config.consecutive_matches, 3);
        assert_eq!(config.polling_interval_ms.0, 100);
    }

    #[test]
    fn flex_duration_parses_suffixed_strings() {
        assert_eq!(FlexDuration::parse_str("5s"), Some(5000));
        assert_eq!(FlexDuration::parse_str("500ms"), Some(500));
        assert_eq!(FlexDuration::parse_str("42"), Some(42));
        assert_eq!(FlexDuration::parse_str("bogus"), None);
    }

    #[test]
    fn flex_duration_deserializes_from_int_or_string() {
        let from_int: FlexDuration = serde_json::from_value(serde_json::json!(1500)).unwrap();
        assert_eq!(from_int.0, 1500);

        let from_str: FlexDuration = serde_json::from_value(serde_json::json!("2s")).unwrap();
        assert_eq!(from_str.0, 2000);
    }
}
