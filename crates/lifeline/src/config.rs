// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub(crate) const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub(crate) const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub(crate) const DEFAULT_BREAKER_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub(crate) const DEFAULT_HISTORY_CAPACITY: usize = 500;
pub(crate) const DEFAULT_HISTORY_RETAIN: usize = 250;
pub(crate) const DEFAULT_RECENT_WINDOW: Duration = Duration::from_secs(5 * 60);
pub(crate) const DEFAULT_RECENT_LIMIT: usize = 10;
pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Caps the attempts of every operation whose name contains `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptLimit {
    /// Substring matched against the operation name.
    pub pattern: String,
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
}

impl AttemptLimit {
    /// Creates a new attempt limit.
    pub fn new(pattern: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            pattern: pattern.into(),
            max_attempts,
        }
    }
}

/// Engine-wide recovery settings.
///
/// All durations serialize as whole milliseconds and every field falls back to its default
/// when missing, so partial documents deserialize cleanly.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use lifeline::RecoveryConfig;
///
/// let config: RecoveryConfig = serde_json::from_str(r#"{ "base_delay": 250 }"#).unwrap();
///
/// assert_eq!(config.base_delay, Duration::from_millis(250));
/// assert_eq!(config.failure_threshold, 5);
/// assert_eq!(config.max_attempts_for("extract-data"), 5);
/// assert_eq!(config.max_attempts_for("upload"), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Base delay fed into every [`Backoff`][crate::Backoff] computation.
    #[serde(with = "millis")]
    pub base_delay: Duration,
    /// Number of exhausted calls that opens an operation's circuit breaker.
    pub failure_threshold: u32,
    /// How long an open breaker rejects calls before admitting a trial.
    #[serde(with = "millis")]
    pub reset_timeout: Duration,
    /// Breakers whose last failure is older than this are dropped by the idle sweep.
    #[serde(with = "millis")]
    pub breaker_idle_timeout: Duration,
    /// Whether exhausted operations may fall back to a degraded result.
    pub graceful_degradation: bool,
    /// Whether per-attempt debug events are emitted.
    pub debug_logging: bool,
    /// Maximum number of failure records kept.
    pub history_capacity: usize,
    /// Number of most recent records kept when the history overflows.
    pub history_retain: usize,
    /// Window in which failures count as recent.
    #[serde(with = "millis")]
    pub recent_window: Duration,
    /// Maximum number of recent failures reported in statistics.
    pub recent_limit: usize,
    /// Attempt ceilings by operation name, first match wins.
    pub attempt_limits: Vec<AttemptLimit>,
    /// Attempt ceiling of operations that match no entry of `attempt_limits`.
    pub default_max_attempts: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            breaker_idle_timeout: DEFAULT_BREAKER_IDLE_TIMEOUT,
            graceful_degradation: true,
            debug_logging: false,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            history_retain: DEFAULT_HISTORY_RETAIN,
            recent_window: DEFAULT_RECENT_WINDOW,
            recent_limit: DEFAULT_RECENT_LIMIT,
            attempt_limits: vec![
                AttemptLimit::new("extract-data", 5),
                AttemptLimit::new("ai-review", 5),
                AttemptLimit::new("navigate", 3),
                AttemptLimit::new("activate-patient", 3),
            ],
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RecoveryConfig {
    /// Returns the attempt ceiling for the given operation name.
    ///
    /// The result is never below one.
    #[must_use]
    pub fn max_attempts_for(&self, operation_name: &str) -> u32 {
        self.attempt_limits
            .iter()
            .find(|limit| operation_name.contains(limit.pattern.as_str()))
            .map_or(self.default_max_attempts, |limit| limit.max_attempts)
            .max(1)
    }
}

/// A partial [`RecoveryConfig`]; only the fields that are set are applied.
///
/// # Examples
///
/// ```rust
/// use lifeline::{ConfigUpdate, RecoveryConfig};
///
/// let mut config = RecoveryConfig::default();
/// ConfigUpdate {
///     graceful_degradation: Some(false),
///     ..ConfigUpdate::default()
/// }
/// .apply_to(&mut config);
///
/// assert!(!config.graceful_degradation);
/// assert_eq!(config.failure_threshold, 5);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    /// See [`RecoveryConfig::base_delay`].
    #[serde(with = "millis_opt")]
    pub base_delay: Option<Duration>,
    /// See [`RecoveryConfig::failure_threshold`].
    pub failure_threshold: Option<u32>,
    /// See [`RecoveryConfig::reset_timeout`].
    #[serde(with = "millis_opt")]
    pub reset_timeout: Option<Duration>,
    /// See [`RecoveryConfig::breaker_idle_timeout`].
    #[serde(with = "millis_opt")]
    pub breaker_idle_timeout: Option<Duration>,
    /// See [`RecoveryConfig::graceful_degradation`].
    pub graceful_degradation: Option<bool>,
    /// See [`RecoveryConfig::debug_logging`].
    pub debug_logging: Option<bool>,
    /// See [`RecoveryConfig::history_capacity`].
    pub history_capacity: Option<usize>,
    /// See [`RecoveryConfig::history_retain`].
    pub history_retain: Option<usize>,
    /// See [`RecoveryConfig::recent_window`].
    #[serde(with = "millis_opt")]
    pub recent_window: Option<Duration>,
    /// See [`RecoveryConfig::recent_limit`].
    pub recent_limit: Option<usize>,
    /// See [`RecoveryConfig::attempt_limits`].
    pub attempt_limits: Option<Vec<AttemptLimit>>,
    /// See [`RecoveryConfig::default_max_attempts`].
    pub default_max_attempts: Option<u32>,
}

impl ConfigUpdate {
    /// Overwrites the fields of `config` that are set in this update.
    pub fn apply_to(self, config: &mut RecoveryConfig) {
        macro_rules! apply {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(value) = self.$field {
                        config.$field = value;
                    }
                )*
            };
        }

        apply!(
            base_delay,
            failure_threshold,
            reset_timeout,
            breaker_idle_timeout,
            graceful_degradation,
            debug_logging,
            history_capacity,
            history_retain,
            recent_window,
            recent_limit,
            attempt_limits,
            default_max_attempts,
        );
    }
}

impl From<RecoveryConfig> for ConfigUpdate {
    fn from(config: RecoveryConfig) -> Self {
        Self {
            base_delay: Some(config.base_delay),
            failure_threshold: Some(config.failure_threshold),
            reset_timeout: Some(config.reset_timeout),
            breaker_idle_timeout: Some(config.breaker_idle_timeout),
            graceful_degradation: Some(config.graceful_degradation),
            debug_logging: Some(config.debug_logging),
            history_capacity: Some(config.history_capacity),
            history_retain: Some(config.history_retain),
            recent_window: Some(config.recent_window),
            recent_limit: Some(config.recent_limit),
            attempt_limits: Some(config.attempt_limits),
            default_max_attempts: Some(config.default_max_attempts),
        }
    }
}

pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

pub(crate) mod millis_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[expect(clippy::ref_option, reason = "signature required by serde(with)")]
    pub(crate) fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => super::millis::serialize(duration, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|value| value.map(Duration::from_millis))
    }
}
