use serde::{Deserialize, Serialize};

/// Monitor configuration with per-field defaults.
///
/// Every field has a serde default so partial TOML files work:
///
/// ```
/// use vigil_common::config::MonitorConfig;
///
/// let cfg: MonitorConfig = toml::from_str("interval_secs = 15").unwrap();
/// assert_eq!(cfg.interval_secs, 15);
/// assert_eq!(cfg.baseline_window_hours, 24);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between scheduled evaluation passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Maximum retained samples per metric.
    #[serde(default = "default_max_history_size")]
    pub max_history_size: usize,
    /// Window used for rolling baselines; samples are pruned past twice this.
    #[serde(default = "default_baseline_window_hours")]
    pub baseline_window_hours: u64,
    /// Per-pass time budget.
    #[serde(default = "default_evaluation_timeout_secs")]
    pub evaluation_timeout_secs: u64,
    /// Rule-level cooldown applied when a rule does not specify one.
    #[serde(default = "default_cooldown_minutes")]
    pub default_cooldown_minutes: u32,
    /// How long `stop()` waits for an in-flight pass before giving up.
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
    /// Bounded size of the dispatch history kept for statistics.
    #[serde(default = "default_dispatch_history_cap")]
    pub dispatch_history_cap: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_history_size: default_max_history_size(),
            baseline_window_hours: default_baseline_window_hours(),
            evaluation_timeout_secs: default_evaluation_timeout_secs(),
            default_cooldown_minutes: default_cooldown_minutes(),
            stop_grace_secs: default_stop_grace_secs(),
            dispatch_history_cap: default_dispatch_history_cap(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_max_history_size() -> usize {
    1000
}

fn default_baseline_window_hours() -> u64 {
    24
}

fn default_evaluation_timeout_secs() -> u64 {
    10
}

fn default_cooldown_minutes() -> u32 {
    30
}

fn default_stop_grace_secs() -> u64 {
    5
}

fn default_dispatch_history_cap() -> usize {
    1000
}

impl MonitorConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: MonitorConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.interval_secs, 60);
        assert_eq!(cfg.max_history_size, 1000);
        assert_eq!(cfg.baseline_window_hours, 24);
        assert_eq!(cfg.evaluation_timeout_secs, 10);
        assert_eq!(cfg.default_cooldown_minutes, 30);
        assert_eq!(cfg.stop_grace_secs, 5);
        assert_eq!(cfg.dispatch_history_cap, 1000);
    }

    #[test]
    fn overrides_apply() {
        let cfg: MonitorConfig =
            toml::from_str("interval_secs = 5\ndefault_cooldown_minutes = 0").unwrap();
        assert_eq!(cfg.interval_secs, 5);
        assert_eq!(cfg.default_cooldown_minutes, 0);
        assert_eq!(cfg.baseline_window_hours, 24);
    }
}
