use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use vigil_common::types::{MetricSample, FLOAT_EPSILON};

/// Baselines are recomputed at most this often.
const BASELINE_REFRESH_SECS: i64 = 3600;
/// A baseline is undefined below this many in-window samples.
const MIN_BASELINE_SAMPLES: usize = 5;
/// Trend direction is unknown below this many points.
const MIN_TREND_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    Unknown,
}

/// Summary of a metric's behavior over a requested window.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrendReport {
    pub metric_name: String,
    pub window_hours: u64,
    pub sample_count: usize,
    pub first: Option<f64>,
    pub last: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub direction: TrendDirection,
}

struct CachedBaseline {
    value: f64,
    computed_at: DateTime<Utc>,
}

/// Bounded, time-pruned sample history per metric, with derived rolling
/// baselines and trend statistics.
///
/// State is per-metric; computations for different metrics never contend
/// beyond the map locks, so callers may query freely while the monitor
/// records new samples.
pub struct BaselineTracker {
    window_hours: u64,
    max_history: usize,
    series: RwLock<HashMap<String, VecDeque<MetricSample>>>,
    baselines: RwLock<HashMap<String, CachedBaseline>>,
}

impl BaselineTracker {
    pub fn new(window_hours: u64, max_history: usize) -> Self {
        Self {
            window_hours,
            max_history,
            series: RwLock::new(HashMap::new()),
            baselines: RwLock::new(HashMap::new()),
        }
    }

    /// Appends a sample and prunes anything older than twice the baseline
    /// window (or beyond the per-metric size cap).
    pub fn record(&self, metric: &str, value: f64, at: DateTime<Utc>) {
        let mut series = self.series.write().unwrap_or_else(|p| p.into_inner());
        let samples = series.entry(metric.to_string()).or_default();
        samples.push_back(MetricSample {
            metric_name: metric.to_string(),
            value,
            timestamp: at,
        });

        let cutoff = at - Duration::hours(2 * self.window_hours as i64);
        while let Some(front) = samples.front() {
            if front.timestamp < cutoff {
                samples.pop_front();
            } else {
                break;
            }
        }
        while samples.len() > self.max_history {
            samples.pop_front();
        }
    }

    pub fn sample_count(&self, metric: &str) -> usize {
        self.series
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(metric)
            .map_or(0, VecDeque::len)
    }

    /// Samples for `metric` no older than `hours`, oldest first.
    pub fn recent_samples(&self, metric: &str, hours: u64) -> Vec<MetricSample> {
        let cutoff = Utc::now() - Duration::hours(hours as i64);
        self.series
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(metric)
            .map_or_else(Vec::new, |samples| {
                samples
                    .iter()
                    .filter(|s| s.timestamp >= cutoff)
                    .cloned()
                    .collect()
            })
    }

    /// Rolling baseline: arithmetic mean of the samples inside the baseline
    /// window. `None` with fewer than five in-window samples. The value is
    /// cached per metric and recomputed at most once per hour.
    pub fn baseline(&self, metric: &str) -> Option<f64> {
        let now = Utc::now();
        {
            let cache = self.baselines.read().unwrap_or_else(|p| p.into_inner());
            if let Some(cached) = cache.get(metric) {
                if (now - cached.computed_at).num_seconds() < BASELINE_REFRESH_SECS {
                    return Some(cached.value);
                }
            }
        }

        let samples = self.recent_samples(metric, self.window_hours);
        let mut cache = self.baselines.write().unwrap_or_else(|p| p.into_inner());
        if samples.len() < MIN_BASELINE_SAMPLES {
            cache.remove(metric);
            return None;
        }

        let mean = samples.iter().map(|s| s.value).sum::<f64>() / samples.len() as f64;
        cache.insert(
            metric.to_string(),
            CachedBaseline {
                value: mean,
                computed_at: now,
            },
        );
        Some(mean)
    }

    /// Trend over the requested window: range statistics plus a direction
    /// derived from the sign of the least-squares slope over the sample
    /// index. Direction is `Unknown` with fewer than three points.
    pub fn trend(&self, metric: &str, hours: u64) -> TrendReport {
        let samples = self.recent_samples(metric, hours);
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();

        let mean = if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        };

        let direction = if values.len() < MIN_TREND_POINTS {
            TrendDirection::Unknown
        } else {
            let slope = ols_slope(&values);
            if slope.abs() <= FLOAT_EPSILON {
                TrendDirection::Stable
            } else if slope > 0.0 {
                TrendDirection::Increasing
            } else {
                TrendDirection::Decreasing
            }
        };

        TrendReport {
            metric_name: metric.to_string(),
            window_hours: hours,
            sample_count: values.len(),
            first: values.first().copied(),
            last: values.last().copied(),
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
            mean,
            direction,
        }
    }
}

/// Least-squares slope of `values` against their index.
fn ols_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;

    for (i, y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let denom = n * sum_x2 - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}

/// True when `current` deviates from `baseline` by at least
/// `threshold_percent` percent. Requires a defined, non-zero baseline.
pub fn percent_change_exceeds(current: f64, baseline: f64, threshold_percent: f64) -> bool {
    if baseline.abs() < FLOAT_EPSILON {
        return false;
    }
    ((current - baseline).abs() / baseline.abs()) * 100.0 >= threshold_percent.abs()
}

/// True when `current` falls outside the inclusive `[min, max]` range.
pub fn outside_range(current: f64, min: f64, max: f64) -> bool {
    current < min || current > max
}
