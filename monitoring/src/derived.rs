use std::{collections::HashMap, time::SystemTime};

use thiserror::Error;

use crate::metric::{Metric, MetricType, MetricValue};

/// Which derived metrics to compute when sending a metric.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DerivedMetricMode {
    /// Send the metric as-is.
    #[default]
    None,

    /// Additionally send the per-second rate of change.
    Rate,

    /// Additionally send the difference from the previous value.
    Increment,

    /// Additionally send both the rate and the increment.
    RateAndIncrement,
}

impl DerivedMetricMode {
    const fn wants_rate(self) -> bool {
        matches!(self, DerivedMetricMode::Rate | DerivedMetricMode::RateAndIncrement)
    }

    const fn wants_increment(self) -> bool {
        matches!(self, DerivedMetricMode::Increment | DerivedMetricMode::RateAndIncrement)
    }
}

/// Errors that could occur while deriving metrics.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DerivedError {
    /// Rate and increment are only defined for numeric values.
    #[error("cannot derive from non-numeric metric `{name}` of type {metric_type}")]
    NonNumeric {
        /// Name of the offending metric.
        name: String,

        /// Type of the offending metric.
        metric_type: MetricType,
    },
}

struct Observation {
    value: MetricValue,
    timestamp: SystemTime,
}

/// Computes rates and increments from consecutive observations of the same metric name.
///
/// State is kept per metric name for as long as this value lives. The first observation of a name only seeds the
/// state; derived metrics are produced from the second observation onwards.
#[derive(Default)]
pub struct DerivedMetrics {
    rates: HashMap<String, Observation>,
    increments: HashMap<String, Observation>,
}

impl DerivedMetrics {
    /// Creates an empty `DerivedMetrics`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the derived metrics requested by `mode` for `metric`.
    ///
    /// # Errors
    ///
    /// If a derivation is requested for a string metric, [`DerivedError::NonNumeric`] is returned and no state is
    /// modified.
    pub fn derive(&mut self, metric: &Metric, mode: DerivedMetricMode) -> Result<Vec<Metric>, DerivedError> {
        let mut derived = Vec::new();
        if mode == DerivedMetricMode::None {
            return Ok(derived);
        }

        check_numeric(metric)?;
        if mode.wants_rate() {
            derived.extend(self.rate(metric)?);
        }
        if mode.wants_increment() {
            derived.extend(self.increment(metric)?);
        }

        Ok(derived)
    }

    /// Computes the per-second rate of change of `metric` since its previous observation.
    ///
    /// Returns `None` on the first observation, and when no wall time elapsed between the two observations.
    ///
    /// # Errors
    ///
    /// Returns [`DerivedError::NonNumeric`] for string metrics.
    pub fn rate(&mut self, metric: &Metric) -> Result<Option<Metric>, DerivedError> {
        let current = check_numeric(metric)?;
        let Some(previous) = remember(&mut self.rates, metric) else {
            return Ok(None);
        };
        let Some(last) = previous.value.as_f64() else {
            return Ok(None);
        };

        let elapsed = match metric.timestamp().duration_since(previous.timestamp) {
            Ok(elapsed) if !elapsed.is_zero() => elapsed,
            _ => return Ok(None),
        };

        let rate = (current - last) / elapsed.as_secs_f64();
        Ok(Some(derived_from(metric, "Rate", MetricValue::Double(rate))))
    }

    /// Computes the difference between `metric` and its previous observation.
    ///
    /// Returns `None` on the first observation.
    ///
    /// # Errors
    ///
    /// Returns [`DerivedError::NonNumeric`] for string metrics.
    pub fn increment(&mut self, metric: &Metric) -> Result<Option<Metric>, DerivedError> {
        check_numeric(metric)?;
        let Some(previous) = remember(&mut self.increments, metric) else {
            return Ok(None);
        };

        Ok(difference(metric.value(), &previous.value)
            .map(|delta| derived_from(metric, "Increment", delta)))
    }
}

fn check_numeric(metric: &Metric) -> Result<f64, DerivedError> {
    metric.value().as_f64().ok_or_else(|| DerivedError::NonNumeric {
        name: metric.name().to_string(),
        metric_type: metric.metric_type(),
    })
}

/// Stores `metric` as the latest observation of its name, returning the one it replaced.
fn remember(states: &mut HashMap<String, Observation>, metric: &Metric) -> Option<Observation> {
    let observation = Observation { value: metric.value().clone(), timestamp: metric.timestamp() };
    match states.get_mut(metric.name()) {
        Some(state) => Some(std::mem::replace(state, observation)),
        None => {
            states.insert(metric.name().to_string(), observation);
            None
        }
    }
}

fn difference(current: &MetricValue, last: &MetricValue) -> Option<MetricValue> {
    let signed = |delta: i128| {
        i64::try_from(delta).unwrap_or(if delta < 0 { i64::MIN } else { i64::MAX })
    };

    match (current, last) {
        (MetricValue::Int(c), MetricValue::Int(l)) => Some(MetricValue::Int(signed(i128::from(*c) - i128::from(*l)))),
        (MetricValue::UInt64(c), MetricValue::UInt64(l)) => {
            Some(MetricValue::Int(signed(i128::from(*c) - i128::from(*l))))
        }
        _ => Some(MetricValue::Double(current.as_f64()? - last.as_f64()?)),
    }
}

fn derived_from(metric: &Metric, suffix: &str, value: MetricValue) -> Metric {
    let mut derived = metric.clone();
    derived.set_name(format!("{}{}", metric.name(), suffix));
    derived.set_value(value);
    derived
}
