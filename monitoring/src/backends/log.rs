use tracing::info;

use crate::{
    backend::{Backend, BackendError, Verbosity},
    backends::influxdb::unix_nanos,
    metric::Metric,
};

/// Emits every metric as a structured `tracing` event on the `monitoring::metrics` target.
///
/// Events are emitted at `INFO` level with `name`, `value`, `metric_type`, `timestamp` and `tags` fields, and end up
/// wherever the process's subscriber sends them.
#[derive(Default)]
pub struct Log {
    global_tags: Vec<(String, String)>,
    verbosity: Verbosity,
}

impl Log {
    /// Creates a new `Log` backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn render_tags(&self, metric: &Metric) -> String {
        metric
            .tags()
            .iter()
            .map(|t| (t.name(), t.value()))
            .chain(self.global_tags.iter().map(|(n, v)| (n.as_str(), v.as_str())))
            .map(|(n, v)| format!("{}={}", n, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Backend for Log {
    fn send(&mut self, metric: &Metric) -> Result<(), BackendError> {
        info!(
            target: "monitoring::metrics",
            name = metric.name(),
            value = %metric.value(),
            metric_type = metric.metric_type().as_str(),
            timestamp = unix_nanos(metric.timestamp()),
            tags = %self.render_tags(metric),
            "Metric."
        );
        Ok(())
    }

    fn add_global_tag(&mut self, name: &str, value: &str) {
        self.global_tags.push((name.to_string(), value.to_string()));
    }

    fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    fn verbosity(&self) -> Verbosity {
        self.verbosity
    }
}
