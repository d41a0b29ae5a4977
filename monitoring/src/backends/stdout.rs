use std::io::{self, Stdout, Write};

use crate::{
    backend::{Backend, BackendError, Verbosity},
    backends::influxdb::unix_nanos,
    metric::Metric,
};

/// Writes one human-readable line per metric.
///
/// Lines look like `[METRIC] <name>,<type> <value> <unix nanos> <tags>`, where tags are the metric's own tags followed
/// by the global tags, as comma-separated `name=value` pairs.
pub struct StdOut<W = Stdout> {
    out: W,
    global_tags: String,
    verbosity: Verbosity,
}

impl StdOut<Stdout> {
    /// Creates a backend writing to standard output.
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for StdOut<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> StdOut<W> {
    /// Creates a backend writing to `out`.
    pub fn with_writer(out: W) -> Self {
        StdOut { out, global_tags: String::new(), verbosity: Verbosity::default() }
    }

    /// Consumes the backend, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, name: &str, metric: &Metric) -> io::Result<()> {
        let mut tags =
            metric.tags().iter().map(|t| format!("{}={}", t.name(), t.value())).collect::<Vec<_>>().join(",");
        if !self.global_tags.is_empty() {
            if !tags.is_empty() {
                tags.push(',');
            }
            tags.push_str(&self.global_tags);
        }

        writeln!(
            self.out,
            "[METRIC] {},{} {} {} {}",
            name,
            metric.metric_type().as_u8(),
            metric.value(),
            unix_nanos(metric.timestamp()),
            tags
        )
    }
}

impl<W: Write + Send> Backend for StdOut<W> {
    fn send(&mut self, metric: &Metric) -> Result<(), BackendError> {
        self.write_line(metric.name(), metric)?;
        Ok(())
    }

    fn send_grouped(&mut self, measurement: &str, metrics: &[Metric]) -> Result<(), BackendError> {
        for metric in metrics {
            let name = format!("{}/{}", measurement, metric.name());
            self.write_line(&name, metric)?;
        }
        Ok(())
    }

    fn add_global_tag(&mut self, name: &str, value: &str) {
        if !self.global_tags.is_empty() {
            self.global_tags.push(',');
        }
        self.global_tags.push_str(name);
        self.global_tags.push('=');
        self.global_tags.push_str(value);
    }

    fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    fn verbosity(&self) -> Verbosity {
        self.verbosity
    }
}
