use std::time::{SystemTime, UNIX_EPOCH};

use crate::metric::{Metric, MetricValue, Tag};

struct ValueFormatter {
    int_writer: itoa::Buffer,
    float_writer: ryu::Buffer,
}

impl ValueFormatter {
    fn new() -> Self {
        Self { int_writer: itoa::Buffer::new(), float_writer: ryu::Buffer::new() }
    }

    /// Renders a numeric value, returning `None` for strings.
    fn format_numeric(&mut self, value: &MetricValue) -> Option<&str> {
        match value {
            MetricValue::Int(v) => Some(self.int_writer.format(*v)),
            MetricValue::UInt64(v) => Some(self.int_writer.format(*v)),
            MetricValue::Double(v) => Some(self.float_writer.format(*v)),
            MetricValue::String(_) => None,
        }
    }
}

/// Encodes metrics into the line protocol.
///
/// A line has the shape `<measurement>[,<tag>=<value>...] <field>=<value>[,...] <timestamp>`, where the timestamp is
/// in nanoseconds since the Unix epoch. Measurement names, tag keys and values, and string field values have commas,
/// equals signs and spaces escaped with a backslash; string field values are also wrapped in double quotes.
///
/// Global tags are rendered once, when they are added, and appended to every line after the metric's own tags.
pub struct LineWriter {
    tag_set: String,
    buf: String,
    formatter: ValueFormatter,
}

impl LineWriter {
    /// Creates a `LineWriter` with no global tags.
    pub fn new() -> Self {
        LineWriter { tag_set: String::new(), buf: String::new(), formatter: ValueFormatter::new() }
    }

    /// Adds a tag to render on every line.
    pub fn add_global_tag(&mut self, name: &str, value: &str) {
        if !self.tag_set.is_empty() {
            self.tag_set.push(',');
        }
        escape_into(&mut self.tag_set, name);
        self.tag_set.push('=');
        escape_into(&mut self.tag_set, value);
    }

    /// Returns the pre-rendered global tag set, without a leading comma.
    pub fn tag_set(&self) -> &str {
        &self.tag_set
    }

    /// Encodes a single metric as a line with one field named `value`.
    pub fn write_metric(&mut self, metric: &Metric) -> &str {
        self.buf.clear();
        self.write_header(metric.name(), metric.tags());

        self.buf.push_str(" value=");
        self.write_value(metric.value());
        self.write_timestamp(metric.timestamp());

        &self.buf
    }

    /// Encodes several metrics as fields of one measurement, using the timestamp of the first metric.
    ///
    /// Only global tags are rendered. Returns `None` if `metrics` is empty.
    pub fn write_grouped(&mut self, measurement: &str, metrics: &[Metric]) -> Option<&str> {
        let first = metrics.first()?;

        self.buf.clear();
        self.write_header(measurement, &[]);

        for (i, metric) in metrics.iter().enumerate() {
            self.buf.push(if i == 0 { ' ' } else { ',' });
            escape_into(&mut self.buf, metric.name());
            self.buf.push('=');
            self.write_value(metric.value());
        }
        self.write_timestamp(first.timestamp());

        Some(self.buf.as_str())
    }

    fn write_header(&mut self, name: &str, tags: &[Tag]) {
        escape_into(&mut self.buf, name);

        for tag in tags {
            self.buf.push(',');
            escape_into(&mut self.buf, tag.name());
            self.buf.push('=');
            escape_into(&mut self.buf, tag.value());
        }

        if !self.tag_set.is_empty() {
            self.buf.push(',');
            self.buf.push_str(&self.tag_set);
        }
    }

    fn write_value(&mut self, value: &MetricValue) {
        match value {
            MetricValue::String(s) => {
                self.buf.push('"');
                escape_into(&mut self.buf, s);
                self.buf.push('"');
            }
            numeric => {
                if let Some(rendered) = self.formatter.format_numeric(numeric) {
                    self.buf.push_str(rendered);
                }
            }
        }
    }

    fn write_timestamp(&mut self, timestamp: SystemTime) {
        self.buf.push(' ');
        self.buf.push_str(self.formatter.int_writer.format(unix_nanos(timestamp)));
    }
}

impl Default for LineWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a timestamp to nanoseconds since the Unix epoch, clamping pre-epoch times to zero.
pub fn unix_nanos(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Appends `raw` to `buf`, prefixing every comma, equals sign and space with a backslash.
pub fn escape_into(buf: &mut String, raw: &str) {
    for c in raw.chars() {
        if matches!(c, ',' | '=' | ' ') {
            buf.push('\\');
        }
        buf.push(c);
    }
}
