//! Line-protocol backend.

use tracing::debug;

use crate::{
    backend::{Backend, BackendError, Verbosity},
    metric::{Metric, MetricValue},
    transports::{Transport, TransportError, UdpTransport},
};

mod writer;
pub use self::writer::{escape_into, unix_nanos, LineWriter};

/// Sends metrics in the line protocol, one metric per payload.
///
/// Each payload is the encoded line followed by a newline. Grouped sends are supported natively and produce a single
/// line with one field per metric.
///
/// The line protocol has no representation for NaN or infinite floats. Metrics holding one are rejected with
/// [`BackendError::Write`] instead of being sent, and a grouped send containing one is rejected as a whole.
pub struct InfluxDb<T = UdpTransport> {
    transport: T,
    writer: LineWriter,
    payload: Vec<u8>,
    verbosity: Verbosity,
}

impl InfluxDb<UdpTransport> {
    /// Creates a backend sending UDP datagrams to `host:port`.
    ///
    /// # Errors
    ///
    /// If the address cannot be resolved or the local socket cannot be bound, an error is returned.
    pub fn udp(host: &str, port: u16) -> Result<Self, TransportError> {
        let transport = UdpTransport::new(host, port)?;
        debug!(remote_addr = %transport.remote_addr(), "Line-protocol backend enabled over UDP.");
        Ok(Self::with_transport(transport))
    }
}

impl<T: Transport> InfluxDb<T> {
    /// Creates a backend sending over the given transport.
    pub fn with_transport(transport: T) -> Self {
        InfluxDb { transport, writer: LineWriter::new(), payload: Vec::new(), verbosity: Verbosity::default() }
    }

    fn transmit(transport: &mut T, payload: &mut Vec<u8>, line: &str) -> Result<(), BackendError> {
        payload.clear();
        payload.extend_from_slice(line.as_bytes());
        payload.push(b'\n');
        transport.send(payload).map_err(BackendError::from)
    }
}

impl<T: Transport> Backend for InfluxDb<T> {
    fn send(&mut self, metric: &Metric) -> Result<(), BackendError> {
        check_finite(metric)?;
        let line = self.writer.write_metric(metric);
        Self::transmit(&mut self.transport, &mut self.payload, line)
    }

    fn send_grouped(&mut self, measurement: &str, metrics: &[Metric]) -> Result<(), BackendError> {
        metrics.iter().try_for_each(check_finite)?;
        match self.writer.write_grouped(measurement, metrics) {
            Some(line) => Self::transmit(&mut self.transport, &mut self.payload, line),
            None => Ok(()),
        }
    }

    fn add_global_tag(&mut self, name: &str, value: &str) {
        self.writer.add_global_tag(name, value);
    }

    fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    fn verbosity(&self) -> Verbosity {
        self.verbosity
    }
}

fn check_finite(metric: &Metric) -> Result<(), BackendError> {
    match metric.value() {
        MetricValue::Double(v) if !v.is_finite() => Err(BackendError::Write {
            name: metric.name().to_string(),
            reason: format!("{} cannot be represented in the line protocol", v),
        }),
        _ => Ok(()),
    }
}
