use std::{fmt, io, str::FromStr};

use thiserror::Error;

use crate::metric::Metric;

/// Which metrics a backend is interested in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verbosity {
    /// Receives metrics sent with `send`, but not those sent with `debug`.
    #[default]
    Prod,

    /// Receives metrics sent with both `send` and `debug`.
    Debug,
}

impl Verbosity {
    /// Returns the lowercase name of this verbosity level.
    pub const fn as_str(self) -> &'static str {
        match self {
            Verbosity::Prod => "prod",
            Verbosity::Debug => "debug",
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prod" => Ok(Verbosity::Prod),
            "debug" => Ok(Verbosity::Debug),
            other => Err(format!("invalid verbosity '{}' (expected 'prod' or 'debug')", other)),
        }
    }
}

/// Errors a backend can report while emitting metrics.
///
/// These never interrupt dispatch: the engine logs them and moves on to the next metric or backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The underlying transport or writer failed.
    #[error("failed to transmit metric: {0}")]
    Io(#[from] io::Error),

    /// The metric could not be rendered by the backend.
    #[error("failed to write metric `{name}`: {reason}")]
    Write {
        /// Name of the metric that could not be written.
        name: String,

        /// Why it could not be written.
        reason: String,
    },
}

/// A sink that metrics are fanned out to.
///
/// Only [`Backend::send`] and [`Backend::add_global_tag`] are required. Batches and grouped sends fall back to sending
/// each metric individually, in order. Backends that do not track verbosity report themselves as
/// [`Verbosity::Debug`] and so receive everything.
pub trait Backend: Send {
    /// Sends a single metric.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric could not be rendered or handed to the transport.
    fn send(&mut self, metric: &Metric) -> Result<(), BackendError>;

    /// Sends several unrelated metrics, in order.
    ///
    /// Every metric is attempted even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the last error encountered, if any.
    fn send_batch(&mut self, metrics: &[Metric]) -> Result<(), BackendError> {
        let mut result = Ok(());
        for metric in metrics {
            if let Err(e) = self.send(metric) {
                result = Err(e);
            }
        }
        result
    }

    /// Sends related metrics as a single measurement named `measurement`.
    ///
    /// Backends without grouping support send each metric individually instead.
    ///
    /// # Errors
    ///
    /// Returns the last error encountered, if any.
    fn send_grouped(&mut self, measurement: &str, metrics: &[Metric]) -> Result<(), BackendError> {
        let _ = measurement;
        let mut result = Ok(());
        for metric in metrics {
            if let Err(e) = self.send(metric) {
                result = Err(e);
            }
        }
        result
    }

    /// Adds a tag to attach to every metric this backend emits from now on.
    fn add_global_tag(&mut self, name: &str, value: &str);

    /// Sets the verbosity of this backend.
    fn set_verbosity(&mut self, verbosity: Verbosity) {
        let _ = verbosity;
    }

    /// Returns the verbosity of this backend.
    fn verbosity(&self) -> Verbosity {
        Verbosity::Debug
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn send(&mut self, metric: &Metric) -> Result<(), BackendError> {
        (**self).send(metric)
    }

    fn send_batch(&mut self, metrics: &[Metric]) -> Result<(), BackendError> {
        (**self).send_batch(metrics)
    }

    fn send_grouped(&mut self, measurement: &str, metrics: &[Metric]) -> Result<(), BackendError> {
        (**self).send_grouped(measurement, metrics)
    }

    fn add_global_tag(&mut self, name: &str, value: &str) {
        (**self).add_global_tag(name, value);
    }

    fn set_verbosity(&mut self, verbosity: Verbosity) {
        (**self).set_verbosity(verbosity);
    }

    fn verbosity(&self) -> Verbosity {
        (**self).verbosity()
    }
}

#[cfg(test)]
mod tests {
    use super::{Backend, Verbosity};
    use crate::{
        metric::Metric,
        test_util::{Call, RecordingBackend},
    };

    #[test]
    fn verbosity_parsing() {
        assert_eq!("prod".parse::<Verbosity>(), Ok(Verbosity::Prod));
        assert_eq!("debug".parse::<Verbosity>(), Ok(Verbosity::Debug));
        assert!("loud".parse::<Verbosity>().is_err());
        assert_eq!(Verbosity::default(), Verbosity::Prod);
    }

    #[test]
    fn batch_falls_back_to_single_sends() {
        let (mut backend, calls) = RecordingBackend::new();
        let metrics = [Metric::new("a", 1), Metric::new("b", 2)];
        backend.send_batch(&metrics).unwrap();

        assert_eq!(calls.take(), vec![Call::Send("a".into()), Call::Send("b".into())]);
    }

    #[test]
    fn grouped_send_falls_back_to_single_sends() {
        let (mut grouped, grouped_calls) = RecordingBackend::new();
        let (mut single, single_calls) = RecordingBackend::new();
        let metrics = [Metric::new("a", 1), Metric::new("b", 2.5), Metric::new("c", "x")];

        grouped.send_grouped("m", &metrics).unwrap();
        for metric in &metrics {
            single.send(metric).unwrap();
        }

        let grouped_calls = grouped_calls.take();
        assert_eq!(grouped_calls.len(), 3);
        assert_eq!(grouped_calls, single_calls.take());
    }

    #[test]
    fn batch_attempts_every_metric_after_a_failure() {
        let (mut backend, calls) = RecordingBackend::new();
        backend.fail_on("a");
        let metrics = [Metric::new("a", 1), Metric::new("b", 2)];

        assert!(backend.send_batch(&metrics).is_err());
        assert_eq!(calls.take(), vec![Call::Send("a".into()), Call::Send("b".into())]);
    }

    #[test]
    fn untracked_verbosity_receives_everything() {
        let (backend, _) = RecordingBackend::new();
        assert_eq!(backend.verbosity(), Verbosity::Debug);
    }
}
