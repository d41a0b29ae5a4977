use std::time::Duration;

use quanta::Clock;
use thiserror::Error;

use crate::{
    backend::Backend,
    factory::backend_from_url,
    monitoring::{Monitoring, MonitoringError},
    process::ProcessDetails,
    scheduler::DEFAULT_TICK_INTERVAL,
    transports::TransportError,
};

/// Errors that could occur while building a [`Monitoring`].
#[derive(Debug, Error)]
pub enum BuildError {
    /// A backend URL could not be parsed.
    #[error("invalid backend URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,

        /// Details about the parsing failure.
        reason: String,
    },

    /// A backend URL names an unknown scheme.
    #[error("unrecognized backend scheme '{scheme}'")]
    UnrecognizedBackend {
        /// The unknown scheme.
        scheme: String,
    },

    /// A backend URL names a known backend over a transport that is not available.
    #[error("backend transport '{scheme}' is not supported")]
    UnsupportedTransport {
        /// The unsupported scheme.
        scheme: String,
    },

    /// A backend's transport could not be created.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Background activity could not be enabled.
    #[error(transparent)]
    Monitoring(#[from] MonitoringError),
}

/// Builder for a [`Monitoring`].
///
/// ```no_run
/// # use std::time::Duration;
/// # use monitoring::{Metric, MonitoringBuilder};
/// let monitoring = MonitoringBuilder::new()
///     .with_backend_urls("stdout://,influxdb-udp://localhost:8089")?
///     .with_process_tags()
///     .with_process_monitoring(Duration::from_secs(5))
///     .build()?;
///
/// monitoring.send(Metric::new("requests", 10));
/// # Ok::<(), monitoring::BuildError>(())
/// ```
pub struct MonitoringBuilder {
    backends: Vec<Box<dyn Backend>>,
    global_tags: Vec<(String, String)>,
    buffer_size: Option<usize>,
    process_monitoring: Option<Duration>,
    auto_push: Option<Duration>,
    tick_interval: Duration,
    clock: Clock,
}

impl MonitoringBuilder {
    /// Creates a builder with no backends.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a backend.
    #[must_use]
    pub fn with_backend<B>(self, backend: B) -> Self
    where
        B: Backend + 'static,
    {
        self.with_boxed_backend(Box::new(backend))
    }

    /// Adds an already boxed backend.
    #[must_use]
    pub fn with_boxed_backend(mut self, backend: Box<dyn Backend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Adds a backend described by a URL.
    ///
    /// See [`backend_from_url`] for the accepted format.
    ///
    /// # Errors
    ///
    /// If the URL is invalid, or the backend cannot be created, an error is returned.
    pub fn with_backend_url(self, url: &str) -> Result<Self, BuildError> {
        Ok(self.with_boxed_backend(backend_from_url(url)?))
    }

    /// Adds a backend for each URL in a comma separated list.
    ///
    /// # Errors
    ///
    /// If any URL is invalid, or any backend cannot be created, an error is returned.
    pub fn with_backend_urls(self, urls: &str) -> Result<Self, BuildError> {
        urls.split(',').map(str::trim).filter(|url| !url.is_empty()).try_fold(self, Self::with_backend_url)
    }

    /// Adds a global tag, applied to every metric sent.
    #[must_use]
    pub fn with_global_tag<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.global_tags.push((name.into(), value.into()));
        self
    }

    /// Adds `hostname` and `name` global tags describing the current process.
    #[must_use]
    pub fn with_process_tags(self) -> Self {
        let details = ProcessDetails::current();
        self.with_global_tag("hostname", details.hostname()).with_global_tag("name", details.name())
    }

    /// Enables buffering, sending metrics in batches of up to `size`.
    ///
    /// Defaults to disabled. See [`DEFAULT_BUFFER_SIZE`][crate::DEFAULT_BUFFER_SIZE] for a typical size.
    #[must_use]
    pub fn with_buffering(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    /// Enables sampling of the current process's resource usage every `interval`.
    ///
    /// Defaults to disabled. See
    /// [`DEFAULT_PROCESS_MONITORING_INTERVAL`][crate::DEFAULT_PROCESS_MONITORING_INTERVAL] for a typical interval.
    #[must_use]
    pub fn with_process_monitoring(mut self, interval: Duration) -> Self {
        self.process_monitoring = Some(interval);
        self
    }

    /// Enables pushing of auto-push metrics every `interval`.
    ///
    /// Defaults to disabled. See [`DEFAULT_AUTO_PUSH_INTERVAL`][crate::DEFAULT_AUTO_PUSH_INTERVAL] for a typical
    /// interval.
    #[must_use]
    pub fn with_auto_push(mut self, interval: Duration) -> Self {
        self.auto_push = Some(interval);
        self
    }

    /// Sets how often the background thread checks whether sampling or auto-push are due.
    ///
    /// Intervals shorter than the tick are effectively rounded up to it.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Sets the clock used for timers and background intervals.
    ///
    /// Mostly useful in tests, with [`Clock::mock`].
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the [`Monitoring`].
    ///
    /// Backends are registered before global tags are added, so every backend given to the builder receives every
    /// global tag given to the builder.
    ///
    /// # Errors
    ///
    /// If the background thread is needed but cannot be started, or process monitoring cannot be set up, an error is
    /// returned.
    pub fn build(self) -> Result<Monitoring, BuildError> {
        let monitoring = Monitoring::with_clock(self.clock, self.tick_interval);

        for backend in self.backends {
            monitoring.add_boxed_backend(backend);
        }
        for (name, value) in self.global_tags {
            monitoring.add_global_tag(name, value);
        }
        if let Some(size) = self.buffer_size {
            monitoring.enable_buffering(size);
        }
        if let Some(interval) = self.process_monitoring {
            monitoring.enable_process_monitoring(interval)?;
        }
        if let Some(interval) = self.auto_push {
            monitoring.enable_auto_push(interval)?;
        }

        Ok(monitoring)
    }
}

impl Default for MonitoringBuilder {
    fn default() -> Self {
        MonitoringBuilder {
            backends: Vec::new(),
            global_tags: Vec::new(),
            buffer_size: None,
            process_monitoring: None,
            auto_push: None,
            tick_interval: DEFAULT_TICK_INTERVAL,
            clock: Clock::new(),
        }
    }
}
