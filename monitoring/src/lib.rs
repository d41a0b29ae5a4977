//! Typed, tagged measurements dispatched to pluggable telemetry backends.
//!
//! # Usage
//!
//! Applications create a [`Monitoring`], usually through a [`MonitoringBuilder`], register one or more backends, and
//! then send [`Metric`]s to it from any thread:
//!
//! ```no_run
//! # use monitoring::{DerivedMetricMode, Metric, MonitoringBuilder};
//! let monitoring = MonitoringBuilder::new()
//!     .with_backend_url("influxdb-udp://localhost:8089")?
//!     .with_global_tag("subsystem", "readout")
//!     .build()?;
//!
//! // A plain metric, timestamped now.
//! monitoring.send(Metric::new("eventsProcessed", 1200).add_tags([("detector", "tpc")]));
//!
//! // Also send the per-second rate, computed from the previous value sent under the same name.
//! monitoring.send_derived(Metric::new("bytesRead", 1_048_576u64), DerivedMetricMode::Rate);
//!
//! // Time an operation.
//! monitoring.start_timer("processing");
//! // ...
//! monitoring.stop_and_send_timer("processing");
//! # Ok::<(), monitoring::BuildError>(())
//! ```
//!
//! # Backends
//!
//! A backend is anything implementing [`Backend`]. The crate ships with:
//!
//! - [`InfluxDb`][backends::InfluxDb], encoding metrics as InfluxDB line protocol sent over UDP
//! - [`StdOut`][backends::StdOut], writing one human readable line per metric
//! - [`Log`][backends::Log], emitting one `tracing` event per metric
//! - [`Noop`][backends::Noop], discarding everything
//!
//! Backends can also be created from URLs such as `influxdb-udp://host:8089/debug`, see [`backend_from_url`].
//!
//! # Background activity
//!
//! [`Monitoring::enable_process_monitoring`] periodically samples the CPU, memory and network usage of the current
//! process, and [`Monitoring::enable_auto_push`] periodically re-sends metrics held through [`AutoPushMetric`]
//! handles. Both run on a single background thread, which is stopped when the `Monitoring` is dropped.
//!
//! # Logging
//!
//! Internal diagnostics, such as backend failures, are emitted through `tracing`. No subscriber is installed by this
//! crate.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod backend;
pub use self::backend::{Backend, BackendError, Verbosity};

pub mod backends;

mod builder;
pub use self::builder::{BuildError, MonitoringBuilder};

mod derived;
pub use self::derived::{DerivedError, DerivedMetricMode, DerivedMetrics};

mod factory;
pub use self::factory::backend_from_url;

mod metric;
pub use self::metric::{Metric, MetricType, MetricValue, Tag, ValueError};

#[allow(clippy::module_inception)]
mod monitoring;
pub use self::monitoring::{
    AutoPushMetric, Monitoring, MonitoringError, DEFAULT_AUTO_PUSH_INTERVAL, DEFAULT_BUFFER_SIZE,
    DEFAULT_PROCESS_MONITORING_INTERVAL,
};

mod process;
pub use self::process::{ProcessDetails, ProcessError, ProcessMonitor};

mod scheduler;
pub use self::scheduler::DEFAULT_TICK_INTERVAL;

pub mod transports;

#[cfg(test)]
mod test_util;
