use std::{collections::HashMap, io, sync::Arc, time::Duration};

use indexmap::IndexMap;
use parking_lot::Mutex;
use quanta::{Clock, Instant};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{
    backend::{Backend, Verbosity},
    derived::{DerivedMetricMode, DerivedMetrics},
    metric::{Metric, MetricValue, Tag},
    process::{ProcessError, ProcessMonitor},
    scheduler::{Cadence, Scheduler, DEFAULT_TICK_INTERVAL},
};

/// Default buffer size, in metrics.
pub const DEFAULT_BUFFER_SIZE: usize = 128;

/// Default process monitoring interval.
pub const DEFAULT_PROCESS_MONITORING_INTERVAL: Duration = Duration::from_secs(5);

/// Default auto-push interval.
pub const DEFAULT_AUTO_PUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Errors that could occur while enabling background activity.
#[derive(Debug, Error)]
pub enum MonitoringError {
    /// The background scheduler thread could not be spawned.
    #[error("failed to spawn background scheduler thread: {0}")]
    SchedulerSpawn(#[source] io::Error),

    /// The process monitor could not be created.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// State shared between callers and the scheduler thread, all behind one lock.
struct State {
    backends: Vec<Box<dyn Backend>>,
    global_tags: Vec<Tag>,
    derived: DerivedMetrics,
    buffer: Vec<Metric>,
    buffer_size: Option<usize>,
    timers: HashMap<String, Instant>,
    auto_push: IndexMap<String, Metric>,
    process_cadence: Option<Cadence>,
    auto_push_cadence: Option<Cadence>,
}

impl State {
    /// Routes a metric through the buffering policy.
    fn push(&mut self, metric: Metric) {
        match self.buffer_size {
            Some(size) => {
                if self.buffer.len() >= size {
                    self.flush();
                }
                self.buffer.push(metric);
            }
            None => self.dispatch(&metric, Verbosity::Prod),
        }
    }

    /// Sends a metric to every backend that accepts `verbosity`.
    fn dispatch(&mut self, metric: &Metric, verbosity: Verbosity) {
        for backend in self.backends.iter_mut().filter(|b| b.verbosity() >= verbosity) {
            if let Err(e) = backend.send(metric) {
                error!(error = %e, metric_name = metric.name(), "Backend failed to send metric.");
            }
        }
    }

    fn dispatch_batch(&mut self, metrics: &[Metric]) {
        if metrics.is_empty() {
            return;
        }

        for backend in &mut self.backends {
            if let Err(e) = backend.send_batch(metrics) {
                error!(error = %e, metrics = metrics.len(), "Backend failed to send metric batch.");
            }
        }
    }

    fn flush(&mut self) {
        let metrics = std::mem::take(&mut self.buffer);
        debug!(metrics = metrics.len(), "Flushing metric buffer.");
        self.dispatch_batch(&metrics);
    }
}

pub(crate) struct Inner {
    state: Mutex<State>,
    sampler: Mutex<Option<ProcessMonitor>>,
    clock: Clock,
}

impl Inner {
    fn send_all(&self, metrics: Vec<Metric>) {
        let mut state = self.state.lock();
        if state.buffer_size.is_some() {
            for metric in metrics {
                state.push(metric);
            }
        } else {
            state.dispatch_batch(&metrics);
        }
    }

    /// Runs one scheduler tick: samples the process and pushes the auto-push store if their intervals have elapsed.
    pub(crate) fn tick(&self) {
        let now = self.clock.now();
        let (sample_due, pushed) = {
            let mut state = self.state.lock();
            let sample_due = state.process_cadence.as_mut().is_some_and(|c| c.poll(now));
            let push_due = state.auto_push_cadence.as_mut().is_some_and(|c| c.poll(now));

            let pushed = if push_due {
                let timestamp = Metric::current_timestamp();
                state.auto_push.values().map(|m| m.clone().with_timestamp(timestamp)).collect()
            } else {
                Vec::new()
            };
            (sample_due, pushed)
        };

        if sample_due {
            let sampled = self.sampler.lock().as_mut().map(ProcessMonitor::sample);
            if let Some(metrics) = sampled {
                self.send_all(metrics);
            }
        }
        if !pushed.is_empty() {
            self.send_all(pushed);
        }
    }
}

/// Collects metrics from callers and dispatches them to every registered backend.
///
/// All operations take `&self` and may be called from any thread. A single lock guards the backends, the buffer, the
/// derived-metric state, timers and the auto-push store; backends are always called in registration order while that
/// lock is held, so metrics from a single thread reach each backend in call order.
///
/// Process monitoring and auto-push share one background thread, started the first time either is enabled. Dropping
/// the `Monitoring` stops that thread, waiting for it to exit, and then flushes any buffered metrics.
pub struct Monitoring {
    inner: Arc<Inner>,
    scheduler: Mutex<Option<Scheduler>>,
    tick: Duration,
}

impl Monitoring {
    /// Creates a `Monitoring` with no backends.
    pub fn new() -> Self {
        Self::with_clock(Clock::new(), DEFAULT_TICK_INTERVAL)
    }

    pub(crate) fn with_clock(clock: Clock, tick: Duration) -> Self {
        let state = State {
            backends: Vec::new(),
            global_tags: Vec::new(),
            derived: DerivedMetrics::new(),
            buffer: Vec::new(),
            buffer_size: None,
            timers: HashMap::new(),
            auto_push: IndexMap::new(),
            process_cadence: None,
            auto_push_cadence: None,
        };

        Monitoring {
            inner: Arc::new(Inner { state: Mutex::new(state), sampler: Mutex::new(None), clock }),
            scheduler: Mutex::new(None),
            tick,
        }
    }

    /// Appends a backend to the list metrics are dispatched to.
    pub fn add_backend<B>(&self, backend: B)
    where
        B: Backend + 'static,
    {
        self.add_boxed_backend(Box::new(backend));
    }

    /// Appends an already boxed backend to the list metrics are dispatched to.
    pub fn add_boxed_backend(&self, backend: Box<dyn Backend>) {
        let mut state = self.inner.state.lock();
        state.backends.push(backend);
        debug!(backends = state.backends.len(), "Backend added.");
    }

    /// Adds a tag to attach to every metric.
    ///
    /// The tag is handed to the backends registered at the time of the call; backends added later do not receive it.
    pub fn add_global_tag<N, V>(&self, name: N, value: V)
    where
        N: Into<String>,
        V: Into<String>,
    {
        let tag = Tag::new(name, value);
        let mut state = self.inner.state.lock();
        for backend in &mut state.backends {
            backend.add_global_tag(tag.name(), tag.value());
        }
        state.global_tags.push(tag);
    }

    /// Returns the global tags added so far, in order.
    pub fn global_tags(&self) -> Vec<Tag> {
        self.inner.state.lock().global_tags.clone()
    }

    /// Sends a metric to all backends.
    pub fn send(&self, metric: Metric) {
        self.send_derived(metric, DerivedMetricMode::None);
    }

    /// Sends a metric to all backends, preceded by any derived metrics requested by `mode`.
    ///
    /// If derivation fails, for example because the metric holds a string, the failure is logged and only the metric
    /// itself is sent.
    pub fn send_derived(&self, metric: Metric, mode: DerivedMetricMode) {
        let mut state = self.inner.state.lock();

        match state.derived.derive(&metric, mode) {
            Ok(derived) => {
                for metric in derived {
                    state.push(metric);
                }
            }
            Err(e) => warn!(error = %e, "Skipping derived metrics."),
        }

        state.push(metric);
    }

    /// Sends a metric only to backends with [`Verbosity::Debug`].
    ///
    /// Debug metrics are never buffered.
    #[allow(clippy::needless_pass_by_value)]
    pub fn debug(&self, metric: Metric) {
        self.inner.state.lock().dispatch(&metric, Verbosity::Debug);
    }

    /// Sends several unrelated metrics, in order.
    pub fn send_batch(&self, metrics: Vec<Metric>) {
        self.inner.send_all(metrics);
    }

    /// Sends related metrics as a single measurement named `measurement`.
    ///
    /// Backends that do not support grouping receive the metrics one by one. Grouped metrics are never buffered.
    pub fn send_grouped<N: AsRef<str>>(&self, measurement: N, metrics: &[Metric]) {
        let measurement = measurement.as_ref();
        let mut state = self.inner.state.lock();
        for backend in &mut state.backends {
            if let Err(e) = backend.send_grouped(measurement, metrics) {
                error!(error = %e, measurement, "Backend failed to send grouped metrics.");
            }
        }
    }

    /// Enables buffering: metrics are held back and sent in batches of up to `size`.
    ///
    /// When the buffer is full, it is flushed before the next metric is added. A size of zero is treated as one.
    pub fn enable_buffering(&self, size: usize) {
        let size = size.max(1);
        let mut state = self.inner.state.lock();
        if state.buffer.len() > size {
            state.flush();
        }
        state.buffer_size = Some(size);
        debug!(size, "Buffering enabled.");
    }

    /// Sends every buffered metric to all backends.
    pub fn flush_buffer(&self) {
        self.inner.state.lock().flush();
    }

    /// Periodically samples the resource usage of this process and sends it.
    ///
    /// # Errors
    ///
    /// If the process monitor cannot be created, or the background thread cannot be started, an error is returned.
    pub fn enable_process_monitoring(&self, interval: Duration) -> Result<(), MonitoringError> {
        {
            let mut sampler = self.inner.sampler.lock();
            if sampler.is_none() {
                *sampler = Some(ProcessMonitor::new()?);
            }
        }

        let now = self.inner.clock.now();
        {
            let mut state = self.inner.state.lock();
            match state.process_cadence.as_mut() {
                Some(cadence) => cadence.set_interval(interval),
                None => state.process_cadence = Some(Cadence::new(interval, now)),
            }
        }
        debug!(?interval, "Process monitoring enabled.");

        self.ensure_scheduler()
    }

    /// Periodically re-sends every metric obtained from [`Monitoring::auto_push_metric`].
    ///
    /// # Errors
    ///
    /// If the background thread cannot be started, an error is returned.
    pub fn enable_auto_push(&self, interval: Duration) -> Result<(), MonitoringError> {
        let now = self.inner.clock.now();
        {
            let mut state = self.inner.state.lock();
            match state.auto_push_cadence.as_mut() {
                Some(cadence) => cadence.set_interval(interval),
                None => state.auto_push_cadence = Some(Cadence::new(interval, now)),
            }
        }
        debug!(?interval, "Auto-push enabled.");

        self.ensure_scheduler()
    }

    fn ensure_scheduler(&self) -> Result<(), MonitoringError> {
        let mut scheduler = self.scheduler.lock();
        if scheduler.is_none() {
            let spawned =
                Scheduler::spawn(Arc::clone(&self.inner), self.tick).map_err(MonitoringError::SchedulerSpawn)?;
            *scheduler = Some(spawned);
        }
        Ok(())
    }

    /// Returns a handle to the auto-pushed metric named `name`, creating it with a value of `0` if needed.
    pub fn auto_push_metric<N: Into<String>>(&self, name: N) -> AutoPushMetric {
        let name = name.into();
        let mut state = self.inner.state.lock();
        let entry = state.auto_push.entry(name.clone());
        let index = entry.index();
        entry.or_insert_with(|| Metric::new(name.clone(), 0));

        AutoPushMetric { inner: Arc::clone(&self.inner), name, index }
    }

    /// Starts a timer named `name`, replacing any running timer of the same name.
    pub fn start_timer<N: Into<String>>(&self, name: N) {
        let now = self.inner.clock.now();
        self.inner.state.lock().timers.insert(name.into(), now);
    }

    /// Stops the timer named `name` and sends the elapsed time, in milliseconds, as a metric of the same name.
    ///
    /// Does nothing if no such timer is running.
    pub fn stop_and_send_timer(&self, name: &str) {
        let now = self.inner.clock.now();
        let mut state = self.inner.state.lock();
        let Some(started) = state.timers.remove(name) else {
            debug!(timer = name, "No such timer running.");
            return;
        };

        let millis = u64::try_from(now.saturating_duration_since(started).as_millis()).unwrap_or(u64::MAX);
        state.push(Metric::new(name, millis));
    }
}

impl Default for Monitoring {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Monitoring {
    fn drop(&mut self) {
        drop(self.scheduler.lock().take());
        self.inner.state.lock().flush();
    }
}

/// Handle to a metric that is re-sent on every auto-push interval.
///
/// The handle can be cloned and moved across threads; reads and writes go through the owning [`Monitoring`]'s lock.
#[derive(Clone)]
pub struct AutoPushMetric {
    inner: Arc<Inner>,
    name: String,
    index: usize,
}

impl AutoPushMetric {
    /// Returns a copy of the current metric.
    pub fn get(&self) -> Metric {
        let state = self.inner.state.lock();
        state
            .auto_push
            .get_index(self.index)
            .map(|(_, metric)| metric.clone())
            .unwrap_or_else(|| Metric::new(self.name.clone(), 0))
    }

    /// Name of the metric.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces the value of the metric.
    pub fn set<V: Into<MetricValue>>(&self, value: V) {
        let value = value.into();
        let mut state = self.inner.state.lock();
        if let Some((_, metric)) = state.auto_push.get_index_mut(self.index) {
            metric.set_value(value);
        }
    }

    /// Modifies the metric.
    ///
    /// `f` runs on a copy of the metric with no lock held, so it may freely use this or other handles, or the owning
    /// [`Monitoring`]. The copy is written back once `f` returns, replacing any change made to the metric meanwhile.
    pub fn update<F: FnOnce(&mut Metric)>(&self, f: F) {
        let mut metric = self.get();
        f(&mut metric);

        let mut state = self.inner.state.lock();
        if let Some((_, slot)) = state.auto_push.get_index_mut(self.index) {
            *slot = metric;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    use mockall::Sequence;
    use quanta::Clock;

    use super::Monitoring;
    use crate::{
        backend::{Backend, BackendError, Verbosity},
        derived::DerivedMetricMode,
        metric::{Metric, Tag},
        test_util::{Call, MockTestBackend, RecordingBackend},
    };

    fn failure() -> BackendError {
        BackendError::Write { name: "m".to_string(), reason: "boom".to_string() }
    }

    #[test]
    fn sends_to_every_backend_in_order() {
        let monitoring = Monitoring::new();
        let (first, first_calls) = RecordingBackend::new();
        let (second, second_calls) = RecordingBackend::new();
        monitoring.add_backend(first);
        monitoring.add_backend(second);

        monitoring.send(Metric::new("a", 1));
        monitoring.send(Metric::new("b", 2));

        assert_eq!(first_calls.sent_names(), ["a", "b"]);
        assert_eq!(second_calls.sent_names(), ["a", "b"]);
    }

    #[test]
    fn failing_backend_does_not_stop_fan_out() {
        let monitoring = Monitoring::new();

        let mut failing = MockTestBackend::new();
        failing.expect_verbosity().return_const(Verbosity::Prod);
        failing.expect_send().times(2).returning(|_| Err(failure()));

        let (recording, calls) = RecordingBackend::new();
        monitoring.add_backend(failing);
        monitoring.add_backend(recording);

        monitoring.send(Metric::new("a", 1));
        monitoring.send(Metric::new("b", 2));

        assert_eq!(calls.sent_names(), ["a", "b"]);
    }

    #[test]
    fn failing_backend_does_not_stop_batch_fan_out() {
        let monitoring = Monitoring::new();

        let mut failing = MockTestBackend::new();
        failing.expect_send_batch().times(2).returning(|_| Err(failure()));

        let (recording, calls) = RecordingBackend::new();
        monitoring.add_backend(failing);
        monitoring.add_backend(recording);

        monitoring.send_batch(vec![Metric::new("a", 1), Metric::new("b", 2)]);
        assert_eq!(calls.sent_names(), ["a", "b"]);

        monitoring.enable_buffering(10);
        monitoring.send(Metric::new("c", 3));
        monitoring.send(Metric::new("d", 4));
        monitoring.flush_buffer();
        assert_eq!(calls.sent_names(), ["a", "b", "c", "d"]);
    }

    #[test]
    fn global_tags_are_broadcast_only_to_current_backends() {
        let monitoring = Monitoring::new();
        let (early, early_calls) = RecordingBackend::new();
        monitoring.add_backend(early);
        monitoring.add_global_tag("hostname", "h1");

        let (late, late_calls) = RecordingBackend::new();
        monitoring.add_backend(late);
        monitoring.add_global_tag("name", "proc");

        assert_eq!(
            early_calls.take(),
            vec![
                Call::GlobalTag("hostname".into(), "h1".into()),
                Call::GlobalTag("name".into(), "proc".into())
            ]
        );
        assert_eq!(late_calls.take(), vec![Call::GlobalTag("name".into(), "proc".into())]);
        assert_eq!(monitoring.global_tags(), vec![Tag::new("hostname", "h1"), Tag::new("name", "proc")]);
    }

    #[test]
    fn global_tags_are_not_copied_into_metrics() {
        let monitoring = Monitoring::new();
        let (backend, calls) = RecordingBackend::new();
        monitoring.add_backend(backend);
        monitoring.add_global_tag("hostname", "h1");

        monitoring.send(Metric::new("a", 1).add_tags([("own", "tag")]));
        assert_eq!(calls.sent()[0].tags(), &[Tag::new("own", "tag")]);
    }

    #[test]
    fn derived_metrics_precede_the_metric() {
        let monitoring = Monitoring::new();
        let (backend, calls) = RecordingBackend::new();
        monitoring.add_backend(backend);

        let t0 = std::time::SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let t1 = t0 + Duration::from_secs(1);
        monitoring.send_derived(Metric::new("m", 10).with_timestamp(t0), DerivedMetricMode::RateAndIncrement);
        monitoring.send_derived(Metric::new("m", 15).with_timestamp(t1), DerivedMetricMode::RateAndIncrement);

        assert_eq!(calls.sent_names(), ["m", "mRate", "mIncrement", "m"]);
        let sent = calls.sent();
        assert_eq!(sent[1].as_double(), Ok(5.0));
        assert_eq!(sent[2].as_int(), Ok(5));
    }

    #[test]
    fn failed_derivation_still_sends_the_metric() {
        let monitoring = Monitoring::new();
        let (backend, calls) = RecordingBackend::new();
        monitoring.add_backend(backend);

        monitoring.send_derived(Metric::new("s", "text"), DerivedMetricMode::Rate);
        monitoring.send_derived(Metric::new("s", "text"), DerivedMetricMode::Rate);
        monitoring.send_batch(vec![Metric::new("after", 1)]);

        assert_eq!(calls.sent_names(), ["s", "s", "after"]);
    }

    #[test]
    fn debug_only_reaches_debug_backends() {
        let monitoring = Monitoring::new();

        let mut prod = MockTestBackend::new();
        prod.expect_verbosity().return_const(Verbosity::Prod);
        prod.expect_send().times(1).withf(|m| m.name() == "normal").returning(|_| Ok(()));

        let mut debug = MockTestBackend::new();
        debug.expect_verbosity().return_const(Verbosity::Debug);
        let mut seq = Sequence::new();
        debug.expect_send().times(1).in_sequence(&mut seq).withf(|m| m.name() == "normal").returning(|_| Ok(()));
        debug.expect_send().times(1).in_sequence(&mut seq).withf(|m| m.name() == "verbose").returning(|_| Ok(()));

        monitoring.add_backend(prod);
        monitoring.add_backend(debug);

        monitoring.send(Metric::new("normal", 1));
        monitoring.debug(Metric::new("verbose", 2));
    }

    #[test]
    fn buffer_flushes_before_overflowing() {
        const N: usize = 3;
        let monitoring = Monitoring::new();

        let mut backend = MockTestBackend::new();
        backend.expect_send().never();
        backend
            .expect_send_batch()
            .times(1)
            .withf(|metrics| metrics.iter().map(Metric::name).eq(["m0", "m1", "m2"]))
            .returning(|_| Ok(()));
        backend.expect_send_batch().times(1).withf(|metrics| metrics.len() == 1).returning(|_| Ok(()));
        monitoring.add_backend(backend);

        monitoring.enable_buffering(N);
        for i in 0..=N {
            monitoring.send(Metric::new(format!("m{}", i), i));
        }
        // The fourth metric stays buffered until the engine is dropped.
    }

    #[test]
    fn flush_buffer_preserves_order() {
        let monitoring = Monitoring::new();
        let (backend, calls) = RecordingBackend::new();
        monitoring.add_backend(backend);
        monitoring.enable_buffering(10);

        monitoring.send(Metric::new("a", 1));
        monitoring.send_batch(vec![Metric::new("b", 2), Metric::new("c", 3)]);
        assert!(calls.sent_names().is_empty());

        monitoring.flush_buffer();
        assert_eq!(calls.sent_names(), ["a", "b", "c"]);

        monitoring.flush_buffer();
        assert_eq!(calls.sent_names().len(), 3);
    }

    #[test]
    fn dropping_flushes_the_buffer() {
        let (backend, calls) = RecordingBackend::new();
        {
            let monitoring = Monitoring::new();
            monitoring.add_backend(backend);
            monitoring.enable_buffering(0);
            monitoring.send(Metric::new("a", 1));
            monitoring.send(Metric::new("b", 1));
            assert_eq!(calls.sent_names(), ["a"]);
        }
        assert_eq!(calls.sent_names(), ["a", "b"]);
    }

    #[test]
    fn grouped_send_uses_backend_grouping() {
        let monitoring = Monitoring::new();

        let mut grouping = MockTestBackend::new();
        grouping
            .expect_send_grouped()
            .times(1)
            .withf(|measurement, metrics| measurement.to_string() == "disk" && metrics.len() == 2)
            .returning(|_, _| Ok(()));
        monitoring.add_backend(grouping);

        let (plain, calls) = RecordingBackend::new();
        monitoring.add_backend(plain);

        monitoring.send_grouped("disk", &[Metric::new("read", 1), Metric::new("write", 2)]);
        assert_eq!(calls.sent_names(), ["read", "write"]);
    }

    #[test]
    fn timer_reports_elapsed_milliseconds() {
        let (clock, mock) = Clock::mock();
        let monitoring = Monitoring::with_clock(clock, Duration::from_secs(1));
        let (backend, calls) = RecordingBackend::new();
        monitoring.add_backend(backend);

        monitoring.start_timer("x");
        mock.increment(Duration::from_millis(250));
        monitoring.stop_and_send_timer("x");

        let sent = calls.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name(), "x");
        assert_eq!(sent[0].as_uint64(), Ok(250));
    }

    #[test]
    fn stopping_unknown_timer_emits_nothing() {
        let monitoring = Monitoring::new();
        let (backend, calls) = RecordingBackend::new();
        monitoring.add_backend(backend);

        monitoring.stop_and_send_timer("never started");
        monitoring.start_timer("once");
        monitoring.stop_and_send_timer("once");
        monitoring.stop_and_send_timer("once");

        assert_eq!(calls.sent_names(), ["once"]);
    }

    #[test]
    fn auto_push_handles_share_a_slot() {
        let monitoring = Monitoring::new();
        let first = monitoring.auto_push_metric("queue");
        let second = monitoring.auto_push_metric("queue");
        let other = monitoring.auto_push_metric("other");

        assert_eq!(first.get().as_int(), Ok(0));
        second.set(42u64);
        assert_eq!(first.get().as_uint64(), Ok(42));
        assert_eq!(first.name(), "queue");
        assert_eq!(other.name(), "other");

        first.update(|m| m.set_timestamp(std::time::SystemTime::UNIX_EPOCH));
        assert_eq!(second.get().timestamp(), std::time::SystemTime::UNIX_EPOCH);
    }

    #[test]
    fn update_can_use_the_engine_from_its_closure() {
        let monitoring = Arc::new(Monitoring::new());
        let (backend, calls) = RecordingBackend::new();
        monitoring.add_backend(backend);

        let source = monitoring.auto_push_metric("source");
        source.update(|m| m.set_timestamp(std::time::SystemTime::UNIX_EPOCH + Duration::from_secs(7)));
        let target = monitoring.auto_push_metric("target");

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let engine = Arc::clone(&monitoring);
        let worker_target = target.clone();
        std::thread::spawn(move || {
            worker_target.update(|m| {
                m.set_timestamp(source.get().timestamp());
                engine.send(Metric::new("inside", 1));
                worker_target.set(5);
            });
            let _ = done_tx.send(());
        });

        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok(), "update did not complete");
        assert_eq!(target.get().timestamp(), std::time::SystemTime::UNIX_EPOCH + Duration::from_secs(7));
        assert_eq!(target.get().as_int(), Ok(0));
        assert_eq!(calls.sent_names(), ["inside"]);
    }

    #[test]
    fn tick_pushes_auto_push_store_in_insertion_order() {
        let (clock, mock) = Clock::mock();
        let monitoring = Monitoring::with_clock(clock, Duration::from_secs(3600));
        let (backend, calls) = RecordingBackend::new();
        monitoring.add_backend(backend);

        monitoring.auto_push_metric("b").set(1);
        monitoring.auto_push_metric("a").set(2);
        monitoring.enable_auto_push(Duration::from_secs(2)).unwrap();

        mock.increment(Duration::from_secs(1));
        monitoring.inner.tick();
        assert!(calls.sent_names().is_empty());

        mock.increment(Duration::from_secs(1));
        monitoring.inner.tick();
        assert_eq!(calls.sent_names(), ["b", "a"]);
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Backend for DropFlag {
        fn send(&mut self, _metric: &Metric) -> Result<(), BackendError> {
            Ok(())
        }

        fn add_global_tag(&mut self, _name: &str, _value: &str) {}
    }

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn drop_waits_for_the_scheduler() {
        let dropped = Arc::new(AtomicBool::new(false));
        let monitoring = Monitoring::with_clock(Clock::new(), Duration::from_secs(3600));
        monitoring.add_backend(DropFlag(Arc::clone(&dropped)));
        monitoring.enable_auto_push(Duration::from_secs(1)).unwrap();

        // With an hour-long tick, this only returns promptly if shutdown interrupts the tick sleep.
        drop(monitoring);
        assert!(dropped.load(Ordering::SeqCst));
    }
}
