use std::{io, sync::Arc};

use mockall::mock;
use parking_lot::Mutex;

use crate::{
    backend::{Backend, BackendError, Verbosity},
    metric::Metric,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Send(String),
    GlobalTag(String, String),
}

/// Shared view of everything a [`RecordingBackend`] has been asked to do.
#[derive(Clone, Default)]
pub struct Calls {
    calls: Arc<Mutex<Vec<Call>>>,
    metrics: Arc<Mutex<Vec<Metric>>>,
}

impl Calls {
    pub fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock())
    }

    pub fn sent(&self) -> Vec<Metric> {
        self.metrics.lock().clone()
    }

    pub fn sent_names(&self) -> Vec<String> {
        self.metrics.lock().iter().map(|m| m.name().to_string()).collect()
    }
}

/// Backend that only implements the required methods and records what it receives.
pub struct RecordingBackend {
    calls: Calls,
    fail_on: Option<String>,
}

impl RecordingBackend {
    pub fn new() -> (Self, Calls) {
        let calls = Calls::default();
        (RecordingBackend { calls: calls.clone(), fail_on: None }, calls)
    }

    pub fn fail_on(&mut self, name: &str) {
        self.fail_on = Some(name.to_string());
    }
}

impl Backend for RecordingBackend {
    fn send(&mut self, metric: &Metric) -> Result<(), BackendError> {
        self.calls.calls.lock().push(Call::Send(metric.name().to_string()));
        self.calls.metrics.lock().push(metric.clone());

        if self.fail_on.as_deref() == Some(metric.name()) {
            return Err(BackendError::Io(io::Error::new(io::ErrorKind::Other, "refused")));
        }
        Ok(())
    }

    fn add_global_tag(&mut self, name: &str, value: &str) {
        self.calls.calls.lock().push(Call::GlobalTag(name.to_string(), value.to_string()));
    }
}

mock! {
    pub TestBackend {}

    impl Backend for TestBackend {
        fn send(&mut self, metric: &Metric) -> Result<(), BackendError>;
        fn send_batch(&mut self, metrics: &[Metric]) -> Result<(), BackendError>;
        fn send_grouped(&mut self, measurement: &str, metrics: &[Metric]) -> Result<(), BackendError>;
        fn add_global_tag(&mut self, name: &str, value: &str);
        fn set_verbosity(&mut self, verbosity: Verbosity);
        fn verbosity(&self) -> Verbosity;
    }
}
