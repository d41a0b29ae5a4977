use crate::{
    backend::{Backend, BackendError},
    metric::Metric,
};

/// Discards everything it is given.
#[derive(Clone, Copy, Debug, Default)]
pub struct Noop;

impl Backend for Noop {
    fn send(&mut self, _metric: &Metric) -> Result<(), BackendError> {
        Ok(())
    }

    fn send_batch(&mut self, _metrics: &[Metric]) -> Result<(), BackendError> {
        Ok(())
    }

    fn send_grouped(&mut self, _measurement: &str, _metrics: &[Metric]) -> Result<(), BackendError> {
        Ok(())
    }

    fn add_global_tag(&mut self, _name: &str, _value: &str) {}
}
