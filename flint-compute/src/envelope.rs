//! Decoded result of a job invocation

use flint_core::{Error, Result};
use flint_rpc::{FromValue, Value, ValueType};

/// Possibly empty value returned by a job.
///
/// An empty envelope means the job completed without a value; it is not an
/// error. Extraction never consumes or changes the envelope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobResult {
    value: Option<Value>,
}

impl JobResult {
    pub fn new(value: Option<Value>) -> Self {
        Self { value }
    }

    pub fn empty() -> Self {
        Self { value: None }
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Extract the value as `T`.
    ///
    /// Fails with [`Error::EmptyResult`] when there is no value and with
    /// [`Error::TypeMismatch`] when the value tag differs from `T`.
    pub fn get<T: FromValue>(&self) -> Result<T> {
        match &self.value {
            Some(value) => T::from_value(value),
            None => Err(Error::EmptyResult),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn value_type(&self) -> Option<ValueType> {
        self.value.as_ref().map(Value::value_type)
    }

    pub fn into_value(self) -> Option<Value> {
        self.value
    }
}

impl From<Option<Value>> for JobResult {
    fn from(value: Option<Value>) -> Self {
        Self::new(value)
    }
}
