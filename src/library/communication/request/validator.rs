use crate::library::BoxedError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

/// Shape check applied to the `data` field of a reply
pub trait ResponseValidator {
    /// Value produced by a successful validation
    type Output;

    /// Checks the decoded reply body, converting it into the output type
    fn validate(&self, data: Value) -> Result<Self::Output, BoxedError>;
}

/// Validator that accepts everything which deserializes into `T`
pub struct Typed<T> {
    marker: PhantomData<fn() -> T>,
}

impl<T> Typed<T> {
    /// Creates a new validator
    pub fn new() -> Self {
        Self {
            marker: PhantomData,
        }
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> ResponseValidator for Typed<T> {
    type Output = T;

    fn validate(&self, data: Value) -> Result<T, BoxedError> {
        Ok(serde_json::from_value(data)?)
    }
}

/// Validator backed by a closure, created through [`validator_fn`]
pub struct ValidatorFn<F> {
    check: F,
}

/// Wraps a closure into a [`ResponseValidator`]
pub fn validator_fn<F, T>(check: F) -> ValidatorFn<F>
where
    F: Fn(Value) -> Result<T, BoxedError>,
{
    ValidatorFn { check }
}

impl<F, T> ResponseValidator for ValidatorFn<F>
where
    F: Fn(Value) -> Result<T, BoxedError>,
{
    type Output = T;

    fn validate(&self, data: Value) -> Result<T, BoxedError> {
        (self.check)(data)
    }
}
