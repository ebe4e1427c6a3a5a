//! Persistent-engine callables.

use std::fmt;

use crate::{MethodError, PersistentValue};

/// Method body: `(this, args) -> result`.
pub type MethodFn = dyn Fn(&PersistentValue, &[PersistentValue]) -> Result<PersistentValue, MethodError>
    + Send
    + Sync;

/// A callable executed by the persistent engine.
pub struct PersistentMethod {
    name: String,
    body: Box<MethodFn>,
}

impl PersistentMethod {
    /// Creates a method from a body.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&PersistentValue, &[PersistentValue]) -> Result<PersistentValue, MethodError>
            + Send
            + Sync
            + 'static,
    {
        PersistentMethod {
            name: name.into(),
            body: Box::new(body),
        }
    }

    /// Returns the method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the method.
    pub fn invoke(
        &self,
        this: &PersistentValue,
        args: &[PersistentValue],
    ) -> Result<PersistentValue, MethodError> {
        (self.body)(this, args)
    }
}

impl fmt::Debug for PersistentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentMethod")
            .field("name", &self.name)
            .finish()
    }
}
