use serde::{Deserialize, Serialize};

/// A successful value plus a marker telling whether it was confirmed
/// against the remote source of truth.
///
/// `deferred == true` means the value is valid but was served from (or only
/// written to) the local cache, typically after a network failure. Callers
/// render it with a "syncing" affordance instead of treating it as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome<T> {
    pub value: T,
    pub deferred: bool,
}

impl<T> Outcome<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            deferred: false,
        }
    }

    pub fn deferred(value: T) -> Self {
        Self {
            value,
            deferred: true,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            deferred: self.deferred,
        }
    }

    /// Carry this outcome's deferred flag over to another value.
    pub fn with<U>(&self, value: U) -> Outcome<U> {
        Outcome {
            value,
            deferred: self.deferred,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}
