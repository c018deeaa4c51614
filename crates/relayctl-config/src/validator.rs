//! External validation port.

use std::sync::Arc;

use crate::document::ConfigDocument;

/// Why a candidate document was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("configuration rejected: {reason}")]
pub struct Rejection {
    pub reason: String,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Checks a candidate document before it is committed.
///
/// The production implementation runs the proxy engine's own self-test;
/// tests substitute an in-process fake.
pub trait ConfigValidator: Send + Sync {
    fn validate(&self, candidate: &ConfigDocument) -> Result<(), Rejection>;
}

impl<V: ConfigValidator + ?Sized> ConfigValidator for &V {
    #[inline]
    fn validate(&self, candidate: &ConfigDocument) -> Result<(), Rejection> {
        (**self).validate(candidate)
    }
}

impl<V: ConfigValidator + ?Sized> ConfigValidator for Arc<V> {
    #[inline]
    fn validate(&self, candidate: &ConfigDocument) -> Result<(), Rejection> {
        (**self).validate(candidate)
    }
}

impl<V: ConfigValidator + ?Sized> ConfigValidator for Box<V> {
    #[inline]
    fn validate(&self, candidate: &ConfigDocument) -> Result<(), Rejection> {
        (**self).validate(candidate)
    }
}
