use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use super::values::FieldKey;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("unsupported schema: expected a parse schema or a validation schema")]
    UnsupportedSchema,
    #[error("unknown field `{0}`")]
    UnknownField(FieldKey),
    #[error("field `{field}` expects {expected}, got {found}")]
    TypeMismatch {
        field: FieldKey,
        expected: &'static str,
        found: &'static str,
    },
    #[error("form controller was torn down")]
    TornDown,
    #[error("failed to spawn form task: {0}")]
    Spawn(String),
}

pub type FormResult<T> = Result<T, FormError>;

/// Error type returned by submit callbacks; logged, never propagated.
pub type SubmitError = Box<dyn std::error::Error + Send + Sync>;

/// Error type returned by async field validators; downgraded to a field message.
pub type ValidatorError = Box<dyn std::error::Error + Send + Sync>;

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
