use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{AbortHandle, Abortable, BoxFuture, join_all};
use futures_timer::Delay;

use super::error::{FormError, FormResult, ValidatorError, read_lock, write_lock};
use super::schema::{FormSchema, normalize_failure};
use super::state::{FieldErrors, FormAction, FormStore};
use super::values::{FieldKey, FieldValue, FormValues};

pub const ASYNC_VALIDATION_FAILED: &str = "validation error occurred";

pub type AsyncValidatorFn<T> = Arc<
    dyn Fn(FieldValue, T) -> BoxFuture<'static, Result<Option<String>, ValidatorError>>
        + Send
        + Sync,
>;

/// Extra per-field check run after the schema passes. Resolving to
/// `Some(message)` marks the field invalid.
#[derive(Clone)]
pub struct AsyncValidator<T> {
    pub field: FieldKey,
    pub validator: AsyncValidatorFn<T>,
    pub debounce: Option<Duration>,
}

impl<T> AsyncValidator<T> {
    pub fn new<F, Fut>(field: impl Into<FieldKey>, validator: F) -> Self
    where
        F: Fn(FieldValue, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<String>, ValidatorError>> + Send + 'static,
    {
        Self {
            field: field.into(),
            validator: Arc::new(move |value, values| validator(value, values).boxed()),
            debounce: None,
        }
    }

    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debounce = Some(delay);
        self
    }

    pub fn with_debounce_ms(self, delay_ms: u64) -> Self {
        self.with_debounce(Duration::from_millis(delay_ms))
    }
}

#[derive(Default)]
struct PendingTimers {
    next_id: u64,
    timers: BTreeMap<u64, AbortHandle>,
    closed: bool,
}

/// Runs schema and async validators and writes the outcome into the store.
/// Passes are not serialized; overlapping passes race on `errors` and
/// `is_validating`, and the last write wins.
#[derive(Clone)]
pub(super) struct ValidationOrchestrator<T> {
    store: FormStore<T>,
    schema: Arc<FormSchema<T>>,
    async_validators: Arc<RwLock<Vec<AsyncValidator<T>>>>,
    timers: Arc<Mutex<PendingTimers>>,
}

impl<T> ValidationOrchestrator<T>
where
    T: FormValues,
{
    pub(super) fn new(store: FormStore<T>, schema: FormSchema<T>) -> Self {
        Self {
            store,
            schema: Arc::new(schema),
            async_validators: Arc::new(RwLock::new(Vec::new())),
            timers: Arc::new(Mutex::new(PendingTimers::default())),
        }
    }

    pub(super) fn schema(&self) -> &FormSchema<T> {
        &self.schema
    }

    pub(super) fn register(&self, validator: AsyncValidator<T>) -> FormResult<()> {
        write_lock(&self.async_validators, "registering async validator")?.push(validator);
        Ok(())
    }

    pub(super) fn unregister(&self, field: &FieldKey) -> FormResult<usize> {
        let mut validators = write_lock(&self.async_validators, "unregistering async validators")?;
        let before = validators.len();
        validators.retain(|validator| &validator.field != field);
        Ok(before - validators.len())
    }

    pub(super) async fn validate(&self, values: T) -> FormResult<bool> {
        self.store.dispatch(FormAction::SetValidating(true))?;
        tracing::debug!("validation pass started");

        let outcome = self.run_pass(&values).await;
        let released = self.store.dispatch(FormAction::SetValidating(false));

        match &outcome {
            Ok(valid) => tracing::debug!(valid, "validation pass finished"),
            Err(error) => tracing::debug!(%error, "validation pass aborted"),
        }
        let valid = outcome?;
        released?;
        Ok(valid)
    }

    async fn run_pass(&self, values: &T) -> FormResult<bool> {
        if let Err(failure) = self.schema.run(values).await? {
            self.store
                .dispatch(FormAction::SetErrors(normalize_failure(&failure)))?;
            return Ok(false);
        }

        self.store.dispatch(FormAction::SetErrors(FieldErrors::new()))?;
        let async_errors = self.run_async_validators(values).await?;
        if async_errors.is_empty() {
            return Ok(true);
        }
        self.store.dispatch(FormAction::SetErrors(async_errors))?;
        Ok(false)
    }

    async fn run_async_validators(&self, values: &T) -> FormResult<FieldErrors> {
        let validators = read_lock(&self.async_validators, "reading async validators")?.clone();
        let checks = validators
            .into_iter()
            .map(|validator| self.run_async_validator(validator, values.clone()));

        let mut errors = FieldErrors::new();
        for outcome in join_all(checks).await {
            if let Some((field, message)) = outcome? {
                errors.insert(field, message);
            }
        }
        Ok(errors)
    }

    async fn run_async_validator(
        &self,
        validator: AsyncValidator<T>,
        values: T,
    ) -> FormResult<Option<(FieldKey, String)>> {
        if let Some(delay) = validator.debounce.filter(|delay| !delay.is_zero()) {
            if !self.wait(delay).await? {
                tracing::debug!(field = %validator.field, "async validator timer cancelled");
                return Ok(None);
            }
        }

        let value = values.field(&validator.field).unwrap_or_default();
        match (validator.validator)(value, values).await {
            Ok(Some(message)) => Ok(Some((validator.field, message))),
            Ok(None) => Ok(None),
            Err(error) => {
                tracing::warn!(field = %validator.field, %error, "async validator failed");
                Ok(Some((validator.field, ASYNC_VALIDATION_FAILED.to_string())))
            }
        }
    }

    /// Returns `false` when the timer was cancelled by teardown.
    async fn wait(&self, delay: Duration) -> FormResult<bool> {
        let (handle, registration) = AbortHandle::new_pair();
        let id = {
            let mut pending = self.lock_timers("scheduling async validator timer")?;
            if pending.closed {
                return Ok(false);
            }
            let id = pending.next_id;
            pending.next_id += 1;
            pending.timers.insert(id, handle);
            id
        };

        let finished = Abortable::new(Delay::new(delay), registration)
            .await
            .is_ok();
        self.lock_timers("releasing async validator timer")?
            .timers
            .remove(&id);
        Ok(finished)
    }

    pub(super) fn cancel_timers(&self) -> FormResult<()> {
        let mut pending = self.lock_timers("cancelling async validator timers")?;
        pending.closed = true;
        let cancelled = pending.timers.len();
        for (_, timer) in std::mem::take(&mut pending.timers) {
            timer.abort();
        }
        if cancelled > 0 {
            tracing::debug!(cancelled, "cancelled pending async validator timers");
        }
        Ok(())
    }

    fn lock_timers(&self, context: &'static str) -> FormResult<MutexGuard<'_, PendingTimers>> {
        self.timers
            .lock()
            .map_err(|_| FormError::StatePoisoned(context))
    }
}
