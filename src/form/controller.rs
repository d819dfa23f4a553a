use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::task::SpawnExt;

use super::binding::{BlurHandler, ChangeEvent, ChangeHandler, SubmitEvent};
use super::debounce::{Debouncer, Spawner};
use super::error::{FormError, FormResult, SubmitError, read_lock, write_lock};
use super::schema::{FormSchema, SchemaKind};
use super::state::{FieldErrors, FormAction, FormState, FormStore};
use super::validation::{AsyncValidator, ValidationOrchestrator};
use super::values::{FieldKey, FieldValue, FieldValues, FormValues};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormOptions {
    pub validate_on_change: bool,
    pub validate_on_blur: bool,
    pub reset_on_submit: bool,
    pub debounce: Duration,
    pub enable_reinitialize: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validate_on_change: true,
            validate_on_blur: true,
            reset_on_submit: false,
            debounce: Duration::from_millis(300),
            enable_reinitialize: false,
        }
    }
}

impl FormOptions {
    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce = Duration::from_millis(debounce_ms);
        self
    }
}

pub(super) type SubmitFn<T> =
    Arc<dyn Fn(T) -> BoxFuture<'static, Result<(), SubmitError>> + Send + Sync>;

struct Lifecycle<T>
where
    T: FormValues,
{
    change_validation: Debouncer<T>,
    validation: ValidationOrchestrator<T>,
}

impl<T> Lifecycle<T>
where
    T: FormValues,
{
    fn teardown(&self) -> FormResult<()> {
        self.change_validation.close()?;
        self.validation.cancel_timers()
    }
}

impl<T> Drop for Lifecycle<T>
where
    T: FormValues,
{
    fn drop(&mut self) {
        if let Err(error) = self.teardown() {
            tracing::warn!(%error, "form teardown failed");
        }
    }
}

#[derive(Clone)]
pub struct FormController<T>
where
    T: FormValues,
{
    pub(super) options: FormOptions,
    pub(super) store: FormStore<T>,
    pub(super) validation: ValidationOrchestrator<T>,
    pub(super) initial_values: Arc<RwLock<T>>,
    on_submit: SubmitFn<T>,
    spawner: Spawner,
    lifecycle: Arc<Lifecycle<T>>,
}

impl<T> FormController<T>
where
    T: FormValues,
{
    pub fn new<F, Fut>(
        schema: FormSchema<T>,
        initial_values: T,
        on_submit: F,
        options: FormOptions,
        spawner: Spawner,
    ) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SubmitError>> + Send + 'static,
    {
        let store = FormStore::new(initial_values.clone());
        let validation = ValidationOrchestrator::new(store.clone(), schema);
        let change_validation = {
            let validation = validation.clone();
            Debouncer::new(spawner.clone(), options.debounce, move |values: T| {
                let validation = validation.clone();
                async move {
                    if let Err(error) = validation.validate(values).await {
                        tracing::warn!(%error, "change validation failed");
                    }
                }
            })
        };

        Self {
            options,
            store,
            validation: validation.clone(),
            initial_values: Arc::new(RwLock::new(initial_values)),
            on_submit: Arc::new(move |values| on_submit(values).boxed()),
            spawner,
            lifecycle: Arc::new(Lifecycle {
                change_validation,
                validation,
            }),
        }
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    pub fn snapshot(&self) -> FormResult<FormState<T>> {
        self.store.snapshot()
    }

    pub fn values(&self) -> FormResult<T> {
        self.store.with_state("reading form values", |state| state.values.clone())
    }

    pub fn schema_kind(&self) -> FormResult<SchemaKind> {
        self.validation.schema().kind()
    }

    /// Re-probes the bound schema after its capabilities changed.
    pub fn redetect_schema(&self) -> FormResult<SchemaKind> {
        self.validation.schema().redetect()
    }

    pub fn register_async_validator(&self, validator: AsyncValidator<T>) -> FormResult<()> {
        self.validation.register(validator)
    }

    pub fn unregister_async_validators(&self, field: impl Into<FieldKey>) -> FormResult<usize> {
        self.validation.unregister(&field.into())
    }

    pub fn change(&self, field: impl Into<FieldKey>, event: ChangeEvent) -> FormResult<()> {
        let key = field.into();
        self.store.dispatch(FormAction::SetValue(key, event.field_value()))?;
        if self.options.validate_on_change {
            self.lifecycle.change_validation.call(self.values()?)?;
        }
        Ok(())
    }

    pub fn handle_change(&self, field: impl Into<FieldKey>) -> ChangeHandler {
        let key = field.into();
        let controller = self.clone();
        Arc::new(move |event| {
            if let Err(error) = controller.change(key.clone(), event) {
                tracing::warn!(field = %key, %error, "change handler failed");
            }
        })
    }

    pub fn blur(&self, field: impl Into<FieldKey>) -> FormResult<()> {
        self.store.dispatch(FormAction::SetTouched(field.into(), true))?;
        if self.options.validate_on_blur {
            let values = self.values()?;
            let validation = self.validation.clone();
            self.spawner
                .spawn(async move {
                    if let Err(error) = validation.validate(values).await {
                        tracing::warn!(%error, "blur validation failed");
                    }
                })
                .map_err(|error| FormError::Spawn(error.to_string()))?;
        }
        Ok(())
    }

    pub fn handle_blur(&self, field: impl Into<FieldKey>) -> BlurHandler {
        let key = field.into();
        let controller = self.clone();
        Arc::new(move || {
            if let Err(error) = controller.blur(key.clone()) {
                tracing::warn!(field = %key, %error, "blur handler failed");
            }
        })
    }

    pub fn set_value(
        &self,
        field: impl Into<FieldKey>,
        value: impl Into<FieldValue>,
    ) -> FormResult<()> {
        self.store.dispatch(FormAction::SetValue(field.into(), value.into()))
    }

    pub fn set_values(&self, values: FieldValues) -> FormResult<()> {
        self.store.dispatch(FormAction::SetValues(values))
    }

    pub fn set_error(
        &self,
        field: impl Into<FieldKey>,
        message: impl Into<String>,
    ) -> FormResult<()> {
        self.store.dispatch(FormAction::SetError(field.into(), message.into()))
    }

    pub fn set_errors(&self, errors: FieldErrors) -> FormResult<()> {
        self.store.dispatch(FormAction::SetErrors(errors))
    }

    pub fn set_touched(&self, field: impl Into<FieldKey>, touched: bool) -> FormResult<()> {
        self.store.dispatch(FormAction::SetTouched(field.into(), touched))
    }

    /// Resets to `values`, or to the current initial values when `None`.
    pub fn reset_form(&self, values: Option<T>) -> FormResult<()> {
        let values = match values {
            Some(values) => values,
            None => read_lock(&self.initial_values, "reading initial values")?.clone(),
        };
        self.store.dispatch(FormAction::Reset(Some(values)))
    }

    /// Every call counts as a new set of initial values.
    pub fn set_initial_values(&self, values: T) -> FormResult<()> {
        *write_lock(&self.initial_values, "replacing initial values")? = values.clone();
        if self.options.enable_reinitialize {
            tracing::debug!("reinitializing form from new initial values");
            self.store.dispatch(FormAction::Reset(Some(values)))?;
        }
        Ok(())
    }

    /// Full, non-debounced validation of the current values.
    pub async fn validate(&self) -> FormResult<bool> {
        let values = self.values()?;
        self.validation.validate(values).await
    }

    /// Validates the values held by the store when called and, if they pass,
    /// hands them to the submit callback. Callback failures are logged, not
    /// returned; an unsupported schema is. Refused with `TornDown` after
    /// teardown.
    pub async fn handle_submit(&self, event: Option<&mut SubmitEvent>) -> FormResult<()> {
        if let Some(event) = event {
            event.prevent_default();
        }
        if self.is_torn_down()? {
            tracing::warn!("submit refused after teardown");
            return Err(FormError::TornDown);
        }
        self.store.dispatch(FormAction::SubmitAttempt)?;

        let values = self.values()?;
        if !self.validation.validate(values.clone()).await? {
            tracing::debug!("submit blocked by validation errors");
            return Ok(());
        }

        self.store.dispatch(FormAction::SetSubmitting(true))?;
        let outcome = (self.on_submit)(values).await;
        self.store.dispatch(FormAction::SetSubmitting(false))?;

        match outcome {
            Ok(()) => {
                if self.options.reset_on_submit {
                    self.reset_form(None)?;
                }
            }
            Err(error) => tracing::error!(%error, "form submit handler failed"),
        }
        Ok(())
    }

    /// Stops pending change validation and async validator timers. Dropping the
    /// last handle to the controller does the same.
    pub fn teardown(&self) -> FormResult<()> {
        self.lifecycle.teardown()
    }

    pub fn is_torn_down(&self) -> FormResult<bool> {
        self.lifecycle.change_validation.is_closed()
    }
}
