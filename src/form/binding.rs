use std::sync::Arc;

use super::controller::FormController;
use super::error::FormResult;
use super::values::{FieldKey, FieldValue, FormValues};

pub type ChangeHandler = Arc<dyn Fn(ChangeEvent) + Send + Sync>;
pub type BlurHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlKind {
    Text,
    Number,
    TextArea,
    Select,
    Radio,
    Checkbox,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChangeEvent {
    pub control: ControlKind,
    pub value: String,
    pub checked: bool,
}

impl ChangeEvent {
    pub fn input(value: impl Into<String>) -> Self {
        Self::with_control(ControlKind::Text, value)
    }

    pub fn checkbox(checked: bool) -> Self {
        Self {
            control: ControlKind::Checkbox,
            value: String::new(),
            checked,
        }
    }

    pub fn with_control(control: ControlKind, value: impl Into<String>) -> Self {
        Self {
            control,
            value: value.into(),
            checked: false,
        }
    }

    /// Checkboxes report their checked state; every other control its raw text.
    pub fn field_value(&self) -> FieldValue {
        match self.control {
            ControlKind::Checkbox => FieldValue::Bool(self.checked),
            _ => FieldValue::Text(self.value.clone()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SubmitEvent {
    default_prevented: bool,
}

impl SubmitEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AriaRole {
    Alert,
}

impl AriaRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AriaRole::Alert => "alert",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AriaLive {
    Polite,
}

impl AriaLive {
    pub fn as_str(self) -> &'static str {
        match self {
            AriaLive::Polite => "polite",
        }
    }
}

#[derive(Clone)]
pub struct FieldProps {
    pub name: FieldKey,
    pub value: String,
    /// Set for boolean fields so checkbox-like controls can bind to it.
    pub checked: Option<bool>,
    pub on_change: ChangeHandler,
    pub on_blur: BlurHandler,
    pub aria_invalid: bool,
    pub aria_described_by: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorProps {
    pub id: String,
    pub role: AriaRole,
    pub aria_live: AriaLive,
}

pub fn error_id(field: &FieldKey) -> String {
    format!("{field}-error")
}

impl<T> FormController<T>
where
    T: FormValues,
{
    pub fn field_props(&self, field: impl Into<FieldKey>) -> FormResult<FieldProps> {
        let key = field.into();
        let (value, has_error) = self.store.with_state("building field props", |state| {
            (
                state.values.field(&key).unwrap_or_default(),
                state.errors.contains_key(&key),
            )
        })?;

        Ok(FieldProps {
            name: key.clone(),
            value: value.display_text(),
            checked: value.as_bool(),
            on_change: self.handle_change(key.clone()),
            on_blur: self.handle_blur(key.clone()),
            aria_invalid: has_error,
            aria_described_by: has_error.then(|| error_id(&key)),
        })
    }

    pub fn error_props(&self, field: impl Into<FieldKey>) -> ErrorProps {
        ErrorProps {
            id: error_id(&field.into()),
            role: AriaRole::Alert,
            aria_live: AriaLive::Polite,
        }
    }

    /// The field's error once it is touched or a submit was attempted.
    pub fn visible_error(&self, field: impl Into<FieldKey>) -> FormResult<Option<String>> {
        let key = field.into();
        self.store.with_state("reading display error message", |state| {
            if !state.is_touched(&key) && state.submit_attempt_count == 0 {
                return None;
            }
            state.errors.get(&key).cloned()
        })
    }
}
