use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::error::{FormResult, read_lock, write_lock};
use super::values::{FieldKey, FieldValue, FieldValues, FormValues};

/// Field name to message. A missing key means valid or not yet checked.
pub type FieldErrors = BTreeMap<FieldKey, String>;

#[derive(Clone, Debug, PartialEq)]
pub struct FormState<T> {
    pub values: T,
    pub errors: FieldErrors,
    pub touched: BTreeMap<FieldKey, bool>,
    pub is_submitting: bool,
    pub is_validating: bool,
    pub is_dirty: bool,
    pub is_valid: bool,
    pub submit_attempt_count: u32,
}

impl<T> FormState<T> {
    pub fn new(values: T) -> Self {
        Self {
            values,
            errors: FieldErrors::new(),
            touched: BTreeMap::new(),
            is_submitting: false,
            is_validating: false,
            is_dirty: false,
            is_valid: false,
            submit_attempt_count: 0,
        }
    }

    pub fn is_touched(&self, key: &FieldKey) -> bool {
        self.touched.get(key).copied().unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub enum FormAction<T> {
    SetValue(FieldKey, FieldValue),
    SetValues(FieldValues),
    /// Always marks the form invalid, whatever the message.
    SetError(FieldKey, String),
    SetErrors(FieldErrors),
    SetTouched(FieldKey, bool),
    /// Writes the flag into `is_valid` as well. Consumers depend on that
    /// coupling, so it stays.
    SetSubmitting(bool),
    SetValidating(bool),
    SubmitAttempt,
    /// `None` keeps the current values.
    Reset(Option<T>),
}

impl<T> FormAction<T> {
    pub fn name(&self) -> &'static str {
        match self {
            FormAction::SetValue(..) => "set_value",
            FormAction::SetValues(_) => "set_values",
            FormAction::SetError(..) => "set_error",
            FormAction::SetErrors(_) => "set_errors",
            FormAction::SetTouched(..) => "set_touched",
            FormAction::SetSubmitting(_) => "set_submitting",
            FormAction::SetValidating(_) => "set_validating",
            FormAction::SubmitAttempt => "submit_attempt",
            FormAction::Reset(_) => "reset",
        }
    }
}

pub fn reduce<T>(state: &FormState<T>, action: FormAction<T>) -> FormResult<FormState<T>>
where
    T: FormValues,
{
    let mut next = state.clone();
    match action {
        FormAction::SetValue(key, value) => {
            next.values.set_field(&key, value)?;
            next.is_dirty = true;
        }
        FormAction::SetValues(partial) => {
            for (key, value) in partial {
                next.values.set_field(&key, value)?;
            }
            next.is_dirty = true;
        }
        FormAction::SetError(key, message) => {
            next.errors.insert(key, message);
            next.is_valid = false;
        }
        FormAction::SetErrors(errors) => {
            next.is_valid = errors.is_empty();
            next.errors = errors;
        }
        FormAction::SetTouched(key, touched) => {
            next.touched.insert(key, touched);
        }
        FormAction::SetSubmitting(flag) => {
            next.is_submitting = flag;
            next.is_valid = flag;
        }
        FormAction::SetValidating(flag) => {
            next.is_validating = flag;
        }
        FormAction::SubmitAttempt => {
            next.submit_attempt_count = next.submit_attempt_count.saturating_add(1);
        }
        FormAction::Reset(values) => {
            if let Some(values) = values {
                next.values = values;
            }
            next.errors.clear();
            next.touched.clear();
            next.is_submitting = false;
            next.is_validating = false;
            next.is_dirty = false;
            next.is_valid = true;
            next.submit_attempt_count = 0;
        }
    }
    Ok(next)
}

#[derive(Clone)]
pub(super) struct FormStore<T> {
    state: Arc<RwLock<FormState<T>>>,
}

impl<T> FormStore<T>
where
    T: FormValues,
{
    pub(super) fn new(values: T) -> Self {
        Self {
            state: Arc::new(RwLock::new(FormState::new(values))),
        }
    }

    pub(super) fn dispatch(&self, action: FormAction<T>) -> FormResult<()> {
        let name = action.name();
        let mut state = write_lock(&self.state, "applying form transition")?;
        let next = reduce(&state, action)?;
        *state = next;
        tracing::trace!(action = name, "applied form transition");
        Ok(())
    }

    pub(super) fn snapshot(&self) -> FormResult<FormState<T>> {
        Ok(read_lock(&self.state, "creating form snapshot")?.clone())
    }

    pub(super) fn with_state<R>(
        &self,
        context: &'static str,
        f: impl FnOnce(&FormState<T>) -> R,
    ) -> FormResult<R> {
        let state = read_lock(&self.state, context)?;
        Ok(f(&state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormError;

    fn values(pairs: &[(&'static str, &str)]) -> FieldValues {
        pairs
            .iter()
            .map(|&(key, value)| (FieldKey::new(key), FieldValue::from(value)))
            .collect()
    }

    fn apply(
        state: FormState<FieldValues>,
        action: FormAction<FieldValues>,
    ) -> FormState<FieldValues> {
        reduce(&state, action).expect("transition should apply")
    }

    #[test]
    fn new_state_starts_clean() {
        let state = FormState::new(values(&[("email", "")]));
        assert!(state.errors.is_empty());
        assert!(state.touched.is_empty());
        assert!(!state.is_submitting);
        assert!(!state.is_validating);
        assert!(!state.is_dirty);
        assert!(!state.is_valid);
        assert_eq!(state.submit_attempt_count, 0);
    }

    #[test]
    fn value_writes_mark_dirty_until_reset() {
        let mut state = FormState::new(values(&[("email", "")]));
        for text in ["a", "ab", ""] {
            state = apply(
                state,
                FormAction::SetValue(FieldKey::new("email"), text.into()),
            );
            assert!(state.is_dirty);
        }
        assert!(state.errors.is_empty());
        assert!(state.touched.is_empty());

        state = apply(state, FormAction::Reset(None));
        assert!(!state.is_dirty);
        assert_eq!(
            state.values.get(&FieldKey::new("email")),
            Some(&FieldValue::from(""))
        );
    }

    #[test]
    fn set_values_merges_shallowly() {
        let state = FormState::new(values(&[("email", "a@b.c"), ("name", "Ann")]));
        let state = apply(state, FormAction::SetValues(values(&[("name", "Bob")])));
        assert_eq!(state.values, values(&[("email", "a@b.c"), ("name", "Bob")]));
        assert!(state.is_dirty);
    }

    #[test]
    fn bulk_errors_recompute_validity_and_single_errors_force_invalid() {
        let state = FormState::new(values(&[]));
        let state = apply(state, FormAction::SetErrors(FieldErrors::new()));
        assert!(state.is_valid);

        let state = apply(state, FormAction::SetError(FieldKey::new("email"), String::new()));
        assert!(!state.is_valid);
        assert_eq!(state.errors.get(&FieldKey::new("email")), Some(&String::new()));

        let mut errors = FieldErrors::new();
        errors.insert(FieldKey::new("name"), "required".to_string());
        let state = apply(state, FormAction::SetErrors(errors.clone()));
        assert!(!state.is_valid);
        assert_eq!(state.errors, errors);
    }

    #[test]
    fn submitting_flag_is_mirrored_into_validity() {
        let state = FormState::new(values(&[]));
        let state = apply(state, FormAction::SetSubmitting(true));
        assert!(state.is_submitting);
        assert!(state.is_valid);

        let state = apply(state, FormAction::SetSubmitting(false));
        assert!(!state.is_submitting);
        assert!(!state.is_valid);
    }

    #[test]
    fn validating_flag_touches_nothing_else() {
        let state = FormState::new(values(&[]));
        let next = apply(state.clone(), FormAction::SetValidating(true));
        assert!(next.is_validating);
        assert_eq!(
            FormState {
                is_validating: false,
                ..next
            },
            state
        );
    }

    #[test]
    fn reset_restores_pristine_shape() {
        let mut state = FormState::new(values(&[("email", "")]));
        state = apply(state, FormAction::SetValue(FieldKey::new("email"), "x".into()));
        state = apply(state, FormAction::SetTouched(FieldKey::new("email"), true));
        state = apply(state, FormAction::SetError(FieldKey::new("email"), "bad".into()));
        state = apply(state, FormAction::SubmitAttempt);
        state = apply(state, FormAction::SubmitAttempt);
        state = apply(state, FormAction::SetSubmitting(true));
        assert_eq!(state.submit_attempt_count, 2);

        let replacement = values(&[("email", "fresh@example.com")]);
        let state = apply(state, FormAction::Reset(Some(replacement.clone())));
        assert_eq!(state.values, replacement);
        assert!(state.errors.is_empty());
        assert!(state.touched.is_empty());
        assert!(state.is_valid);
        assert!(!state.is_dirty);
        assert!(!state.is_submitting);
        assert!(!state.is_validating);
        assert_eq!(state.submit_attempt_count, 0);
    }

    #[test]
    fn failed_value_write_leaves_store_untouched() {
        #[derive(Clone, Debug, PartialEq, crate::form::FormModel)]
        struct Signup {
            accepted: bool,
        }

        let store = FormStore::new(Signup { accepted: false });
        let error = store
            .dispatch(FormAction::SetValue(FieldKey::new("accepted"), "yes".into()))
            .expect_err("text cannot land in a bool field");
        assert!(matches!(error, FormError::TypeMismatch { .. }));

        let error = store
            .dispatch(FormAction::SetValue(FieldKey::new("missing"), true.into()))
            .expect_err("unknown fields are rejected");
        assert_eq!(error, FormError::UnknownField(FieldKey::new("missing")));

        let snapshot = store.snapshot().expect("snapshot");
        assert_eq!(snapshot, FormState::new(Signup { accepted: false }));
    }
}
