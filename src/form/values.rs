use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rust_decimal::Decimal;

use super::error::{FormError, FormResult};

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(Cow<'static, str>);

impl FieldKey {
    /// Key for errors a schema reports against the whole form rather than a field.
    pub const ROOT: FieldKey = FieldKey::new("");

    pub const fn new(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for FieldKey {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FieldKey {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum FieldValue {
    #[default]
    Empty,
    Text(String),
    Bool(bool),
    Number(Decimal),
}

impl FieldValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Empty => "empty",
            FieldValue::Text(_) => "text",
            FieldValue::Bool(_) => "bool",
            FieldValue::Number(_) => "number",
        }
    }

    /// Text shown in a control's `value` slot. Only `Empty` renders as the
    /// empty string; `0` and `false` keep their textual form.
    pub fn display_text(&self) -> String {
        match self {
            FieldValue::Empty => String::new(),
            FieldValue::Text(text) => text.clone(),
            FieldValue::Bool(flag) => flag.to_string(),
            FieldValue::Number(number) => number.to_string(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(flag) => Some(*flag),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

/// Conversion between a concrete model field and [`FieldValue`].
pub trait FieldType: Sized {
    const EXPECTED: &'static str;

    fn to_field_value(&self) -> FieldValue;

    /// Hands the rejected value back on mismatch.
    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue>;
}

impl FieldType for String {
    const EXPECTED: &'static str = "text";

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Text(text) => Ok(text),
            FieldValue::Empty => Ok(String::new()),
            FieldValue::Number(number) => Ok(number.to_string()),
            other => Err(other),
        }
    }
}

impl FieldType for bool {
    const EXPECTED: &'static str = "bool";

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Bool(flag) => Ok(flag),
            other => Err(other),
        }
    }
}

impl FieldType for Decimal {
    const EXPECTED: &'static str = "number";

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Number(*self)
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Number(number) => Ok(number),
            FieldValue::Text(text) => match Decimal::from_str(text.trim()) {
                Ok(number) => Ok(number),
                Err(_) => Err(FieldValue::Text(text)),
            },
            other => Err(other),
        }
    }
}

/// Numeric field bound to a text input. Holds the raw entry so partial input
/// such as `""` or `"-"` is kept and left for the schema to judge.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct NumberField {
    raw: String,
}

impl NumberField {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// `None` while the entry is blank or not a number.
    pub fn value(&self) -> Option<Decimal> {
        Decimal::from_str(self.raw.trim()).ok()
    }
}

impl From<Decimal> for NumberField {
    fn from(value: Decimal) -> Self {
        Self::new(value.to_string())
    }
}

impl FieldType for NumberField {
    const EXPECTED: &'static str = "number";

    fn to_field_value(&self) -> FieldValue {
        match self.value() {
            Some(number) if number.to_string() == self.raw => FieldValue::Number(number),
            _ if self.raw.is_empty() => FieldValue::Empty,
            _ => FieldValue::Text(self.raw.clone()),
        }
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Empty => Ok(Self::default()),
            FieldValue::Text(text) => Ok(Self::new(text)),
            FieldValue::Number(number) => Ok(Self::from(number)),
            other => Err(other),
        }
    }
}

impl<F> FieldType for Option<F>
where
    F: FieldType,
{
    const EXPECTED: &'static str = F::EXPECTED;

    fn to_field_value(&self) -> FieldValue {
        match self {
            Some(inner) => inner.to_field_value(),
            None => FieldValue::Empty,
        }
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Empty => Ok(None),
            FieldValue::Text(text) if text.trim().is_empty() => Ok(None),
            other => F::from_field_value(other).map(Some),
        }
    }
}

#[doc(hidden)]
pub fn decode_field<F>(key: &FieldKey, value: FieldValue) -> FormResult<F>
where
    F: FieldType,
{
    F::from_field_value(value).map_err(|found| FormError::TypeMismatch {
        field: key.clone(),
        expected: F::EXPECTED,
        found: found.kind_name(),
    })
}

/// Values object a form controller operates on, addressed by field name.
pub trait FormValues: Clone + Send + Sync + 'static {
    fn field(&self, key: &FieldKey) -> Option<FieldValue>;
    fn set_field(&mut self, key: &FieldKey, value: FieldValue) -> FormResult<()>;
    fn field_keys(&self) -> Vec<FieldKey>;
}

pub trait FormModel: FormValues {
    type Fields;

    fn fields() -> Self::Fields;
}

/// Untyped values, used for dynamic forms and as the `SetValues` payload.
pub type FieldValues = BTreeMap<FieldKey, FieldValue>;

impl FormValues for FieldValues {
    fn field(&self, key: &FieldKey) -> Option<FieldValue> {
        self.get(key).cloned()
    }

    fn set_field(&mut self, key: &FieldKey, value: FieldValue) -> FormResult<()> {
        self.insert(key.clone(), value);
        Ok(())
    }

    fn field_keys(&self) -> Vec<FieldKey> {
        self.keys().cloned().collect()
    }
}
