mod binding;
mod controller;
mod debounce;
mod error;
mod schema;
mod state;
mod validation;
mod values;


pub use binding::{
    AriaLive, AriaRole, BlurHandler, ChangeEvent, ChangeHandler, ControlKind, ErrorProps,
    FieldProps, SubmitEvent, error_id,
};
pub use controller::{FormController, FormOptions};
pub use debounce::{Debouncer, Spawner};
pub use error::{FormError, FormResult, SubmitError, ValidatorError};
pub use form_schema_derive::FormModel;
pub use schema::{
    FormSchema, ParseError, ParseIssue, ParseSchema, PathSegment, SchemaCapabilities,
    SchemaFailure, SchemaKind, ValidateOptions, ValidationFailure, ValidationSchema, detect_kind,
    normalize_failure, normalize_parse_error, normalize_validation_failure,
};
pub use state::{FieldErrors, FormAction, FormState, reduce};
pub use validation::{ASYNC_VALIDATION_FAILED, AsyncValidator, AsyncValidatorFn};
pub use values::{
    FieldKey, FieldType, FieldValue, FieldValues, FormModel, FormValues, NumberField, decode_field,
};
