pub use crate::form::{
    AsyncValidator, ChangeEvent, FieldErrors, FieldKey, FieldValue, FieldValues, FormController,
    FormError, FormModel, FormOptions, FormResult, FormSchema, FormState, FormValues, NumberField,
    ParseError, ParseIssue, ParseSchema, PathSegment, SchemaCapabilities, Spawner, SubmitError,
    SubmitEvent, ValidateOptions, ValidationFailure, ValidationSchema,
};
