use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;

use super::error::{FormError, FormResult, read_lock, write_lock};
use super::state::FieldErrors;
use super::values::FieldKey;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    fn to_field_key(&self) -> FieldKey {
        match self {
            PathSegment::Key(key) => FieldKey::from(key.clone()),
            PathSegment::Index(index) => FieldKey::from(index.to_string()),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        PathSegment::Key(value.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(value: usize) -> Self {
        PathSegment::Index(value)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParseIssue {
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl ParseIssue {
    pub fn new(path: impl IntoIterator<Item = PathSegment>, message: impl Into<String>) -> Self {
        Self {
            path: path.into_iter().collect(),
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParseError {
    pub issues: Vec<ParseIssue>,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} parse issue(s)", self.issues.len())
    }
}

impl std::error::Error for ParseError {}

/// Schemas that parse a whole values object and report every issue found.
pub trait ParseSchema<T>: Send + Sync {
    fn safe_parse(&self, values: &T) -> Result<(), ParseError>;
    fn parse_async<'a>(&'a self, values: &'a T) -> BoxFuture<'a, Result<(), ParseError>>;
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ValidateOptions {
    pub abort_early: bool,
}

/// Either a single `(path, message)` failure or an aggregate carrying `inner`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValidationFailure {
    pub path: Option<String>,
    pub message: String,
    pub inner: Vec<ValidationFailure>,
}

impl ValidationFailure {
    pub fn at(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            message: message.into(),
            inner: Vec::new(),
        }
    }

    pub fn aggregate(message: impl Into<String>, inner: Vec<ValidationFailure>) -> Self {
        Self {
            path: None,
            message: message.into(),
            inner,
        }
    }
}

impl Display for ValidationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationFailure {}

/// Schemas exposing a single `validate` entry point; implementing this trait
/// is the marker for that shape.
pub trait ValidationSchema<T>: Send + Sync {
    fn validate<'a>(
        &'a self,
        values: &'a T,
        options: ValidateOptions,
    ) -> BoxFuture<'a, Result<(), ValidationFailure>>;
}

/// Capability probe over an arbitrary schema object.
pub trait SchemaCapabilities<T>: Send + Sync {
    fn as_parse_schema(&self) -> Option<&dyn ParseSchema<T>> {
        None
    }

    fn as_validation_schema(&self) -> Option<&dyn ValidationSchema<T>> {
        None
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchemaKind {
    Parse,
    Validation,
    Unknown,
}

pub fn detect_kind<T>(schema: &dyn SchemaCapabilities<T>) -> SchemaKind {
    if schema.as_parse_schema().is_some() {
        SchemaKind::Parse
    } else if schema.as_validation_schema().is_some() {
        SchemaKind::Validation
    } else {
        SchemaKind::Unknown
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SchemaFailure {
    Parse(ParseError),
    Validation(ValidationFailure),
}

pub fn normalize_failure(failure: &SchemaFailure) -> FieldErrors {
    match failure {
        SchemaFailure::Parse(error) => normalize_parse_error(error),
        SchemaFailure::Validation(failure) => normalize_validation_failure(failure),
    }
}

pub fn normalize_parse_error(error: &ParseError) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for issue in &error.issues {
        let key = issue
            .path
            .first()
            .map(PathSegment::to_field_key)
            .unwrap_or(FieldKey::ROOT);
        errors.insert(key, issue.message.clone());
    }
    errors
}

pub fn normalize_validation_failure(failure: &ValidationFailure) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if failure.inner.is_empty() {
        errors.insert(validation_key(failure), failure.message.clone());
        return errors;
    }
    for inner in &failure.inner {
        errors.insert(validation_key(inner), inner.message.clone());
    }
    errors
}

fn validation_key(failure: &ValidationFailure) -> FieldKey {
    failure
        .path
        .clone()
        .map(FieldKey::from)
        .unwrap_or(FieldKey::ROOT)
}

struct ParseAdapter<S>(S);

impl<T, S> SchemaCapabilities<T> for ParseAdapter<S>
where
    S: ParseSchema<T>,
{
    fn as_parse_schema(&self) -> Option<&dyn ParseSchema<T>> {
        Some(&self.0)
    }
}

struct ValidationAdapter<S>(S);

impl<T, S> SchemaCapabilities<T> for ValidationAdapter<S>
where
    S: ValidationSchema<T>,
{
    fn as_validation_schema(&self) -> Option<&dyn ValidationSchema<T>> {
        Some(&self.0)
    }
}

/// A schema bound to one controller, with its kind resolved at most once.
pub struct FormSchema<T> {
    inner: Arc<dyn SchemaCapabilities<T>>,
    kind: RwLock<Option<SchemaKind>>,
}

impl<T> FormSchema<T>
where
    T: Send + Sync + 'static,
{
    pub fn parse<S>(schema: S) -> Self
    where
        S: ParseSchema<T> + 'static,
    {
        Self {
            inner: Arc::new(ParseAdapter(schema)),
            kind: RwLock::new(Some(SchemaKind::Parse)),
        }
    }

    pub fn validation<S>(schema: S) -> Self
    where
        S: ValidationSchema<T> + 'static,
    {
        Self {
            inner: Arc::new(ValidationAdapter(schema)),
            kind: RwLock::new(Some(SchemaKind::Validation)),
        }
    }

    /// Kind is detected on first use and cached; see [`FormSchema::redetect`].
    pub fn probe(schema: Arc<dyn SchemaCapabilities<T>>) -> Self {
        Self {
            inner: schema,
            kind: RwLock::new(None),
        }
    }

    pub fn kind(&self) -> FormResult<SchemaKind> {
        if let Some(kind) = *read_lock(&self.kind, "reading cached schema kind")? {
            return Ok(kind);
        }
        self.redetect()
    }

    pub fn redetect(&self) -> FormResult<SchemaKind> {
        let kind = detect_kind(self.inner.as_ref());
        *write_lock(&self.kind, "caching schema kind")? = Some(kind);
        tracing::debug!(?kind, "detected schema kind");
        Ok(kind)
    }

    /// Runs the schema's native entry point, collecting every error.
    pub async fn run(&self, values: &T) -> FormResult<Result<(), SchemaFailure>> {
        match self.kind()? {
            SchemaKind::Parse => {
                let schema = self
                    .inner
                    .as_parse_schema()
                    .ok_or(FormError::UnsupportedSchema)?;
                Ok(schema.parse_async(values).await.map_err(SchemaFailure::Parse))
            }
            SchemaKind::Validation => {
                let schema = self
                    .inner
                    .as_validation_schema()
                    .ok_or(FormError::UnsupportedSchema)?;
                let options = ValidateOptions { abort_early: false };
                Ok(schema
                    .validate(values, options)
                    .await
                    .map_err(SchemaFailure::Validation))
            }
            SchemaKind::Unknown => Err(FormError::UnsupportedSchema),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Opaque;

    impl SchemaCapabilities<()> for Opaque {}

    struct AlwaysParses;

    impl ParseSchema<()> for AlwaysParses {
        fn safe_parse(&self, _values: &()) -> Result<(), ParseError> {
            Ok(())
        }

        fn parse_async<'a>(&'a self, _values: &'a ()) -> BoxFuture<'a, Result<(), ParseError>> {
            async { Ok(()) }.boxed()
        }
    }

    impl SchemaCapabilities<()> for AlwaysParses {
        fn as_parse_schema(&self) -> Option<&dyn ParseSchema<()>> {
            Some(self)
        }
    }

    #[derive(Default)]
    struct Switchable {
        parses: AtomicBool,
        probes: AtomicUsize,
    }

    impl SchemaCapabilities<()> for Switchable {
        fn as_parse_schema(&self) -> Option<&dyn ParseSchema<()>> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.parses.load(Ordering::SeqCst) {
                Some(&AlwaysParses)
            } else {
                None
            }
        }
    }

    struct RejectsAll;

    impl ValidationSchema<()> for RejectsAll {
        fn validate<'a>(
            &'a self,
            _values: &'a (),
            options: ValidateOptions,
        ) -> BoxFuture<'a, Result<(), ValidationFailure>> {
            async move {
                assert!(!options.abort_early, "all errors must be requested");
                Err(ValidationFailure::at("name", "required"))
            }
            .boxed()
        }
    }

    #[test]
    fn parse_issues_key_on_first_path_segment_with_last_write_winning() {
        let error = ParseError {
            issues: vec![
                ParseIssue::new([PathSegment::from("address"), "street".into()], "missing"),
                ParseIssue::new([PathSegment::from("email")], "first"),
                ParseIssue::new([PathSegment::from("email")], "second"),
                ParseIssue::new([PathSegment::from(2)], "bad row"),
                ParseIssue::new(Vec::new(), "form level"),
            ],
        };

        let errors = normalize_parse_error(&error);
        assert_eq!(errors.get(&FieldKey::new("address")).map(String::as_str), Some("missing"));
        assert_eq!(errors.get(&FieldKey::new("email")).map(String::as_str), Some("second"));
        assert_eq!(errors.get(&FieldKey::new("2")).map(String::as_str), Some("bad row"));
        assert_eq!(errors.get(&FieldKey::ROOT).map(String::as_str), Some("form level"));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn aggregate_and_single_validation_failures_normalize_alike() {
        let aggregate = ValidationFailure::aggregate(
            "2 errors occurred",
            vec![
                ValidationFailure::at("email", "invalid email"),
                ValidationFailure::at("age", "too young"),
            ],
        );
        let single = ValidationFailure::at("email", "invalid email");

        let from_aggregate = normalize_failure(&SchemaFailure::Validation(aggregate));
        let from_single = normalize_failure(&SchemaFailure::Validation(single));

        assert_eq!(from_aggregate.len(), 2);
        assert_eq!(
            from_aggregate.get(&FieldKey::new("email")),
            from_single.get(&FieldKey::new("email"))
        );
        assert_eq!(from_single.len(), 1);
    }

    #[test]
    fn detection_probes_capabilities() {
        assert_eq!(detect_kind::<()>(&Opaque), SchemaKind::Unknown);
        assert_eq!(detect_kind::<()>(&AlwaysParses), SchemaKind::Parse);
        assert_eq!(
            detect_kind::<()>(&ValidationAdapter(RejectsAll)),
            SchemaKind::Validation
        );
    }

    #[test]
    fn unknown_schema_is_a_configuration_error() {
        let schema = FormSchema::<()>::probe(Arc::new(Opaque));
        let outcome = block_on(schema.run(&()));
        assert_eq!(outcome, Err(FormError::UnsupportedSchema));
    }

    #[test]
    fn probed_schema_caches_its_kind() {
        let schema = FormSchema::<()>::probe(Arc::new(AlwaysParses));
        assert_eq!(schema.kind(), Ok(SchemaKind::Parse));
        assert_eq!(block_on(schema.run(&())), Ok(Ok(())));
    }

    #[test]
    fn validation_schema_runs_with_all_errors_requested() {
        let schema = FormSchema::validation(RejectsAll);
        let outcome = block_on(schema.run(&())).expect("schema kind is known");
        let errors = normalize_failure(&outcome.expect_err("schema rejects"));
        assert_eq!(errors.get(&FieldKey::new("name")).map(String::as_str), Some("required"));
    }

    #[test]
    fn cached_kind_survives_capability_changes_until_redetect() {
        let capabilities = Arc::new(Switchable::default());
        let schema = FormSchema::<()>::probe(capabilities.clone());

        assert_eq!(schema.kind(), Ok(SchemaKind::Unknown));
        capabilities.parses.store(true, Ordering::SeqCst);
        assert_eq!(schema.kind(), Ok(SchemaKind::Unknown));
        assert_eq!(block_on(schema.run(&())), Err(FormError::UnsupportedSchema));
        assert_eq!(capabilities.probes.load(Ordering::SeqCst), 1);

        assert_eq!(schema.redetect(), Ok(SchemaKind::Parse));
        assert_eq!(schema.kind(), Ok(SchemaKind::Parse));
        assert_eq!(block_on(schema.run(&())), Ok(Ok(())));
    }
}
