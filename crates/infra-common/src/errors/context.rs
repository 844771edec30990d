use super::types::Error;
use std::fmt;

/// Where an error happened: which component, doing what
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub component: String,
    pub operation: String,
    pub details: Option<String>,
}

impl ErrorContext {
    pub fn new<S: Into<String>, T: Into<String>>(component: S, operation: T) -> Self {
        ErrorContext {
            component: component.into(),
            operation: operation.into(),
            details: None,
        }
    }

    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in component '{}' during operation '{}'", self.component, self.operation)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

/// Extension trait for attaching an [`ErrorContext`] to errors
pub trait ErrorExt<T> {
    fn context(self, ctx: ErrorContext) -> std::result::Result<T, Error>;

    fn with_context<S: Into<String>, O: Into<String>>(
        self,
        component: S,
        operation: O,
    ) -> std::result::Result<T, Error>;
}

impl Error {
    /// Fold the context into the message while keeping the variant where it matters
    pub fn annotate(self, ctx: &ErrorContext) -> Error {
        match self {
            Error::Config(msg) => Error::Config(format!("{} [{}]", msg, ctx)),
            Error::Parse(msg) => Error::Parse(format!("{} [{}]", msg, ctx)),
            other => Error::Custom(format!("{} [{}]", other, ctx)),
        }
    }
}

impl<T> ErrorExt<T> for std::result::Result<T, Error> {
    fn context(self, ctx: ErrorContext) -> std::result::Result<T, Error> {
        self.map_err(|e| e.annotate(&ctx))
    }

    fn with_context<S: Into<String>, O: Into<String>>(
        self,
        component: S,
        operation: O,
    ) -> std::result::Result<T, Error> {
        self.context(ErrorContext::new(component, operation))
    }
}
