//! Application error taxonomy.
//!
//! [`ApplicationError`] is the classified error every endpoint returns for a
//! recognizable condition. It carries an [`ErrorKind`], a [`Localizable`]
//! message, an optional UI code for clients, and an optional cause.
//!
//! Classification walks `source()` chains, so an `ApplicationError` wrapped in
//! any number of other errors still determines the outcome:
//!
//! ```
//! use devicehub_lib::{error_kind, ErrorKind, ERR_RECORD_NOT_FOUND};
//!
//! let err = ERR_RECORD_NOT_FOUND.clone().with_var("name", "Device");
//! assert_eq!(error_kind(&err), ErrorKind::NotFound);
//! assert!(ERR_RECORD_NOT_FOUND.is(&err));
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::error::BoxError;
use crate::locale::Localizable;

/// UI code used for every unclassified failure.
pub const UI_INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";

/// UI code for request bodies that could not be decoded.
pub const UI_INVALID_REQUEST_BODY: &str = "INVALID_REQUEST_BODY";

/// UI code for an unusable `Accept-Language` header.
pub const UI_INVALID_ACCEPT_LANGUAGE: &str = "INVALID_ACCEPT_LANGUAGE";

/// UI code for request bodies over the configured size limit.
pub const UI_PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";

/// Outcome class of an application error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    PayloadTooLarge,
    Unprocessable,
    Internal,
}

impl ErrorKind {
    /// HTTP status code for this kind.
    pub const fn status_code(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::Unprocessable => 422,
            ErrorKind::Internal => 500,
        }
    }
}

/// Classified, localizable application error.
#[derive(Debug, Clone)]
pub struct ApplicationError {
    pub localizable: Localizable,
    pub kind: ErrorKind,
    /// Stable code clients can branch on. May be empty.
    pub ui_code: String,
    cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

/// Canonical "record not found" error. Clone it and set `name`.
pub static ERR_RECORD_NOT_FOUND: Lazy<ApplicationError> = Lazy::new(|| {
    ApplicationError::new(
        ErrorKind::NotFound,
        Localizable::new("errors.record_not_found", "record not found").with_var("name", "Resource"),
    )
});

/// Canonical "record not unique" error.
pub static ERR_RECORD_NOT_UNIQUE: Lazy<ApplicationError> = Lazy::new(|| {
    ApplicationError::new(
        ErrorKind::Unprocessable,
        Localizable::new("errors.record_not_unique", "record not unique"),
    )
});

/// Canonical "request unauthorized" error.
pub static ERR_UNAUTHORIZED: Lazy<ApplicationError> = Lazy::new(|| {
    ApplicationError::new(
        ErrorKind::Unauthorized,
        Localizable::new("errors.request_unauthorized", "request unauthorized"),
    )
});

/// Canonical "request forbidden" error.
pub static ERR_FORBIDDEN: Lazy<ApplicationError> = Lazy::new(|| {
    ApplicationError::new(
        ErrorKind::Forbidden,
        Localizable::new("errors.request_forbidden", "request forbidden"),
    )
});

/// Canonical "record already exists" error.
pub static ERR_CONFLICT: Lazy<ApplicationError> = Lazy::new(|| {
    ApplicationError::new(
        ErrorKind::Conflict,
        Localizable::new("errors.record_already_exist", "record already exist")
            .with_var("name", "Record"),
    )
});

/// The request body exceeded the configured limit.
pub static ERR_PAYLOAD_TOO_LARGE: Lazy<ApplicationError> = Lazy::new(|| {
    ApplicationError::new(
        ErrorKind::PayloadTooLarge,
        Localizable::new("errors.payload_too_large", "request body too large"),
    )
    .with_ui_code(UI_PAYLOAD_TOO_LARGE)
});

/// A request payload of the wrong type reached an endpoint.
pub static ERR_INVALID_TYPE: Lazy<ApplicationError> = Lazy::new(|| {
    ApplicationError::new(
        ErrorKind::BadRequest,
        Localizable::new("errors.invalid_type", "invalid type"),
    )
});

impl ApplicationError {
    /// Create an error without UI code or cause.
    pub fn new(kind: ErrorKind, localizable: Localizable) -> Self {
        Self {
            localizable,
            kind,
            ui_code: String::new(),
            cause: None,
        }
    }

    /// Set the UI code.
    #[must_use]
    pub fn with_ui_code(mut self, ui_code: impl Into<String>) -> Self {
        self.ui_code = ui_code.into();
        self
    }

    /// Attach the lower-level error that caused this one.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        let cause: BoxError = cause.into();
        self.cause = Some(Arc::from(cause));
        self
    }

    /// Set a message variable on this (cloned) error.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.localizable = self.localizable.with_var(name, value);
        self
    }

    /// The wrapped cause, if any.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// HTTP status code of this error's kind.
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// Whether `err` (or the first application error in its chain) is
    /// equivalent to `self`.
    ///
    /// Kind, literal message and cause identity are compared; message id and
    /// variables are not, so annotated clones of a sentinel still match it.
    pub fn is(&self, err: &(dyn StdError + 'static)) -> bool {
        find_application_error(err).is_some_and(|other| self == other)
    }
}

impl PartialEq for ApplicationError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.localizable.message == other.localizable.message
            && same_cause(&self.cause, &other.cause)
    }
}

fn same_cause(
    a: &Option<Arc<dyn StdError + Send + Sync + 'static>>,
    b: &Option<Arc<dyn StdError + Send + Sync + 'static>>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => std::ptr::eq(
            Arc::as_ptr(a) as *const (),
            Arc::as_ptr(b) as *const (),
        ),
        _ => false,
    }
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            None => write!(f, "{}", self.localizable.message),
            Some(cause) => write!(f, "{}: {}", self.localizable.message, cause),
        }
    }
}

impl StdError for ApplicationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// Build a bad-request error wrapping a validation `cause`.
pub fn invalid_request(cause: impl Into<BoxError>, ui_code: impl Into<String>) -> ApplicationError {
    let cause = cause.into();
    let message = cause.to_string();
    ApplicationError::new(
        ErrorKind::BadRequest,
        Localizable::new("errors.invalid_request", "invalid request").with_var("message", message),
    )
    .with_ui_code(ui_code)
    .with_cause(cause)
}

/// First [`ApplicationError`] in `err`'s source chain, starting with `err`.
pub fn find_application_error<'a>(
    err: &'a (dyn StdError + 'static),
) -> Option<&'a ApplicationError> {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(app_err) = err.downcast_ref::<ApplicationError>() {
            return Some(app_err);
        }
        current = err.source();
    }
    None
}

/// Kind of the first application error in the chain, or
/// [`ErrorKind::Internal`] for unclassified errors.
pub fn error_kind(err: &(dyn StdError + 'static)) -> ErrorKind {
    find_application_error(err).map_or(ErrorKind::Internal, |app_err| app_err.kind)
}

/// HTTP status code for any error.
pub fn status_code(err: &(dyn StdError + 'static)) -> u16 {
    error_kind(err).status_code()
}
