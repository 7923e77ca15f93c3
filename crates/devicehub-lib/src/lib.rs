//! devicehub library entry points.
//!
//! This crate holds the transport-independent core shared by every devicehub
//! endpoint: message catalogs and their localization, and the classified
//! application errors that carry localizable messages. HTTP glue lives in
//! `devicehub-service-shared`; consumers should depend on the items exported
//! here instead of reimplementing them.
//!

#![deny(warnings)]

pub mod app_error;
pub mod catalog;
pub mod error;
pub mod locale;
pub mod template;

pub use app_error::{
    error_kind, find_application_error, invalid_request, status_code, ApplicationError,
    ErrorKind, ERR_CONFLICT, ERR_FORBIDDEN, ERR_INVALID_TYPE, ERR_PAYLOAD_TOO_LARGE,
    ERR_RECORD_NOT_FOUND,
    ERR_RECORD_NOT_UNIQUE, ERR_UNAUTHORIZED, UI_INTERNAL_SERVER_ERROR,
    UI_INVALID_ACCEPT_LANGUAGE, UI_INVALID_REQUEST_BODY, UI_PAYLOAD_TOO_LARGE,
};
pub use catalog::Catalog;
pub use error::{BoxError, Error, Result};
pub use locale::{Bundle, Localizable, Localizer, DEFAULT_BASE_PATH, DEFAULT_LANGUAGE};
