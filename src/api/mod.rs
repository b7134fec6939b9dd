//! REST API module.
//!
//! Handlers are thin: they validate the body, take the authenticated identity
//! from a typed extractor, and delegate to the repository.

mod internal;
mod owners;
mod rides;
mod vehicles;

pub use internal::*;
pub use owners::*;
pub use rides::*;
pub use vehicles::*;

use axum::{extract::rejection::JsonRejection, Json};

use crate::errors::AppError;

/// Handler result; errors render through [`AppError`]'s response envelope.
pub type ApiResult<T> = Result<T, AppError>;

/// Unwrap a JSON body, turning malformed or missing fields into a validation error.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    let Json(value) = payload?;
    Ok(value)
}

/// Reject blank required string fields.
fn require_non_empty(fields: &[&str], message: &str) -> ApiResult<()> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(AppError::Validation(message.to_string()));
    }
    Ok(())
}
