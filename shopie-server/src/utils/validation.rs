//! Request payload validation
//!
//! Turns `validator` results into the unified error shape so field-level
//! problems come back under `details` instead of a bare 400.

use shared::AppError;
use validator::{Validate, ValidationErrors};

/// Validate a request payload, mapping failures to [`AppError`]
pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), AppError> {
    payload.validate().map_err(into_app_error)
}

fn into_app_error(errors: ValidationErrors) -> AppError {
    let mut err = AppError::validation("request validation failed");
    for (field, field_errors) in errors.field_errors() {
        let messages: Vec<String> = field_errors
            .iter()
            .map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string())
            })
            .collect();
        err = err.with_detail(field.to_string(), messages);
    }
    err
}
