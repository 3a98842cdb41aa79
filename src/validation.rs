use crate::error::AppError;

pub fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Request(format!("{field} cannot be empty")));
    }
    Ok(())
}

pub fn require_some<T>(field: &str, values: &[T]) -> Result<(), AppError> {
    if values.is_empty() {
        return Err(AppError::Request(format!("at least one {field} is required")));
    }
    Ok(())
}
