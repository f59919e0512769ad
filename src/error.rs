use sea_orm::DbErr;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Invalid value for field: {field}")]
    ValidationError { field: &'static str },

    #[error("Subscription not found: {id}")]
    NotFound { id: i64 },

    #[error("Subscription already exists for user {user_id} and package {package_id}")]
    Conflict { package_id: i64, user_id: i64 },

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// The offending field name of a validation error, for form attribution.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            AppError::ValidationError { field } => Some(field),
            _ => None,
        }
    }
}
