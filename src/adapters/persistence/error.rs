//! Maps `sqlx::Error` onto `CoreError` so every repository adapter has one
//! mechanical translation to perform and no business rules leak into it.

use crate::core::error::CoreError;

pub fn map_sqlx_error(entity: &str, err: sqlx::Error) -> CoreError {
    match &err {
        sqlx::Error::RowNotFound => CoreError::not_found(format!("{entity} not found")),
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => CoreError::conflict(format!("{entity} already exists")),
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => CoreError::bad_request(format!("{entity} references a missing row")),
        _ => CoreError::internal(format!("persistence error on {entity}: {err}")),
    }
}
