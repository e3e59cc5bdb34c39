use crate::domain_port::StoreError;
use sqlx::mysql::MySqlDatabaseError;

const ER_DUP_ENTRY: u16 = 1062;

pub fn is_dup_key(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.try_downcast_ref::<MySqlDatabaseError>())
        .is_some_and(|e| e.number() == ER_DUP_ENTRY)
}

/// Tags a driver error with the statement it came from.
pub fn store_err(context: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| StoreError::Store(format!("{context}: {e}"))
}
