use tabula_data::DataError;

/// Bridges `sqlx::Error` into the core's [`DataError`].
///
/// The orphan rule forbids `From<sqlx::Error> for DataError` here, so call
/// `.map_err(SqlxErrorExt::into_data_error)` at the driver boundary.
pub trait SqlxErrorExt {
    fn into_data_error(self) -> DataError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_data_error(self) -> DataError {
        match &self {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".into()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DataError::Other(format!("could not decode column: {self}"))
            }
            _ => DataError::database(self),
        }
    }
}

/// Result of a driver-level step such as decoding one row.
pub type SqlxResult<T> = Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(sqlx::Error::RowNotFound.into_data_error().is_not_found());
    }

    #[test]
    fn test_driver_errors_stay_database_errors() {
        let err = sqlx::Error::PoolTimedOut.into_data_error();
        assert!(matches!(err, DataError::Database(_)));
        assert!(!err.is_structural());
    }
}
