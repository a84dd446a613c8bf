use thiserror::Error;

/// Failures raised by the provider client (`database_ops::nager`).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("http {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },
    #[error("network: {0}")]
    Net(#[from] reqwest::Error),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("no answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// Failures raised by a `HolidayStore`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    /// The rows a write was planned against changed underneath it.
    #[error("conflicting write: {0}")]
    Conflict(String),
    #[error("{0}")]
    Other(String),
}

/// Classified failure of a sync / refresh / search operation.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("holiday provider unavailable: {0}")]
    ProviderUnavailable(#[from] ProviderError),
    #[error("holiday provider returned no records for {scope}")]
    EmptyProviderResponse { scope: String },
    #[error("unknown country code: {0}")]
    UnknownCountryCode(String),
    #[error("store failure: {0}")]
    StoreFailure(#[from] StoreError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl SyncError {
    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            SyncError::EmptyProviderResponse { .. } => "EMPTY_PROVIDER_RESPONSE",
            SyncError::UnknownCountryCode(_) => "UNKNOWN_COUNTRY_CODE",
            SyncError::StoreFailure(_) => "STORE_FAILURE",
            SyncError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    pub fn empty(code: &str, year: Option<i32>) -> Self {
        let scope = match year {
            Some(y) => format!("{code}/{y}"),
            None => code.to_string(),
        };
        SyncError::EmptyProviderResponse { scope }
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_response_names_scope() {
        let err = SyncError::empty("KR", Some(2025));
        assert_eq!(err.code(), "EMPTY_PROVIDER_RESPONSE");
        assert!(err.to_string().contains("KR/2025"));

        let countries = SyncError::empty("AvailableCountries", None);
        assert!(countries.to_string().ends_with("AvailableCountries"));
    }

    #[test]
    fn store_errors_convert() {
        let err: SyncError = StoreError::Other("boom".into()).into();
        assert_eq!(err.code(), "STORE_FAILURE");
        assert_eq!(err.to_string(), "store failure: boom");
    }
}
