use docql_infra::StoreError;

use super::translate::TranslateError;

/// Unified error type for GraphQL resolvers.
///
/// async-graphql has a blanket `impl<T: Display + Send + Sync + 'static> From<T> for Error`,
/// so any type implementing `Display` auto-converts via `?`.
///
/// This enum gives us:
///   - `From<StoreError>`: logs database detail, shows a sanitized message to clients
///   - `From<TranslateError>`: not-found and malformed argument messages pass through
///   - `GqlError::new("...")`: custom one-off messages
#[derive(Debug)]
pub enum GqlError {
    Store(StoreError),
    Translate(TranslateError),
    Custom(String),
}

impl GqlError {
    pub fn new(msg: impl Into<String>) -> Self {
        GqlError::Custom(msg.into())
    }
}

impl std::fmt::Display for GqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GqlError::Store(StoreError::Db(e)) | GqlError::Translate(TranslateError::Store(StoreError::Db(e))) => {
                // Log the real error server-side; return a generic message to clients
                tracing::error!("Database error: {e}");
                write!(f, "Internal database error")
            }
            GqlError::Store(e) => write!(f, "{e}"),
            GqlError::Translate(e) => write!(f, "{e}"),
            GqlError::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for GqlError {}

impl From<StoreError> for GqlError {
    fn from(e: StoreError) -> Self {
        GqlError::Store(e)
    }
}

impl From<TranslateError> for GqlError {
    fn from(e: TranslateError) -> Self {
        GqlError::Translate(e)
    }
}

/// Extension trait that converts any `Result<T, E>` where `E: Display`
/// into `async_graphql::Result<T>` with a contextual message prefix.
///
/// Usage: `value.deserialize::<String>().gql_err("Invalid document id")?`
pub trait ResultExt<T> {
    fn gql_err(self, context: &str) -> std::result::Result<T, async_graphql::Error>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn gql_err(self, context: &str) -> std::result::Result<T, async_graphql::Error> {
        self.map_err(|e| async_graphql::Error::new(format!("{context}: {e}")))
    }
}
