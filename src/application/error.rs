use thiserror::Error;

use crate::application::repos::RepoError;

/// Error surface of the read path.
///
/// Cache-store failures never appear here: they are contained inside the
/// read service and degrade to the durable store. Only a durable-store
/// failure during the synchronous fallback reaches the caller.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error(transparent)]
    Durable(#[from] RepoError),
}
