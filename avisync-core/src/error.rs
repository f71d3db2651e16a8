use crate::provider::ProviderError;

/// Erreurs du coeur de synchronisation.
/// Seul le refresh manuel propage une erreur à un appelant direct ;
/// tout le reste est récupéré localement (voir sync.rs).
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Invalid {context} payload: {reason}")]
    InvalidPayload { context: String, reason: String },
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
