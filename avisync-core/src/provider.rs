/**
 * REALTIME PROVIDER - Interface vers la base temps réel hébergée
 *
 * RÔLE :
 * Seam unique entre le moteur de synchronisation et le backend hébergé
 * (hors scope). Le moteur ne connaît que subscribe/get_once ; le vrai
 * client (ou le stub du devkit) implémente ce trait.
 *
 * FONCTIONNEMENT :
 * - subscribe(path) branche des callbacks push et retourne une closure
 *   de désabonnement, consommée exactement une fois par le registry
 * - get_once(path) est le seul chemin awaité (refresh manuel)
 *
 * Le provider décide seul du seuil de staleness qui fixe isConnected ;
 * le moteur ne fait que re-dériver le tier de qualité.
 */

use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// Callback de réception d'un payload poussé par le provider.
pub type DataCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Callback d'erreur sur un canal live.
pub type ErrorCallback = Arc<dyn Fn(ProviderError) + Send + Sync>;

/// Closure de désabonnement retournée par `subscribe`.
/// Le registry garantit qu'elle est appelée exactement une fois.
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// Erreurs remontées par le provider externe.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Path not found: {0}")]
    NotFound(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Permission denied")]
    PermissionDenied,
}

pub trait RealtimeProvider: Send + Sync {
    /// Ouvre une subscription push sur un chemin.
    /// Les payloads d'un même chemin arrivent dans l'ordre d'émission (FIFO par clé).
    fn subscribe(
        &self,
        path: &str,
        on_data: DataCallback,
        on_error: ErrorCallback,
    ) -> Result<Unsubscribe, ProviderError>;

    /// Lecture one-shot d'un chemin, sans passer par le cache de subscriptions.
    fn get_once(&self, path: &str) -> BoxFuture<'static, Result<Value, ProviderError>>;
}

pub type SharedProvider = Arc<dyn RealtimeProvider>;
