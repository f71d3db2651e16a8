/**
 * AVISYNC CORE - Moteur de synchronisation temps réel du dashboard avicole
 *
 * RÔLE : Multiplexer les subscriptions push par unité (data, connectivité,
 * historiques capteurs) sans listener dupliqué ni fuité, dédupliquer les
 * payloads inchangés, classifier la vivacité depuis le dernier heartbeat et
 * émettre les notifications de transition via une file bornée auto-expirante.
 *
 * ARCHITECTURE : service à propriétaire unique avec provider injecté (trait
 * RealtimeProvider) — mono-process, concurrence = entrelacement de callbacks
 * async, toute mutation du store sérialisée derrière un seul Mutex.
 * UTILITÉ : coeur de l'état partagé consommé par la couche présentation
 * (hors scope), qui ne fait que lire et piloter les hooks de watch.
 */

pub mod classify;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod notify;
pub mod provider;
pub mod registry;
pub mod state;
pub mod sync;

pub use config::{load_config, SyncConfig};
pub use error::SyncError;
pub use models::{
    ChannelKey, ConnectivityRecord, DeviceStatus, NotificationEntry, QualityTier, Severity,
};
pub use notify::NotificationQueue;
pub use provider::{ProviderError, RealtimeProvider, SharedProvider};
pub use sync::{EngineStats, SyncEngine};
