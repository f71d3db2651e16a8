use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Réglages du moteur de synchronisation.
/// Les seuils du classifieur de qualité sont des constantes (classify.rs),
/// pas des réglages : les tests de bornes en dépendent.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SyncConfig {
    /// Délai de debounce avant ouverture d'une subscription (coalesce le churn)
    pub debounce_ms: u64,
    /// TTL d'une notification non dismissée
    pub notification_ttl_ms: u64,
    /// Capacité de la file de notifications (éviction FIFO au-delà)
    pub notification_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 150,
            notification_ttl_ms: 5000,
            notification_capacity: 5,
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }
}

pub async fn load_config() -> SyncConfig {
    let path = std::env::var("AVISYNC_CONFIG").unwrap_or_else(|_| "avisync.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return SyncConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            log::warn!("[config] invalid {path}: {e}, using defaults");
            SyncConfig::default()
        })
    } else {
        log::info!("[config] no {path}, using defaults");
        SyncConfig::default()
    }
}
