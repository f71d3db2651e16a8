/*!
Test Harness pour le moteur AviSync

Facilite l'écriture de tests d'intégration avec:
- Câblage automatique moteur + stub provider
- Builders de payloads de connectivité (heartbeats datés)
- Assertions sur subscriptions et notifications
*/

use crate::provider_stub::StubProvider;
use anyhow::Result;
use avisync_core::models::{ChannelKey, Severity};
use avisync_core::sync::SyncEngine;
use avisync_core::SyncConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Harness de test complet : moteur + stub, avec une config rapide
/// (debounce 20 ms) pour garder les tests courts.
pub struct TestHarness {
    pub provider: Arc<StubProvider>,
    pub engine: SyncEngine,
    config: SyncConfig,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_provider(StubProvider::new(), Self::fast_config())
    }

    /// Harness dont le stub continue de tirer après unsubscribe
    /// (exerce la garde de génération du moteur).
    pub fn leaky() -> Self {
        Self::with_provider(StubProvider::leaky(), Self::fast_config())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self::with_provider(StubProvider::new(), config)
    }

    fn with_provider(stub: StubProvider, config: SyncConfig) -> Self {
        env_logger::try_init().ok();
        let provider = Arc::new(stub);
        let engine = SyncEngine::new(provider.clone(), config.clone());
        Self { provider, engine, config }
    }

    fn fast_config() -> SyncConfig {
        SyncConfig { debounce_ms: 20, ..SyncConfig::default() }
    }

    /// Attend que les ouvertures débouncées en attente aient tiré.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(self.config.debounce_ms * 2 + 15)).await;
    }

    // --- chemins provider ---

    pub fn connectivity_path(device_id: &str) -> String {
        ChannelKey::connectivity(device_id).path()
    }

    pub fn data_path(device_id: &str) -> String {
        ChannelKey::data(device_id).path()
    }

    pub fn history_path(device_id: &str, sensor: &str) -> String {
        ChannelKey::sensor_history(device_id, sensor).path()
    }

    // --- builders de payloads ---

    /// Descripteur de connectivité avec un lastSeen daté de `secs_ago` secondes.
    pub fn heartbeat(connected: bool, secs_ago: i64) -> Value {
        let seen = OffsetDateTime::now_utc() - time::Duration::seconds(secs_ago);
        json!({
            "isConnected": connected,
            "lastSeen": seen.format(&Rfc3339).unwrap(),
        })
    }

    /// Descripteur jamais vu : déconnecté, lastSeen null.
    pub fn heartbeat_never_seen() -> Value {
        json!({ "isConnected": false, "lastSeen": null })
    }

    /// Pousse un heartbeat sur le canal de connectivité d'une unité.
    pub fn push_heartbeat(&self, device_id: &str, connected: bool, secs_ago: i64) {
        self.provider
            .push(&Self::connectivity_path(device_id), Self::heartbeat(connected, secs_ago));
    }

    // --- assertions ---

    /// Vérifie qu'exactement une subscription live existe sur un chemin.
    pub fn assert_single_subscription(&self, path: &str) -> Result<()> {
        let live = self.provider.live_count(path);
        if live != 1 {
            anyhow::bail!("expected exactly 1 live subscription on {path}, got {live}");
        }
        Ok(())
    }

    /// Notifications courantes d'une sévérité donnée.
    pub fn notifications_with(&self, severity: Severity) -> Vec<String> {
        self.engine
            .notifications()
            .into_iter()
            .filter(|n| n.severity == severity)
            .map(|n| n.message)
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
