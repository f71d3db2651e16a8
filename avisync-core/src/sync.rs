/**
 * SYNCHRONIZATION ORCHESTRATOR - Coordinateur central du moteur AviSync
 *
 * RÔLE :
 * Ouvre/ferme les subscriptions quand l'unité courante ou la liste d'unités
 * change, route les payloads entrants (garde de génération -> dédup ->
 * store canonique), détecte les transitions de connectivité et pousse les
 * notifications. Porte aussi le refresh manuel (seul chemin awaité).
 *
 * FONCTIONNEMENT :
 * - machine d'état par canal : Unwatched -> Subscribing (debounce ~150 ms,
 *   annulable) -> Live (premier payload accepté) -> Unwatched (close synchrone)
 * - le store canonique (snapshots + records + notifications) n'est muté
 *   qu'ici et par l'expiration TTL de la file — la présentation ne fait que lire
 * - seule l'arête connecté/déconnecté notifie, jamais le jitter de qualité
 */

use crate::classify::quality_tier;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::filter::ChangeFilter;
use crate::models::{
    ChannelKey, ConnectivityRecord, ConnectivitySignal, DeviceStatus, NotificationEntry, Severity,
};
use crate::notify::NotificationQueue;
use crate::provider::{DataCallback, ErrorCallback, ProviderError, SharedProvider};
use crate::registry::SubscriptionRegistry;
use crate::state::{new_state, Shared};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Default)]
struct EngineInner {
    registry: SubscriptionRegistry,
    filter: ChangeFilter,
    /// Records de connectivité par unité, détruits quand l'unité quitte le watched set
    records: HashMap<String, ConnectivityRecord>,
    /// Dernier payload data accepté par unité
    device_data: HashMap<String, Value>,
    /// Dernier payload d'historique accepté par (unité, capteur)
    sensor_history: HashMap<(String, String), Value>,
    watched_device: Option<String>,
    watched_list: Vec<String>,
    watched_sensors: Vec<String>,
    /// Ouvertures débouncées en attente : clé -> epoch (annulation par retrait)
    pending: HashMap<ChannelKey, u64>,
    epoch: u64,
}

impl EngineInner {
    /// Ensemble des canaux que l'état de watch courant exige :
    /// connectivité pour toute la liste, data + historiques pour l'unité courante.
    fn desired_channels(&self) -> HashSet<ChannelKey> {
        let mut set = HashSet::new();
        for device in &self.watched_list {
            set.insert(ChannelKey::connectivity(device.clone()));
        }
        if let Some(current) = &self.watched_device {
            set.insert(ChannelKey::connectivity(current.clone()));
            set.insert(ChannelKey::data(current.clone()));
            for sensor in &self.watched_sensors {
                set.insert(ChannelKey::sensor_history(current.clone(), sensor.clone()));
            }
        }
        set
    }
}

/// Vue d'ensemble de l'état du moteur (observabilité légère).
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub active_subscriptions: usize,
    pub pending_subscriptions: usize,
    pub snapshots_held: usize,
    pub devices_tracked: usize,
    pub notifications_live: usize,
}

#[derive(Clone)]
pub struct SyncEngine {
    inner: Shared<EngineInner>,
    provider: SharedProvider,
    notifications: NotificationQueue,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(provider: SharedProvider, config: SyncConfig) -> Self {
        let notifications =
            NotificationQueue::new(config.notification_capacity, config.notification_ttl());
        Self {
            inner: new_state(EngineInner::default()),
            provider,
            notifications,
            config,
        }
    }

    // --- hooks de watch (pilotés par la présentation) ---

    pub fn set_watched_device(&self, device_id: Option<String>) {
        self.inner.lock().watched_device = device_id;
        self.apply_watch_set();
    }

    pub fn set_watched_device_list(&self, device_ids: Vec<String>) {
        self.inner.lock().watched_list = device_ids;
        self.apply_watch_set();
    }

    pub fn set_watched_sensors(&self, sensors: Vec<String>) {
        self.inner.lock().watched_sensors = sensors;
        self.apply_watch_set();
    }

    /// Ré-applique le watched set courant : rouvre tout canal désiré mais
    /// inactif (typiquement après une erreur provider sur un canal).
    pub fn resync(&self) {
        self.apply_watch_set();
    }

    // --- lectures synchrones (couche présentation) ---

    /// État de connectivité courant ; défaut déconnecté/Unknown si jamais observé.
    pub fn get_connectivity(&self, device_id: &str) -> ConnectivityRecord {
        self.inner
            .lock()
            .records
            .get(device_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_device_data(&self, device_id: &str) -> Option<Value> {
        self.inner.lock().device_data.get(device_id).cloned()
    }

    pub fn get_sensor_history(&self, device_id: &str, sensor: &str) -> Option<Value> {
        self.inner
            .lock()
            .sensor_history
            .get(&(device_id.to_string(), sensor.to_string()))
            .cloned()
    }

    // --- notifications ---

    pub fn notify(&self, message: impl Into<String>, severity: Severity) -> u64 {
        self.notifications.push(message, severity)
    }

    pub fn dismiss(&self, id: u64) -> bool {
        self.notifications.dismiss(id)
    }

    pub fn notifications(&self) -> Vec<NotificationEntry> {
        self.notifications.entries()
    }

    // --- refresh manuel (gateway one-shot) ---

    /// Lecture one-shot de la connectivité d'une unité, fusionnée dans le
    /// store par le même chemin de transition que les subscriptions (peut
    /// donc notifier). Ne touche jamais l'ensemble des subscriptions actives ;
    /// en cas d'erreur provider, le store reste intact et l'erreur remonte.
    pub async fn refresh_connectivity(
        &self,
        device_id: &str,
    ) -> Result<ConnectivityRecord, SyncError> {
        let path = ChannelKey::connectivity(device_id).path();
        let value = self.provider.get_once(&path).await?;
        self.merge_connectivity(device_id, &value, None)
    }

    pub fn stats(&self) -> EngineStats {
        let inner = self.inner.lock();
        EngineStats {
            active_subscriptions: inner.registry.len(),
            pending_subscriptions: inner.pending.len(),
            snapshots_held: inner.filter.len(),
            devices_tracked: inner.records.len(),
            notifications_live: self.notifications.len(),
        }
    }

    /// Teardown complet : ferme toutes les subscriptions (closures appelées
    /// hors lock), annule les debounce en attente, vide le store.
    pub fn shutdown(&self) {
        let drained = {
            let mut inner = self.inner.lock();
            inner.pending.clear();
            inner.filter.clear();
            inner.records.clear();
            inner.device_data.clear();
            inner.sensor_history.clear();
            inner.watched_device = None;
            inner.watched_list.clear();
            inner.registry.drain()
        };
        for (key, unsubscribe) in drained {
            if let Some(unsub) = unsubscribe {
                unsub();
            }
            debug!("[sync] shutdown closed {key}");
        }
        self.notifications.clear();
    }

    // --- mécanique interne ---

    /// Diff entre canaux désirés et canaux actifs/en attente.
    /// Close synchrone sur le chemin de cleanup (y compris annulation d'un
    /// debounce jamais ouvert) ; open différé derrière le debounce.
    fn apply_watch_set(&self) {
        let mut to_unsubscribe = Vec::new();
        let mut to_open = Vec::new();
        {
            let mut inner = self.inner.lock();
            let desired = inner.desired_channels();

            for key in inner.registry.active_keys() {
                if !desired.contains(&key) {
                    if let Some(unsub) = inner.registry.close(&key) {
                        to_unsubscribe.push(unsub);
                    }
                    inner.filter.forget(&key);
                    debug!("[sync] closed {key}");
                }
            }

            // un retrait de pending suffit à annuler le debounce correspondant
            inner.pending.retain(|key, _| desired.contains(key));

            // les unités plus du tout suivies perdent leur record et leurs snapshots
            let watched_devices: HashSet<String> =
                desired.iter().map(|k| k.device_id().to_string()).collect();
            inner.records.retain(|device, _| watched_devices.contains(device));
            inner
                .device_data
                .retain(|device, _| desired.contains(&ChannelKey::data(device.clone())));
            inner.sensor_history.retain(|(device, sensor), _| {
                desired.contains(&ChannelKey::sensor_history(device.clone(), sensor.clone()))
            });

            for key in desired {
                if !inner.registry.is_active(&key) && !inner.pending.contains_key(&key) {
                    inner.epoch += 1;
                    let epoch = inner.epoch;
                    inner.pending.insert(key.clone(), epoch);
                    to_open.push((key, epoch));
                }
            }
        }

        for unsub in to_unsubscribe {
            unsub();
        }
        for (key, epoch) in to_open {
            self.spawn_debounced_open(key, epoch);
        }
    }

    fn spawn_debounced_open(&self, key: ChannelKey, epoch: u64) {
        let engine = self.clone();
        let delay = self.config.debounce();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.open_after_debounce(key, epoch);
        });
    }

    fn open_after_debounce(&self, key: ChannelKey, epoch: u64) {
        let generation = {
            let mut inner = self.inner.lock();
            if inner.pending.get(&key) != Some(&epoch) {
                debug!("[sync] debounced open of {key} cancelled");
                return;
            }
            inner.pending.remove(&key);
            match inner.registry.reserve(&key) {
                Some(generation) => generation,
                None => return,
            }
        };

        let on_data: DataCallback = {
            let engine = self.clone();
            let key = key.clone();
            Arc::new(move |value| engine.handle_payload(&key, generation, value))
        };
        let on_error: ErrorCallback = {
            let engine = self.clone();
            let key = key.clone();
            Arc::new(move |err| engine.handle_channel_error(&key, generation, err))
        };

        match self.provider.subscribe(&key.path(), on_data, on_error) {
            Ok(unsubscribe) => {
                let stale = self.inner.lock().registry.attach(&key, generation, unsubscribe);
                match stale {
                    // fermé pendant l'appel provider : teardown immédiat
                    Some(unsub) => unsub(),
                    None => debug!("[sync] subscribed {key}"),
                }
            }
            Err(e) => {
                warn!("[sync] subscribe failed for {key}: {e}");
                let mut inner = self.inner.lock();
                if inner.registry.is_current(&key, generation) {
                    inner.registry.close(&key);
                }
            }
        }
    }

    /// Réception d'un payload poussé. La garde de génération tombe en tête :
    /// un callback d'une subscription démontée ne touche jamais l'état.
    fn handle_payload(&self, key: &ChannelKey, generation: u64, value: Value) {
        {
            let mut inner = self.inner.lock();
            if !inner.registry.is_current(key, generation) {
                debug!("[sync] dropped payload for torn-down channel {key}");
                return;
            }
            if !inner.filter.accept(key, &value) {
                return;
            }
            match key {
                ChannelKey::Data { device_id } => {
                    inner.device_data.insert(device_id.clone(), value);
                    return;
                }
                ChannelKey::SensorHistory { device_id, sensor } => {
                    inner
                        .sensor_history
                        .insert((device_id.clone(), sensor.clone()), value);
                    return;
                }
                // la connectivité passe par le chemin de fusion commun, hors de
                // ce lock ; la garde de génération y est re-validée (un close
                // peut s'intercaler entre les deux sections critiques)
                ChannelKey::Connectivity { .. } => {}
            }
        }
        if let Err(e) = self.merge_connectivity(key.device_id(), &value, Some((key, generation))) {
            warn!("[sync] connectivity payload rejected on {key}: {e}");
        }
    }

    /// Erreur provider sur un canal live : la clé quitte l'ensemble actif
    /// (un open futur pourra retenter), snapshots et records restent en place,
    /// aucune notification automatique.
    fn handle_channel_error(&self, key: &ChannelKey, generation: u64, err: ProviderError) {
        warn!("[sync] channel error on {key}: {err}");
        let unsubscribe = self.inner.lock().registry.fail(key, generation);
        if let Some(unsub) = unsubscribe {
            // le listener est mort côté provider, on libère quand même la closure
            unsub();
        }
    }

    /// Chemin de fusion commun subscriptions + refresh manuel.
    /// `gate` porte la (clé, génération) du callback source : elle est
    /// re-validée sous le lock qui écrit le record, sinon un close intercalé
    /// laisserait un payload d'une subscription démontée ré-insérer le record
    /// d'une unité plus suivie. Le refresh manuel passe None (pas de subscription).
    fn merge_connectivity(
        &self,
        device_id: &str,
        value: &Value,
        gate: Option<(&ChannelKey, u64)>,
    ) -> Result<ConnectivityRecord, SyncError> {
        let signal = ConnectivitySignal::from_value(value)?;
        let last_seen = signal.last_seen_ts()?;

        let mut notification: Option<(String, Severity)> = None;
        let record = {
            let mut inner = self.inner.lock();
            if let Some((key, generation)) = gate {
                if !inner.registry.is_current(key, generation) {
                    debug!("[sync] merge abandoned, channel {key} torn down meanwhile");
                    return Ok(inner.records.get(device_id).cloned().unwrap_or_default());
                }
            }
            let previous = inner.records.get(device_id).cloned().unwrap_or_default();

            // garde anti-réordonnancement : un heartbeat plus vieux que l'état
            // courant est ignoré (les deux chemins convergent vers le plus récent)
            if let (Some(incoming), Some(current)) = (last_seen, previous.last_seen) {
                if incoming < current {
                    debug!("[sync] stale connectivity payload for {device_id}, ignored");
                    return Ok(previous);
                }
            }

            let record = ConnectivityRecord {
                is_connected: signal.is_connected,
                last_seen,
                quality_tier: quality_tier(last_seen, OffsetDateTime::now_utc()),
                status: signal
                    .status
                    .as_deref()
                    .map(DeviceStatus::from_wire)
                    .unwrap_or(previous.status),
            };

            if record.is_connected != previous.is_connected {
                notification = Some(if record.is_connected {
                    (format!("Unit {device_id} is back online"), Severity::Success)
                } else {
                    (format!("Unit {device_id} lost connection"), Severity::Warning)
                });
            }

            inner.records.insert(device_id.to_string(), record.clone());
            record
        };

        if let Some((message, severity)) = notification {
            info!("[sync] connectivity transition: {message}");
            self.notifications.push(message, severity);
        }
        Ok(record)
    }
}
