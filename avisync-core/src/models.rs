use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Clé d'adressage d'une subscription live.
/// Invariant : au plus une subscription active par clé (voir registry).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    /// Racine des données temps réel d'une unité (capteurs, automatismes)
    Data { device_id: String },
    /// Descripteur de connectivité d'une unité ({isConnected, lastSeen})
    Connectivity { device_id: String },
    /// Historique d'un capteur donné d'une unité
    SensorHistory { device_id: String, sensor: String },
}

impl ChannelKey {
    pub fn data(device_id: impl Into<String>) -> Self {
        ChannelKey::Data { device_id: device_id.into() }
    }

    pub fn connectivity(device_id: impl Into<String>) -> Self {
        ChannelKey::Connectivity { device_id: device_id.into() }
    }

    pub fn sensor_history(device_id: impl Into<String>, sensor: impl Into<String>) -> Self {
        ChannelKey::SensorHistory { device_id: device_id.into(), sensor: sensor.into() }
    }

    pub fn device_id(&self) -> &str {
        match self {
            ChannelKey::Data { device_id }
            | ChannelKey::Connectivity { device_id }
            | ChannelKey::SensorHistory { device_id, .. } => device_id,
        }
    }

    /// Chemin provider correspondant, ex: "devices/coop-01/connectivity".
    pub fn path(&self) -> String {
        match self {
            ChannelKey::Data { device_id } => format!("devices/{device_id}/data"),
            ChannelKey::Connectivity { device_id } => format!("devices/{device_id}/connectivity"),
            ChannelKey::SensorHistory { device_id, sensor } => {
                format!("devices/{device_id}/sensors/{sensor}/history")
            }
        }
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKey::Data { device_id } => write!(f, "device:{device_id}:data"),
            ChannelKey::Connectivity { device_id } => write!(f, "device:{device_id}:connectivity"),
            ChannelKey::SensorHistory { device_id, sensor } => {
                write!(f, "device:{device_id}:sensor:{sensor}:history")
            }
        }
    }
}

/// Tier de qualité dérivé de l'âge du dernier heartbeat (jamais fourni par le provider).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityTier {
    Unknown,
    Poor,
    Fair,
    Good,
    Excellent,
}

/// Statut opérationnel remonté par le provider (toléré absent ou inconnu).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Unknown,
    Active,
    Inactive,
    Error,
}

impl DeviceStatus {
    /// Parse tolérant du champ wire ("active", "INACTIVE"...) ; inconnu -> Unknown.
    pub fn from_wire(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "active" | "online" => DeviceStatus::Active,
            "inactive" | "offline" => DeviceStatus::Inactive,
            "error" | "failed" => DeviceStatus::Error,
            _ => DeviceStatus::Unknown,
        }
    }
}

/// État de connectivité canonique d'une unité.
/// Possédé exclusivement par l'orchestrateur : la couche présentation ne fait que lire.
/// is_connected vient du provider, quality_tier est recalculé côté client —
/// les deux signaux sont indépendants et peuvent diverger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectivityRecord {
    pub is_connected: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
    pub quality_tier: QualityTier,
    pub status: DeviceStatus,
}

impl Default for ConnectivityRecord {
    fn default() -> Self {
        Self {
            is_connected: false,
            last_seen: None,
            quality_tier: QualityTier::Unknown,
            status: DeviceStatus::Unknown,
        }
    }
}

/// Forme wire du descripteur de connectivité poussé par le provider.
/// lastSeen arrive en RFC 3339, en epoch millisecondes, ou null.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivitySignal {
    #[serde(default)]
    pub is_connected: bool,
    #[serde(default)]
    pub last_seen: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ConnectivitySignal {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, SyncError> {
        serde_json::from_value(value.clone()).map_err(|e| SyncError::InvalidPayload {
            context: "connectivity".into(),
            reason: e.to_string(),
        })
    }

    /// Timestamp normalisé du dernier heartbeat.
    pub fn last_seen_ts(&self) -> Result<Option<OffsetDateTime>, SyncError> {
        match &self.last_seen {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => OffsetDateTime::parse(s, &Rfc3339)
                .map(Some)
                .map_err(|_| SyncError::InvalidTimestamp(s.clone())),
            Some(serde_json::Value::Number(n)) => {
                // epoch millisecondes (variante historique du backend)
                let millis = n
                    .as_i64()
                    .ok_or_else(|| SyncError::InvalidTimestamp(n.to_string()))?;
                OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
                    .map(Some)
                    .map_err(|_| SyncError::InvalidTimestamp(millis.to_string()))
            }
            Some(other) => Err(SyncError::InvalidTimestamp(other.to_string())),
        }
    }
}

/// Sévérité d'une notification utilisateur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Entrée de la file de notifications (fire-and-forget, TTL + éviction FIFO).
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEntry {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn channel_key_paths_and_display() {
        let key = ChannelKey::connectivity("coop-01");
        assert_eq!(key.path(), "devices/coop-01/connectivity");
        assert_eq!(key.to_string(), "device:coop-01:connectivity");
        assert_eq!(key.device_id(), "coop-01");

        let key = ChannelKey::sensor_history("coop-01", "temperature");
        assert_eq!(key.path(), "devices/coop-01/sensors/temperature/history");
        assert_eq!(key.to_string(), "device:coop-01:sensor:temperature:history");
    }

    #[test]
    fn connectivity_signal_parses_rfc3339() {
        let signal = ConnectivitySignal::from_value(&json!({
            "isConnected": true,
            "lastSeen": "2026-08-01T10:00:00Z",
        }))
        .unwrap();
        assert!(signal.is_connected);
        let ts = signal.last_seen_ts().unwrap().unwrap();
        assert_eq!(ts.unix_timestamp(), 1_785_578_400);
    }

    #[test]
    fn connectivity_signal_parses_epoch_millis_and_null() {
        let signal = ConnectivitySignal::from_value(&json!({
            "isConnected": false,
            "lastSeen": 1_700_000_000_000i64,
        }))
        .unwrap();
        let ts = signal.last_seen_ts().unwrap().unwrap();
        assert_eq!(ts.unix_timestamp(), 1_700_000_000);

        let signal = ConnectivitySignal::from_value(&json!({ "isConnected": false })).unwrap();
        assert!(signal.last_seen_ts().unwrap().is_none());
        let signal =
            ConnectivitySignal::from_value(&json!({ "isConnected": false, "lastSeen": null }))
                .unwrap();
        assert!(signal.last_seen_ts().unwrap().is_none());
    }

    #[test]
    fn connectivity_signal_rejects_garbage_timestamp() {
        let signal = ConnectivitySignal::from_value(&json!({
            "isConnected": true,
            "lastSeen": "pas une date",
        }))
        .unwrap();
        assert!(signal.last_seen_ts().is_err());
    }

    #[test]
    fn device_status_wire_parse_is_tolerant() {
        assert_eq!(DeviceStatus::from_wire("active"), DeviceStatus::Active);
        assert_eq!(DeviceStatus::from_wire("OFFLINE"), DeviceStatus::Inactive);
        assert_eq!(DeviceStatus::from_wire("failed"), DeviceStatus::Error);
        assert_eq!(DeviceStatus::from_wire("n/a"), DeviceStatus::Unknown);
    }

    #[test]
    fn default_record_is_disconnected_unknown() {
        let rec = ConnectivityRecord::default();
        assert!(!rec.is_connected);
        assert_eq!(rec.quality_tier, QualityTier::Unknown);
        assert_eq!(rec.status, DeviceStatus::Unknown);
        assert!(rec.last_seen.is_none());
    }
}
