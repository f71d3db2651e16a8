/**
 * CHANGE FILTER - Déduplication structurelle des payloads entrants
 *
 * RÔLE :
 * Supprime la propagation des payloads identiques au dernier accepté sur
 * un même canal (le backend repousse régulièrement des valeurs inchangées,
 * ce qui provoquait des tempêtes de re-render côté dashboard).
 *
 * FONCTIONNEMENT :
 * - un snapshot = la sérialisation canonique du dernier payload accepté
 * - égalité structurelle : clés d'objets triées (Map serde_json = BTreeMap,
 *   la feature preserve_order ne doit PAS être activée)
 * - les chaînes numériques du transport ("21.5") sont normalisées en nombres
 *   avant comparaison, sinon deux updates sémantiquement identiques
 *   passeraient pour distincts
 */

use crate::models::ChannelKey;
use log::debug;
use serde_json::{Number, Value};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ChangeFilter {
    snapshots: HashMap<ChannelKey, String>,
}

impl ChangeFilter {
    pub fn new() -> Self {
        Self { snapshots: HashMap::new() }
    }

    /// true si le payload doit se propager : première valeur vue sur la clé,
    /// ou forme canonique différente du snapshot courant.
    /// Effet de bord sur true : le snapshot est remplacé.
    pub fn accept(&mut self, key: &ChannelKey, payload: &Value) -> bool {
        let canon = canonical_string(payload);
        match self.snapshots.get(key) {
            Some(prev) if *prev == canon => {
                debug!("[filter] duplicate payload on {key}, suppressed");
                false
            }
            _ => {
                self.snapshots.insert(key.clone(), canon);
                true
            }
        }
    }

    /// Oublie le snapshot d'un canal (teardown de la subscription).
    pub fn forget(&mut self, key: &ChannelKey) {
        self.snapshots.remove(key);
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

fn canonical_string(value: &Value) -> String {
    serde_json::to_string(&canonicalize(value)).unwrap_or_default()
}

/// Normalisation récursive : chaînes numériques -> nombres, le reste intact.
/// Le tri des clés est assuré par la Map BTreeMap de serde_json.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::String(s) => match parse_numeric(s) {
            Some(n) => Value::Number(n),
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect())
        }
        _ => value.clone(),
    }
}

fn parse_numeric(s: &str) -> Option<Number> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    // entier d'abord pour garder une représentation exacte
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::from(i));
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => Number::from_f64(f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> ChannelKey {
        ChannelKey::data("coop-01")
    }

    #[test]
    fn first_payload_always_propagates() {
        let mut filter = ChangeFilter::new();
        assert!(filter.accept(&key(), &json!({"temp": 21.5})));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn duplicate_payload_is_suppressed() {
        let mut filter = ChangeFilter::new();
        assert!(filter.accept(&key(), &json!({"temp": 21.5, "fan": true})));
        assert!(!filter.accept(&key(), &json!({"temp": 21.5, "fan": true})));
        assert!(filter.accept(&key(), &json!({"temp": 22.0, "fan": true})));
    }

    #[test]
    fn equality_is_key_order_insensitive() {
        let mut filter = ChangeFilter::new();
        assert!(filter.accept(&key(), &json!({"a": 1, "b": 2})));
        // mêmes champs, ordre d'insertion différent
        let mut other = serde_json::Map::new();
        other.insert("b".into(), json!(2));
        other.insert("a".into(), json!(1));
        assert!(!filter.accept(&key(), &Value::Object(other)));
    }

    #[test]
    fn numeric_strings_compare_equal_to_numbers() {
        let mut filter = ChangeFilter::new();
        assert!(filter.accept(&key(), &json!({"temp": "21.5", "count": "3"})));
        assert!(!filter.accept(&key(), &json!({"temp": 21.5, "count": 3})));
    }

    #[test]
    fn non_numeric_strings_stay_strings() {
        let mut filter = ChangeFilter::new();
        assert!(filter.accept(&key(), &json!({"name": "coop-3"})));
        assert!(filter.accept(&key(), &json!({"name": "coop-4"})));
    }

    #[test]
    fn keys_are_independent() {
        let mut filter = ChangeFilter::new();
        let payload = json!({"v": 1});
        assert!(filter.accept(&ChannelKey::data("a"), &payload));
        assert!(filter.accept(&ChannelKey::data("b"), &payload));
        assert!(!filter.accept(&ChannelKey::data("a"), &payload));
    }

    #[test]
    fn forget_resets_the_snapshot() {
        let mut filter = ChangeFilter::new();
        let payload = json!({"v": 1});
        assert!(filter.accept(&key(), &payload));
        filter.forget(&key());
        assert!(filter.accept(&key(), &payload));
    }
}
