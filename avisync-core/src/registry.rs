/**
 * SUBSCRIPTION REGISTRY - Ensemble des subscriptions actives
 *
 * RÔLE :
 * Garantit l'invariant "au plus une subscription live par ChannelKey" même
 * sous churn rapide (changements d'unité répétés côté dashboard), et
 * possède le teardown : la closure de désabonnement du provider est appelée
 * exactement une fois.
 *
 * FONCTIONNEMENT :
 * - reserve(key) pose la clé dans l'ensemble AVANT l'appel provider, ce qui
 *   rend open idempotent sous ré-entrance (un second open est no-op)
 * - chaque entrée porte une génération monotone ; tout callback entrant
 *   valide is_current(key, gen) en tête, donc un callback d'une
 *   subscription démontée ne touche jamais l'état courant
 * - close retire la clé et REND la closure : l'appelant l'invoque hors lock
 */

use crate::models::ChannelKey;
use crate::provider::Unsubscribe;
use crate::state::MonotonicCounter;
use log::{debug, warn};
use std::collections::HashMap;

struct ActiveEntry {
    generation: u64,
    // None tant que l'appel provider.subscribe est en vol
    unsubscribe: Option<Unsubscribe>,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    active: HashMap<ChannelKey, ActiveEntry>,
    generations: MonotonicCounter,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Réserve la clé et retourne sa génération.
    /// None si la clé est déjà active (open idempotent : l'appelant n'ouvre pas).
    pub fn reserve(&mut self, key: &ChannelKey) -> Option<u64> {
        if self.active.contains_key(key) {
            debug!("[registry] {key} already active, open is a no-op");
            return None;
        }
        let generation = self.generations.next();
        self.active.insert(key.clone(), ActiveEntry { generation, unsubscribe: None });
        Some(generation)
    }

    /// Attache la closure de désabonnement à une réservation.
    /// Si la réservation a été fermée entre-temps, la closure est rendue à
    /// l'appelant, qui doit l'invoquer immédiatement.
    pub fn attach(
        &mut self,
        key: &ChannelKey,
        generation: u64,
        unsubscribe: Unsubscribe,
    ) -> Option<Unsubscribe> {
        match self.active.get_mut(key) {
            Some(entry) if entry.generation == generation => {
                entry.unsubscribe = Some(unsubscribe);
                None
            }
            _ => {
                debug!("[registry] stale attach on {key} (gen {generation}), returning unsubscribe");
                Some(unsubscribe)
            }
        }
    }

    /// Garde de ré-entrance : vrai ssi la clé est active sous cette génération.
    pub fn is_current(&self, key: &ChannelKey, generation: u64) -> bool {
        self.active
            .get(key)
            .is_some_and(|entry| entry.generation == generation)
    }

    pub fn is_active(&self, key: &ChannelKey) -> bool {
        self.active.contains_key(key)
    }

    /// Retire la clé et rend la closure de désabonnement (à invoquer hors lock).
    /// Un close sur clé inactive est un no-op loggé, pas une erreur : c'est une
    /// garde contre le timing ré-entrant de l'event loop.
    pub fn close(&mut self, key: &ChannelKey) -> Option<Unsubscribe> {
        match self.active.remove(key) {
            Some(entry) => entry.unsubscribe,
            None => {
                warn!("[registry] close on inactive channel {key}, ignored");
                None
            }
        }
    }

    /// Retrait sur erreur provider : la clé quitte l'ensemble pour qu'un
    /// open futur puisse retenter. Rend l'éventuelle closure pour cleanup.
    pub fn fail(&mut self, key: &ChannelKey, generation: u64) -> Option<Unsubscribe> {
        if !self.is_current(key, generation) {
            return None;
        }
        self.active.remove(key).and_then(|entry| entry.unsubscribe)
    }

    /// Vide le registre et rend toutes les closures (shutdown).
    pub fn drain(&mut self) -> Vec<(ChannelKey, Option<Unsubscribe>)> {
        self.active
            .drain()
            .map(|(key, entry)| (key, entry.unsubscribe))
            .collect()
    }

    pub fn active_keys(&self) -> Vec<ChannelKey> {
        self.active.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
