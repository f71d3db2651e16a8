/**
 * NOTIFICATION QUEUE - File bornée de notifications utilisateur
 *
 * RÔLE :
 * Collection auto-expirante des événements visibles (transitions de
 * connectivité, actions explicites). La couche présentation ne fait que
 * lire `entries()` et appeler `dismiss()`.
 *
 * FONCTIONNEMENT :
 * - capacité fixe (5 par défaut) : au-delà, éviction FIFO de la plus
 *   ancienne entrée, distincte de l'expiration TTL
 * - un timer TTL indépendant par entrée (task tokio), annulé sur dismiss
 *   et sur éviction pour qu'aucun callback tardif ne touche un slot réutilisé
 * - ids u64 monotones, jamais réutilisés pendant la vie du process
 *
 * Nécessite un runtime tokio actif (les timers sont des tasks spawnées).
 */

use crate::models::{NotificationEntry, Severity};
use crate::state::{new_state, MonotonicCounter, Shared};
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

#[derive(Default)]
struct QueueInner {
    entries: VecDeque<NotificationEntry>,
    timers: HashMap<u64, JoinHandle<()>>,
}

#[derive(Clone)]
pub struct NotificationQueue {
    inner: Shared<QueueInner>,
    ids: Arc<MonotonicCounter>,
    capacity: usize,
    ttl: Duration,
}

impl NotificationQueue {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: new_state(QueueInner::default()),
            ids: Arc::new(MonotonicCounter::new()),
            capacity,
            ttl,
        }
    }

    /// Empile une notification et arme son timer TTL.
    /// Retourne l'id attribué (utilisable pour dismiss).
    pub fn push(&self, message: impl Into<String>, severity: Severity) -> u64 {
        let id = self.ids.next();
        let entry = NotificationEntry {
            id,
            message: message.into(),
            severity,
            created_at: OffsetDateTime::now_utc(),
        };

        let mut inner = self.inner.lock();
        inner.entries.push_back(entry);

        // éviction FIFO au-delà de la capacité, timer de l'évincée annulé
        if inner.entries.len() > self.capacity {
            if let Some(evicted) = inner.entries.pop_front() {
                if let Some(handle) = inner.timers.remove(&evicted.id) {
                    handle.abort();
                }
                debug!("[notify] capacity eviction of entry {}", evicted.id);
            }
        }

        let queue = self.clone();
        let ttl = self.ttl;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            queue.expire(id);
        });
        inner.timers.insert(id, handle);

        id
    }

    /// Suppression explicite par l'utilisateur ; annule le timer TTL.
    /// Retourne false si l'entrée avait déjà disparu (TTL ou éviction).
    pub fn dismiss(&self, id: u64) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.id != id);
        if let Some(handle) = inner.timers.remove(&id) {
            handle.abort();
        }
        inner.entries.len() != before
    }

    /// Expiration TTL. No-op si l'entrée a été dismissée ou évincée entre-temps
    /// (les ids étant monotones, aucun risque de toucher un slot réutilisé).
    fn expire(&self, id: u64) {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.id != id);
        inner.timers.remove(&id);
        if inner.entries.len() != before {
            debug!("[notify] entry {id} expired");
        }
    }

    /// Vue lecture seule pour le rendu.
    pub fn entries(&self) -> Vec<NotificationEntry> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Vide la file et annule tous les timers (teardown).
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        for (_, handle) in inner.timers.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(ttl_ms: u64) -> NotificationQueue {
        NotificationQueue::new(5, Duration::from_millis(ttl_ms))
    }

    #[tokio::test]
    async fn ids_are_unique_and_monotonic() {
        let q = queue(5000);
        let a = q.push("a", Severity::Info);
        let b = q.push("b", Severity::Info);
        assert!(b > a);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest_fifo() {
        let q = queue(5000);
        let first = q.push("n1", Severity::Info);
        for i in 2..=6 {
            q.push(format!("n{i}"), Severity::Info);
        }
        let entries = q.entries();
        assert_eq!(entries.len(), 5);
        assert!(entries.iter().all(|e| e.id != first));
        assert_eq!(entries[0].message, "n2");
        assert_eq!(entries[4].message, "n6");
    }

    #[tokio::test]
    async fn ttl_expires_undismissed_entries() {
        let q = queue(50);
        q.push("ephemeral", Severity::Warning);
        assert_eq!(q.len(), 1);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn dismiss_removes_immediately_and_cancels_timer() {
        let q = queue(50);
        let id = q.push("to dismiss", Severity::Info);
        assert!(q.dismiss(id));
        assert!(q.is_empty());
        // le timer annulé ne doit pas réagir après coup
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(q.is_empty());
        assert!(!q.dismiss(id));
    }

    #[tokio::test]
    async fn eviction_cancels_the_evicted_timer() {
        let q = queue(5000);
        q.push("n1", Severity::Info);
        for i in 2..=6 {
            q.push(format!("n{i}"), Severity::Info);
        }
        // l'entrée 1 est évincée, son timer annulé : rien ne doit bouger
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(q.len(), 5);
    }

    #[tokio::test]
    async fn clear_empties_everything() {
        let q = queue(5000);
        q.push("a", Severity::Info);
        q.push("b", Severity::Error);
        q.clear();
        assert!(q.is_empty());
    }
}
