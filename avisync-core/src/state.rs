use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Compteur monotone partagé : ids de notifications, générations de subscriptions.
/// Jamais remis à zéro pendant la vie du process (pas de collision d'ids).
#[derive(Debug, Default)]
pub struct MonotonicCounter(AtomicU64);

impl MonotonicCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Retourne la prochaine valeur (commence à 1).
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}
