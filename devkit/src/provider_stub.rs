/*!
Stub du provider temps réel pour développement sans backend hébergé

Enregistre tous les appels subscribe/unsubscribe/get_once, permet de pousser
des payloads et des erreurs dans les callbacks live, et de scripter les
réponses de get_once. Le mode "leaky" simule un désabonnement externe
asynchrone : unsubscribe est journalisé mais les callbacks continuent de
tirer, ce qui exerce la garde de génération du moteur.
*/

use avisync_core::provider::{
    DataCallback, ErrorCallback, ProviderError, RealtimeProvider, Unsubscribe,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Journal d'un appel reçu par le stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubCall {
    Subscribe(String),
    Unsubscribe(String),
    GetOnce(String),
}

struct LiveSub {
    id: u64,
    on_data: DataCallback,
    on_error: ErrorCallback,
    torn_down: bool,
}

#[derive(Default)]
struct StubInner {
    live: HashMap<String, Vec<LiveSub>>,
    calls: Vec<StubCall>,
    once_responses: HashMap<String, VecDeque<Result<Value, ProviderError>>>,
}

pub struct StubProvider {
    inner: Arc<Mutex<StubInner>>,
    next_sub_id: AtomicU64,
    leaky: bool,
}

impl StubProvider {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StubInner::default())),
            next_sub_id: AtomicU64::new(0),
            leaky: false,
        }
    }

    /// Variante dont l'unsubscribe est journalisé mais n'arrête PAS les
    /// callbacks : simule un teardown externe encore en vol.
    pub fn leaky() -> Self {
        Self { leaky: true, ..Self::new() }
    }

    /// Pousse un payload dans tous les callbacks live d'un chemin
    /// (callbacks appelés hors lock).
    pub fn push(&self, path: &str, value: Value) {
        let callbacks: Vec<DataCallback> = {
            let inner = self.inner.lock().unwrap();
            inner
                .live
                .get(path)
                .map(|subs| {
                    subs.iter()
                        .filter(|s| !s.torn_down || self.leaky)
                        .map(|s| s.on_data.clone())
                        .collect()
                })
                .unwrap_or_default()
        };
        log::info!("📨 [STUB] push on {} -> {} callback(s)", path, callbacks.len());
        for cb in callbacks {
            cb(value.clone());
        }
    }

    /// Pousse une erreur transport dans tous les callbacks d'erreur d'un chemin.
    pub fn push_error(&self, path: &str, message: &str) {
        let callbacks: Vec<ErrorCallback> = {
            let inner = self.inner.lock().unwrap();
            inner
                .live
                .get(path)
                .map(|subs| {
                    subs.iter()
                        .filter(|s| !s.torn_down || self.leaky)
                        .map(|s| s.on_error.clone())
                        .collect()
                })
                .unwrap_or_default()
        };
        log::info!("⚠️ [STUB] error on {}: {}", path, message);
        for cb in callbacks {
            cb(ProviderError::Transport(message.to_string()));
        }
    }

    /// Scripte la prochaine réponse de get_once pour un chemin.
    pub fn script_once(&self, path: &str, response: Result<Value, ProviderError>) {
        self.inner
            .lock()
            .unwrap()
            .once_responses
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    // --- assertions de tests ---

    pub fn calls(&self) -> Vec<StubCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn subscribe_count(&self, path: &str) -> usize {
        self.count(&StubCall::Subscribe(path.to_string()))
    }

    pub fn unsubscribe_count(&self, path: &str) -> usize {
        self.count(&StubCall::Unsubscribe(path.to_string()))
    }

    pub fn get_once_count(&self, path: &str) -> usize {
        self.count(&StubCall::GetOnce(path.to_string()))
    }

    fn count(&self, call: &StubCall) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| *c == call)
            .count()
    }

    /// Nombre de subscriptions effectivement vivantes sur un chemin
    /// (en mode leaky, un canal démonté compte encore jusqu'au vrai teardown).
    pub fn live_count(&self, path: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .live
            .get(path)
            .map(|subs| subs.iter().filter(|s| !s.torn_down).count())
            .unwrap_or(0)
    }

    /// Reset du journal et des callbacks (nouveau test).
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.live.clear();
        inner.calls.clear();
        inner.once_responses.clear();
    }
}

impl Default for StubProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeProvider for StubProvider {
    fn subscribe(
        &self,
        path: &str,
        on_data: DataCallback,
        on_error: ErrorCallback,
    ) -> Result<Unsubscribe, ProviderError> {
        let id = self.next_sub_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StubCall::Subscribe(path.to_string()));
        inner.live.entry(path.to_string()).or_default().push(LiveSub {
            id,
            on_data,
            on_error,
            torn_down: false,
        });
        log::info!("📥 [STUB] subscribed to {} (sub #{})", path, id);

        let shared = self.inner.clone();
        let path = path.to_string();
        let leaky = self.leaky;
        Ok(Box::new(move || {
            let mut inner = shared.lock().unwrap();
            inner.calls.push(StubCall::Unsubscribe(path.clone()));
            if let Some(subs) = inner.live.get_mut(&path) {
                if leaky {
                    // teardown externe "en vol" : on marque sans retirer
                    if let Some(sub) = subs.iter_mut().find(|s| s.id == id) {
                        sub.torn_down = true;
                    }
                } else {
                    subs.retain(|s| s.id != id);
                }
            }
            log::info!("📤 [STUB] unsubscribed from {} (sub #{})", path, id);
        }))
    }

    fn get_once(&self, path: &str) -> BoxFuture<'static, Result<Value, ProviderError>> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StubCall::GetOnce(path.to_string()));
        let response = inner
            .once_responses
            .get_mut(path)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Err(ProviderError::NotFound(path.to_string())));
        futures::future::ready(response).boxed()
    }
}
