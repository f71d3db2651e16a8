/*!
# AviSync DevKit - Stubs et Utilitaires pour Développement

Bibliothèque facilitant le développement et les tests du moteur AviSync avec:
- Stub du provider temps réel (sans backend hébergé)
- Harness de test : moteur + stub câblés, builders de heartbeats
- Assertions sur subscriptions et notifications
*/

pub mod provider_stub;
pub mod test_utils;

pub use provider_stub::StubProvider;
pub use test_utils::TestHarness;
