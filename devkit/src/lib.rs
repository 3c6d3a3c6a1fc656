/*!
# SRCDS DevKit - Mock RCON et Utilitaires de Test

Bibliothèque facilitant les tests de l'exporter sans serveur de jeu:
- Mock RCON parlant le vrai protocole Source
- Sorties `status`/`stats` réelles par jeu
- Harness de test (config rapide, cible, routeur HTTP)
*/

pub mod fixtures;
pub mod rcon_stub;
pub mod test_utils;

pub use rcon_stub::{MockBehavior, MockRconServer, ServerLog};
pub use test_utils::{SaturatedListener, TestHarness};
