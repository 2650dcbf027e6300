//! Core domain logic for FlashDeck.
//! This crate is the single source of truth for card storage invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::card::{CardDraft, CardId, CardValidationError, FlashCard};
pub use model::deck::{CardFace, Deck};
pub use repo::card_repo::{CardRepoError, CardRepoResult, CardRepository, StoreCardRepository};
pub use service::deck_service::{DeckLoad, DeckService, DeckServiceError, DeckServiceResult};
pub use store::{
    clear_all, CancelToken, KeyValueStore, MemoryKvStore, SqliteKvStore, StoreError, StorePage,
    StoreResult, APP_NAMESPACE, CARD_NAMESPACE,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
