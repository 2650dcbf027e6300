//! Deck use-case service.
//!
//! # Responsibility
//! - Turn authoring drafts into persisted cards.
//! - Load the review deck and tell "no cards yet" apart from load failures.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Service layer remains storage-agnostic.

use crate::model::card::{CardDraft, CardValidationError, FlashCard};
use crate::model::deck::Deck;
use crate::repo::card_repo::{CardRepoError, CardRepository};
use crate::store::CancelToken;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub type DeckServiceResult<T> = Result<T, DeckServiceError>;

#[derive(Debug)]
pub enum DeckServiceError {
    /// Draft is missing an image or a label.
    DraftIncomplete(CardValidationError),
    Repo(CardRepoError),
}

impl Display for DeckServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DraftIncomplete(err) => write!(f, "card draft incomplete: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DeckServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DraftIncomplete(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<CardRepoError> for DeckServiceError {
    fn from(value: CardRepoError) -> Self {
        Self::Repo(value)
    }
}

/// Outcome of loading the review deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckLoad {
    /// Store is readable and holds no cards.
    Empty,
    Ready(Deck),
}

impl DeckLoad {
    pub fn into_deck(self) -> Deck {
        match self {
            Self::Empty => Deck::default(),
            Self::Ready(deck) => deck,
        }
    }
}

/// Use-case service wrapper for deck operations.
pub struct DeckService<R: CardRepository> {
    repo: R,
}

impl<R: CardRepository> DeckService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Saves a draft as a new card stamped with the current time.
    ///
    /// # Contract
    /// - Assigns a fresh UUID v4 `id`.
    /// - Returns the card exactly as persisted.
    pub fn create_card(&self, draft: CardDraft) -> DeckServiceResult<FlashCard> {
        self.create_card_at(draft, now_epoch_ms())
    }

    /// Saves a draft as a new card with an explicit `created_at`.
    pub fn create_card_at(
        &self,
        draft: CardDraft,
        created_at: i64,
    ) -> DeckServiceResult<FlashCard> {
        let card = draft
            .into_card(Uuid::new_v4().to_string(), created_at)
            .map_err(DeckServiceError::DraftIncomplete)?;
        self.repo.create_card(&card)?;
        Ok(card)
    }

    /// Persists a card whose identity was assigned outside core.
    pub fn import_card(&self, card: &FlashCard) -> DeckServiceResult<()> {
        self.repo.create_card(card)?;
        Ok(())
    }

    pub fn get_card(&self, id: &str) -> DeckServiceResult<Option<FlashCard>> {
        Ok(self.repo.get_card(id)?)
    }

    /// Loads every card into a deck.
    pub fn load_deck(&self) -> DeckServiceResult<DeckLoad> {
        self.load_deck_cancellable(&CancelToken::new())
    }

    pub fn load_deck_cancellable(&self, cancel: &CancelToken) -> DeckServiceResult<DeckLoad> {
        let cards = self.repo.list_cards_cancellable(cancel)?;
        if cards.is_empty() {
            return Ok(DeckLoad::Empty);
        }
        Ok(DeckLoad::Ready(Deck::new(cards)))
    }

    /// Deletes one card by id.
    pub fn discard_card(&self, id: &str) -> DeckServiceResult<()> {
        Ok(self.repo.delete_card(id)?)
    }

    /// Deletes every card. Irreversible.
    pub fn clear_deck(&self) -> DeckServiceResult<usize> {
        Ok(self.repo.clear_cards()?)
    }

    pub fn card_count(&self) -> DeckServiceResult<usize> {
        Ok(self.repo.count_cards()?)
    }
}

/// Current wall-clock time in epoch milliseconds; `0` if the clock is before 1970.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| i64::try_from(elapsed.as_millis()).ok())
        .unwrap_or(0)
}
