//! Card repository contracts and store-backed implementation.
//!
//! # Responsibility
//! - Provide typed create/read/delete APIs for `FlashCard` records.
//! - Key every card by its `id` in the card namespace.
//!
//! # Invariants
//! - Write paths call `FlashCard::validate()` before touching the store.
//! - Read paths reject invalid persisted cards instead of masking them.
//! - A stored card's key always equals its `id`.

use crate::model::card::{CardId, CardValidationError, FlashCard};
use crate::store::{CancelToken, KeyValueStore, StoreError};
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CardRepoResult<T> = Result<T, CardRepoError>;

/// Error for card persistence and query operations.
#[derive(Debug)]
pub enum CardRepoError {
    Validation(CardValidationError),
    Store(StoreError),
    DuplicateId(CardId),
    NotFound(CardId),
    InvalidData(String),
}

impl Display for CardRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::DuplicateId(id) => write!(f, "card already exists: {id}"),
            Self::NotFound(id) => write!(f, "card not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted card data: {message}"),
        }
    }
}

impl Error for CardRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::DuplicateId(_) | Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<CardValidationError> for CardRepoError {
    fn from(value: CardValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for CardRepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Repository interface for flashcards.
pub trait CardRepository {
    /// Persists a new card. Fails with `DuplicateId` if the id is taken.
    fn create_card(&self, card: &FlashCard) -> CardRepoResult<CardId>;
    /// Gets one card by id.
    fn get_card(&self, id: &str) -> CardRepoResult<Option<FlashCard>>;
    /// Lists all cards oldest first.
    fn list_cards(&self) -> CardRepoResult<Vec<FlashCard>>;
    /// Lists all cards, stopping early when `cancel` is signalled.
    fn list_cards_cancellable(&self, cancel: &CancelToken) -> CardRepoResult<Vec<FlashCard>>;
    /// Deletes one card. Fails with `NotFound` if absent.
    fn delete_card(&self, id: &str) -> CardRepoResult<()>;
    /// Deletes every card. Returns how many were removed.
    fn clear_cards(&self) -> CardRepoResult<usize>;
    fn count_cards(&self) -> CardRepoResult<usize>;
}

/// Card repository over any `KeyValueStore` bound to the card namespace.
pub struct StoreCardRepository<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> StoreCardRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Access to the underlying store, e.g. for diagnostics.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: KeyValueStore> CardRepository for StoreCardRepository<S> {
    fn create_card(&self, card: &FlashCard) -> CardRepoResult<CardId> {
        card.validate()?;

        if !self.store.put_if_absent(&card.id, card)? {
            return Err(CardRepoError::DuplicateId(card.id.clone()));
        }

        info!(
            "event=card_create module=repo status=ok tags={}",
            card.tags.len()
        );
        Ok(card.id.clone())
    }

    fn get_card(&self, id: &str) -> CardRepoResult<Option<FlashCard>> {
        match self.store.get::<FlashCard>(id)? {
            Some(card) => Ok(Some(check_persisted(id, card)?)),
            None => Ok(None),
        }
    }

    fn list_cards(&self) -> CardRepoResult<Vec<FlashCard>> {
        self.list_cards_cancellable(&CancelToken::new())
    }

    fn list_cards_cancellable(&self, cancel: &CancelToken) -> CardRepoResult<Vec<FlashCard>> {
        let entries = self.store.get_all_cancellable::<FlashCard>(cancel)?;
        let mut cards = entries
            .into_iter()
            .map(|(key, card)| check_persisted(&key, card))
            .collect::<CardRepoResult<Vec<_>>>()?;
        cards.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        debug!(
            "event=card_list module=repo status=ok count={}",
            cards.len()
        );
        Ok(cards)
    }

    fn delete_card(&self, id: &str) -> CardRepoResult<()> {
        if !self.store.remove(id)? {
            return Err(CardRepoError::NotFound(id.to_string()));
        }
        info!("event=card_delete module=repo status=ok");
        Ok(())
    }

    fn clear_cards(&self) -> CardRepoResult<usize> {
        let removed = self.store.clear()?;
        info!(
            "event=card_clear module=repo status=ok removed={}",
            removed
        );
        Ok(removed)
    }

    fn count_cards(&self) -> CardRepoResult<usize> {
        Ok(self.store.len()?)
    }
}

fn check_persisted(key: &str, card: FlashCard) -> CardRepoResult<FlashCard> {
    if card.id != key {
        return Err(CardRepoError::InvalidData(format!(
            "card stored under `{key}` carries id `{}`",
            card.id
        )));
    }
    card.validate().map_err(|err| {
        CardRepoError::InvalidData(format!("card `{key}` failed validation: {err}"))
    })?;
    Ok(card)
}
