//! Card domain model.
//!
//! # Responsibility
//! - Define the persisted `FlashCard` record and the authoring draft.
//! - Define the in-memory `Deck` browsed on the review screen.
//!
//! # Invariants
//! - Every card is identified by a stable `CardId`.
//! - Cards are immutable after creation; there is no edit path.

pub mod card;
pub mod deck;
