//! In-memory deck used by the review screen.
//!
//! # Invariants
//! - Cards are ordered oldest first by `created_at`, ties broken by `id`,
//!   until the deck is shuffled.
//! - The cursor always points at a card when the deck is non-empty.
//! - Moving the cursor turns the card back to its front face.

use super::card::FlashCard;
use rand::seq::SliceRandom;
use rand::Rng;

/// Which side of the current card is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardFace {
    #[default]
    Front,
    Back,
}

impl CardFace {
    fn flipped(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }
}

/// Ordered, navigable list of cards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Deck {
    cards: Vec<FlashCard>,
    position: usize,
    face: CardFace,
}

impl Deck {
    /// Builds a deck from cards in any order.
    pub fn new(mut cards: Vec<FlashCard>) -> Self {
        cards.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Self {
            cards,
            position: 0,
            face: CardFace::Front,
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[FlashCard] {
        &self.cards
    }

    pub fn into_cards(self) -> Vec<FlashCard> {
        self.cards
    }

    /// Zero-based cursor position. Meaningless on an empty deck.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn face(&self) -> CardFace {
        self.face
    }

    pub fn current(&self) -> Option<&FlashCard> {
        self.cards.get(self.position)
    }

    /// Swipes forward. Returns `false` at the last card.
    pub fn next(&mut self) -> bool {
        if self.position + 1 >= self.cards.len() {
            return false;
        }
        self.position += 1;
        self.face = CardFace::Front;
        true
    }

    /// Swipes back. Returns `false` at the first card.
    pub fn previous(&mut self) -> bool {
        if self.position == 0 || self.cards.is_empty() {
            return false;
        }
        self.position -= 1;
        self.face = CardFace::Front;
        true
    }

    /// Jumps to the card with `id`. Returns `false` when it is not in the deck.
    pub fn go_to(&mut self, id: &str) -> bool {
        match self.cards.iter().position(|card| card.id == id) {
            Some(index) => {
                self.position = index;
                self.face = CardFace::Front;
                true
            }
            None => false,
        }
    }

    /// Flips the current card and returns the face now shown.
    pub fn flip(&mut self) -> CardFace {
        if !self.cards.is_empty() {
            self.face = self.face.flipped();
        }
        self.face
    }

    /// Puts the cards in random order and returns to the first card, front up.
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    /// Same as [`Deck::shuffle`] with a caller-provided RNG.
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
        self.position = 0;
        self.face = CardFace::Front;
    }

    /// Drops the card with `id`, keeping the cursor on a valid card.
    pub fn remove(&mut self, id: &str) -> Option<FlashCard> {
        let index = self.cards.iter().position(|card| card.id == id)?;
        let removed = self.cards.remove(index);
        if index < self.position || self.position >= self.cards.len() {
            self.position = self.position.saturating_sub(1);
        }
        self.face = CardFace::Front;
        Some(removed)
    }
}
