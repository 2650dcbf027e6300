//! Flutter bridge crate for the FlashDeck core.

pub mod api;
