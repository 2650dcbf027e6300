//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for cards.
//! - Isolate store details from service orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `FlashCard::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateId`) in
//!   addition to store transport errors.

pub mod card_repo;
