//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `flashdeck_core` linkage.
//! - Optionally print the deck stored in a database file.
//!
//! Usage: `flashdeck_cli [DB_PATH]`

use flashdeck_core::db::open_db;
use flashdeck_core::{DeckLoad, DeckService, SqliteKvStore, StoreCardRepository, CARD_NAMESPACE};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("flashdeck_core ping={}", flashdeck_core::ping());
    println!("flashdeck_core version={}", flashdeck_core::core_version());

    let Some(db_path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        return ExitCode::SUCCESS;
    };

    match print_deck(&db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn print_deck(db_path: &Path) -> Result<(), String> {
    let conn = open_db(db_path).map_err(|err| format!("open {}: {err}", db_path.display()))?;
    let store = SqliteKvStore::try_new(&conn, CARD_NAMESPACE).map_err(|err| err.to_string())?;
    let service = DeckService::new(StoreCardRepository::new(store));

    match service.load_deck().map_err(|err| err.to_string())? {
        DeckLoad::Empty => println!("deck=empty"),
        DeckLoad::Ready(deck) => {
            println!("deck=ready count={}", deck.len());
            for card in deck.cards() {
                println!(
                    "card id={} created_at={} tags={} back_text={:?}",
                    card.id,
                    card.created_at,
                    card.tags.join(","),
                    card.back_text
                );
            }
        }
    }
    Ok(())
}
