//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level card and key/value functions to Dart via FRB.
//! - Fold core errors into response envelopes the UI can branch on.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Store-touching functions are async on the Dart side (run on the FRB
//!   worker pool) so the UI thread never waits on disk.
//! - Each call opens its own connection; no handle is cached between calls.

use flashdeck_core::db::open_db;
use flashdeck_core::{
    clear_all, core_version as core_version_inner, init_logging as init_logging_inner,
    ping as ping_inner, CardDraft, CardRepoError, DeckLoad, DeckService, DeckServiceError,
    FlashCard, KeyValueStore, SqliteKvStore, StoreCardRepository, StoreError, APP_NAMESPACE,
    CARD_NAMESPACE,
};
use log::warn;
use rusqlite::Connection;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::OnceLock;

const DB_FILE_NAME: &str = "flashdeck.sqlite3";
const DB_PATH_ENV: &str = "FLASHDECK_DB_PATH";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Card as rendered by the deck and detail screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardItem {
    pub id: String,
    pub front_image: String,
    pub back_text: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub tags: Vec<String>,
}

impl From<FlashCard> for CardItem {
    fn from(card: FlashCard) -> Self {
        Self {
            id: card.id,
            front_image: card.front_image,
            back_text: card.back_text,
            created_at: card.created_at,
            tags: card.tags,
        }
    }
}

/// Result envelope for single-card commands and lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardActionResponse {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Affected card, when the operation produces one.
    pub card: Option<CardItem>,
    /// Stable error code (`draft_incomplete`, `not_found`, ...); empty on success.
    pub error_code: String,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
}

impl CardActionResponse {
    fn success(message: impl Into<String>, card: Option<CardItem>) -> Self {
        Self {
            ok: true,
            card,
            error_code: String::new(),
            message: message.into(),
        }
    }

    fn failure(error_code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            card: None,
            error_code: error_code.to_string(),
            message: message.into(),
        }
    }
}

/// Deck load outcome as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckState {
    /// Store readable, no cards yet.
    Empty,
    Ready,
    /// Cards could not be loaded; offer a retry.
    Failed,
}

/// Result envelope for the deck listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardListResponse {
    pub state: DeckState,
    /// Cards oldest first; empty unless `state == Ready`.
    pub items: Vec<CardItem>,
    pub message: String,
}

/// Result envelope for auxiliary key/value calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvResponse {
    pub ok: bool,
    /// JSON text of the value for reads; `None` when absent or on writes.
    pub value: Option<String>,
    /// Keys for `kv_keys`; empty otherwise.
    pub keys: Vec<String>,
    pub message: String,
}

impl KvResponse {
    fn done(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            value: None,
            keys: Vec::new(),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            value: None,
            keys: Vec::new(),
            message: message.into(),
        }
    }
}

/// Saves a new card from the add-card screen.
///
/// # FFI contract
/// - Async on the Dart side, DB-backed execution.
/// - Never panics.
/// - On success returns the persisted card, including its generated id.
pub fn card_create(
    front_image: String,
    back_text: String,
    tags: Vec<String>,
) -> CardActionResponse {
    let draft = CardDraft {
        front_image,
        back_text,
        tags,
    };
    match with_deck_service(|service| service.create_card(draft)) {
        Ok(card) => CardActionResponse::success("Card created.", Some(card.into())),
        Err(err) => deck_failure("card_create", err),
    }
}

/// Loads one card for the detail screen.
///
/// A missing id is a failure with `error_code = "not_found"`.
pub fn card_get(id: String) -> CardActionResponse {
    match with_deck_service(|service| service.get_card(id.trim())) {
        Ok(Some(card)) => CardActionResponse::success("Card loaded.", Some(card.into())),
        Ok(None) => CardActionResponse::failure("not_found", format!("card not found: {id}")),
        Err(err) => deck_failure("card_get", err),
    }
}

/// Loads the review deck.
///
/// # FFI contract
/// - Distinguishes "no cards yet" (`Empty`) from load failures (`Failed`).
/// - Never panics.
pub fn cards_list() -> CardListResponse {
    load_deck_response("cards_list", false)
}

/// Loads the review deck in random order, for the deck screen's shuffle action.
pub fn cards_shuffled() -> CardListResponse {
    load_deck_response("cards_shuffled", true)
}

fn load_deck_response(operation: &str, shuffle: bool) -> CardListResponse {
    match with_deck_service(|service| service.load_deck()) {
        Ok(DeckLoad::Empty) => CardListResponse {
            state: DeckState::Empty,
            items: Vec::new(),
            message: "No cards yet.".to_string(),
        },
        Ok(DeckLoad::Ready(mut deck)) => {
            if shuffle {
                deck.shuffle();
            }
            let items = deck
                .into_cards()
                .into_iter()
                .map(CardItem::from)
                .collect::<Vec<_>>();
            CardListResponse {
                state: DeckState::Ready,
                message: format!("Loaded {} card(s).", items.len()),
                items,
            }
        }
        Err(err) => {
            warn!("event=ffi_{operation} module=ffi status=error error={err}");
            CardListResponse {
                state: DeckState::Failed,
                items: Vec::new(),
                message: format!("{operation} failed: {err}"),
            }
        }
    }
}

/// Deletes one card.
pub fn card_discard(id: String) -> CardActionResponse {
    match with_deck_service(|service| service.discard_card(id.trim())) {
        Ok(()) => CardActionResponse::success("Card discarded.", None),
        Err(err) => deck_failure("card_discard", err),
    }
}

/// Deletes every card. Auxiliary values are kept.
pub fn cards_clear() -> CardActionResponse {
    match with_deck_service(|service| service.clear_deck()) {
        Ok(removed) => CardActionResponse::success(format!("Removed {removed} card(s)."), None),
        Err(err) => deck_failure("cards_clear", err),
    }
}

/// Writes an auxiliary JSON value under `key`.
///
/// `value_json` must be valid JSON text.
pub fn kv_put(key: String, value_json: String) -> KvResponse {
    let result = parse_json(&value_json)
        .and_then(|value| with_app_store(|store| store.put(&key, &value)));
    match result {
        Ok(()) => KvResponse::done("Stored."),
        Err(message) => KvResponse::failure(format!("kv_put failed: {message}")),
    }
}

/// Reads an auxiliary value as JSON text; `value = None` when absent.
pub fn kv_get(key: String) -> KvResponse {
    match with_app_store(|store| store.get::<Value>(&key)) {
        Ok(value) => KvResponse {
            ok: true,
            value: value.map(|value| value.to_string()),
            keys: Vec::new(),
            message: String::new(),
        },
        Err(message) => KvResponse::failure(format!("kv_get failed: {message}")),
    }
}

/// Removes an auxiliary value; absent keys are not an error.
pub fn kv_remove(key: String) -> KvResponse {
    match with_app_store(|store| store.remove(&key)) {
        Ok(true) => KvResponse::done("Removed."),
        Ok(false) => KvResponse::done("Nothing to remove."),
        Err(message) => KvResponse::failure(format!("kv_remove failed: {message}")),
    }
}

/// Shallow-merges a JSON object into the stored auxiliary object.
pub fn kv_merge(key: String, partial_json: String) -> KvResponse {
    let result = parse_json(&partial_json)
        .and_then(|partial| with_app_store(|store| store.merge(&key, &partial)));
    match result {
        Ok(()) => KvResponse::done("Merged."),
        Err(message) => KvResponse::failure(format!("kv_merge failed: {message}")),
    }
}

/// Lists auxiliary keys, sorted.
pub fn kv_keys() -> KvResponse {
    match with_app_store(|store| store.keys()) {
        Ok(keys) => KvResponse {
            ok: true,
            value: None,
            message: format!("{} key(s).", keys.len()),
            keys,
        },
        Err(message) => KvResponse::failure(format!("kv_keys failed: {message}")),
    }
}

/// Deletes every auxiliary value. Cards are kept.
pub fn kv_clear() -> KvResponse {
    match with_app_store(|store| store.clear()) {
        Ok(removed) => KvResponse::done(format!("Removed {removed} value(s).")),
        Err(message) => KvResponse::failure(format!("kv_clear failed: {message}")),
    }
}

/// Wipes the whole store: cards and auxiliary values alike.
///
/// # FFI contract
/// - Async on the Dart side, DB-backed execution.
/// - Never panics; `ok = false` when the store cannot be opened or cleared.
pub fn store_clear_all() -> KvResponse {
    match open_connection() {
        Ok(conn) => clear_everything(&conn),
        Err(err) => {
            warn!(
                "event=ffi_store_clear_all module=ffi status=error error_code={}",
                err.code()
            );
            KvResponse::failure(format!("store_clear_all failed: {err}"))
        }
    }
}

fn clear_everything(conn: &Connection) -> KvResponse {
    match clear_all(conn) {
        Ok(removed) => KvResponse::done(format!("Removed {removed} entr(ies).")),
        Err(err) => KvResponse::failure(format!("store_clear_all failed: {err}")),
    }
}

fn deck_failure(operation: &str, err: DeckServiceError) -> CardActionResponse {
    let code = deck_error_code(&err);
    warn!("event=ffi_{operation} module=ffi status=error error_code={code}");
    CardActionResponse::failure(code, format!("{operation} failed: {err}"))
}

fn deck_error_code(err: &DeckServiceError) -> &'static str {
    match err {
        DeckServiceError::DraftIncomplete(_) => "draft_incomplete",
        DeckServiceError::Repo(CardRepoError::Validation(_)) => "validation",
        DeckServiceError::Repo(CardRepoError::DuplicateId(_)) => "duplicate_id",
        DeckServiceError::Repo(CardRepoError::NotFound(_)) => "not_found",
        DeckServiceError::Repo(CardRepoError::InvalidData(_)) => "invalid_data",
        DeckServiceError::Repo(CardRepoError::Store(store_err)) => store_err.code(),
    }
}

fn parse_json(text: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|err| format!("invalid JSON value: {err}"))
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn open_connection() -> Result<Connection, StoreError> {
    Ok(open_db(resolve_db_path())?)
}

fn with_deck_service<T>(
    f: impl FnOnce(
        &DeckService<StoreCardRepository<SqliteKvStore<'_>>>,
    ) -> Result<T, DeckServiceError>,
) -> Result<T, DeckServiceError> {
    let store_error = |err| DeckServiceError::Repo(CardRepoError::Store(err));
    let conn = open_connection().map_err(store_error)?;
    let store = SqliteKvStore::try_new(&conn, CARD_NAMESPACE).map_err(store_error)?;
    let service = DeckService::new(StoreCardRepository::new(store));
    f(&service)
}

fn with_app_store<T>(
    f: impl FnOnce(&SqliteKvStore<'_>) -> Result<T, StoreError>,
) -> Result<T, String> {
    let conn = open_connection().map_err(|err| err.to_string())?;
    let store = SqliteKvStore::try_new(&conn, APP_NAMESPACE).map_err(|err| err.to_string())?;
    f(&store).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::{
        card_create, card_discard, card_get, cards_list, cards_shuffled, clear_everything,
        core_version, init_logging, kv_get, kv_keys, kv_merge, kv_put, kv_remove, ping,
        DeckState,
    };
    use flashdeck_core::db::open_db_in_memory;
    use flashdeck_core::{KeyValueStore, SqliteKvStore, APP_NAMESPACE, CARD_NAMESPACE};
    use rusqlite::Connection;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn card_create_then_get_and_list() {
        let label = unique_token("card-create");
        let created = card_create(
            "file://apple.jpg".to_string(),
            format!("  {label} "),
            vec!["fruit".to_string()],
        );
        assert!(created.ok, "{}", created.message);
        let card = created.card.expect("created card should be returned");
        assert_eq!(card.back_text, label);

        let loaded = card_get(card.id.clone());
        assert!(loaded.ok, "{}", loaded.message);
        assert_eq!(loaded.card, Some(card.clone()));

        let listed = cards_list();
        assert_eq!(listed.state, DeckState::Ready, "{}", listed.message);
        assert!(listed.items.iter().any(|item| item.id == card.id));
        let shuffled = cards_shuffled();
        assert_eq!(shuffled.state, DeckState::Ready, "{}", shuffled.message);
        assert!(shuffled.items.iter().any(|item| item.id == card.id));

        let discarded = card_discard(card.id.clone());
        assert!(discarded.ok, "{}", discarded.message);
        let missing = card_get(card.id);
        assert!(!missing.ok);
        assert_eq!(missing.error_code, "not_found");
    }

    #[test]
    fn card_create_rejects_missing_image() {
        let response = card_create(String::new(), "label".to_string(), Vec::new());
        assert!(!response.ok);
        assert_eq!(response.error_code, "draft_incomplete");
        assert!(response.card.is_none());
    }

    #[test]
    fn kv_roundtrip_merge_and_remove() {
        let key = unique_token("prefs");
        let stored = kv_put(key.clone(), r#"{"theme":"dark","review":{"limit":20}}"#.to_string());
        assert!(stored.ok, "{}", stored.message);

        let merged = kv_merge(key.clone(), r#"{"review":{"limit":5}}"#.to_string());
        assert!(merged.ok, "{}", merged.message);

        let read = kv_get(key.clone());
        let value: serde_json::Value =
            serde_json::from_str(read.value.as_deref().expect("value present")).unwrap();
        assert_eq!(value["theme"], "dark");
        assert_eq!(value["review"], serde_json::json!({"limit": 5}));

        assert!(kv_keys().keys.contains(&key));
        assert!(kv_remove(key.clone()).ok);
        assert_eq!(kv_get(key).value, None);
    }

    #[test]
    fn kv_put_rejects_invalid_json() {
        let response = kv_put(unique_token("bad"), "{not json".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("invalid JSON"));
    }

    #[test]
    fn clear_everything_wipes_cards_and_app_values() {
        let conn = open_db_in_memory().unwrap();
        let cards = SqliteKvStore::try_new(&conn, CARD_NAMESPACE).unwrap();
        let app = SqliteKvStore::try_new(&conn, APP_NAMESPACE).unwrap();
        cards.put("1", &serde_json::json!({"id": "1"})).unwrap();
        app.put("theme", &"dark").unwrap();

        let response = clear_everything(&conn);
        assert!(response.ok, "{}", response.message);
        assert!(cards.keys().unwrap().is_empty());
        assert!(app.keys().unwrap().is_empty());
    }

    #[test]
    fn clear_everything_reports_unmigrated_store() {
        let conn = Connection::open_in_memory().unwrap();
        let response = clear_everything(&conn);
        assert!(!response.ok);
        assert!(response.message.contains("store_clear_all failed"));
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
