use flashdeck_core::db::{open_db, open_db_in_memory};
use flashdeck_core::{
    clear_all, CancelToken, FlashCard, KeyValueStore, SqliteKvStore, StoreError, APP_NAMESPACE,
    CARD_NAMESPACE,
};
use rusqlite::{params, Connection};
use serde_json::{json, Value};

fn sample_card(id: &str, back_text: &str) -> FlashCard {
    FlashCard::with_id(id, format!("file://{id}.jpg"), back_text, 1_700_000_000_000)
}

#[test]
fn put_then_get_roundtrips_card() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, CARD_NAMESPACE).unwrap();

    let card = sample_card("1", "apple").with_tags(["fruit", "red"]);
    store.put(&card.id, &card).unwrap();

    let loaded: FlashCard = store.get("1").unwrap().unwrap();
    assert_eq!(loaded, card);
}

#[test]
fn get_missing_key_on_empty_store_is_absent() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, CARD_NAMESPACE).unwrap();

    let loaded: Option<FlashCard> = store.get("missing-key").unwrap();
    assert!(loaded.is_none());

    let err = store.require::<FlashCard>("missing-key").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(ref key) if key == "missing-key"));
}

#[test]
fn get_all_returns_single_card_scenario() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, CARD_NAMESPACE).unwrap();

    let card = FlashCard::with_id("1", "file://a.jpg", "apple", 1_700_000_000_000);
    store.put("1", &card).unwrap();

    let all = store.get_all::<FlashCard>().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all.get("1"), Some(&card));
}

#[test]
fn get_all_after_sequential_puts_returns_last_written_values() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, CARD_NAMESPACE).unwrap();

    for index in 0..5 {
        let id = format!("card-{index}");
        store.put(&id, &sample_card(&id, "first")).unwrap();
    }
    store.put("card-2", &sample_card("card-2", "second")).unwrap();

    let all = store.get_all::<FlashCard>().unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all["card-2"].back_text, "second");
    assert_eq!(all["card-4"].back_text, "first");
}

#[test]
fn put_overwrites_previous_value() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, APP_NAMESPACE).unwrap();

    store.put("k", &json!({"v": 1})).unwrap();
    store.put("k", &json!({"v": 2})).unwrap();

    assert_eq!(store.get::<Value>("k").unwrap(), Some(json!({"v": 2})));
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn remove_makes_key_absent_and_is_noop_when_missing() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, APP_NAMESPACE).unwrap();

    store.put("k", &"value").unwrap();
    assert!(store.remove("k").unwrap());
    assert!(store.get::<String>("k").unwrap().is_none());
    assert!(!store.remove("k").unwrap());
}

#[test]
fn clear_empties_namespace_and_leaves_others_alone() {
    let conn = open_db_in_memory().unwrap();
    let cards = SqliteKvStore::try_new(&conn, CARD_NAMESPACE).unwrap();
    let app = SqliteKvStore::try_new(&conn, APP_NAMESPACE).unwrap();

    cards.put("1", &sample_card("1", "apple")).unwrap();
    cards.put("2", &sample_card("2", "pear")).unwrap();
    app.put("onboarding_done", &true).unwrap();

    assert_eq!(cards.clear().unwrap(), 2);
    assert!(cards.keys().unwrap().is_empty());
    assert!(cards.is_empty().unwrap());
    assert_eq!(app.keys().unwrap(), vec!["onboarding_done".to_string()]);
}

#[test]
fn clear_all_empties_every_namespace() {
    let conn = open_db_in_memory().unwrap();
    let cards = SqliteKvStore::try_new(&conn, CARD_NAMESPACE).unwrap();
    let app = SqliteKvStore::try_new(&conn, APP_NAMESPACE).unwrap();

    cards.put("1", &sample_card("1", "apple")).unwrap();
    app.put("x", &1).unwrap();
    app.put("y", &2).unwrap();

    assert_eq!(clear_all(&conn).unwrap(), 3);
    assert!(cards.keys().unwrap().is_empty());
    assert!(app.keys().unwrap().is_empty());
    assert_eq!(clear_all(&conn).unwrap(), 0);
}

#[test]
fn clear_all_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(matches!(
        clear_all(&conn),
        Err(StoreError::StorageUnavailable(_))
    ));
}

#[test]
fn put_if_absent_never_overwrites_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cards.db");
    let first_conn = open_db(&path).unwrap();
    let second_conn = open_db(&path).unwrap();
    let first = SqliteKvStore::try_new(&first_conn, CARD_NAMESPACE).unwrap();
    let second = SqliteKvStore::try_new(&second_conn, CARD_NAMESPACE).unwrap();

    assert!(first.put_if_absent("1", &sample_card("1", "apple")).unwrap());
    assert!(!second.put_if_absent("1", &sample_card("1", "pear")).unwrap());

    let stored: FlashCard = second.require("1").unwrap();
    assert_eq!(stored.back_text, "apple");
}

#[test]
fn keys_are_sorted() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, APP_NAMESPACE).unwrap();

    for key in ["b", "c", "a"] {
        store.put(key, &key).unwrap();
    }
    assert_eq!(store.keys().unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn merge_is_shallow_and_creates_missing_entries() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, APP_NAMESPACE).unwrap();

    store
        .put(
            "prefs",
            &json!({"theme": "dark", "review": {"shuffle": true, "limit": 20}}),
        )
        .unwrap();
    store
        .merge("prefs", &json!({"review": {"limit": 5}, "locale": "tr"}))
        .unwrap();

    assert_eq!(
        store.get::<Value>("prefs").unwrap(),
        Some(json!({"theme": "dark", "review": {"limit": 5}, "locale": "tr"}))
    );

    store.merge("fresh", &json!({"a": 1})).unwrap();
    assert_eq!(store.get::<Value>("fresh").unwrap(), Some(json!({"a": 1})));
}

#[test]
fn merge_into_non_object_fails_and_keeps_value() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, APP_NAMESPACE).unwrap();

    store.put("count", &3).unwrap();
    let err = store.merge("count", &json!({"a": 1})).unwrap_err();
    assert!(matches!(err, StoreError::NotMergeable(_)));
    assert_eq!(store.get::<i32>("count").unwrap(), Some(3));
}

#[test]
fn corrupt_entry_is_an_error_not_absent() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, CARD_NAMESPACE).unwrap();
    store.put("good", &sample_card("good", "ok")).unwrap();
    insert_raw(&conn, CARD_NAMESPACE, "bad", "{not json", 1);

    let err = store.get::<FlashCard>("bad").unwrap_err();
    assert!(matches!(err, StoreError::Serialization { ref key, .. } if key == "bad"));

    let err = store.get_all::<FlashCard>().unwrap_err();
    assert!(matches!(err, StoreError::Serialization { .. }));
}

#[test]
fn future_format_version_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, APP_NAMESPACE).unwrap();
    insert_raw(&conn, APP_NAMESPACE, "next", "{}", 2);

    let err = store.get::<Value>("next").unwrap_err();
    assert!(matches!(
        err,
        StoreError::UnsupportedFormat {
            version: 2,
            latest_supported: 1,
            ..
        }
    ));
}

#[test]
fn negative_format_version_is_a_payload_error() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, APP_NAMESPACE).unwrap();
    store.put("ok", &1).unwrap();
    conn.execute(
        "INSERT INTO kv_entries (namespace, key, value, format_version) VALUES (?1, 'bad', '1', -1);",
        [APP_NAMESPACE],
    )
    .unwrap();

    let err = store.get::<i32>("bad").unwrap_err();
    assert!(matches!(err, StoreError::Serialization { ref key, .. } if key == "bad"));
    assert!(matches!(
        store.get_all::<i32>(),
        Err(StoreError::Serialization { .. })
    ));
    assert!(matches!(
        store.list_page::<i32>(None, 10),
        Err(StoreError::Serialization { .. })
    ));
}

#[test]
fn empty_key_and_namespace_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    assert!(matches!(
        SqliteKvStore::try_new(&conn, "  "),
        Err(StoreError::InvalidKey(_))
    ));

    let store = SqliteKvStore::try_new(&conn, APP_NAMESPACE).unwrap();
    assert!(matches!(
        store.put("", &1),
        Err(StoreError::InvalidKey(_))
    ));
}

#[test]
fn store_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(matches!(
        SqliteKvStore::try_new(&conn, CARD_NAMESPACE),
        Err(StoreError::StorageUnavailable(_))
    ));
}

#[test]
fn cancelled_get_all_stops() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, CARD_NAMESPACE).unwrap();
    store.put("1", &sample_card("1", "apple")).unwrap();

    let token = CancelToken::new();
    token.cancel();
    let err = store.get_all_cancellable::<FlashCard>(&token).unwrap_err();
    assert!(matches!(err, StoreError::Cancelled));
}

#[test]
fn multi_set_and_multi_get() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, APP_NAMESPACE).unwrap();

    store
        .multi_set(&[("a", json!(1)), ("b", json!(2))])
        .unwrap();
    let values = store.multi_get::<Value>(&["a", "missing", "b"]).unwrap();
    assert_eq!(
        values,
        vec![
            ("a".to_string(), Some(json!(1))),
            ("missing".to_string(), None),
            ("b".to_string(), Some(json!(2))),
        ]
    );
}

#[test]
fn multi_set_with_invalid_key_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, APP_NAMESPACE).unwrap();

    let err = store
        .multi_set(&[("a", json!(1)), ("", json!(2))])
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidKey(_)));
    assert!(store.keys().unwrap().is_empty());
}

#[test]
fn list_page_walks_all_entries_in_key_order() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteKvStore::try_new(&conn, APP_NAMESPACE).unwrap();
    for key in ["e", "a", "d", "b", "c"] {
        store.put(key, &key).unwrap();
    }

    let first = store.list_page::<String>(None, 2).unwrap();
    assert_eq!(
        first.entries.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
        vec!["a", "b"]
    );
    assert_eq!(first.next_after.as_deref(), Some("b"));

    let second = store.list_page::<String>(Some("b"), 2).unwrap();
    assert_eq!(second.next_after.as_deref(), Some("d"));

    let last = store.list_page::<String>(Some("d"), 2).unwrap();
    assert_eq!(last.entries, vec![("e".to_string(), "e".to_string())]);
    assert!(last.next_after.is_none());
}

#[test]
fn put_is_visible_to_a_later_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cards.db");

    {
        let conn = open_db(&path).unwrap();
        let store = SqliteKvStore::try_new(&conn, CARD_NAMESPACE).unwrap();
        store.put("1", &sample_card("1", "apple")).unwrap();
    }

    let conn = open_db(&path).unwrap();
    let store = SqliteKvStore::try_new(&conn, CARD_NAMESPACE).unwrap();
    let all = store.get_all::<FlashCard>().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all["1"].back_text, "apple");
}

fn insert_raw(conn: &Connection, namespace: &str, key: &str, value: &str, version: u32) {
    conn.execute(
        "INSERT INTO kv_entries (namespace, key, value, format_version) VALUES (?1, ?2, ?3, ?4);",
        params![namespace, key, value, version],
    )
    .unwrap();
}
