use std::{
    fs::{self, OpenOptions},
    io::Write,
    sync::Arc,
    thread,
};

use rowlog::{
    storage::{config::StoreConfig, schema::Column, storage_manager::StorageManager},
    types::{
        error::DatabaseError,
        row::Row,
        value::{DataType, Value},
    },
    utils::mock::{TempStore, account_row, accounts_columns},
};
use tempfile::tempdir;

#[test]
fn test_accounts_scenario() {
    let temp = TempStore::with_prefix("accounts_scenario").unwrap();
    let storage = &temp.storage_manager;

    storage.create_table("accounts", accounts_columns()).unwrap();
    let written = storage
        .insert_rows("accounts", &[account_row(1, "alice"), account_row(2, "bob")])
        .unwrap();
    assert_eq!(written, 2);

    let row = storage.select_by_id("accounts", 2).unwrap().unwrap();
    assert_eq!(row, account_row(2, "bob"));
    assert!(storage.select_by_id("accounts", 3).unwrap().is_none());

    storage.close_writers().unwrap();
}

#[test]
fn test_files_laid_out_per_table() {
    let temp = TempStore::with_prefix("layout").unwrap();
    let storage = &temp.storage_manager;
    storage.create_table("accounts", accounts_columns()).unwrap();
    storage
        .insert_rows("accounts", &[account_row(7, "eve, \"the\" auditor")])
        .unwrap();
    storage.close_writers().unwrap();

    assert_eq!(
        fs::read_to_string(temp.path_of("accounts-data.csv")).unwrap(),
        "7,\"eve, \"\"the\"\" auditor\"\n"
    );
    assert_eq!(
        fs::read_to_string(temp.path_of("accounts-primary-index.csv")).unwrap(),
        "7,0\n"
    );
    assert_eq!(
        fs::read_to_string(temp.path_of("accounts-metadata.csv")).unwrap(),
        "id,INTEGER,true\nname,TEXT,false\n"
    );
    assert_eq!(
        fs::read_to_string(temp.path_of("tables.csv")).unwrap(),
        "accounts,0\n"
    );
}

#[test]
fn test_duplicate_create_fails() {
    let temp = TempStore::with_prefix("duplicate_create").unwrap();
    let storage = &temp.storage_manager;
    storage.create_table("accounts", accounts_columns()).unwrap();

    match storage.create_table("accounts", accounts_columns()) {
        Err(DatabaseError::TableAlreadyExists { name }) => assert_eq!(name, "accounts"),
        other => panic!("Expected TableAlreadyExists, got {:?}", other),
    }
}

#[test]
fn test_operations_on_unknown_table() {
    let temp = TempStore::with_prefix("unknown_table").unwrap();
    let storage = &temp.storage_manager;

    assert!(matches!(
        storage.select_by_id("ghost", 1),
        Err(DatabaseError::TableDoesNotExist { .. })
    ));
    assert!(matches!(
        storage.insert_rows("ghost", &[account_row(1, "a")]),
        Err(DatabaseError::TableDoesNotExist { .. })
    ));
    assert!(matches!(
        storage.load_schema("ghost"),
        Err(DatabaseError::TableDoesNotExist { .. })
    ));
    assert!(!storage.table_exists("ghost"));
}

#[test]
fn test_catalog_lists_every_table() {
    let temp = TempStore::with_prefix("catalog").unwrap();
    let storage = &temp.storage_manager;
    storage.create_table("accounts", accounts_columns()).unwrap();
    storage.create_table("archive", accounts_columns()).unwrap();

    assert_eq!(storage.table_names().unwrap(), vec!["accounts", "archive"]);
    assert_eq!(storage.open_tables(), vec!["accounts", "archive"]);
    assert!(storage.table_exists("archive"));
    assert_eq!(
        storage.table_schema("accounts").unwrap().column_names(),
        vec!["id", "name"]
    );
}

#[test]
fn test_reopen_replays_index() {
    let mut temp = TempStore::with_prefix("reopen").unwrap();
    {
        let storage = &temp.storage_manager;
        storage.create_table("accounts", accounts_columns()).unwrap();
        storage
            .insert_rows(
                "accounts",
                &[account_row(1, "alice"), account_row(2, "bob"), account_row(1, "alicia")],
            )
            .unwrap();
    }

    temp.reopen(StoreConfig::default()).unwrap();
    let storage = &temp.storage_manager;

    assert_eq!(storage.open_tables(), vec!["accounts"]);
    assert_eq!(
        storage.select_by_id("accounts", 1).unwrap(),
        Some(account_row(1, "alicia"))
    );
    assert_eq!(
        storage.select_by_id("accounts", 2).unwrap(),
        Some(account_row(2, "bob"))
    );

    // New rows continue after the recovered ones
    storage
        .insert_rows("accounts", &[account_row(3, "carol")])
        .unwrap();
    storage.close_writers().unwrap();
    assert_eq!(
        fs::read_to_string(temp.path_of("accounts-primary-index.csv")).unwrap(),
        "1,0\n2,1\n1,2\n3,3\n"
    );
}

#[test]
fn test_reopen_without_recovery_leaves_tables_closed() {
    let mut temp = TempStore::with_prefix("no_recovery").unwrap();
    temp.storage_manager
        .create_table("accounts", accounts_columns())
        .unwrap();
    temp.storage_manager
        .insert_rows("accounts", &[account_row(1, "alice")])
        .unwrap();

    temp.reopen(StoreConfig::default().recover_on_open(false))
        .unwrap();
    let storage = &temp.storage_manager;

    assert!(storage.open_tables().is_empty());
    assert!(storage.table_exists("accounts"));
    assert!(matches!(
        storage.select_by_id("accounts", 1),
        Err(DatabaseError::TableDoesNotExist { .. })
    ));
    // The data file is still there, so the name cannot be reused
    assert!(matches!(
        storage.create_table("accounts", accounts_columns()),
        Err(DatabaseError::TableAlreadyExists { .. })
    ));
}

#[test]
fn test_recovery_skips_index_entries_past_data_log() {
    let dir = tempdir().unwrap();
    {
        let storage = StorageManager::open(dir.path()).unwrap();
        storage.create_table("accounts", accounts_columns()).unwrap();
        storage
            .insert_rows("accounts", &[account_row(1, "alice")])
            .unwrap();
        storage.close_writers().unwrap();
    }
    // An index entry whose data row never reached the data log
    let index_path = dir.path().join("accounts-primary-index.csv");
    let mut index = fs::read_to_string(&index_path).unwrap();
    index.push_str("9,5\n");
    fs::write(&index_path, index).unwrap();

    let storage = StorageManager::open(dir.path()).unwrap();
    assert_eq!(
        storage.select_by_id("accounts", 1).unwrap(),
        Some(account_row(1, "alice"))
    );
    assert!(storage.select_by_id("accounts", 9).unwrap().is_none());
}

#[test]
fn test_text_first_column_keeps_leading_bom() {
    let temp = TempStore::with_prefix("leading_bom").unwrap();
    let storage = &temp.storage_manager;
    storage
        .create_table(
            "labels",
            vec![
                Column::new("name", DataType::Text),
                Column::new("id", DataType::Integer).primary_key(),
            ],
        )
        .unwrap();
    let row = Row::from_pairs([("name", Value::from("\u{FEFF}x")), ("id", Value::Integer(1))]);
    storage.insert_rows("labels", &[row.clone()]).unwrap();

    assert_eq!(storage.select_by_id("labels", 1).unwrap(), Some(row));
}

#[test]
fn test_torn_data_record_is_dropped_on_reopen() {
    let mut temp = TempStore::with_prefix("torn_record").unwrap();
    temp.storage_manager
        .create_table("accounts", accounts_columns())
        .unwrap();
    temp.storage_manager
        .insert_rows("accounts", &[account_row(1, "alice")])
        .unwrap();
    temp.storage_manager.close_writers().unwrap();

    // A row whose write was interrupted halfway
    let mut data = OpenOptions::new()
        .append(true)
        .open(temp.path_of("accounts-data.csv"))
        .unwrap();
    data.write_all(b"2,bo").unwrap();
    drop(data);

    temp.reopen(StoreConfig::default()).unwrap();
    temp.storage_manager
        .insert_rows("accounts", &[account_row(3, "carol")])
        .unwrap();
    assert_eq!(
        temp.storage_manager.select_by_id("accounts", 3).unwrap(),
        Some(account_row(3, "carol"))
    );

    temp.reopen(StoreConfig::default()).unwrap();
    let storage = &temp.storage_manager;
    assert_eq!(
        storage.select_by_id("accounts", 3).unwrap(),
        Some(account_row(3, "carol"))
    );
    assert!(storage.select_by_id("accounts", 2).unwrap().is_none());
    assert_eq!(
        fs::read_to_string(temp.path_of("accounts-data.csv")).unwrap(),
        "1,alice\n3,carol\n"
    );
    assert_eq!(
        fs::read_to_string(temp.path_of("accounts-primary-index.csv")).unwrap(),
        "1,0\n3,1\n"
    );
}

#[test]
fn test_stale_index_entries_do_not_match_reused_positions() {
    let mut temp = TempStore::with_prefix("stale_index").unwrap();
    temp.storage_manager
        .create_table("accounts", accounts_columns())
        .unwrap();
    temp.storage_manager
        .insert_rows("accounts", &[account_row(1, "alice")])
        .unwrap();
    temp.storage_manager.close_writers().unwrap();

    // The index reached disk for a row the data log never got
    let index_path = temp.path_of("accounts-primary-index.csv");
    let mut index = fs::read_to_string(&index_path).unwrap();
    index.push_str("2,1\n");
    fs::write(&index_path, index).unwrap();

    temp.reopen(StoreConfig::default()).unwrap();
    temp.storage_manager
        .insert_rows("accounts", &[account_row(3, "carol")])
        .unwrap();

    temp.reopen(StoreConfig::default()).unwrap();
    let storage = &temp.storage_manager;
    assert!(storage.select_by_id("accounts", 2).unwrap().is_none());
    assert_eq!(
        storage.select_by_id("accounts", 3).unwrap(),
        Some(account_row(3, "carol"))
    );
}

#[test]
fn test_missing_index_log_is_rebuilt_from_data() {
    let mut temp = TempStore::with_prefix("rebuild_index").unwrap();
    temp.storage_manager
        .create_table("accounts", accounts_columns())
        .unwrap();
    temp.storage_manager
        .insert_rows(
            "accounts",
            &[account_row(1, "alice"), account_row(2, "bob"), account_row(1, "alicia")],
        )
        .unwrap();
    temp.storage_manager.close_writers().unwrap();
    fs::remove_file(temp.path_of("accounts-primary-index.csv")).unwrap();

    temp.reopen(StoreConfig::default()).unwrap();
    let storage = &temp.storage_manager;
    assert_eq!(
        storage.select_by_id("accounts", 1).unwrap(),
        Some(account_row(1, "alicia"))
    );
    assert_eq!(
        storage.select_by_id("accounts", 2).unwrap(),
        Some(account_row(2, "bob"))
    );
    storage.close_writers().unwrap();
    assert_eq!(
        fs::read_to_string(temp.path_of("accounts-primary-index.csv")).unwrap(),
        "1,0\n2,1\n1,2\n"
    );
}

#[test]
fn test_failed_create_leaves_name_reusable() {
    let temp = TempStore::with_prefix("failed_create").unwrap();
    let storage = &temp.storage_manager;
    // A directory where the index log should go makes log creation fail
    let blocker = temp.path_of("accounts-primary-index.csv");
    fs::create_dir(&blocker).unwrap();

    assert!(matches!(
        storage.create_table("accounts", accounts_columns()),
        Err(DatabaseError::WriteFailure { .. })
    ));
    assert!(!temp.path_of("accounts-metadata.csv").exists());
    assert!(!temp.path_of("accounts-data.csv").exists());
    assert!(!storage.table_exists("accounts"));

    fs::remove_dir(&blocker).unwrap();
    storage.create_table("accounts", accounts_columns()).unwrap();
    storage
        .insert_rows("accounts", &[account_row(1, "alice")])
        .unwrap();
    assert_eq!(
        storage.select_by_id("accounts", 1).unwrap(),
        Some(account_row(1, "alice"))
    );
}

#[test]
fn test_root_that_is_a_file_fails_initialization() {
    let dir = tempdir().unwrap();
    let file_root = dir.path().join("not-a-dir");
    fs::write(&file_root, "").unwrap();

    assert!(matches!(
        StorageManager::open(&file_root),
        Err(DatabaseError::InitializationFailure { .. })
    ));
}

#[test]
fn test_close_writers_then_insert_fails() {
    let temp = TempStore::with_prefix("closed").unwrap();
    let storage = &temp.storage_manager;
    storage.create_table("accounts", accounts_columns()).unwrap();
    storage
        .insert_rows("accounts", &[account_row(1, "alice")])
        .unwrap();

    storage.close_writers().unwrap();
    // Closing twice is harmless
    storage.close_writers().unwrap();

    assert!(matches!(
        storage.insert_rows("accounts", &[account_row(2, "bob")]),
        Err(DatabaseError::WriteFailure { .. })
    ));
    // Lookups keep reading the closed logs
    assert_eq!(
        storage.select_by_id("accounts", 1).unwrap(),
        Some(account_row(1, "alice"))
    );
}

#[test]
fn test_concurrent_inserts_and_lookups_across_tables() {
    const THREADS: i64 = 4;
    const ROWS: i64 = 200;

    let temp = TempStore::with_prefix("concurrent").unwrap();
    let storage = Arc::new(StorageManager::open(temp.root().join("shared")).unwrap());
    storage.create_table("left", accounts_columns()).unwrap();
    storage.create_table("right", accounts_columns()).unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                let table = if t % 2 == 0 { "left" } else { "right" };
                for i in 0..ROWS {
                    let id = t * ROWS + i;
                    storage
                        .insert_rows(table, &[account_row(id, &format!("name-{}", id))])
                        .unwrap();
                    let row = storage.select_by_id(table, id).unwrap().unwrap();
                    assert_eq!(row.get("name"), Some(&Value::Text(format!("name-{}", id))));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..THREADS {
        let table = if t % 2 == 0 { "left" } else { "right" };
        for i in 0..ROWS {
            let id = t * ROWS + i;
            assert_eq!(
                storage.select_by_id(table, id).unwrap(),
                Some(account_row(id, &format!("name-{}", id)))
            );
        }
    }
    storage.close_writers().unwrap();
}
