// Integration tests for the bulk bot-name import pipeline.

mod common;

use statsadmin_backend::import::{import_names, read_all_lines, save_upload, NamePattern, DEFAULT_KEYWORD};
use statsadmin_backend::player::{BOT_COUNTRY, BOT_EMAIL};
use statsadmin_backend::sql::SqlValue;
use statsadmin_backend::error::AdminError;
use sqlx::sqlite::SqlitePool;

fn pattern() -> NamePattern {
    NamePattern::new(DEFAULT_KEYWORD).unwrap()
}

fn bot_fields() -> Vec<(&'static str, SqlValue)> {
    vec![
        ("country", BOT_COUNTRY.into()),
        ("email", BOT_EMAIL.into()),
        ("password", "".into()),
    ]
}

async fn import(pool: &SqlitePool, lines: &[&str]) -> Result<statsadmin_backend::import::ImportResult, AdminError> {
    import_names(pool, lines, &pattern(), "player", "name", &bot_fields()).await
}

async fn player_count(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM player WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_existing_name_is_skipped() {
    let (_dir, db) = common::file_db().await;
    common::add_player(&db, "Rambo", "secret").await;

    let result = import(db.pool(), &["aiSettings.addBotName Rambo"]).await.unwrap();
    assert_eq!(result.imported_count, 0);
    assert_eq!(result.skipped_count, 1);
    assert!(result.errors.is_empty());
    assert_eq!(player_count(db.pool(), "Rambo").await, 1);
}

#[tokio::test]
async fn test_imports_new_names_and_ignores_other_lines() {
    let (_dir, db) = common::file_db().await;

    let lines = [
        "rem bot roster",
        "aiSettings.addBotName Alpha",
        "aiSettings.setBotSkill 1.0",
        "aiSettings.addBotName Bravo",
    ];
    let result = import(db.pool(), &lines).await.unwrap();
    assert_eq!(result.imported_count, 2);
    assert_eq!(result.skipped_count, 0);

    let row: (String, String, String) =
        sqlx::query_as("SELECT country, email, password FROM player WHERE name = 'Alpha'")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(row, ("US".into(), "bot@botNames.ai".into(), String::new()));
}

#[tokio::test]
async fn test_repeated_name_in_one_file_is_inserted_once() {
    let (_dir, db) = common::file_db().await;

    let lines = ["aiSettings.addBotName Echo", "aiSettings.addBotName Echo"];
    let result = import(db.pool(), &lines).await.unwrap();
    assert_eq!(result.imported_count, 1);
    assert_eq!(result.skipped_count, 1);
    assert_eq!(player_count(db.pool(), "Echo").await, 1);
}

#[tokio::test]
async fn test_empty_input_imports_nothing() {
    let (_dir, db) = common::file_db().await;
    let result = import(db.pool(), &[]).await.unwrap();
    assert_eq!(result.imported_count, 0);
    assert_eq!(result.skipped_count, 0);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_uploaded_file_round_trip() {
    let (dir, db) = common::file_db().await;
    let path = save_upload(
        &dir.path().join("uploads"),
        b"aiSettings.addBotName Foxtrot\r\naiSettings.addBotName Golf\r\n",
    )
    .await
    .unwrap();
    let lines = read_all_lines(&path).await.unwrap();

    let result = import_names(db.pool(), &lines, &pattern(), "player", "name", &bot_fields())
        .await
        .unwrap();
    assert_eq!(result.imported_count, 2);
    assert_eq!(player_count(db.pool(), "Golf").await, 1);
}

#[tokio::test]
async fn test_invalid_table_fails_before_writing() {
    let (_dir, db) = common::file_db().await;
    let err = import_names(
        db.pool(),
        &["aiSettings.addBotName Hotel"],
        &pattern(),
        "player; --",
        "name",
        &bot_fields(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AdminError::InvalidIdentifier(_)));
    assert_eq!(player_count(db.pool(), "Hotel").await, 0);
}

fn roster(prefix: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("aiSettings.addBotName {prefix}{i}"))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_imports_keep_every_distinct_name() {
    let (_dir, db) = common::file_db().await;
    let pool = db.pool().clone();

    for round in 0..5 {
        let shared = roster(&format!("Shared{round}x"), 30);
        let first_lines: Vec<String> = shared
            .iter()
            .cloned()
            .chain(roster(&format!("OnlyA{round}x"), 10))
            .collect();
        let second_lines: Vec<String> = shared
            .iter()
            .cloned()
            .chain(roster(&format!("OnlyB{round}x"), 30))
            .collect();

        let first = {
            let pool = pool.clone();
            tokio::spawn(async move {
                import_names(&pool, &first_lines, &pattern(), "player", "name", &bot_fields()).await
            })
        };
        let second = {
            let pool = pool.clone();
            tokio::spawn(async move {
                import_names(&pool, &second_lines, &pattern(), "player", "name", &bot_fields()).await
            })
        };
        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert!(first.errors.is_empty(), "{:?}", first.errors);
        assert!(second.errors.is_empty(), "{:?}", second.errors);
        assert_eq!(first.imported_count + first.skipped_count, 40);
        assert_eq!(second.imported_count + second.skipped_count, 60);
        // 30 shared names once, plus each file's own names
        assert_eq!(first.imported_count + second.imported_count, 70);

        for i in 0..30 {
            assert_eq!(player_count(&pool, &format!("Shared{round}x{i}")).await, 1);
            assert_eq!(player_count(&pool, &format!("OnlyB{round}x{i}")).await, 1);
        }
        for i in 0..10 {
            assert_eq!(player_count(&pool, &format!("OnlyA{round}x{i}")).await, 1);
        }
    }
}
