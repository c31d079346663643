// Shared helpers for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use statsadmin_backend::api::AppState;
use statsadmin_backend::db::{Database, NewPlayer};
use statsadmin_backend::import::{NamePattern, DEFAULT_KEYWORD};
use tempfile::TempDir;

/// A file-backed database so that every pooled connection sees the same data.
/// Keep the returned directory alive for as long as the database is used.
pub async fn file_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("stats.db").display());
    let db = Database::new(&url).await.unwrap();
    (dir, db)
}

pub async fn add_player(db: &Database, name: &str, password: &str) -> i64 {
    db.create_player(&NewPlayer {
        name: name.to_string(),
        password: password.to_string(),
        rank: 2,
        email: format!("{name}@example.com"),
        country: "DE".to_string(),
    })
    .await
    .unwrap()
}

pub async fn add_bot(db: &Database, name: &str) -> i64 {
    add_player(db, name, "").await
}

pub fn app_state(dir: &TempDir, db: Database) -> AppState {
    AppState {
        db: Arc::new(db),
        upload_dir: dir.path().join("uploads"),
        name_pattern: NamePattern::new(DEFAULT_KEYWORD).unwrap(),
    }
}
