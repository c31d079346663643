// Database access layer (SQLite via sqlx).

use std::str::FromStr;

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::error::AdminError;
use crate::sql::{insert_row, update_rows, Ident, SqlValue};

/// Every per-player stat column zeroed by a stats reset.
pub const STAT_COLUMNS: [&str; 38] = [
    "time",
    "rounds",
    "score",
    "cmdscore",
    "skillscore",
    "teamscore",
    "kills",
    "wins",
    "losses",
    "deaths",
    "captures",
    "captureassists",
    "neutralizes",
    "neutralizeassists",
    "defends",
    "damageassists",
    "heals",
    "revives",
    "ammos",
    "repairs",
    "targetassists",
    "driverspecials",
    "teamkills",
    "teamdamage",
    "teamvehicledamage",
    "suicides",
    "rank",
    "cmdtime",
    "sqltime",
    "sqmtime",
    "lwtime",
    "timepara",
    "mode0",
    "mode1",
    "mode2",
    "rndscore",
    "deathstreak",
    "killstreak",
];

/// Per-player child tables cleared by a stats reset.
pub const PLAYER_STAT_TABLES: [&str; 7] = [
    "player_kit",
    "player_army",
    "player_award",
    "player_map",
    "player_vehicle",
    "player_weapon",
    "player_unlock",
];

/// Breakdown tables attached to a player's detail view, with the key each
/// is reported under.
pub const PLAYER_BREAKDOWN_TABLES: [(&str, &str); 4] = [
    ("armies", "player_army"),
    ("kits", "player_kit"),
    ("vehicles", "player_vehicle"),
    ("weapons", "player_weapon"),
];

const PLAYER_COLUMNS: &str = "id, name, rank, email, country, clantag, joined, time, lastonline, \
    score, skillscore, cmdscore, teamscore, kills, deaths, teamkills, kicked, banned, permban, \
    heals, repairs, ammos, revives, captures, captureassists, defends, driverspecials, \
    neutralizes, neutralizeassists, damageassists, rounds, wins, losses, cmdtime, sqmtime, \
    sqltime, lwtime, suicides, teamdamage, teamvehicledamage, killstreak, rndscore";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub rank: i64,
    pub email: String,
    pub country: String,
    pub clantag: String,
    pub joined: i64,
    pub time: i64,
    pub lastonline: i64,
    pub score: i64,
    pub skillscore: i64,
    pub cmdscore: i64,
    pub teamscore: i64,
    pub kills: i64,
    pub deaths: i64,
    pub teamkills: i64,
    pub kicked: i64,
    pub banned: i64,
    pub permban: i64,
    pub heals: i64,
    pub repairs: i64,
    pub ammos: i64,
    pub revives: i64,
    pub captures: i64,
    pub captureassists: i64,
    pub defends: i64,
    pub driverspecials: i64,
    pub neutralizes: i64,
    pub neutralizeassists: i64,
    pub damageassists: i64,
    pub rounds: i64,
    pub wins: i64,
    pub losses: i64,
    pub cmdtime: i64,
    pub sqmtime: i64,
    pub sqltime: i64,
    pub lwtime: i64,
    pub suicides: i64,
    pub teamdamage: i64,
    pub teamvehicledamage: i64,
    pub killstreak: i64,
    pub rndscore: i64,
}

/// One player's view of one round, joined with the round, map and server.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RoundDetail {
    pub pid: i64,
    pub roundid: i64,
    pub team: i64,
    pub score: i64,
    pub kills: i64,
    pub deaths: i64,
    pub time: i64,
    pub rank: i64,
    pub name: Option<String>,
    pub timestamp: Option<i64>,
    pub tickets1: Option<i64>,
    pub tickets2: Option<i64>,
    pub mapname: Option<String>,
    pub server: Option<String>,
    pub ip: Option<String>,
    pub port: Option<i64>,
    pub player_count: Option<i64>,
    pub team_name: Option<String>,
}

/// Time played, kills and deaths with one army, kit, vehicle or weapon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PlayerStatRow {
    pub id: i64,
    pub time: i64,
    pub kills: i64,
    pub deaths: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PlayerAward {
    pub id: i64,
    pub roundid: i64,
    pub level: i64,
    pub earned: i64,
}

/// Fields for a new player row. `password` is already hashed; an empty
/// password marks a bot.
#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub name: String,
    pub password: String,
    pub rank: i64,
    pub email: String,
    pub country: String,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        // Each connection to `:memory:` is its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        let stat_columns = STAT_COLUMNS
            .iter()
            .map(|c| format!("{c} INTEGER NOT NULL DEFAULT 0"))
            .collect::<Vec<_>>()
            .join(",\n                ");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS player (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL DEFAULT '',
                country TEXT NOT NULL DEFAULT 'US',
                clantag TEXT NOT NULL DEFAULT '',
                joined INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                lastonline INTEGER NOT NULL DEFAULT 0,
                kicked INTEGER NOT NULL DEFAULT 0,
                banned INTEGER NOT NULL DEFAULT 0,
                permban INTEGER NOT NULL DEFAULT 0,
                bantime INTEGER NOT NULL DEFAULT 0,
                {stat_columns}
            )
        "#
        ))
        .execute(&self.pool)
        .await?;

        for table in ["player_kit", "player_army", "player_map", "player_vehicle", "player_weapon"] {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    pid INTEGER NOT NULL REFERENCES player(id) ON DELETE CASCADE,
                    id INTEGER NOT NULL,
                    time INTEGER NOT NULL DEFAULT 0,
                    kills INTEGER NOT NULL DEFAULT 0,
                    deaths INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (pid, id)
                )
            "#
            ))
            .execute(&self.pool)
            .await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS player_award (
                pid INTEGER NOT NULL REFERENCES player(id) ON DELETE CASCADE,
                id INTEGER NOT NULL,
                roundid INTEGER NOT NULL DEFAULT 0,
                level INTEGER NOT NULL DEFAULT 1,
                earned INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS player_unlock (
                pid INTEGER NOT NULL REFERENCES player(id) ON DELETE CASCADE,
                id INTEGER NOT NULL,
                PRIMARY KEY (pid, id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS army (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mapinfo (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS server (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL DEFAULT '',
                ip TEXT NOT NULL DEFAULT '',
                port INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS round_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mapid INTEGER NOT NULL REFERENCES mapinfo(id),
                serverid INTEGER NOT NULL REFERENCES server(id),
                timestamp INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                team1 INTEGER NOT NULL DEFAULT 0,
                team2 INTEGER NOT NULL DEFAULT 0,
                tickets1 INTEGER NOT NULL DEFAULT 0,
                tickets2 INTEGER NOT NULL DEFAULT 0,
                pids1_end INTEGER NOT NULL DEFAULT 0,
                pids2_end INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS player_history (
                pid INTEGER NOT NULL REFERENCES player(id) ON DELETE CASCADE,
                roundid INTEGER NOT NULL REFERENCES round_history(id) ON DELETE CASCADE,
                team INTEGER NOT NULL DEFAULT 0,
                score INTEGER NOT NULL DEFAULT 0,
                kills INTEGER NOT NULL DEFAULT 0,
                deaths INTEGER NOT NULL DEFAULT 0,
                time INTEGER NOT NULL DEFAULT 0,
                rank INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (pid, roundid)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE VIEW IF NOT EXISTS player_history_view AS
            SELECT ph.pid AS pid, ph.roundid AS roundid, s.name AS name, mi.name AS mapname,
                   ph.score AS score, ph.kills AS kills, ph.deaths AS deaths, ph.time AS time,
                   ph.team AS team, h.timestamp AS timestamp, ph.rank AS rank
            FROM player_history AS ph
              JOIN round_history AS h ON ph.roundid = h.id
              LEFT JOIN mapinfo AS mi ON h.mapid = mi.id
              LEFT JOIN server AS s ON h.serverid = s.id
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Players ───────────────────────────────────────────────────────

    pub async fn get_player(&self, id: i64) -> Result<Option<Player>, sqlx::Error> {
        let row = sqlx::query_as::<_, Player>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn create_player(&self, player: &NewPlayer) -> Result<i64, AdminError> {
        insert_row(
            &self.pool,
            "player",
            &[
                ("name", player.name.as_str().into()),
                ("password", player.password.as_str().into()),
                ("rank", player.rank.into()),
                ("email", player.email.as_str().into()),
                ("country", player.country.as_str().into()),
            ],
        )
        .await
    }

    /// Update the given columns of one player. Returns false if no such player.
    pub async fn update_player(
        &self,
        id: i64,
        fields: &[(&str, SqlValue)],
    ) -> Result<bool, AdminError> {
        let affected = update_rows(&self.pool, "player", fields, &[("id", id.into())]).await?;
        Ok(affected > 0)
    }

    /// Set or clear the permanent ban flag. `bantime` is the unix time of the
    /// ban, or 0 when lifting it.
    pub async fn set_player_ban(
        &self,
        id: i64,
        banned: bool,
        bantime: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE player SET permban = ?, bantime = ? WHERE id = ?")
            .bind(banned as i64)
            .bind(bantime)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_player(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM player WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every bot (player without a password). Returns the count.
    pub async fn delete_bots(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM player WHERE password = ''")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Clear all per-player stat tables and zero every stat column in one
    /// transaction. Returns false (and changes nothing) if the player does
    /// not exist.
    pub async fn reset_player_stats(&self, id: i64) -> Result<bool, AdminError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AdminError::query("BEGIN", e))?;

        for table in PLAYER_STAT_TABLES {
            let statement = format!("DELETE FROM {table} WHERE pid = ?");
            sqlx::query(&statement)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AdminError::query(statement.as_str(), e))?;
        }

        let zeroes: Vec<(&str, SqlValue)> = STAT_COLUMNS
            .iter()
            .map(|c| (*c, SqlValue::Integer(0)))
            .collect();
        let affected = update_rows(&mut *tx, "player", &zeroes, &[("id", id.into())]).await?;
        if affected == 0 {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }

        tx.commit()
            .await
            .map_err(|e| AdminError::query("COMMIT", e))?;
        Ok(true)
    }

    pub async fn delete_player_awards(&self, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM player_award WHERE pid = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_player_unlocks(&self, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM player_unlock WHERE pid = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ── Player breakdowns ─────────────────────────────────────────────

    /// Rows of one breakdown table (see [`PLAYER_BREAKDOWN_TABLES`]) for a player.
    pub async fn get_player_breakdown(
        &self,
        table: &str,
        pid: i64,
    ) -> Result<Vec<PlayerStatRow>, AdminError> {
        let statement = format!(
            "SELECT id, time, kills, deaths FROM {} WHERE pid = ? ORDER BY id",
            Ident::new(table)?.quoted()
        );
        sqlx::query_as::<_, PlayerStatRow>(&statement)
            .bind(pid)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AdminError::query(statement.clone(), e))
    }

    pub async fn get_player_awards(&self, pid: i64) -> Result<Vec<PlayerAward>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PlayerAward>(
            "SELECT id, roundid, level, earned FROM player_award WHERE pid = ? ORDER BY earned, id",
        )
        .bind(pid)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ── Round history ─────────────────────────────────────────────────

    pub async fn get_round_detail(
        &self,
        pid: i64,
        roundid: i64,
    ) -> Result<Option<RoundDetail>, sqlx::Error> {
        let row = sqlx::query_as::<_, RoundDetail>(
            r#"
            SELECT ph.pid, ph.roundid, ph.team, ph.score, ph.kills, ph.deaths, ph.time, ph.rank,
                   p.name, h.timestamp, h.tickets1, h.tickets2,
                   mi.name AS mapname, s.name AS server, s.ip AS ip, s.port AS port,
                   h.pids1_end + h.pids2_end AS player_count, a.name AS team_name
            FROM player_history AS ph
              LEFT JOIN player AS p ON ph.pid = p.id
              LEFT JOIN round_history AS h ON ph.roundid = h.id
              LEFT JOIN mapinfo AS mi ON h.mapid = mi.id
              LEFT JOIN server AS s ON h.serverid = s.id
              LEFT JOIN army AS a ON ph.team = a.id
            WHERE ph.pid = ? AND ph.roundid = ?
        "#,
        )
        .bind(pid)
        .bind(roundid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// `(next, previous)` round ids the player took part in, 0 when none.
    pub async fn adjacent_rounds(&self, pid: i64, roundid: i64) -> Result<(i64, i64), sqlx::Error> {
        let next: Option<i64> = sqlx::query_scalar(
            "SELECT MIN(roundid) FROM player_history WHERE pid = ? AND roundid > ?",
        )
        .bind(pid)
        .bind(roundid)
        .fetch_one(&self.pool)
        .await?;
        let prev: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(roundid) FROM player_history WHERE pid = ? AND roundid < ?",
        )
        .bind(pid)
        .bind(roundid)
        .fetch_one(&self.pool)
        .await?;
        Ok((next.unwrap_or(0), prev.unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    fn new_player(name: &str, password: &str) -> NewPlayer {
        NewPlayer {
            name: name.to_string(),
            password: password.to_string(),
            rank: 3,
            email: format!("{name}@example.com"),
            country: "DE".to_string(),
        }
    }

    async fn seed_round(db: &Database, pid: i64, roundid: i64) {
        sqlx::query("INSERT OR IGNORE INTO mapinfo (id, name) VALUES (1, 'strike_at_karkand')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT OR IGNORE INTO server (id, name, ip, port) VALUES (1, 'Main', '10.0.0.1', 16567)")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT OR IGNORE INTO army (id, name) VALUES (0, 'USMC')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO round_history (id, mapid, serverid, timestamp, pids1_end, pids2_end) VALUES (?, 1, 1, 1488726240, 12, 14)",
        )
        .bind(roundid)
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO player_history (pid, roundid, team, score, kills, deaths, time) VALUES (?, ?, 0, 50, 10, 4, 1800)",
        )
        .bind(pid)
        .bind(roundid)
        .execute(db.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_create_and_get_player() {
        let db = test_db().await;

        let id = db.create_player(&new_player("Alpha", "hash")).await.unwrap();
        let player = db.get_player(id).await.unwrap().unwrap();
        assert_eq!(player.name, "Alpha");
        assert_eq!(player.rank, 3);
        assert_eq!(player.country, "DE");
        assert_eq!(player.permban, 0);

        assert!(db.get_player(999).await.unwrap().is_none());

        let err = db.create_player(&new_player("Alpha", "x")).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_update_player() {
        let db = test_db().await;
        let id = db.create_player(&new_player("Bravo", "hash")).await.unwrap();

        let updated = db
            .update_player(id, &[("name", "Bravo2".into()), ("rank", 7.into())])
            .await
            .unwrap();
        assert!(updated);
        let player = db.get_player(id).await.unwrap().unwrap();
        assert_eq!(player.name, "Bravo2");
        assert_eq!(player.rank, 7);

        assert!(!db.update_player(999, &[("rank", 1.into())]).await.unwrap());
    }

    #[tokio::test]
    async fn test_ban_and_unban() {
        let db = test_db().await;
        let id = db.create_player(&new_player("Charlie", "hash")).await.unwrap();

        assert!(db.set_player_ban(id, true, 1_700_000_000).await.unwrap());
        assert_eq!(db.get_player(id).await.unwrap().unwrap().permban, 1);
        let bantime: i64 = sqlx::query_scalar("SELECT bantime FROM player WHERE id = ?")
            .bind(id)
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(bantime, 1_700_000_000);

        assert!(db.set_player_ban(id, false, 0).await.unwrap());
        assert_eq!(db.get_player(id).await.unwrap().unwrap().permban, 0);

        assert!(!db.set_player_ban(999, true, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_player_and_bots() {
        let db = test_db().await;
        let human = db.create_player(&new_player("Human", "hash")).await.unwrap();
        db.create_player(&new_player("Bot1", "")).await.unwrap();
        db.create_player(&new_player("Bot2", "")).await.unwrap();

        assert_eq!(db.delete_bots().await.unwrap(), 2);
        assert!(db.delete_player(human).await.unwrap());
        assert!(!db.delete_player(human).await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_player_stats() {
        let db = test_db().await;
        let id = db.create_player(&new_player("Delta", "hash")).await.unwrap();
        sqlx::query("UPDATE player SET score = 900, kills = 40, rank = 5 WHERE id = ?")
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap();
        for table in PLAYER_STAT_TABLES {
            sqlx::query(&format!("INSERT INTO {table} (pid, id) VALUES (?, 1)"))
                .bind(id)
                .execute(db.pool())
                .await
                .unwrap();
        }

        assert!(db.reset_player_stats(id).await.unwrap());

        let player = db.get_player(id).await.unwrap().unwrap();
        assert_eq!(player.score, 0);
        assert_eq!(player.kills, 0);
        assert_eq!(player.rank, 0);
        assert_eq!(player.name, "Delta");
        for table in PLAYER_STAT_TABLES {
            let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE pid = ?"))
                .bind(id)
                .fetch_one(db.pool())
                .await
                .unwrap();
            assert_eq!(n, 0, "{table} should be empty");
        }

        assert!(!db.reset_player_stats(999).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_awards_and_unlocks() {
        let db = test_db().await;
        let id = db.create_player(&new_player("Echo", "hash")).await.unwrap();
        sqlx::query("INSERT INTO player_award (pid, id) VALUES (?, 1), (?, 2)")
            .bind(id)
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO player_unlock (pid, id) VALUES (?, 11)")
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(db.delete_player_awards(id).await.unwrap(), 2);
        assert_eq!(db.delete_player_unlocks(id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_round_detail_and_navigation() {
        let db = test_db().await;
        let id = db.create_player(&new_player("Foxtrot", "hash")).await.unwrap();
        seed_round(&db, id, 10).await;
        seed_round(&db, id, 20).await;
        seed_round(&db, id, 30).await;

        let round = db.get_round_detail(id, 20).await.unwrap().unwrap();
        assert_eq!(round.name.as_deref(), Some("Foxtrot"));
        assert_eq!(round.mapname.as_deref(), Some("strike_at_karkand"));
        assert_eq!(round.server.as_deref(), Some("Main"));
        assert_eq!(round.team_name.as_deref(), Some("USMC"));
        assert_eq!(round.player_count, Some(26));
        assert_eq!(round.kills, 10);

        assert_eq!(db.adjacent_rounds(id, 20).await.unwrap(), (30, 10));
        assert_eq!(db.adjacent_rounds(id, 10).await.unwrap(), (20, 0));
        assert_eq!(db.adjacent_rounds(id, 30).await.unwrap(), (0, 20));

        assert!(db.get_round_detail(id, 99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_player_breakdowns() {
        let db = test_db().await;
        let id = db.create_player(&new_player("Golf", "hash")).await.unwrap();
        let other = db.create_player(&new_player("Hotel", "hash")).await.unwrap();
        for (pid, army) in [(id, 2), (id, 0), (other, 1)] {
            sqlx::query("INSERT INTO player_army (pid, id, time, kills, deaths) VALUES (?, ?, 600, 7, 3)")
                .bind(pid)
                .bind(army)
                .execute(db.pool())
                .await
                .unwrap();
        }
        sqlx::query("INSERT INTO player_award (pid, id, roundid, level, earned) VALUES (?, 1031406, 5, 1, 1488726240)")
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap();

        let armies = db.get_player_breakdown("player_army", id).await.unwrap();
        let ids: Vec<i64> = armies.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(armies[0].kills, 7);
        assert!(db.get_player_breakdown("player_kit", id).await.unwrap().is_empty());

        let awards = db.get_player_awards(id).await.unwrap();
        assert_eq!(awards.len(), 1);
        assert_eq!(awards[0].id, 1031406);
        assert!(db.get_player_awards(other).await.unwrap().is_empty());

        let err = db.get_player_breakdown("player_army; --", id).await.unwrap_err();
        assert!(matches!(err, AdminError::InvalidIdentifier(_)));
    }
}
