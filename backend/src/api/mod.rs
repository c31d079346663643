// HTTP API routes (player tables, bot import, player administration).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        multipart::MultipartRejection, DefaultBodyLimit, Form, FromRequest, Multipart, Path,
        Request, State,
    },
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::datatables::{fetch_data, format, ColumnSpec, Condition, DataRequest};
use crate::db::{Database, NewPlayer, PLAYER_BREAKDOWN_TABLES};
use crate::error::AdminError;
use crate::import::{import_names, read_all_lines, save_upload, NamePattern};
use crate::metrics;
use crate::password::hash_password;
use crate::player::{is_valid_rank, rank_name, sanitize_name, BOT_COUNTRY, BOT_EMAIL};
use crate::sql::SqlValue;

/// Multipart field carrying the uploaded bot-names file.
pub const UPLOAD_FIELD: &str = "botNamesFile";

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub upload_dir: PathBuf,
    pub name_pattern: NamePattern,
}

// ── Form extractor ───────────────────────────────────────────────────

/// Decoded form fields. Rejects with a JSON envelope instead of plain text.
#[derive(Debug, Clone)]
pub struct FormParams(pub HashMap<String, String>);

impl<S> FromRequest<S> for FormParams
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Form::<HashMap<String, String>>::from_request(req, state).await {
            Ok(Form(params)) => Ok(FormParams(params)),
            Err(rejection) => Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": rejection.body_text() })),
            )),
        }
    }
}

// ── Error helpers ────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

fn failure(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "success": false, "error": msg }))).into_response()
}

fn error_status(e: &AdminError) -> StatusCode {
    match e {
        AdminError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn log_error(e: &AdminError) {
    match e {
        AdminError::Validation(msg) => tracing::debug!("Rejected request: {msg}"),
        AdminError::Query { statement, .. } => {
            tracing::error!(statement = %statement, "Database error: {e}")
        }
        _ => tracing::error!("Request failed: {e}"),
    }
}

/// `{error}` envelope used by the table endpoints.
fn table_error(e: AdminError) -> Response {
    log_error(&e);
    json_error(error_status(&e), &e.to_string()).into_response()
}

/// `{success: false, error}` envelope used by every other endpoint.
fn admin_failure(e: AdminError) -> Response {
    log_error(&e);
    failure(error_status(&e), &e.to_string())
}

fn success(message: impl Into<Value>) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": message.into() })),
    )
        .into_response()
}

// ── Parameter helpers ────────────────────────────────────────────────

fn player_id(params: &HashMap<String, String>) -> Result<i64, AdminError> {
    let raw = params
        .get("playerId")
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AdminError::validation("No Player ID Specified!"))?;
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AdminError::validation(format!("Invalid Player ID: {raw}"))),
    }
}

fn required<'a>(params: &'a HashMap<String, String>, key: &str) -> Result<&'a str, AdminError> {
    params
        .get(key)
        .map(|v| v.as_str())
        .ok_or_else(|| AdminError::validation(format!("Missing field: {key}")))
}

fn parse_rank(raw: &str) -> Result<i64, AdminError> {
    match raw.trim().parse::<i64>() {
        Ok(rank) if is_valid_rank(rank) => Ok(rank),
        _ => Err(AdminError::validation(format!("Invalid rank: {raw}"))),
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        // Tables
        .route("/api/players/list", post(list_players))
        .route("/api/players/history", post(list_player_history))
        // Bulk import
        .route(
            "/api/players/import",
            post(import_bot_names).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        // Administration
        .route("/api/players/add", post(save_player))
        .route("/api/players/authorize", post(authorize_player))
        .route("/api/players/delete", post(delete_player))
        .route("/api/players/reset", post(reset_player))
        // Detail
        .route("/api/players/{id}", get(get_player))
        .route("/api/players/{id}/history/{round_id}", get(get_round))
        .layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let endpoint = metrics::normalize_path(req.uri().path());

    let response = next.run(req).await;

    metrics::API_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), endpoint.as_str(), response.status().as_str()])
        .inc();
    metrics::API_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint.as_str()])
        .observe(started.elapsed().as_secs_f64());
    response
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "statsadmin-backend" }))
}

async fn get_metrics() -> impl IntoResponse {
    (
        [("content-type", "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

// ── Table handlers ───────────────────────────────────────────────────

fn player_list_columns() -> Vec<ColumnSpec<'static>> {
    vec![
        ColumnSpec::new("id", "id"),
        ColumnSpec::new("name", "name").formatted(format::text),
        ColumnSpec::new("rank", "rank").formatted(format::rank_image),
        ColumnSpec::new("score", "score").formatted(format::number),
        ColumnSpec::new("country", "country").formatted(format::text),
        ColumnSpec::new("joined", "joined").formatted(format::date),
        ColumnSpec::new("lastonline", "online").formatted(format::time_since),
        ColumnSpec::new("clantag", "clan").formatted(format::text),
        ColumnSpec::new("permban", "permban").formatted(format::ban_flag),
        ColumnSpec::new("kicked", "actions")
            .formatted(format::player_actions)
            .not_searchable(),
    ]
}

fn player_history_columns() -> Vec<ColumnSpec<'static>> {
    vec![
        ColumnSpec::new("pid", "id"),
        ColumnSpec::new("roundid", "rid"),
        ColumnSpec::new("name", "server").formatted(format::text),
        ColumnSpec::new("mapname", "map").formatted(format::text),
        ColumnSpec::new("score", "score").formatted(format::number),
        ColumnSpec::new("kills", "kills").formatted(format::number),
        ColumnSpec::new("deaths", "deaths").formatted(format::number),
        ColumnSpec::new("time", "time").formatted(format::duration),
        ColumnSpec::new("team", "team").formatted(format::army_image),
        ColumnSpec::new("timestamp", "timestamp").formatted(format::long_timestamp),
        ColumnSpec::new("rank", "actions")
            .formatted(format::round_actions)
            .not_searchable(),
    ]
}

async fn list_players(
    State(state): State<AppState>,
    FormParams(params): FormParams,
) -> impl IntoResponse {
    let request = match DataRequest::from_params(&params) {
        Ok(r) => r,
        Err(e) => return table_error(e),
    };
    let show_bots = params
        .get("showBots")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(0)
        != 0;
    // Bots are the accounts without a password.
    let base_filter = if show_bots {
        Vec::new()
    } else {
        vec![Condition::ne("password", "")]
    };

    match fetch_data(
        state.db.pool(),
        &request,
        "player",
        "id",
        &player_list_columns(),
        &base_filter,
    )
    .await
    {
        Ok(page) => (StatusCode::OK, Json(json!(page))).into_response(),
        Err(e) => table_error(e),
    }
}

async fn list_player_history(
    State(state): State<AppState>,
    FormParams(params): FormParams,
) -> impl IntoResponse {
    let pid = match player_id(&params) {
        Ok(id) => id,
        Err(e) => return table_error(e),
    };
    let request = match DataRequest::from_params(&params) {
        Ok(r) => r,
        Err(e) => return table_error(e),
    };

    match fetch_data(
        state.db.pool(),
        &request,
        "player_history_view",
        // pid is pinned by the filter; roundid keeps pages stable
        "roundid",
        &player_history_columns(),
        &[Condition::eq("pid", pid)],
    )
    .await
    {
        Ok(page) => (StatusCode::OK, Json(json!(page))).into_response(),
        Err(e) => table_error(e),
    }
}

// ── Bulk import ──────────────────────────────────────────────────────

async fn import_bot_names(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> impl IntoResponse {
    let Ok(mut multipart) = multipart else {
        return failure(StatusCode::BAD_REQUEST, "No file received.");
    };

    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(UPLOAD_FIELD) => match field.bytes().await {
                Ok(bytes) => {
                    upload = Some(bytes);
                    break;
                }
                Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                    return failure(StatusCode::PAYLOAD_TOO_LARGE, "Exceeded filesize limit.");
                }
                Err(e) => return failure(StatusCode::BAD_REQUEST, &e.body_text()),
            },
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return failure(StatusCode::PAYLOAD_TOO_LARGE, "Exceeded filesize limit.");
            }
            Err(e) => return failure(StatusCode::BAD_REQUEST, &e.body_text()),
        }
    }
    let Some(upload) = upload else {
        return failure(StatusCode::BAD_REQUEST, "No file received.");
    };

    // The file must be readable before any transaction is opened.
    let path = match save_upload(&state.upload_dir, &upload).await {
        Ok(p) => p,
        Err(e) => return admin_failure(e),
    };
    let lines = read_all_lines(&path).await;
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!(path = %path.display(), "Failed to remove uploaded file: {e}");
    }
    let lines = match lines {
        Ok(lines) => lines,
        Err(e) => return admin_failure(e),
    };

    let static_fields = [
        ("country", SqlValue::from(BOT_COUNTRY)),
        ("email", SqlValue::from(BOT_EMAIL)),
        ("password", SqlValue::from("")),
    ];
    match import_names(
        state.db.pool(),
        &lines,
        &state.name_pattern,
        "player",
        "name",
        &static_fields,
    )
    .await
    {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "error": format!("File Received OK. Added {} Bots", result.imported_count),
                "imported": result.imported_count,
                "skipped": result.skipped_count,
                "errors": result.errors,
            })),
        )
            .into_response(),
        Err(e) => admin_failure(e),
    }
}

// ── Player administration ────────────────────────────────────────────

async fn reset_player(
    State(state): State<AppState>,
    FormParams(params): FormParams,
) -> impl IntoResponse {
    let Some(action @ ("stats" | "awards" | "unlocks")) = params.get("action").map(String::as_str)
    else {
        return failure(StatusCode::BAD_REQUEST, "Invalid Action");
    };
    let id = match player_id(&params) {
        Ok(id) => id,
        Err(e) => return admin_failure(e),
    };

    let result = match action {
        "stats" => state.db.reset_player_stats(id).await,
        "awards" => state.db.delete_player_awards(id).await.map(|_| true).map_err(AdminError::from),
        _ => state.db.delete_player_unlocks(id).await.map(|_| true).map_err(AdminError::from),
    };

    match result {
        Ok(false) => failure(StatusCode::NOT_FOUND, "Player not found"),
        Ok(true) => {
            metrics::PLAYER_MUTATIONS_TOTAL
                .with_label_values(&[&format!("reset_{action}")])
                .inc();
            tracing::info!(player_id = id, action, "player reset");
            success(id)
        }
        Err(e) => admin_failure(e),
    }
}

async fn authorize_player(
    State(state): State<AppState>,
    FormParams(params): FormParams,
) -> impl IntoResponse {
    let banned = match params.get("action").map(String::as_str) {
        Some("ban") => true,
        Some("unban") => false,
        _ => return failure(StatusCode::BAD_REQUEST, "Invalid Action"),
    };
    let id = match player_id(&params) {
        Ok(id) => id,
        Err(e) => return admin_failure(e),
    };
    let bantime = if banned { chrono::Utc::now().timestamp() } else { 0 };

    match state.db.set_player_ban(id, banned, bantime).await {
        Ok(true) => {
            let action = if banned { "ban" } else { "unban" };
            metrics::PLAYER_MUTATIONS_TOTAL
                .with_label_values(&[action])
                .inc();
            tracing::info!(player_id = id, action, "player ban state changed");
            success(id)
        }
        Ok(false) => failure(StatusCode::NOT_FOUND, "Player not found"),
        Err(e) => admin_failure(e.into()),
    }
}

async fn delete_player(
    State(state): State<AppState>,
    FormParams(params): FormParams,
) -> impl IntoResponse {
    match params.get("action").map(String::as_str) {
        Some("delete") => {
            let id = match player_id(&params) {
                Ok(id) => id,
                Err(e) => return admin_failure(e),
            };
            match state.db.delete_player(id).await {
                Ok(true) => {
                    metrics::PLAYER_MUTATIONS_TOTAL
                        .with_label_values(&["delete"])
                        .inc();
                    tracing::info!(player_id = id, "player deleted");
                    success(id)
                }
                Ok(false) => failure(StatusCode::NOT_FOUND, "Player not found"),
                Err(e) => admin_failure(e.into()),
            }
        }
        Some("deleteBots") => match state.db.delete_bots().await {
            Ok(count) => {
                metrics::PLAYER_MUTATIONS_TOTAL
                    .with_label_values(&["delete_bots"])
                    .inc();
                tracing::info!(count, "bots deleted");
                success(count)
            }
            Err(e) => admin_failure(e.into()),
        },
        _ => failure(StatusCode::BAD_REQUEST, "Invalid Action"),
    }
}

async fn save_player(
    State(state): State<AppState>,
    FormParams(params): FormParams,
) -> impl IntoResponse {
    let result = match params.get("action").map(String::as_str) {
        Some("add") => add_player(&state.db, &params).await,
        Some("edit") => edit_player(&state.db, &params).await,
        _ => return failure(StatusCode::BAD_REQUEST, "Invalid Action"),
    };
    match result {
        Ok(Some(body)) => (StatusCode::OK, Json(body)).into_response(),
        Ok(None) => failure(StatusCode::NOT_FOUND, "Player not found"),
        Err(e) if e.is_unique_violation() => {
            failure(StatusCode::CONFLICT, "A player with that name already exists")
        }
        Err(e) => admin_failure(e),
    }
}

fn player_name(params: &HashMap<String, String>) -> Result<String, AdminError> {
    let name = sanitize_name(required(params, "playerName")?);
    if name.is_empty() {
        return Err(AdminError::validation("Invalid player name"));
    }
    Ok(name)
}

async fn add_player(
    db: &Database,
    params: &HashMap<String, String>,
) -> Result<Option<Value>, AdminError> {
    let name = player_name(params)?;
    let password = required(params, "playerPassword")?.trim();
    if password.is_empty() {
        return Err(AdminError::validation("Password is required"));
    }
    let rank = parse_rank(required(params, "playerRank")?)?;
    let email = required(params, "playerEmail")?.trim().to_string();
    let country = required(params, "playerCountry")?.trim().to_string();
    let password = hash_password(password).map_err(AdminError::Password)?;

    let id = db
        .create_player(&NewPlayer {
            name,
            password,
            rank,
            email,
            country,
        })
        .await?;
    metrics::PLAYER_MUTATIONS_TOTAL
        .with_label_values(&["add"])
        .inc();
    tracing::info!(player_id = id, "player added");
    Ok(Some(json!({ "success": true, "mode": "add", "id": id })))
}

/// Returns `None` when no player has the given id.
async fn edit_player(
    db: &Database,
    params: &HashMap<String, String>,
) -> Result<Option<Value>, AdminError> {
    let id = player_id(params)?;
    let name = player_name(params)?;
    let rank = parse_rank(required(params, "playerRank")?)?;
    let country = required(params, "playerCountry")?.trim().to_string();

    let mut fields: Vec<(&str, SqlValue)> = vec![
        ("name", name.as_str().into()),
        ("country", country.as_str().into()),
        ("rank", rank.into()),
    ];

    // Blank password or email leaves the stored value alone.
    let password = params.get("playerPassword").map(|p| p.trim()).unwrap_or("");
    if !password.is_empty() {
        let hash = hash_password(password).map_err(AdminError::Password)?;
        fields.push(("password", hash.into()));
    }
    let email = params.get("playerEmail").map(|e| e.trim()).unwrap_or("");
    if !email.is_empty() {
        fields.push(("email", email.into()));
    }

    if !db.update_player(id, &fields).await? {
        return Ok(None);
    }
    metrics::PLAYER_MUTATIONS_TOTAL
        .with_label_values(&["edit"])
        .inc();
    tracing::info!(player_id = id, "player updated");
    Ok(Some(json!({
        "success": true,
        "mode": "update",
        "name": name,
        "rank": rank,
        "email": email,
        "iso": country,
        "rankName": rank_name(rank),
    })))
}

// ── Detail handlers ──────────────────────────────────────────────────

async fn get_player(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    if id <= 0 {
        return failure(StatusCode::BAD_REQUEST, "Invalid player id");
    }
    let player = match state.db.get_player(id).await {
        Ok(Some(player)) => player,
        Ok(None) => return failure(StatusCode::NOT_FOUND, "Player not found"),
        Err(e) => return admin_failure(e.into()),
    };
    let rank = rank_name(player.rank);
    let mut body = json!({ "success": true, "player": player, "rankName": rank });

    for (key, table) in PLAYER_BREAKDOWN_TABLES {
        match state.db.get_player_breakdown(table, id).await {
            Ok(rows) => body[key] = json!(rows),
            Err(e) => return admin_failure(e),
        }
    }
    match state.db.get_player_awards(id).await {
        Ok(awards) => body["awards"] = json!(awards),
        Err(e) => return admin_failure(e.into()),
    }

    (StatusCode::OK, Json(body)).into_response()
}

async fn get_round(
    State(state): State<AppState>,
    Path((id, round_id)): Path<(i64, i64)>,
) -> impl IntoResponse {
    if id <= 0 || round_id <= 0 {
        return failure(StatusCode::BAD_REQUEST, "Invalid player or round id");
    }
    let round = match state.db.get_round_detail(id, round_id).await {
        Ok(Some(round)) => round,
        Ok(None) => return failure(StatusCode::NOT_FOUND, "Round not found"),
        Err(e) => return admin_failure(e.into()),
    };
    match state.db.adjacent_rounds(id, round_id).await {
        Ok((next, prev)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "round": round,
                "nextRoundId": next,
                "prevRoundId": prev,
            })),
        )
            .into_response(),
        Err(e) => admin_failure(e.into()),
    }
}
