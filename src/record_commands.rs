use crate::bracket::Side;
use crate::error::RecordsError;
use crate::records::RecordBook;
use crate::tournament::{parse_score, Tournament};
use crate::types::*;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{error, info};

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CommandError {
    pub status: StatusCode,
    pub message: String,
}

impl From<RecordsError> for CommandError {
    fn from(err: RecordsError) -> Self {
        let status = if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::BAD_REQUEST
        };
        CommandError { status, message: err.to_string() }
    }
}

/// Malformed or missing JSON bodies are client errors like any other.
impl From<JsonRejection> for CommandError {
    fn from(rejection: JsonRejection) -> Self {
        CommandError {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for CommandError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type CommandResult<T> = Result<Json<T>, CommandError>;

// ── Helpers ─────────────────────────────────────────────────────────────

type JsonBody<T> = Result<Json<T>, JsonRejection>;

/// Lock the record book and call `f` with it.
fn with_book<F, R>(state: &ServerState, f: F) -> Result<R, CommandError>
where
    F: FnOnce(&mut RecordBook) -> Result<R, CommandError>,
{
    let mut guard = state.book.lock().map_err(|e| {
        error!("record book lock poisoned: {e}");
        CommandError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "record book unavailable".to_string(),
        }
    })?;
    f(&mut *guard)
}

/// Run a mutation and queue the resulting snapshot while the lock is still
/// held, so the store sees snapshots in the order they were made.
fn mutate<F>(state: &ServerState, f: F) -> Result<Tournament, CommandError>
where
    F: FnOnce(&mut RecordBook) -> Result<Tournament, RecordsError>,
{
    with_book(state, |book| {
        let snapshot = f(book)?;
        state.writer.save(snapshot.clone());
        Ok(snapshot)
    })
}

/// Numbers pass through, numeric text is parsed, anything else clears the score.
pub fn score_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|score| score.is_finite()),
        Value::String(raw) => parse_score(raw),
        _ => None,
    }
}

// ── Handlers ────────────────────────────────────────────────────────────

pub async fn list_tournaments(State(state): State<ServerState>) -> CommandResult<Vec<TournamentSummary>> {
    with_book(&state, |book| Ok(book.list())).map(Json)
}

pub async fn create_tournament(
    State(state): State<ServerState>,
    body: JsonBody<CreateTournamentRequest>,
) -> Result<(StatusCode, Json<Tournament>), CommandError> {
    let Json(request) = body?;
    let created = mutate(&state, |book| book.create(request))?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_tournament(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> CommandResult<BracketView> {
    with_book(&state, |book| Ok(book.view(&id)?)).map(Json)
}

pub async fn delete_tournament(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<StatusCode, CommandError> {
    with_book(&state, |book| {
        let removed = book.delete(&id)?;
        state.writer.delete(removed.id);
        Ok(())
    })?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_settings(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    body: JsonBody<UpdateSettingsRequest>,
) -> CommandResult<Tournament> {
    let Json(request) = body?;
    mutate(&state, |book| book.update_settings(&id, request)).map(Json)
}

pub async fn add_team(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    body: JsonBody<TeamRequest>,
) -> CommandResult<Tournament> {
    let Json(request) = body?;
    mutate(&state, |book| book.add_team(&id, &request.name)).map(Json)
}

pub async fn rename_team(
    State(state): State<ServerState>,
    Path((id, name)): Path<(String, String)>,
    body: JsonBody<TeamRequest>,
) -> CommandResult<Tournament> {
    let Json(request) = body?;
    mutate(&state, |book| book.rename_team(&id, &name, &request.name)).map(Json)
}

pub async fn remove_team(
    State(state): State<ServerState>,
    Path((id, name)): Path<(String, String)>,
) -> CommandResult<Tournament> {
    mutate(&state, |book| book.remove_team(&id, &name)).map(Json)
}

pub async fn build_bracket(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> CommandResult<Tournament> {
    mutate(&state, |book| book.build_bracket(&id)).map(Json)
}

pub async fn clear_bracket(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> CommandResult<Tournament> {
    mutate(&state, |book| book.clear_bracket(&id)).map(Json)
}

pub async fn record_score(
    State(state): State<ServerState>,
    Path((id, match_id)): Path<(String, u64)>,
    body: JsonBody<ScoreRequest>,
) -> CommandResult<BracketView> {
    let Json(request) = body?;
    let value = score_from_value(&request.value);
    let side: Side = request.side;
    let snapshot = mutate(&state, |book| book.record_score(&id, match_id, side, value))?;
    info!(tournament = %id, match_id, ?side, ?value, "score recorded");
    Ok(Json(BracketView::from(&snapshot)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_from_value() {
        assert_eq!(score_from_value(&json!(3)), Some(3.0));
        assert_eq!(score_from_value(&json!(2.5)), Some(2.5));
        assert_eq!(score_from_value(&json!(" 4 ")), Some(4.0));
        assert_eq!(score_from_value(&json!("")), None);
        assert_eq!(score_from_value(&json!("x")), None);
        assert_eq!(score_from_value(&Value::Null), None);
        assert_eq!(score_from_value(&json!(true)), None);
    }

    #[test]
    fn test_error_status_mapping() {
        let not_found = CommandError::from(RecordsError::TournamentNotFound("t".to_string()));
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        let bad = CommandError::from(RecordsError::InsufficientTeams { count: 1 });
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, RecordsError::InsufficientTeams { count: 1 }.to_string());
    }
}
