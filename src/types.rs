use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::bracket::{Format, Placements, Seeding, Side, TeamStanding};
use crate::records::RecordBook;
use crate::store::{StoreWriter, TournamentStore};
use crate::tournament::Tournament;

// ── Constants ──────────────────────────────────────────────────────────

pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:17900";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_STATIC_DIR: &str = "public";
pub const TOURNAMENTS_DIR: &str = "tournaments";
pub const LOGS_DIR: &str = "logs";
pub const STORE_RETRY_ATTEMPTS: u32 = 3;
pub const STORE_RETRY_BACKOFF_MS: u64 = 500;
pub const STORE_USER_AGENT: &str = "pe-class-records";

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedRecordBook = Arc<Mutex<RecordBook>>;
pub type SharedStore = Arc<dyn TournamentStore>;

#[derive(Clone)]
pub struct ServerState {
    pub book: SharedRecordBook,
    pub writer: StoreWriter,
}

// ── Config types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub data_dir: String,
    pub remote_store_url: String,
    pub remote_store_token: String,
    pub http_addr: String,
    pub static_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
            remote_store_url: String::new(),
            remote_store_token: String::new(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            static_dir: DEFAULT_STATIC_DIR.to_string(),
        }
    }
}

// ── Request payloads ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTournamentRequest {
    pub name: String,
    #[serde(default)]
    pub format: Format,
    #[serde(default)]
    pub seeding: Seeding,
    #[serde(default)]
    pub teams: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub name: Option<String>,
    pub format: Option<Format>,
    pub seeding: Option<Seeding>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRequest {
    pub name: String,
}

/// `value` is whatever the score field held: a number, numeric text, or
/// empty/null to clear the score.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub side: Side,
    #[serde(default)]
    pub value: Value,
}

// ── Renderer payloads ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentSummary {
    pub id: String,
    pub name: String,
    pub team_count: usize,
    pub round_count: usize,
    pub format: Format,
    pub seeding: Seeding,
    pub champion: Option<String>,
    pub updated_at: String,
}

impl From<&Tournament> for TournamentSummary {
    fn from(tournament: &Tournament) -> Self {
        TournamentSummary {
            id: tournament.id.clone(),
            name: tournament.name.clone(),
            team_count: tournament.teams.len(),
            round_count: tournament.rounds.len(),
            format: tournament.format,
            seeding: tournament.seeding,
            champion: tournament.placements().gold,
            updated_at: tournament.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketView {
    pub tournament: Tournament,
    pub round_labels: Vec<String>,
    pub placements: Placements,
    pub team_states: Vec<TeamStanding>,
}

impl From<&Tournament> for BracketView {
    fn from(tournament: &Tournament) -> Self {
        BracketView {
            tournament: tournament.clone(),
            round_labels: tournament.round_labels(),
            placements: tournament.placements(),
            team_states: tournament.team_states(),
        }
    }
}
