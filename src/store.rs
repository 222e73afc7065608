use crate::config::{remote_store_enabled, tournaments_dir};
use crate::error::RecordsError;
use crate::tournament::Tournament;
use crate::types::*;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use std::{
  fs,
  path::{Path, PathBuf},
  process,
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
  thread::sleep,
  time::Duration,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

/// Where tournaments are kept between runs. Implementations own their retry
/// policy; callers treat every call as best-effort.
pub trait TournamentStore: Send + Sync {
  fn name(&self) -> &'static str;
  fn save(&self, tournament: &Tournament) -> Result<(), RecordsError>;
  fn load_all(&self) -> Result<Vec<Tournament>, RecordsError>;
  fn delete(&self, id: &str) -> Result<(), RecordsError>;
}

// ── Local JSON files ───────────────────────────────────────────────────

pub struct LocalStore {
  dir: PathBuf,
}

impl LocalStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    LocalStore { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn path_for(&self, id: &str) -> PathBuf {
    self.dir.join(format!("{}.json", file_stem(id)))
  }
}

impl TournamentStore for LocalStore {
  fn name(&self) -> &'static str {
    "local"
  }

  fn save(&self, tournament: &Tournament) -> Result<(), RecordsError> {
    fs::create_dir_all(&self.dir)
      .map_err(|e| RecordsError::Store(format!("create store dir {}: {e}", self.dir.display())))?;
    let path = self.path_for(&tournament.id);
    let payload = serde_json::to_string_pretty(tournament).map_err(|e| RecordsError::Store(e.to_string()))?;
    // Unique per write so concurrent saves never share a temp file
    static TMP_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("json.{}-{seq}.tmp", process::id()));
    fs::write(&tmp, payload).map_err(|e| RecordsError::Store(format!("write tournament {}: {e}", tmp.display())))?;
    fs::rename(&tmp, &path)
      .map_err(|e| RecordsError::Store(format!("replace tournament {}: {e}", path.display())))?;
    Ok(())
  }

  fn load_all(&self) -> Result<Vec<Tournament>, RecordsError> {
    if !self.dir.is_dir() {
      return Ok(Vec::new());
    }
    let entries = fs::read_dir(&self.dir)
      .map_err(|e| RecordsError::Store(format!("read store dir {}: {e}", self.dir.display())))?;
    let mut out = Vec::new();
    for entry in entries {
      let entry = entry.map_err(|e| RecordsError::Store(e.to_string()))?;
      let path = entry.path();
      if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
        continue;
      }
      let parsed = fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|data| serde_json::from_str::<Tournament>(&data).map_err(|e| e.to_string()));
      match parsed {
        Ok(tournament) => out.push(tournament),
        Err(err) => warn!("skipping unreadable tournament file {}: {err}", path.display()),
      }
    }
    out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(out)
  }

  fn delete(&self, id: &str) -> Result<(), RecordsError> {
    let path = self.path_for(id);
    if !path.is_file() {
      return Ok(());
    }
    fs::remove_file(&path).map_err(|e| RecordsError::Store(format!("remove tournament {}: {e}", path.display())))
  }
}

// ── Remote document store ──────────────────────────────────────────────

pub struct RemoteStore {
  base_url: String,
  token: Option<String>,
  client: Client,
}

impl RemoteStore {
  pub fn new(base_url: &str, token: &str) -> Self {
    let token = token.trim();
    RemoteStore {
      base_url: base_url.trim().trim_end_matches('/').to_string(),
      token: if token.is_empty() { None } else { Some(token.to_string()) },
      client: Client::new(),
    }
  }

  fn document_url(&self, id: &str) -> String {
    format!("{}/{TOURNAMENTS_DIR}/{}", self.base_url, file_stem(id))
  }

  fn collection_url(&self) -> String {
    format!("{}/{TOURNAMENTS_DIR}", self.base_url)
  }

  fn send<F>(&self, label: &str, build: F) -> Result<Response, RecordsError>
  where
    F: Fn(&Client) -> RequestBuilder,
  {
    let mut last_send_err = String::new();
    for attempt in 0..STORE_RETRY_ATTEMPTS {
      if attempt > 0 {
        sleep(Duration::from_millis(STORE_RETRY_BACKOFF_MS * u64::from(attempt)));
      }
      let mut request = build(&self.client).header("User-Agent", STORE_USER_AGENT);
      if let Some(token) = self.token.as_ref() {
        request = request.header("Authorization", format!("Bearer {token}"));
      }
      match request.send() {
        Ok(resp) => return Ok(resp),
        Err(e) => {
          last_send_err = format!("{label} failed (attempt {}): {e}", attempt + 1);
          debug!("{last_send_err}");
        }
      }
    }
    Err(RecordsError::Store(last_send_err))
  }
}

fn check_status(label: &str, resp: Response) -> Result<Response, RecordsError> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let body = resp.text().unwrap_or_default();
  Err(RecordsError::Store(format!("{label} error {status}: {body}")))
}

impl TournamentStore for RemoteStore {
  fn name(&self) -> &'static str {
    "remote"
  }

  fn save(&self, tournament: &Tournament) -> Result<(), RecordsError> {
    let url = self.document_url(&tournament.id);
    let resp = self.send("remote save", |client| client.put(&url).json(tournament))?;
    check_status("remote save", resp)?;
    Ok(())
  }

  fn load_all(&self) -> Result<Vec<Tournament>, RecordsError> {
    let url = self.collection_url();
    let resp = self.send("remote load", |client| client.get(&url))?;
    let resp = check_status("remote load", resp)?;
    resp
      .json::<Vec<Tournament>>()
      .map_err(|e| RecordsError::Store(format!("remote load parse failed: {e}")))
  }

  fn delete(&self, id: &str) -> Result<(), RecordsError> {
    let url = self.document_url(id);
    let resp = self.send("remote delete", |client| client.delete(&url))?;
    if resp.status() == StatusCode::NOT_FOUND {
      return Ok(());
    }
    check_status("remote delete", resp)?;
    Ok(())
  }
}

// ── Fallback chain ─────────────────────────────────────────────────────

pub struct FallbackStore<P, S> {
  primary: P,
  secondary: S,
}

impl<P: TournamentStore, S: TournamentStore> FallbackStore<P, S> {
  pub fn new(primary: P, secondary: S) -> Self {
    FallbackStore { primary, secondary }
  }
}

impl<P: TournamentStore, S: TournamentStore> TournamentStore for FallbackStore<P, S> {
  fn name(&self) -> &'static str {
    self.primary.name()
  }

  fn save(&self, tournament: &Tournament) -> Result<(), RecordsError> {
    match self.primary.save(tournament) {
      Ok(()) => Ok(()),
      Err(err) => {
        warn!(
          tournament = %tournament.id,
          "{} save failed, falling back to {}: {err}",
          self.primary.name(),
          self.secondary.name()
        );
        self.secondary.save(tournament)
      }
    }
  }

  fn load_all(&self) -> Result<Vec<Tournament>, RecordsError> {
    match self.primary.load_all() {
      Ok(list) => Ok(list),
      Err(err) => {
        warn!(
          "{} load failed, falling back to {}: {err}",
          self.primary.name(),
          self.secondary.name()
        );
        self.secondary.load_all()
      }
    }
  }

  /// Saves may have landed in either store, so deletes go to both.
  fn delete(&self, id: &str) -> Result<(), RecordsError> {
    let primary = self.primary.delete(id);
    let secondary = self.secondary.delete(id);
    match (primary, secondary) {
      (Err(err), Err(_)) => Err(err),
      (Err(err), Ok(())) => {
        warn!(tournament = %id, "{} delete failed: {err}", self.primary.name());
        Ok(())
      }
      _ => Ok(()),
    }
  }
}

pub fn build_store(config: &AppConfig) -> SharedStore {
  let local = LocalStore::new(tournaments_dir(config));
  if !remote_store_enabled(config) {
    return Arc::new(local);
  }
  let remote = RemoteStore::new(&config.remote_store_url, &config.remote_store_token);
  Arc::new(FallbackStore::new(remote, local))
}

// ── Ordered writer ─────────────────────────────────────────────────────

enum StoreJob {
  Save(Tournament),
  Delete(String),
  Flush(oneshot::Sender<()>),
}

/// Single queue in front of the store. Jobs run one at a time in the order
/// they were queued, so an older snapshot never lands after a newer one and a
/// delete is never undone by a save queued before it.
#[derive(Clone)]
pub struct StoreWriter {
  tx: mpsc::UnboundedSender<StoreJob>,
}

impl StoreWriter {
  /// Must be called inside a tokio runtime.
  pub fn spawn(store: SharedStore) -> Self {
    let (tx, mut rx) = mpsc::unbounded_channel::<StoreJob>();
    tokio::spawn(async move {
      while let Some(job) = rx.recv().await {
        let store = store.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || run_job(store.as_ref(), job)).await {
          error!("store job aborted: {e}");
        }
      }
      debug!("store writer stopped");
    });
    StoreWriter { tx }
  }

  pub fn save(&self, tournament: Tournament) {
    self.send(StoreJob::Save(tournament));
  }

  pub fn delete(&self, id: String) {
    self.send(StoreJob::Delete(id));
  }

  /// Resolves once every job queued before it has finished.
  pub async fn flush(&self) {
    let (done, wait) = oneshot::channel();
    self.send(StoreJob::Flush(done));
    wait.await.ok();
  }

  fn send(&self, job: StoreJob) {
    if self.tx.send(job).is_err() {
      error!("store writer is gone; change not persisted");
    }
  }
}

fn run_job(store: &dyn TournamentStore, job: StoreJob) {
  match job {
    StoreJob::Save(tournament) => match store.save(&tournament) {
      Ok(()) => debug!(tournament = %tournament.id, "saved to {} store", store.name()),
      Err(err) => error!(tournament = %tournament.id, "save failed: {err}"),
    },
    StoreJob::Delete(id) => {
      if let Err(err) = store.delete(&id) {
        error!(tournament = %id, "delete failed: {err}");
      }
    }
    StoreJob::Flush(done) => {
      done.send(()).ok();
    }
  }
}

fn file_stem(id: &str) -> String {
  let mut out = String::new();
  let mut last_dash = false;
  for ch in id.chars() {
    let lower = ch.to_ascii_lowercase();
    if lower.is_ascii_alphanumeric() {
      out.push(lower);
      last_dash = false;
    } else if !last_dash {
      out.push('-');
      last_dash = true;
    }
  }
  let trimmed = out.trim_matches('-');
  if trimmed.is_empty() {
    "tournament".to_string()
  } else {
    trimmed.to_string()
  }
}
