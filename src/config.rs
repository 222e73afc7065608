use crate::types::*;
use std::{
    env,
    fs,
    path::PathBuf,
};

pub fn repo_root() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn resolve_repo_path(raw: &str) -> PathBuf {
  let path = PathBuf::from(raw);
  if path.is_absolute() {
    path
  } else {
    repo_root().join(path)
  }
}

pub fn config_path() -> PathBuf {
  match env_default("PE_RECORDS_CONFIG_PATH") {
    Some(raw) => resolve_repo_path(&raw),
    None => repo_root().join("config.json"),
  }
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

fn fill_from_env(field: &mut String, key: &str) {
  if field.trim().is_empty() {
    if let Some(value) = env_default(key) {
      *field = value;
    }
  }
}

/// Fills every empty field from its environment variable; values already in
/// `config.json` win.
pub fn apply_env_defaults(mut config: AppConfig) -> AppConfig {
  fill_from_env(&mut config.data_dir, "PE_RECORDS_DATA_DIR");
  fill_from_env(&mut config.remote_store_url, "PE_RECORDS_REMOTE_URL");
  fill_from_env(&mut config.remote_store_token, "PE_RECORDS_REMOTE_TOKEN");
  fill_from_env(&mut config.http_addr, "PE_RECORDS_HTTP_ADDR");
  fill_from_env(&mut config.static_dir, "PE_RECORDS_STATIC_DIR");
  if config.data_dir.trim().is_empty() {
    config.data_dir = DEFAULT_DATA_DIR.to_string();
  }
  if config.http_addr.trim().is_empty() {
    config.http_addr = DEFAULT_HTTP_ADDR.to_string();
  }
  if config.static_dir.trim().is_empty() {
    config.static_dir = DEFAULT_STATIC_DIR.to_string();
  }
  config
}

pub fn load_config_inner() -> Result<AppConfig, String> {
  let path = config_path();
  if !path.is_file() {
    return Ok(apply_env_defaults(AppConfig::default()));
  }
  let data = fs::read_to_string(&path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  let config =
    serde_json::from_str::<AppConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))?;
  Ok(apply_env_defaults(config))
}

pub fn load_env_file() {
  let env_path = repo_root().join(".env");
  if !env_path.is_file() {
    return;
  }
  let contents = match fs::read_to_string(&env_path) {
    Ok(data) => data,
    Err(_) => return,
  };
  for line in contents.lines() {
    if let Some((key, value)) = parse_env_line(line) {
      if env::var_os(&key).is_none() {
        env::set_var(key, value);
      }
    }
  }
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let trimmed = line.trim();
  if trimmed.is_empty() || trimmed.starts_with('#') {
    return None;
  }
  let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
  let (key, raw_value) = trimmed.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let mut value = raw_value.trim();
  if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if let Some(idx) = value.find('#') {
    value = value[..idx].trim_end();
  }
  Some((key.to_string(), value.to_string()))
}

pub fn data_dir(config: &AppConfig) -> PathBuf {
  resolve_repo_path(config.data_dir.trim())
}

pub fn tournaments_dir(config: &AppConfig) -> PathBuf {
  data_dir(config).join(TOURNAMENTS_DIR)
}

pub fn logs_dir(config: &AppConfig) -> PathBuf {
  data_dir(config).join(LOGS_DIR)
}

pub fn static_dir(config: &AppConfig) -> PathBuf {
  resolve_repo_path(config.static_dir.trim())
}

pub fn remote_store_enabled(config: &AppConfig) -> bool {
  !config.remote_store_url.trim().is_empty()
}

pub fn log_env_warnings(config: &AppConfig) {
  let mut warnings = Vec::new();

  if !remote_store_enabled(config) {
    warnings.push("PE_RECORDS_REMOTE_URL not set and no remote store in config; tournaments are saved locally only");
  } else if config.remote_store_token.trim().is_empty() {
    warnings.push("PE_RECORDS_REMOTE_TOKEN not set; remote store requests are sent without authorization");
  }
  if !static_dir(config).is_dir() {
    warnings.push("Static renderer directory not found; only the JSON API will be served");
  }

  for msg in warnings {
    tracing::warn!("{}", msg);
  }
}
