use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

const DB_ENV_VAR: &str = "CONTRACTS_DB";
const DEFAULT_CANDIDATES: [&str; 2] = ["contracts.db", "data/contracts.db"];

/// Resolved startup configuration.
///
/// The database file is discovered in this order: explicit `CONTRACTS_DB`
/// override, the location saved by a previous launch, then the default
/// candidate paths next to the working directory. Whatever wins is saved
/// for the next launch. If nothing resolves, startup is fatal.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
}

impl Config {
    pub fn resolve() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let env_override = env::var(DB_ENV_VAR).ok().map(PathBuf::from);
        let saved = read_saved_path(&config_file());
        let candidates: Vec<PathBuf> = DEFAULT_CANDIDATES
            .iter()
            .map(|candidate| PathBuf::from(candidate))
            .collect();

        let db_path = resolve_db_path(env_override, saved.clone(), &candidates).ok_or_else(|| {
            AppError::Config(format!(
                "no database file found; set {DB_ENV_VAR} or place contracts.db next to the executable"
            ))
        })?;

        remember_path(&config_file(), saved.as_deref(), &db_path);
        Ok(Self { db_path })
    }
}

/// Pick the first existing path out of override, saved location and the
/// default candidates.
fn resolve_db_path(
    env_override: Option<PathBuf>,
    saved: Option<PathBuf>,
    candidates: &[PathBuf],
) -> Option<PathBuf> {
    env_override
        .into_iter()
        .chain(saved)
        .chain(candidates.iter().cloned())
        .find(|p| p.is_file())
}

fn config_file() -> PathBuf {
    let base = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("contracts").join("db_path")
}

fn read_saved_path(config_file: &Path) -> Option<PathBuf> {
    let saved = fs::read_to_string(config_file).ok()?;
    let saved = saved.trim();
    if saved.is_empty() {
        return None;
    }
    Some(PathBuf::from(saved))
}

/// Persist the winning path, but only when it differs from what the
/// saved file already holds.
fn remember_path(config_file: &Path, saved: Option<&Path>, db_path: &Path) {
    if saved == Some(db_path) {
        return;
    }
    save_path(config_file, db_path);
}

fn save_path(config_file: &Path, db_path: &Path) {
    let write = || -> std::io::Result<()> {
        if let Some(dir) = config_file.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(config_file, db_path.display().to_string())
    };
    if let Err(err) = write() {
        tracing::warn!("failed to remember database location: {err}");
    }
}
