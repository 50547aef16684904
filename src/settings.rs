//! Runtime settings resolution.
//!
//! Each setting is looked up in order: command-line flag, environment
//! variable, value persisted in `config.redb`, built-in default.

use std::{net::SocketAddr, path::PathBuf};

use crate::{
    config_db::ConfigDb,
    data_dir::DataDir,
    error::{Error, Result},
};

pub const IMAGE_BASE_URL: &str = "image_base_url";
pub const BIND: &str = "bind";
pub const PERSONS_PATH: &str = "persons_path";
pub const PAGES_DIR: &str = "pages_dir";

/// Keys accepted by `pagecard config set`.
pub const KNOWN_KEYS: &[&str] =
    &[IMAGE_BASE_URL, BIND, PERSONS_PATH, PAGES_DIR];

pub const DEFAULT_IMAGE_BASE_URL: &str = "/pages";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub image_base_url: Option<String>,
    pub bind: Option<String>,
    pub persons: Option<PathBuf>,
    pub pages_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Prefix for page image URLs handed to clients.
    pub image_base_url: String,
    pub bind: SocketAddr,
    /// Person snapshot loaded at startup.
    pub persons_path: PathBuf,
    /// Local page images served under `/pages`, if any.
    pub pages_dir: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(
        overrides: &Overrides,
        config_db: &ConfigDb,
        data_dir: &DataDir,
    ) -> Result<Self> {
        Self::resolve_with(overrides, config_db, data_dir, |name| {
            std::env::var(name).ok()
        })
    }

    /// Like [`Settings::resolve`], reading environment variables through
    /// `env` instead of the process environment.
    pub fn resolve_with(
        overrides: &Overrides,
        config_db: &ConfigDb,
        data_dir: &DataDir,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let image_base_url = pick(
            overrides.image_base_url.clone(),
            env("PAGECARD_IMAGE_BASE_URL"),
            config_db,
            IMAGE_BASE_URL,
        )?
        .unwrap_or_else(|| DEFAULT_IMAGE_BASE_URL.to_string());

        let bind_raw = pick(
            overrides.bind.clone(),
            env("PAGECARD_BIND"),
            config_db,
            BIND,
        )?
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw.parse().map_err(|e| {
            Error::Config(format!("invalid bind address '{bind_raw}': {e}"))
        })?;

        let persons_path = pick(
            overrides.persons.as_ref().map(|p| p.display().to_string()),
            env("PAGECARD_PERSONS"),
            config_db,
            PERSONS_PATH,
        )?
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.persons_snapshot());

        let pages_dir = pick(
            overrides.pages_dir.as_ref().map(|p| p.display().to_string()),
            env("PAGECARD_PAGES_DIR"),
            config_db,
            PAGES_DIR,
        )?
        .map(PathBuf::from);

        Ok(Self {
            image_base_url,
            bind,
            persons_path,
            pages_dir,
        })
    }

    /// True when page URLs point back at this server's `/pages` route but
    /// there is no `pages_dir` to answer them from.
    pub fn page_images_unserved(&self) -> bool {
        self.pages_dir.is_none() && !self.image_base_url.contains("://")
    }
}

/// Reject keys `pagecard config set` does not know about.
pub fn validate_key(key: &str) -> Result<()> {
    if KNOWN_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "unknown setting '{key}' (expected one of: {})",
            KNOWN_KEYS.join(", ")
        )))
    }
}

fn pick(
    flag: Option<String>,
    env: Option<String>,
    config_db: &ConfigDb,
    key: &str,
) -> Result<Option<String>> {
    if let Some(value) = flag.or(env).filter(|v| !v.is_empty()) {
        return Ok(Some(value));
    }
    config_db.get_setting(key)
}
