use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poller::BackoffSettings;

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Persisted settings. Poll timings are stored in milliseconds; unset ones fall
/// back to the poller defaults.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    pub token: Option<String>,
    #[serde(default)]
    pub token_source: Option<TokenSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_jitter_ms: Option<u64>,
    #[serde(skip)]
    pub timeout_secs: u64,
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    Env,
    Config,
    Cli,
    #[default]
    None,
}

impl TokenSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSource::Env => "env",
            TokenSource::Config => "config",
            TokenSource::Cli => "cli",
            TokenSource::None => "none",
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let data = fs::read_to_string(path).context("read config file")?;
            let mut cfg: Config = serde_yaml::from_str(&data).context("parse config yaml")?;
            if cfg.token.as_deref().is_some_and(|t| !t.is_empty()) {
                cfg.token_source = Some(TokenSource::Config);
            }
            cfg
        } else {
            Config::default()
        };
        cfg.timeout_secs = DEFAULT_TIMEOUT_SECS;
        cfg.path = Some(path.to_path_buf());
        Ok(cfg)
    }

    pub fn save(&self) -> Result<()> {
        let path = self.path()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("create config dir")?;
        }
        let data = serde_yaml::to_string(&self).context("serialize config")?;
        let mut f = fs::File::create(&path).context("create config file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = f.metadata()?.permissions();
            perms.set_mode(0o600);
            f.set_permissions(perms)?;
        }
        f.write_all(data.as_bytes()).context("write config file")?;
        Ok(())
    }

    pub fn path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(p) => Ok(p.clone()),
            None => Self::config_path(),
        }
    }

    /// `REPOLL_CONFIG` wins over the per-user config dir.
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(p) = std::env::var("REPOLL_CONFIG") {
            if !p.is_empty() {
                return Ok(PathBuf::from(p));
            }
        }
        let proj = ProjectDirs::from("", "", "repoll").context("resolve config dir")?;
        Ok(proj.config_dir().join("config.yaml"))
    }

    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("REPOLL_TOKEN") {
            if !v.is_empty() {
                self.token = Some(v);
                self.token_source = Some(TokenSource::Env);
            }
        }
    }

    pub fn apply_cli(&mut self, cli: &crate::cli::Cli) {
        self.timeout_secs = cli.timeout;
        if let Some(token) = cli.token.clone() {
            self.token = Some(token);
            self.token_source = Some(TokenSource::Cli);
        }
        if let crate::cli::Commands::Watch(w) = &cli.command {
            self.initial_delay_ms = w.initial_delay_ms.or(self.initial_delay_ms);
            self.max_delay_ms = w.max_delay_ms.or(self.max_delay_ms);
            self.max_duration_ms = w.max_duration_ms.or(self.max_duration_ms);
            self.max_jitter_ms = w.max_jitter_ms.or(self.max_jitter_ms);
        }
    }

    pub fn backoff(&self) -> BackoffSettings {
        let d = BackoffSettings::default();
        BackoffSettings {
            initial_delay: self.initial_delay_ms.map(Duration::from_millis).unwrap_or(d.initial_delay),
            max_delay: self.max_delay_ms.map(Duration::from_millis).unwrap_or(d.max_delay),
            max_duration: self.max_duration_ms.map(Duration::from_millis).unwrap_or(d.max_duration),
            max_jitter: self.max_jitter_ms.map(Duration::from_millis).unwrap_or(d.max_jitter),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let ms = |v: &str| v.parse::<u64>().with_context(|| format!("{key} expects milliseconds"));
        match key {
            "token" => {
                self.token = Some(value.to_string());
                self.token_source = Some(TokenSource::Config);
            }
            "initial_delay_ms" => self.initial_delay_ms = Some(ms(value)?),
            "max_delay_ms" => self.max_delay_ms = Some(ms(value)?),
            "max_duration_ms" => self.max_duration_ms = Some(ms(value)?),
            "max_jitter_ms" => self.max_jitter_ms = Some(ms(value)?),
            _ => anyhow::bail!("unsupported key: {key}"),
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "token" => self.token.clone(),
            "initial_delay_ms" => self.initial_delay_ms.map(|v| v.to_string()),
            "max_delay_ms" => self.max_delay_ms.map(|v| v.to_string()),
            "max_duration_ms" => self.max_duration_ms.map(|v| v.to_string()),
            "max_jitter_ms" => self.max_jitter_ms.map(|v| v.to_string()),
            _ => None,
        }
    }

    pub fn token_source_with_presence(&self) -> (String, bool) {
        let present = self.token.as_ref().map(|s| !s.is_empty()).unwrap_or(false);
        let src = self.token_source.clone().unwrap_or_default();
        (src.as_str().to_string(), present)
    }
}
