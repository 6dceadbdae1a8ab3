use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{errors::Error, Result};

const DEFAULT_CONFIG_FILE: &str = "bots.json";
const CUSTOM_CONFIG_FILE: &str = "bots.custom.json";
const DEFAULT_HISTORY_WINDOW: usize = 10;

/// One configured bot identity: credentials per platform plus its trigger
/// phrases and reply lines. A bot with both tokens runs one connection per
/// platform.
#[derive(Clone, Debug, Deserialize)]
pub struct BotOptions {
    #[serde(default)]
    pub telegram_token: Option<String>,
    #[serde(default)]
    pub discord_token: Option<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub replies: Vec<String>,
    /// Size of the recently-used-replies window.
    #[serde(default = "default_history")]
    pub history: usize,
}

fn default_history() -> usize {
    DEFAULT_HISTORY_WINDOW
}

impl BotOptions {
    pub fn telegram_token(&self) -> Option<&str> {
        non_blank(self.telegram_token.as_deref())
    }

    pub fn discord_token(&self) -> Option<&str> {
        non_blank(self.discord_token.as_deref())
    }
}

/// Typed configuration for the whole process: a map from bot name to its
/// options.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bots: BTreeMap<String, BotOptions>,
}

impl Config {
    /// Load configuration the way the process expects it at startup: `.env`
    /// first (never overriding real env), then the base file (`QUIP_CONFIG`,
    /// default `bots.json`), then the per-deployment `bots.custom.json`
    /// overlay, then env token overrides, then validation.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let base =
            PathBuf::from(env_str("QUIP_CONFIG").unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string()));
        let mut cfg = Self::from_files(&base, Some(Path::new(CUSTOM_CONFIG_FILE)))?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read the base file and overlay `custom` per-bot when it exists.
    pub fn from_files(base: &Path, custom: Option<&Path>) -> Result<Self> {
        let mut cfg = Self::read_file(base)?;
        if let Some(custom) = custom {
            if custom.exists() {
                let overlay = Self::read_file(custom)?;
                for (name, bot) in overlay.bots {
                    cfg.bots.insert(name, bot);
                }
            }
        }
        Ok(cfg)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid config {}: {e}", path.display())))
    }

    /// `QUIP_<NAME>_TELEGRAM_TOKEN` / `QUIP_<NAME>_DISCORD_TOKEN` take
    /// precedence over file values, so deployments can keep credentials out
    /// of the config files entirely.
    fn apply_env_overrides(&mut self) {
        for (name, bot) in self.bots.iter_mut() {
            let prefix = env_prefix(name);
            if let Some(token) = env_str(&format!("{prefix}_TELEGRAM_TOKEN")) {
                bot.telegram_token = Some(token);
            }
            if let Some(token) = env_str(&format!("{prefix}_DISCORD_TOKEN")) {
                bot.discord_token = Some(token);
            }
        }
    }

    /// Fail fast on configurations the runtime would otherwise only reject
    /// at first use.
    pub fn validate(&self) -> Result<()> {
        if self.bots.is_empty() {
            return Err(Error::Config("no bots configured".to_string()));
        }
        for (name, bot) in &self.bots {
            if bot.replies.is_empty() {
                return Err(Error::Config(format!(
                    "bot {name}: at least one reply is required"
                )));
            }
            if bot.telegram_token().is_none() && bot.discord_token().is_none() {
                return Err(Error::Config(format!(
                    "bot {name}: a telegram or discord token is required"
                )));
            }
        }
        Ok(())
    }
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

fn env_prefix(bot_name: &str) -> String {
    let upper: String = bot_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("QUIP_{upper}")
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|v| {
        let v = v.trim().to_string();
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    })
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let key = k.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue;
        }

        let mut val = v.trim();
        let quoted = val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')));
        if quoted {
            val = &val[1..val.len() - 1];
        }

        env::set_var(key, val);
    }
}
