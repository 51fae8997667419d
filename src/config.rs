use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use teloxide::types::ChatId;
use tracing::{info, warn};

use crate::triggers::TriggersConfig;

/// Runtime configuration. Built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub allowed_chats: HashSet<ChatId>,
    pub rate_seconds: f64,
    pub use_dictionary: bool,
    pub allowed_words: HashSet<String>,
    pub triggers: TriggersConfig,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    global: GlobalSection,
    #[serde(default)]
    triggers: TriggersConfig,
}

#[derive(Debug, Deserialize)]
struct GlobalSection {
    token: String,
    chats: ChatList,
    rate: f64,
    use_dictionary: Option<bool>,
    #[serde(default = "default_words_file")]
    words_file: PathBuf,
}

/// `chats` accepts either `"1,-2"` or `[1, -2]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatList {
    Ids(Vec<i64>),
    Csv(String),
}

impl ChatList {
    fn into_chat_ids(self) -> Result<HashSet<ChatId>> {
        match self {
            ChatList::Ids(ids) => Ok(ids.into_iter().map(ChatId).collect()),
            ChatList::Csv(csv) => csv
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| {
                    id.parse::<i64>()
                        .map(ChatId)
                        .with_context(|| format!("Invalid chat id '{}' in 'chats'", id))
                })
                .collect(),
        }
    }
}

fn default_words_file() -> PathBuf {
    PathBuf::from("nanoybot_words.txt")
}

impl Config {
    pub fn is_allowed(&self, chat_id: ChatId) -> bool {
        self.allowed_chats.contains(&chat_id)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&content, base_dir)
    }

    /// Parse config file contents. Relative paths resolve against `base_dir`.
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content).context("Failed to parse config file")?;
        let global = file.global;

        if global.token.trim().is_empty() {
            bail!("'token' in section [global] is empty");
        }

        let allowed_chats = global.chats.into_chat_ids()?;
        if allowed_chats.is_empty() {
            warn!("No allowed chats configured, every chat will be rejected");
        }

        if !global.rate.is_finite() || global.rate < 0.0 {
            bail!(
                "'rate' in section [global] must be a non-negative number, got {}",
                global.rate
            );
        }

        let use_dictionary = global.use_dictionary.unwrap_or_else(|| {
            warn!("No use_dictionary setting, defaulting to true");
            true
        });

        let words_path = if global.words_file.is_absolute() {
            global.words_file
        } else {
            base_dir.join(global.words_file)
        };
        let allowed_words = load_words(&words_path);

        Ok(Config {
            token: global.token,
            allowed_chats,
            rate_seconds: global.rate,
            use_dictionary,
            allowed_words,
            triggers: file.triggers,
        })
    }
}

/// Read the newline-delimited word list. A missing file is not fatal.
pub fn load_words(path: &Path) -> HashSet<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let words: HashSet<String> = content
                .lines()
                .map(str::trim_end)
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .collect();
            info!("Loaded {} words from {}", words.len(), path.display());
            words
        }
        Err(e) => {
            warn!("Unable to load words from {}: {}", path.display(), e);
            HashSet::new()
        }
    }
}
