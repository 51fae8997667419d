use anyhow::{bail, Result};
use serde::Deserialize;

const ARCH_ALERT: &str =
    "Tu devrais passer à Arch Linux (rip la synchro contacts/agenda par contre).";

const ARCH_KEYWORDS: &[&str] = &[
    "ubuntu", "debian", "fedora", "manjaro", "mint", "windows", "macos",
];

const PHRASES: &[(&str, &[&str])] = &[
    ("quoi", &["feur", "coubeh"]),
    ("oui", &["stiti"]),
    ("non", &["bril"]),
    ("hein", &["deux", "trois"]),
    ("comment", &["tateur"]),
];

const GREETINGS: &[&str] = &[
    "Nanoy.",
    "C'est moi qui parle.",
    "Il n'y a que moi qui parle ici.",
    "Oui ?",
    "Quelqu'un m'a appelé ?",
];

/// Keyword alert, fired whenever the keyword appears anywhere in a message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubstringAlert {
    pub keyword: String,
    pub text: String,
}

/// Rate-limited reply, fired only when the whole message equals the phrase.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExactPhrase {
    pub phrase: String,
    pub replies: Vec<String>,
}

/// `[triggers]` section of the config file. Each present field replaces the
/// matching built-in table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggersConfig {
    pub alerts: Option<Vec<SubstringAlert>>,
    pub phrases: Option<Vec<ExactPhrase>>,
    pub greetings: Option<Vec<String>>,
}

/// Static tables the reaction engine and the greeting commands read from.
/// Built once at startup, iterated in insertion order.
#[derive(Debug, Clone)]
pub struct TriggerTables {
    substring_alerts: Vec<SubstringAlert>,
    exact_phrases: Vec<ExactPhrase>,
    greetings: Vec<String>,
}

impl TriggerTables {
    pub fn new(
        substring_alerts: Vec<SubstringAlert>,
        exact_phrases: Vec<ExactPhrase>,
        greetings: Vec<String>,
    ) -> Result<Self> {
        let mut alerts = Vec::with_capacity(substring_alerts.len());
        for alert in substring_alerts {
            if alert.keyword.is_empty() {
                bail!("Alert '{}' has an empty keyword", alert.text);
            }
            alerts.push(SubstringAlert {
                keyword: alert.keyword.to_lowercase(),
                text: alert.text,
            });
        }

        let mut phrases = Vec::with_capacity(exact_phrases.len());
        for entry in exact_phrases {
            if entry.phrase.is_empty() {
                bail!("Exact phrase with replies {:?} is empty", entry.replies);
            }
            if entry.replies.is_empty() {
                bail!("Exact phrase '{}' has no replies", entry.phrase);
            }
            phrases.push(ExactPhrase {
                phrase: entry.phrase.to_lowercase(),
                replies: entry.replies,
            });
        }

        if greetings.is_empty() {
            bail!("Greeting reply list is empty");
        }

        Ok(Self {
            substring_alerts: alerts,
            exact_phrases: phrases,
            greetings,
        })
    }

    /// Built-in tables, with any table present in `overrides` swapped in.
    pub fn from_config(overrides: TriggersConfig) -> Result<Self> {
        let defaults = Self::builtin();
        Self::new(
            overrides.alerts.unwrap_or(defaults.substring_alerts),
            overrides.phrases.unwrap_or(defaults.exact_phrases),
            overrides.greetings.unwrap_or(defaults.greetings),
        )
    }

    pub fn builtin() -> Self {
        Self {
            substring_alerts: ARCH_KEYWORDS
                .iter()
                .map(|keyword| SubstringAlert {
                    keyword: keyword.to_string(),
                    text: ARCH_ALERT.to_string(),
                })
                .collect(),
            exact_phrases: PHRASES
                .iter()
                .map(|(phrase, replies)| ExactPhrase {
                    phrase: phrase.to_string(),
                    replies: replies.iter().map(|r| r.to_string()).collect(),
                })
                .collect(),
            greetings: GREETINGS.iter().map(|g| g.to_string()).collect(),
        }
    }

    pub fn substring_alerts(&self) -> &[SubstringAlert] {
        &self.substring_alerts
    }

    pub fn exact_phrases(&self) -> &[ExactPhrase] {
        &self.exact_phrases
    }

    pub fn greetings(&self) -> &[String] {
        &self.greetings
    }
}
