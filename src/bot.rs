use std::sync::Arc;

use rand::seq::IndexedRandom;
use teloxide::types::ChatId;
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::fetch::{fetch_remote_title, PageSource};
use crate::platform::IncomingMessage;
use crate::reaction::ReactionEngine;

const HELP_TEXT: &str = "Hi. I'm nanoy bot. Just talking nonsense.";
const JMENTAPE_FAILURE: &str = "jmentape.fr ne répond pas, réessaie plus tard.";

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Nanoy bot commands:")]
pub enum Command {
    #[command(description = "say something")]
    Start,
    #[command(description = "say something")]
    Nanoy,
    #[command(description = "what jmentape.fr says today")]
    Jmentape,
    #[command(description = "show help")]
    Help,
}

fn not_allowed_text(chat_id: ChatId) -> String {
    format!(
        "Bot will not work on this chan. You need to add the following chat id : {} \
         to the chats list in config.toml file.",
        chat_id.0
    )
}

/// Everything a handler needs. Platform-agnostic: receives an
/// IncomingMessage, returns the replies to send in order.
pub struct AppState {
    config: Arc<Config>,
    engine: ReactionEngine,
    page_source: Box<dyn PageSource>,
    bot_username: String,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        engine: ReactionEngine,
        page_source: Box<dyn PageSource>,
        bot_username: impl Into<String>,
    ) -> Self {
        Self {
            config,
            engine,
            page_source,
            bot_username: bot_username.into(),
        }
    }

    /// Command carried by `text`, if any. Only the first word counts and
    /// the command name is matched case-insensitively.
    pub fn parse_command(&self, text: &str) -> Option<Command> {
        let head = text.split_whitespace().next()?;
        let head = match head.split_once('@') {
            Some((name, mention)) => format!("{}@{}", name.to_lowercase(), mention),
            None => head.to_lowercase(),
        };
        Command::parse(&head, &self.bot_username).ok()
    }

    pub async fn handle(&self, incoming: &IncomingMessage, now: i64) -> Vec<String> {
        match self.parse_command(&incoming.text) {
            Some(command) => self.handle_command(command, incoming.chat_id).await,
            None => self.engine.react(&incoming.text, incoming.chat_id, now),
        }
    }

    async fn handle_command(&self, command: Command, chat_id: ChatId) -> Vec<String> {
        let allowed = self.config.is_allowed(chat_id);
        info!("Command {:?} from chat {} (allowed: {})", command, chat_id.0, allowed);

        match command {
            Command::Help if allowed => vec![HELP_TEXT.to_string()],
            Command::Help => vec![not_allowed_text(chat_id)],
            _ if !allowed => {
                debug!("Ignoring command from chat {}", chat_id.0);
                Vec::new()
            }
            Command::Start | Command::Nanoy => self
                .engine
                .tables()
                .greetings()
                .choose(&mut rand::rng())
                .cloned()
                .into_iter()
                .collect(),
            Command::Jmentape => match fetch_remote_title(self.page_source.as_ref()).await {
                Ok(title) => vec![title],
                Err(e) => {
                    warn!("jmentape failed for chat {}: {}", chat_id.0, e);
                    vec![JMENTAPE_FAILURE.to_string()]
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::reaction::RateLimiter;
    use crate::triggers::{ExactPhrase, SubstringAlert, TriggerTables};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    const ALLOWED: ChatId = ChatId(-100);
    const STRANGER: ChatId = ChatId(555);

    struct FixedSource {
        title: Option<&'static str>,
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl PageSource for FixedSource {
        async fn fetch_page(&self) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(match self.title {
                Some(title) => format!(r#"<meta property="og:title" content="{title}">"#),
                None => String::new(),
            })
        }
    }

    fn test_state(title: Option<&'static str>) -> (AppState, Arc<AtomicU32>) {
        let config = Arc::new(Config {
            token: "token".to_string(),
            allowed_chats: HashSet::from([ALLOWED]),
            rate_seconds: 10.0,
            use_dictionary: false,
            allowed_words: HashSet::new(),
            triggers: Default::default(),
        });
        let tables = TriggerTables::new(
            vec![SubstringAlert {
                keyword: "arch".to_string(),
                text: "arch alert".to_string(),
            }],
            vec![ExactPhrase {
                phrase: "quoi".to_string(),
                replies: vec!["feur".to_string()],
            }],
            vec!["nanoy".to_string(), "oui ?".to_string()],
        )
        .unwrap();
        let engine = ReactionEngine::new(config.clone(), tables, RateLimiter::starting_at(0));
        let calls = Arc::new(AtomicU32::new(0));
        let source = FixedSource {
            title,
            calls: calls.clone(),
        };
        (
            AppState::new(config, engine, Box::new(source), "nanoybot"),
            calls,
        )
    }

    fn msg(chat_id: ChatId, text: &str) -> IncomingMessage {
        IncomingMessage {
            chat_id,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_greeting_commands() {
        let (state, _) = test_state(None);
        for text in [
            "/start",
            "/nanoy",
            "/nanoy@nanoybot",
            "/start now",
            "/START",
            "/Nanoy@nanoybot",
        ] {
            let replies = state.handle(&msg(ALLOWED, text), 100).await;
            assert_eq!(replies.len(), 1, "{text}");
            assert!(["nanoy", "oui ?"].contains(&replies[0].as_str()));
        }
    }

    #[tokio::test]
    async fn test_help_allowed_and_not_allowed() {
        let (state, _) = test_state(None);
        assert_eq!(state.handle(&msg(ALLOWED, "/help"), 100).await, vec![HELP_TEXT]);

        let replies = state.handle(&msg(STRANGER, "/help"), 100).await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("555"));
    }

    #[tokio::test]
    async fn test_stranger_gets_nothing_else() {
        let (state, calls) = test_state(Some("title"));
        for text in ["/start", "/nanoy", "/jmentape", "arch", "quoi", "dyquoi"] {
            assert!(state.handle(&msg(STRANGER, text), 100).await.is_empty(), "{text}");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_jmentape_replies_with_title() {
        let (state, calls) = test_state(Some("Je m'en tape"));
        assert_eq!(
            state.handle(&msg(ALLOWED, "/jmentape"), 100).await,
            vec!["Je m'en tape"]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_command_names_ignore_case() {
        let (state, _) = test_state(None);
        assert_eq!(state.parse_command("/Jmentape"), Some(Command::Jmentape));
        assert_eq!(state.parse_command("/JMENTAPE@nanoybot"), Some(Command::Jmentape));
        assert_eq!(state.parse_command("/HELP please"), Some(Command::Help));
        assert_eq!(state.parse_command("/Help@otherbot"), None);
        assert_eq!(state.parse_command("jmentape"), None);
        assert_eq!(state.parse_command(""), None);
    }

    #[tokio::test]
    async fn test_uppercase_jmentape_fetches() {
        let (state, calls) = test_state(Some("Je m'en tape"));
        assert_eq!(
            state.handle(&msg(ALLOWED, "/Jmentape"), 100).await,
            vec!["Je m'en tape"]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_jmentape_failure_message() {
        let (state, calls) = test_state(None);
        assert_eq!(
            state.handle(&msg(ALLOWED, "/jmentape"), 100).await,
            vec![JMENTAPE_FAILURE]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_plain_messages_go_to_reaction_engine() {
        let (state, _) = test_state(None);
        assert_eq!(
            state.handle(&msg(ALLOWED, "I use Arch btw dyquoi"), 100).await,
            vec!["arch alert", "quoi"]
        );
        assert_eq!(state.handle(&msg(ALLOWED, "quoi"), 100).await, vec!["feur"]);
        assert!(state.handle(&msg(ALLOWED, "quoi"), 105).await.is_empty());
    }

    #[tokio::test]
    async fn test_other_commands_are_plain_messages() {
        let (state, _) = test_state(None);
        assert_eq!(
            state.handle(&msg(ALLOWED, "/arch"), 100).await,
            vec!["arch alert"]
        );
        assert!(state.handle(&msg(ALLOWED, "/help@otherbot"), 100).await.is_empty());
    }
}
