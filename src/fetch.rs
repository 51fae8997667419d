use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

pub const JMENTAPE_URL: &str = "https://jmentape.fr";
pub const MAX_ATTEMPTS: u32 = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

static OG_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta property="og:title" content="([^"]*)">"#)
        .expect("og:title pattern is valid")
});

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no og:title found after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Something that returns the body of the remote page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self) -> Result<String, FetchError>;
}

/// Plain HTTP GET of a fixed URL.
pub struct HttpPageSource {
    client: reqwest::Client,
    url: String,
}

impl HttpPageSource {
    pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("nanoybot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self) -> Result<String, FetchError> {
        let body = self.client.get(&self.url).send().await?.text().await?;
        Ok(body)
    }
}

/// Pull the og:title content out of an HTML page.
pub fn extract_title(html: &str) -> Option<String> {
    OG_TITLE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Fetch the page until a title is found, at most [`MAX_ATTEMPTS`] times.
/// Transport errors count as failed attempts.
pub async fn fetch_remote_title(source: &dyn PageSource) -> Result<String, FetchError> {
    for attempt in 1..=MAX_ATTEMPTS {
        match source.fetch_page().await {
            Ok(page) => match extract_title(&page) {
                Some(title) => {
                    debug!("Found title on attempt {}", attempt);
                    return Ok(title);
                }
                None => debug!("Attempt {}: no og:title in page", attempt),
            },
            Err(e) => warn!("Attempt {}: {}", attempt, e),
        }
    }

    warn!("Giving up on remote title after {} attempts", MAX_ATTEMPTS);
    Err(FetchError::Exhausted {
        attempts: MAX_ATTEMPTS,
    })
}
