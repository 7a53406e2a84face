use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::errors::SessionError;
use crate::traits::{PageSession, SessionFactory};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Page session backed by a plain HTTP client.
///
/// The judgment site renders listing and detail pages server-side, so a GET
/// with browser-like headers returns the same DOM a real browser would
/// settle on.
pub struct HttpSession {
    client: Client,
    url: Option<String>,
    body: Option<String>,
}

impl HttpSession {
    fn new(client: Client) -> Self {
        Self {
            client,
            url: None,
            body: None,
        }
    }
}

#[async_trait]
impl PageSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.url = Some(url.to_string());
        self.body = None;

        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!(url, bytes = body.len(), "page loaded");
        self.body = Some(body);
        Ok(())
    }

    async fn wait_stable(&mut self) -> Result<(), SessionError> {
        // Server-rendered pages are stable once the body has arrived.
        if self.body.is_none() {
            return Err(SessionError::NotLoaded);
        }
        Ok(())
    }

    fn content(&self) -> Result<&str, SessionError> {
        self.body.as_deref().ok_or(SessionError::NotLoaded)
    }
}

/// Builds [`HttpSession`]s sharing one connection pool.
pub struct HttpSessionFactory {
    client: Client,
}

impl HttpSessionFactory {
    pub fn new() -> Result<Self, SessionError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    type Session = HttpSession;

    async fn create(&self) -> Result<HttpSession, SessionError> {
        Ok(HttpSession::new(self.client.clone()))
    }
}
