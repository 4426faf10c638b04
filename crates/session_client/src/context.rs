//! Locating the session identifier in the presentation layer.

use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use shared::domain::SessionId;
use tracing::debug;

pub const SESSION_ID_ELEMENT: &str = "session_id";

pub trait SessionContext: Send + Sync {
    fn session_identifier(&self) -> Option<SessionId>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticSessionContext {
    session_id: Option<SessionId>,
}

impl StaticSessionContext {
    pub fn new(session_id: Option<SessionId>) -> Self {
        Self { session_id }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl SessionContext for StaticSessionContext {
    fn session_identifier(&self) -> Option<SessionId> {
        self.session_id.clone()
    }
}

/// Session page rendered by the server, searched for the element whose id
/// is `session_id`.
#[derive(Debug, Clone)]
pub struct HtmlSessionContext {
    html: String,
    element_id: String,
}

impl HtmlSessionContext {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            element_id: SESSION_ID_ELEMENT.to_string(),
        }
    }

    pub fn with_element_id(mut self, element_id: impl Into<String>) -> Self {
        self.element_id = element_id.into();
        self
    }

    pub async fn fetch(http: &Client, page_url: &str) -> Result<Self> {
        let html = http
            .get(page_url)
            .send()
            .await
            .with_context(|| format!("failed to fetch session page: {page_url}"))?
            .error_for_status()?
            .text()
            .await
            .context("failed to read session page body")?;
        debug!(page_url, bytes = html.len(), "session: fetched session page");
        Ok(Self::new(html))
    }
}

impl SessionContext for HtmlSessionContext {
    fn session_identifier(&self) -> Option<SessionId> {
        element_text(&self.html, &self.element_id).map(SessionId)
    }
}

/// Text content of the first element whose id is `element_id`, with nested
/// markup flattened and surrounding whitespace trimmed.
pub fn element_text(html: &str, element_id: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"[id="{element_id}"]"#)).ok()?;
    let document = Html::parse_document(html);
    let element = document.select(&selector).next()?;
    let text: String = element.text().collect();
    Some(text.trim().to_string())
}

#[cfg(test)]
#[path = "tests/context_tests.rs"]
mod tests;
