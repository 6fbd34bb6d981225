//! Finding the syllabus download link on the publisher's page.

use futures::future::BoxFuture;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::info;
use url::Url;

use syllabot_core::config::SourceConfig;
use syllabot_core::error::{Result, SyllabotError};
use syllabot_core::traits::Tool;
use syllabot_core::types::{ToolContext, ToolResult};

use crate::http;

pub const NOT_FOUND_MESSAGE: &str = "No matching PDF file was found on the page.";

/// Whether an anchor's `download` name qualifies: ends with `.pdf` in any
/// case and contains `required_substring` exactly.
fn qualifies(download: &str, required_substring: &str) -> bool {
    download.to_lowercase().ends_with(".pdf") && download.contains(required_substring)
}

/// Return the first `a[download]` in document order whose download name
/// qualifies, with its `href` resolved against `base`.
///
/// A qualifying anchor without `href` resolves to `base` itself.
pub fn find_pdf_link(html: &str, base: &Url, required_substring: &str) -> Result<Url> {
    let doc = Html::parse_document(html);
    let selector =
        Selector::parse("a[download]").map_err(|e| SyllabotError::Parse(e.to_string()))?;

    let anchor = doc
        .select(&selector)
        .find(|a| {
            a.value()
                .attr("download")
                .is_some_and(|name| qualifies(name, required_substring))
        })
        .ok_or_else(|| SyllabotError::NotFound(NOT_FOUND_MESSAGE.to_string()))?;

    let href = anchor.value().attr("href").unwrap_or("");
    base.join(href).map_err(|e| {
        SyllabotError::NotFound(format!("Matching link has an invalid href {:?}: {}", href, e))
    })
}

/// Fetches the source page and locates the syllabus PDF on it.
pub struct DocumentLocator {
    http: Client,
    page_url: String,
    required_substring: String,
}

impl DocumentLocator {
    pub fn new(http: Client, source: &SourceConfig) -> Self {
        Self {
            http,
            page_url: source.page_url.clone(),
            required_substring: source.required_substring.clone(),
        }
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    /// One GET of the source page, then [`find_pdf_link`].
    pub async fn locate(&self) -> Result<Url> {
        let base = Url::parse(&self.page_url).map_err(|e| {
            SyllabotError::Configuration(format!("invalid source page URL {}: {}", self.page_url, e))
        })?;
        let html = http::get_text(&self.http, &self.page_url).await?;
        let url = find_pdf_link(&html, &base, &self.required_substring)?;
        info!(page = %self.page_url, pdf_url = %url, "Located syllabus PDF");
        Ok(url)
    }
}

pub struct LocatePdfTool {
    locator: DocumentLocator,
}

impl LocatePdfTool {
    pub fn new(locator: DocumentLocator) -> Self {
        Self { locator }
    }
}

impl Tool for LocatePdfTool {
    fn name(&self) -> &str {
        "locate_pdf"
    }

    fn description(&self) -> &str {
        "Open the syllabus download page, find the syllabus PDF link and return its absolute URL."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    fn timeout_secs(&self) -> u64 {
        60
    }

    fn execute(
        &self,
        _input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let url = self.locator.locate().await?;
            Ok(ToolResult::success(url.to_string()))
        })
    }
}
