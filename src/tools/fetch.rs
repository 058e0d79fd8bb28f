//! HTTP page fetcher
//!
//! GETs a page and extracts readable content with `article_scraper`
//! (Mozilla Readability), falling back to a plain tag stripper when the
//! extractor cannot handle the document.

use super::{FetchedPage, PageFetcher, ToolError};
use article_scraper::Readability;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Fetcher limits
#[derive(Debug, Clone)]
pub struct HttpPageFetcherConfig {
    pub timeout: Duration,
    pub max_response_bytes: usize,
    pub user_agent: String,
}

impl Default for HttpPageFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_response_bytes: 1024 * 1024,
            user_agent: format!("songcrew/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// `reqwest`-backed [`PageFetcher`]
pub struct HttpPageFetcher {
    client: reqwest::Client,
    config: HttpPageFetcherConfig,
}

impl HttpPageFetcher {
    pub fn new(config: HttpPageFetcherConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ToolError::InitializationError(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpPageFetcherConfig {
        &self.config
    }

    /// Extract readable content from HTML using article_scraper
    async fn extract_readable_content(html: &str, url: &Url) -> Result<String, ToolError> {
        // article_scraper can panic on malformed HTML, so isolate it
        let html_owned = html.to_string();
        let base_url = url.clone();
        let result = tokio::task::spawn_blocking(move || {
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                tokio::runtime::Handle::current()
                    .block_on(async { Readability::extract(&html_owned, Some(base_url)).await })
            }))
        })
        .await;

        match result {
            Ok(Ok(Ok(article_text))) => Ok(simple_html_to_text(&article_text)),
            Ok(Ok(Err(e))) => {
                debug!("Article extraction failed: {}, using simple extraction", e);
                Ok(simple_html_to_text(html))
            }
            Ok(Err(_panic)) => Err(ToolError::ExecutionError(format!(
                "Content extraction failed for URL '{url}': HTML parser could not handle the page"
            ))),
            Err(e) => {
                warn!("Article extraction task failed: {}", e);
                Ok(simple_html_to_text(html))
            }
        }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, ToolError> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout(format!("GET {url}: {e}"))
            } else {
                ToolError::ExecutionError(format!("GET {url}: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionError(format!(
                "GET {url} returned {status}"
            )));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("html"))
            .unwrap_or(true);

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::ExecutionError(e.to_string()))?;

        if body.len() > self.config.max_response_bytes {
            return Err(ToolError::ResponseTooLarge {
                size: body.len(),
                max: self.config.max_response_bytes,
            });
        }

        let text = if is_html {
            Self::extract_readable_content(&body, url).await?
        } else {
            body
        };

        debug!(url = %url, status = status.as_u16(), chars = text.len(), "Fetched page");
        Ok(FetchedPage {
            url: url.clone(),
            status: status.as_u16(),
            text,
        })
    }
}

/// Simple HTML to text conversion fallback (pure function)
pub fn simple_html_to_text(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;
    let mut tag_name = String::new();

    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag_name.clear();
            }
            '>' if in_tag => {
                let tag = tag_name
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_lowercase();

                match tag.as_str() {
                    "script" => in_script = true,
                    "/script" => in_script = false,
                    "style" => in_style = true,
                    "/style" => in_style = false,
                    _ => {}
                }

                let block = tag.trim_start_matches('/');
                if matches!(
                    block,
                    "div" | "p" | "br" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li"
                ) {
                    result.push('\n');
                }

                in_tag = false;
                tag_name.clear();
            }
            _ if in_tag => tag_name.push(ch),
            _ if in_script || in_style => {}
            _ if ch.is_whitespace() => {
                if !result.ends_with(' ') && !result.ends_with('\n') {
                    result.push(' ');
                }
            }
            _ => result.push(ch),
        }
    }

    result
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_config_default() {
        let config = HttpPageFetcherConfig::default();
        assert_eq!(config.max_response_bytes, 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("songcrew/"));
    }

    #[test]
    fn test_simple_html_to_text() {
        let html = "<html><body><h1>Title</h1><p>Paragraph</p><script>code</script></body></html>";
        let text = simple_html_to_text(html);

        assert!(text.contains("Title"));
        assert!(text.contains("Paragraph"));
        assert!(!text.contains("code"));
        assert!(!text.contains("<h1>"));
    }

    #[test]
    fn test_simple_html_to_text_handles_attributes_and_styles() {
        let html = r#"
            <html>
            <head><style type="text/css">body { color: red; }</style></head>
            <body>
                <div class="verse">First line</div>
                <p id="x">Second   line</p>
                <script type="module">console.log("test");</script>
            </body>
            </html>
        "#;

        let text = simple_html_to_text(html);

        assert_eq!(text, "First line\nSecond line");
    }

    #[tokio::test]
    async fn test_article_extraction_falls_back_for_minimal_html() {
        let url = Url::parse("https://example.com").unwrap();
        let html = "<html><body><div>Just a div</div></body></html>";

        let text = HttpPageFetcher::extract_readable_content(html, &url)
            .await
            .expect("Extraction or fallback should succeed");

        assert!(!text.contains("<div>"));
    }
}
