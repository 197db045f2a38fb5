//! HTTP crawler
//!
//! Fetches a page and pulls out what the index needs: title, meta
//! description, outgoing absolute links and lower-cased word tokens.

use async_trait::async_trait;
use doogle_dht::{CrawlError, CrawledPage, Crawler};
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use crate::queue::CrawlQueue;

/// Crawler configuration
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Pending URLs the work queue holds before dropping new ones
    pub queue_capacity: usize,
    /// Workers draining the queue
    pub workers: usize,
    /// Timeout for one page fetch
    pub request_timeout: Duration,
    /// Deadline for a worker's POST_URL call, which covers the crawl and
    /// every token's fan-out
    pub publish_timeout: Duration,
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        CrawlerConfig {
            queue_capacity: 128,
            workers: 4,
            request_timeout: Duration::from_secs(10),
            publish_timeout: Duration::from_secs(300),
            user_agent: concat!("doogle/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl CrawlerConfig {
    /// Deadline a crawl worker waits for one publish
    ///
    /// Never shorter than one page fetch plus one outbound RPC.
    pub fn publish_deadline(&self, rpc_timeout: Duration) -> Duration {
        self.publish_timeout.max(self.request_timeout + rpc_timeout)
    }
}

/// Compiled extraction patterns
#[derive(Debug, Clone)]
pub struct PageParser {
    title: Regex,
    meta: Regex,
    content: Regex,
    href: Regex,
    invisible: Regex,
    tag: Regex,
    word: Regex,
}

impl PageParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(PageParser {
            title: Regex::new(r"(?is)<title[^>]*>(.*?)</title>")?,
            meta: Regex::new(r#"(?is)<meta\s[^>]*name\s*=\s*["']description["'][^>]*>"#)?,
            content: Regex::new(r#"(?is)content\s*=\s*["']([^"']*)["']"#)?,
            href: Regex::new(r#"(?is)<a\s[^>]*href\s*=\s*["']([^"']+)["']"#)?,
            invisible: Regex::new(r"(?is)<(?:script|style)[^>]*>.*?</(?:script|style)>")?,
            tag: Regex::new(r"(?s)<[^>]*>")?,
            word: Regex::new(r"\b[a-zA-Z]+\b")?,
        })
    }

    pub fn title(&self, html: &str) -> String {
        self.title
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| collapse_whitespace(m.as_str()))
            .unwrap_or_default()
    }

    pub fn description(&self, html: &str) -> String {
        self.meta
            .find(html)
            .and_then(|tag| self.content.captures(tag.as_str()))
            .and_then(|c| c.get(1))
            .map(|m| collapse_whitespace(m.as_str()))
            .unwrap_or_default()
    }

    /// Absolute http(s) links, first occurrence order, without duplicates
    pub fn links(&self, html: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.href
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|href| is_http_url(href))
            .filter(|href| seen.insert(href.to_string()))
            .map(str::to_string)
            .collect()
    }

    /// Lower-cased alphabetic words longer than two characters
    pub fn tokens(&self, html: &str) -> Vec<String> {
        let visible = self.invisible.replace_all(html, " ");
        let text = self.tag.replace_all(&visible, " ").to_lowercase();

        let mut seen = HashSet::new();
        self.word
            .find_iter(&text)
            .map(|m| m.as_str())
            .filter(|word| word.len() > 2)
            .filter(|word| seen.insert(word.to_string()))
            .map(str::to_string)
            .collect()
    }

    pub fn parse(&self, html: &str) -> CrawledPage {
        CrawledPage {
            title: self.title(html),
            description: self.description(html),
            tokens: self.tokens(html),
            outgoing_urls: self.links(html),
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Crawler backed by `reqwest`
///
/// When a queue is attached every outgoing link of a crawled page is offered
/// to it for a later crawl.
pub struct HttpCrawler {
    client: reqwest::Client,
    parser: PageParser,
    queue: Option<CrawlQueue>,
}

impl HttpCrawler {
    pub fn new(config: &CrawlerConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(HttpCrawler {
            client,
            parser: PageParser::new()?,
            queue: None,
        })
    }

    pub fn with_queue(mut self, queue: CrawlQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    async fn fetch(&self, url: &str) -> Result<String, CrawlError> {
        let fetch_error = |e: reqwest::Error| CrawlError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_error)?;

        response.text().await.map_err(|e| CrawlError::Parse {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Crawler for HttpCrawler {
    async fn analyze(&self, url: &str) -> Result<CrawledPage, CrawlError> {
        if !is_http_url(url) {
            return Err(CrawlError::InvalidUrl(url.to_string()));
        }

        let html = self.fetch(url).await?;
        let page = self.parser.parse(&html);
        debug!(
            "Crawled {}: {} tokens, {} links",
            url,
            page.tokens.len(),
            page.outgoing_urls.len()
        );

        if let Some(queue) = &self.queue {
            let queued = page
                .outgoing_urls
                .iter()
                .filter(|link| queue.offer(link))
                .count();
            debug!("Queued {} of {} links from {}", queued, page.outgoing_urls.len(), url);
        }

        Ok(page)
    }
}
