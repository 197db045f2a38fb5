//! Crawler collaborator
//!
//! The node does not fetch pages itself. PostUrl hands the URL to a
//! [`Crawler`] and publishes whatever it extracts.

use async_trait::async_trait;
use thiserror::Error;

/// Crawl failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CrawlError {
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to parse {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("Unsupported URL: {0}")]
    InvalidUrl(String),
}

/// Metadata extracted from one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawledPage {
    pub title: String,
    pub description: String,
    /// Index tokens; each becomes an index key
    pub tokens: Vec<String>,
    /// Outgoing hyperlinks
    pub outgoing_urls: Vec<String>,
}

/// Fetches a URL and extracts its index metadata
#[async_trait]
pub trait Crawler: Send + Sync {
    async fn analyze(&self, url: &str) -> std::result::Result<CrawledPage, CrawlError>;
}
