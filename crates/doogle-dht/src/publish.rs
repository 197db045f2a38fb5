//! Publish workflow behind POST_URL
//!
//! Crawl a page, then for every token look up the closest peers and
//! broadcast a STORE_ITEM to each of them. Tokens are processed one after the
//! other; the stores for one token run concurrently.

use doogle_crypto::DoogleAddress;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::error::Result;
use crate::node::Node;
use crate::operations::StoreItemRequest;

/// Outcome of one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Tokens the crawler extracted
    pub tokens: usize,

    /// STORE_ITEM calls that succeeded
    pub stored: usize,

    /// STORE_ITEM calls that failed
    pub failed: usize,

    /// Tokens whose lookup failed
    pub skipped: usize,
}

impl Node {
    /// Crawl `url` and broadcast it to the peers closest to each token
    ///
    /// Only a crawl failure is an error; lookup and store failures are
    /// logged, counted in the report and do not stop the remaining tokens.
    pub async fn publish(&self, url: &str) -> Result<PublishReport> {
        let page = self.crawler.analyze(url).await.map_err(|e| {
            warn!("Failed to crawl {}: {}", url, e);
            e
        })?;

        let mut report = PublishReport {
            tokens: page.tokens.len(),
            ..Default::default()
        };

        for token in &page.tokens {
            let key = DoogleAddress::hash_of(token);
            let peers = match self.lookup(&key) {
                Ok(peers) => peers,
                Err(e) => {
                    warn!("Skipped token {:?} of {}: {}", token, url, e);
                    report.skipped += 1;
                    continue;
                }
            };

            debug!(
                "Broadcasting {} under {:?} to {} peers",
                url,
                token,
                peers.len()
            );

            let request = StoreItemRequest {
                certificate: self.certificate().clone(),
                url: url.to_string(),
                index: key.as_bytes().to_vec(),
                title: page.title.clone(),
                description: page.description.clone(),
                edges: page.outgoing_urls.clone(),
            };

            let stores: Vec<_> = peers
                .iter()
                .map(|peer| {
                    let request = request.clone();
                    async move {
                        let result = self.transport.store_item(&peer.network_address, request).await;
                        (peer, result)
                    }
                })
                .collect();

            for (peer, result) in join_all(stores).await {
                match result {
                    Ok(()) => report.stored += 1,
                    Err(e) => {
                        warn!(
                            "StoreItem of {} to {} failed: {}",
                            url, peer.network_address, e
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        Ok(report)
    }
}
