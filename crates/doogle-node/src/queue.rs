//! Crawl work queue
//!
//! Links discovered while crawling are offered to a bounded queue. Worker
//! tasks drain it and publish each URL by calling POST_URL on the local node,
//! so discovered pages go through the same path as user-submitted ones.

use doogle_dht::TcpTransport;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle for offering URLs to the crawl workers
#[derive(Clone)]
pub struct CrawlQueue {
    sender: mpsc::Sender<String>,

    /// URLs ever accepted; each is crawled at most once
    ///
    /// Process-lifetime state like the node's index and item stores: it is
    /// never pruned and also backs [`CrawlQueue::accepted`].
    seen: Arc<Mutex<HashSet<String>>>,
}

impl CrawlQueue {
    /// Create the queue and spawn `workers` tasks publishing to `node_address`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        capacity: usize,
        workers: usize,
        node_address: String,
        transport: TcpTransport,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let handles = (0..workers.max(1))
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                let transport = transport.clone();
                let node_address = node_address.clone();
                tokio::spawn(async move {
                    run_worker(id, receiver, transport, node_address).await;
                })
            })
            .collect();

        let queue = CrawlQueue {
            sender,
            seen: Arc::new(Mutex::new(HashSet::new())),
        };
        (queue, handles)
    }

    /// Offer a URL for crawling
    ///
    /// Returns false when the URL was already accepted once or the queue is
    /// full; a full queue drops the URL.
    pub fn offer(&self, url: &str) -> bool {
        let mut seen = self.seen.lock();
        if seen.contains(url) {
            return false;
        }

        match self.sender.try_send(url.to_string()) {
            Ok(()) => {
                seen.insert(url.to_string());
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Crawl queue full, dropped {}", url);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Crawl queue closed, dropped {}", url);
                false
            }
        }
    }

    /// Number of URLs accepted so far
    pub fn accepted(&self) -> usize {
        self.seen.lock().len()
    }
}

async fn run_worker(
    id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<String>>>,
    transport: TcpTransport,
    node_address: String,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(url) = next else {
            debug!("Crawl worker {} stopping", id);
            return;
        };

        match transport.post_url(&node_address, &url).await {
            Ok(()) => debug!("Crawl worker {} published {}", id, url),
            Err(e) => warn!("Crawl worker {} failed to publish {}: {}", id, url, e),
        }
    }
}
