//! The doogle node binary
//!
//! Listens for doogle RPCs, crawls URLs posted to it and publishes them to
//! the peers responsible for each token.

mod crawler;
mod queue;

use anyhow::Context;
use clap::Parser;
use doogle_dht::{Node, NodeConfig, RpcServer, TcpTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::crawler::{CrawlerConfig, HttpCrawler};
use crate::queue::CrawlQueue;

/// Interval between status log lines
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Address to listen on; also the address peers reach this node at
    #[arg(short = 'p', long = "port", default_value = "127.0.0.1:3841")]
    listen: String,

    /// Difficulty of the address puzzle, in leading zero bytes
    #[arg(short, long, default_value_t = 0)]
    difficulty: u32,

    /// Capacity of the crawl work queue
    #[arg(short = 'c', long, default_value_t = 128)]
    queue_capacity: usize,

    /// Number of crawl workers
    #[arg(short, long, default_value_t = 4)]
    workers: usize,

    /// Timeout for outbound RPCs, in seconds
    #[arg(long, default_value_t = 5)]
    rpc_timeout: u64,

    /// Deadline for a crawl worker's publish, in seconds
    #[arg(long, default_value_t = 300)]
    publish_timeout: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("failed to listen on {}", args.listen))?;
    let network_address = listener.local_addr()?.to_string();

    let mut node_config = NodeConfig::new(network_address.clone(), args.difficulty);
    node_config.rpc_timeout = Duration::from_secs(args.rpc_timeout);

    let crawler_config = CrawlerConfig {
        queue_capacity: args.queue_capacity,
        workers: args.workers,
        publish_timeout: Duration::from_secs(args.publish_timeout),
        ..Default::default()
    };

    let (queue, _workers) = CrawlQueue::start(
        crawler_config.queue_capacity,
        crawler_config.workers,
        network_address.clone(),
        TcpTransport::new(crawler_config.publish_deadline(node_config.rpc_timeout)),
    );
    let crawler = HttpCrawler::new(&crawler_config)
        .context("failed to initialize crawler")?
        .with_queue(queue.clone());

    info!(
        "Solving address puzzle for {} at difficulty {}",
        network_address, args.difficulty
    );
    let transport = Arc::new(TcpTransport::new(node_config.rpc_timeout));
    let node = tokio::task::spawn_blocking(move || {
        Node::new(node_config, transport, Arc::new(crawler))
    })
    .await?
    .context("failed to create node")?;
    let node = Arc::new(node);

    info!("Node created: doogle address={}", node.address().to_hex());

    let status_node = Arc::clone(&node);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATUS_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            info!(
                "Status: {} contacts in {} buckets, {} index keys, {} items, {} urls queued",
                status_node.routing_table().len(),
                status_node.routing_table().active_buckets(),
                status_node.index().len(),
                status_node.items().len(),
                queue.accepted()
            );
        }
    });

    RpcServer::new(node)
        .serve(listener, shutdown_signal())
        .await
        .context("RPC server failed")?;

    info!("Stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["doogle"]);
        assert_eq!(args.listen, "127.0.0.1:3841");
        assert_eq!(args.difficulty, 0);
        assert_eq!(args.queue_capacity, 128);
        assert_eq!(args.workers, 4);
        assert_eq!(args.publish_timeout, 300);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_short_flags() {
        let args = Args::parse_from(["doogle", "-p", "0.0.0.0:4000", "-d", "2", "-c", "16", "-w", "8"]);
        assert_eq!(args.listen, "0.0.0.0:4000");
        assert_eq!(args.difficulty, 2);
        assert_eq!(args.queue_capacity, 16);
        assert_eq!(args.workers, 8);
    }
}
