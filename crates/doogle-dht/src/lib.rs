//! Doogle DHT
//!
//! Kademlia-style routing and storage core of a doogle node:
//! - Proof-of-work admission of peers and routing table refresh
//! - XOR-metric routing table with bounded, recency-ordered k-buckets
//! - Local iterative FIND_NODE lookup
//! - Concurrent index (token -> item addresses) and item stores
//! - Publish workflow broadcasting crawled pages to the closest peers
//! - TCP RPC transport and request dispatch

pub mod config;
pub mod crawler;
pub mod dht;
pub mod error;
pub mod item_store;
pub mod iterative_lookup;
pub mod kbucket;
pub mod node;
pub mod node_info;
pub mod operations;
pub mod publish;
pub mod request_handler;
pub mod routing_table;
pub mod rpc_transport;
pub mod storage;

pub use config::NodeConfig;
pub use crawler::{CrawlError, CrawledPage, Crawler};
pub use dht::{DoogleService, PeerTransport};
pub use error::{DhtError, Result, Status, StatusCode};
pub use item_store::{Item, ItemStore};
pub use iterative_lookup::{IterativeLookup, LookupStats, RoundOutcome};
pub use kbucket::{BucketUpdate, KBucket};
pub use node::Node;
pub use node_info::PeerContact;
pub use publish::PublishReport;
pub use request_handler::RpcServer;
pub use routing_table::RoutingTable;
pub use rpc_transport::TcpTransport;
pub use storage::{IndexEntry, IndexStore};

/// Kademlia k parameter (contacts per k-bucket)
pub const K: usize = 20;

/// Alpha parameter (lookup result size and publish fan-out)
pub const ALPHA: usize = 3;

/// Safety ceiling on local lookup rounds
pub const MAX_LOOKUP_ITERATIONS: usize = 10_000_000;

/// Reply message for every successful ping
pub const PONG: &str = "pong";
