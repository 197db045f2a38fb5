//! Node configuration

use std::time::Duration;

use crate::{K, MAX_LOOKUP_ITERATIONS};

/// Node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// `host:port` peers use to reach this node; part of the identity hash
    pub network_address: String,
    /// Puzzle difficulty solved at startup, and the minimum accepted from peers
    pub difficulty: u32,
    /// Timeout for each outbound RPC (default: 5 seconds)
    pub rpc_timeout: Duration,
    /// Contacts per k-bucket
    pub bucket_size: usize,
    /// Safety ceiling on local lookup rounds
    pub max_lookup_iterations: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            network_address: "127.0.0.1:3841".to_string(),
            difficulty: 0,
            rpc_timeout: Duration::from_secs(5),
            bucket_size: K,
            max_lookup_iterations: MAX_LOOKUP_ITERATIONS,
        }
    }
}

impl NodeConfig {
    /// Default configuration for a node reachable at `network_address`
    pub fn new(network_address: impl Into<String>, difficulty: u32) -> Self {
        NodeConfig {
            network_address: network_address.into(),
            difficulty,
            ..Default::default()
        }
    }
}
