//! Service and transport seams of a doogle node
//!
//! [`DoogleService`] is what a node answers; [`PeerTransport`] is how a node
//! reaches its peers. The RPC server dispatches onto the former, the publish
//! fan-out calls through the latter.

use async_trait::async_trait;
use doogle_crypto::NodeCertificate;

use crate::error::Result;
use crate::operations::{
    FindIndexRequest, FindNodeRequest, NodeInfos, PingReply, PingToRequest, StoreItemRequest,
    StringMessage,
};

/// Every RPC a doogle node serves
#[async_trait]
pub trait DoogleService: Send + Sync {
    /// Liveness check, no authentication
    async fn ping(&self, request: StringMessage) -> Result<StringMessage>;

    /// Authenticated ping; admits the caller and answers with our certificate
    async fn ping_with_certificate(&self, certificate: NodeCertificate) -> Result<PingReply>;

    /// Ping another node with our certificate and relay its reply
    async fn ping_to(&self, request: PingToRequest) -> Result<PingReply>;

    /// Up to alpha contacts from the bucket the target falls into
    async fn find_node(&self, request: FindNodeRequest) -> Result<NodeInfos>;

    /// Store one page under one index key
    async fn store_item(&self, request: StoreItemRequest) -> Result<()>;

    /// Crawl a URL and publish it to the peers closest to each of its tokens
    async fn post_url(&self, request: StringMessage) -> Result<()>;

    /// Reserved
    async fn get_index(&self, request: StringMessage) -> Result<()>;

    /// Reserved
    async fn find_index(&self, request: FindIndexRequest) -> Result<()>;
}

/// Outbound calls a node makes to its peers
///
/// This allows the node to broadcast without being coupled to the TCP
/// transport, so tests can substitute in-memory peers.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Send PING_WITH_CERTIFICATE to `network_address`
    async fn ping_with_certificate(
        &self,
        network_address: &str,
        certificate: NodeCertificate,
    ) -> Result<PingReply>;

    /// Send STORE_ITEM to `network_address`
    async fn store_item(&self, network_address: &str, request: StoreItemRequest) -> Result<()>;
}
