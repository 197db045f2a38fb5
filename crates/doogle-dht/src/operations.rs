//! RPC messages (PING, FIND_NODE, STORE_ITEM, POST_URL, ...)
//!
//! Byte fields that carry addresses stay `Vec<u8>` on the wire so a short
//! field is a rejectable request instead of a decode failure.

use doogle_crypto::{DoogleAddress, NodeCertificate};
use serde::{Deserialize, Serialize};

use crate::error::Status;

/// Plain text payload (Ping, PostUrl, GetIndex)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringMessage {
    pub message: String,
}

impl StringMessage {
    pub fn new(message: impl Into<String>) -> Self {
        StringMessage {
            message: message.into(),
        }
    }
}

/// PING / PING_WITH_CERTIFICATE reply
///
/// Certificate-bearing pings are answered with the responder's own
/// certificate so the caller can admit it in turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingReply {
    pub message: String,
    pub certificate: Option<NodeCertificate>,
}

/// PING_TO request: ping another node on the receiver's behalf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingToRequest {
    /// `host:port` of the node to ping
    pub network_address: String,
}

/// Routing contact as carried in FIND_NODE replies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub doogle_address: Vec<u8>,
    pub network_address: String,
}

/// FIND_NODE reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfos {
    pub infos: Vec<NodeInfo>,
}

/// FIND_NODE request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindNodeRequest {
    /// Caller certificate
    pub certificate: NodeCertificate,

    /// Target address (20 bytes)
    pub doogle_address: Vec<u8>,
}

impl FindNodeRequest {
    pub fn new(certificate: NodeCertificate, target: &DoogleAddress) -> Self {
        FindNodeRequest {
            certificate,
            doogle_address: target.as_bytes().to_vec(),
        }
    }
}

/// STORE_ITEM request: one crawled page under one index token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreItemRequest {
    /// Sender certificate
    pub certificate: NodeCertificate,

    pub url: String,

    /// Index key, the SHA-1 of the token (20 bytes)
    pub index: Vec<u8>,

    pub title: String,

    pub description: String,

    /// Outgoing link URLs; the receiver hashes them into item addresses
    pub edges: Vec<String>,
}

/// FIND_INDEX request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindIndexRequest {
    pub certificate: NodeCertificate,
    pub doogle_address: Vec<u8>,
}

/// Every call a doogle node serves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcRequest {
    Ping(StringMessage),
    PingWithCertificate(NodeCertificate),
    PingTo(PingToRequest),
    FindNode(FindNodeRequest),
    StoreItem(StoreItemRequest),
    PostUrl(StringMessage),
    GetIndex(StringMessage),
    FindIndex(FindIndexRequest),
}

impl RpcRequest {
    /// Operation name, for logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            RpcRequest::Ping(_) => "Ping",
            RpcRequest::PingWithCertificate(_) => "PingWithCertificate",
            RpcRequest::PingTo(_) => "PingTo",
            RpcRequest::FindNode(_) => "FindNode",
            RpcRequest::StoreItem(_) => "StoreItem",
            RpcRequest::PostUrl(_) => "PostUrl",
            RpcRequest::GetIndex(_) => "GetIndex",
            RpcRequest::FindIndex(_) => "FindIndex",
        }
    }
}

/// Successful reply payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcReply {
    Pong(PingReply),
    Message(StringMessage),
    Nodes(NodeInfos),
    Empty,
}

/// What travels back over the wire for each request
pub type RpcResponse = std::result::Result<RpcReply, Status>;
