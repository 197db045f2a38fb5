//! TCP RPC transport
//!
//! Every message is a length-prefixed bincode frame:
//!
//! ```text
//! [u32 BE length][bincode payload]
//! ```
//!
//! The client opens one connection per request, writes an [`RpcRequest`]
//! frame and reads back a single [`RpcResponse`] frame.

use async_trait::async_trait;
use doogle_crypto::{DoogleAddress, NodeCertificate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::dht::PeerTransport;
use crate::error::{DhtError, Result};
use crate::operations::{
    FindIndexRequest, FindNodeRequest, NodeInfos, PingReply, PingToRequest, RpcReply, RpcRequest,
    RpcResponse, StoreItemRequest, StringMessage,
};

/// Maximum allowed frame size (4 MiB)
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Default timeout for a single RPC, connect included
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Send a length-prefixed frame
pub async fn send_frame<S>(stream: &mut S, data: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    if data.len() > MAX_FRAME_SIZE {
        return Err(DhtError::Transport(format!(
            "Frame too large: {} > {}",
            data.len(),
            MAX_FRAME_SIZE
        )));
    }

    stream.write_u32(data.len() as u32).await?;
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

/// Receive a length-prefixed frame
///
/// Returns `None` when the peer closed the stream before a new frame began.
pub async fn recv_frame<S>(stream: &mut S) -> Result<Option<Vec<u8>>>
where
    S: AsyncRead + Unpin,
{
    let len = match stream.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if len > MAX_FRAME_SIZE {
        return Err(DhtError::Transport(format!(
            "Frame too large: {} > {}",
            len, MAX_FRAME_SIZE
        )));
    }

    let mut data = vec![0u8; len];
    stream.read_exact(&mut data).await?;
    Ok(Some(data))
}

/// Serialize and send one message
pub async fn write_message<S, T>(stream: &mut S, message: &T) -> Result<()>
where
    S: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(message)
        .map_err(|e| DhtError::Serialization(format!("Failed to serialize message: {}", e)))?;
    send_frame(stream, &payload).await
}

/// Receive and deserialize one message
pub async fn read_message<S, T>(stream: &mut S) -> Result<Option<T>>
where
    S: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match recv_frame(stream).await? {
        Some(payload) => bincode::deserialize(&payload)
            .map(Some)
            .map_err(|e| DhtError::Serialization(format!("Failed to deserialize message: {}", e))),
        None => Ok(None),
    }
}

/// RPC client over TCP
#[derive(Debug, Clone)]
pub struct TcpTransport {
    /// Deadline for a whole call, connect included
    timeout: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_RPC_TIMEOUT)
    }
}

impl TcpTransport {
    pub fn new(timeout: Duration) -> Self {
        TcpTransport { timeout }
    }

    /// Send one request and await its response
    ///
    /// A failed call on the remote side comes back as [`DhtError::Remote`]
    /// with the remote status intact.
    pub async fn call(&self, network_address: &str, request: RpcRequest) -> Result<RpcReply> {
        let name = request.name();
        debug!("Sending {} to {}", name, network_address);

        let exchange = async {
            let mut stream = TcpStream::connect(network_address).await.map_err(|e| {
                DhtError::Transport(format!("failed to connect to {}: {}", network_address, e))
            })?;
            write_message(&mut stream, &request).await?;
            read_message::<_, RpcResponse>(&mut stream)
                .await?
                .ok_or_else(|| {
                    DhtError::Transport(format!("{} closed the connection", network_address))
                })
        };

        match timeout(self.timeout, exchange).await {
            Ok(Ok(Ok(reply))) => Ok(reply),
            Ok(Ok(Err(status))) => Err(DhtError::Remote(status)),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                debug!("{} to {} timed out", name, network_address);
                Err(DhtError::Timeout)
            }
        }
    }

    pub async fn ping(&self, network_address: &str, message: &str) -> Result<StringMessage> {
        match self
            .call(network_address, RpcRequest::Ping(StringMessage::new(message)))
            .await?
        {
            RpcReply::Message(reply) => Ok(reply),
            _ => Err(DhtError::UnexpectedReply("Ping")),
        }
    }

    pub async fn ping_to(&self, network_address: &str, target: &str) -> Result<PingReply> {
        let request = RpcRequest::PingTo(PingToRequest {
            network_address: target.to_string(),
        });
        match self.call(network_address, request).await? {
            RpcReply::Pong(reply) => Ok(reply),
            _ => Err(DhtError::UnexpectedReply("PingTo")),
        }
    }

    pub async fn find_node(
        &self,
        network_address: &str,
        certificate: NodeCertificate,
        target: &DoogleAddress,
    ) -> Result<NodeInfos> {
        let request = RpcRequest::FindNode(FindNodeRequest::new(certificate, target));
        match self.call(network_address, request).await? {
            RpcReply::Nodes(infos) => Ok(infos),
            _ => Err(DhtError::UnexpectedReply("FindNode")),
        }
    }

    pub async fn post_url(&self, network_address: &str, url: &str) -> Result<()> {
        let request = RpcRequest::PostUrl(StringMessage::new(url));
        match self.call(network_address, request).await? {
            RpcReply::Empty => Ok(()),
            _ => Err(DhtError::UnexpectedReply("PostUrl")),
        }
    }

    pub async fn get_index(&self, network_address: &str, query: &str) -> Result<()> {
        let request = RpcRequest::GetIndex(StringMessage::new(query));
        match self.call(network_address, request).await? {
            RpcReply::Empty => Ok(()),
            _ => Err(DhtError::UnexpectedReply("GetIndex")),
        }
    }

    pub async fn find_index(&self, network_address: &str, request: FindIndexRequest) -> Result<()> {
        match self
            .call(network_address, RpcRequest::FindIndex(request))
            .await?
        {
            RpcReply::Empty => Ok(()),
            _ => Err(DhtError::UnexpectedReply("FindIndex")),
        }
    }
}

#[async_trait]
impl PeerTransport for TcpTransport {
    async fn ping_with_certificate(
        &self,
        network_address: &str,
        certificate: NodeCertificate,
    ) -> Result<PingReply> {
        match self
            .call(network_address, RpcRequest::PingWithCertificate(certificate))
            .await?
        {
            RpcReply::Pong(reply) => Ok(reply),
            _ => Err(DhtError::UnexpectedReply("PingWithCertificate")),
        }
    }

    async fn store_item(&self, network_address: &str, request: StoreItemRequest) -> Result<()> {
        match self
            .call(network_address, RpcRequest::StoreItem(request))
            .await?
        {
            RpcReply::Empty => Ok(()),
            _ => Err(DhtError::UnexpectedReply("StoreItem")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Status, StatusCode};
    use std::io::Cursor;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let mut buffer = Vec::new();
        send_frame(&mut Cursor::new(&mut buffer), b"hello doogle")
            .await
            .unwrap();
        assert_eq!(&buffer[..4], &12u32.to_be_bytes());

        let mut cursor = Cursor::new(buffer);
        let frame = recv_frame(&mut cursor).await.unwrap();
        assert_eq!(frame.as_deref(), Some(&b"hello doogle"[..]));
        assert!(recv_frame(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut bytes = ((MAX_FRAME_SIZE + 1) as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        let result = recv_frame(&mut Cursor::new(bytes)).await;
        assert!(matches!(result, Err(DhtError::Transport(_))));

        let big = vec![0u8; MAX_FRAME_SIZE + 1];
        let mut sink = Vec::new();
        assert!(send_frame(&mut Cursor::new(&mut sink), &big).await.is_err());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_truncated_frame_is_error() {
        let mut bytes = 10u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(recv_frame(&mut Cursor::new(bytes)).await.is_err());
    }

    #[tokio::test]
    async fn test_connect_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let transport = TcpTransport::new(Duration::from_secs(2));
        let err = transport.ping(&addr, "hi").await.unwrap_err();
        assert!(matches!(err, DhtError::Transport(_)));
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let _server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let transport = TcpTransport::new(Duration::from_millis(200));
        let err = transport.ping(&addr, "hi").await.unwrap_err();
        assert!(matches!(err, DhtError::Timeout));
    }

    #[tokio::test]
    async fn test_remote_status_surfaces() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _request: Option<RpcRequest> = read_message(&mut stream).await.unwrap();
            let response: RpcResponse = Err(Status::invalid_argument("invalid certificate"));
            write_message(&mut stream, &response).await.unwrap();
        });

        let transport = TcpTransport::default();
        let err = transport.post_url(&addr, "http://example.com").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgument);
    }
}
