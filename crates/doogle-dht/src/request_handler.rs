//! RPC server: accepts connections and dispatches requests onto a
//! [`DoogleService`]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::dht::DoogleService;
use crate::error::{Result, Status};
use crate::operations::{RpcReply, RpcRequest, RpcResponse};
use crate::rpc_transport::{read_message, write_message};

/// Serves doogle RPCs over TCP
///
/// One task per accepted connection; a connection may carry any number of
/// request/response exchanges until the client closes it.
#[derive(Clone)]
pub struct RpcServer {
    service: Arc<dyn DoogleService>,
}

impl RpcServer {
    pub fn new(service: Arc<dyn DoogleService>) -> Self {
        RpcServer { service }
    }

    /// Dispatch one request
    ///
    /// Failures are turned into a [`Status`] for the caller.
    pub async fn handle_request(&self, request: RpcRequest) -> RpcResponse {
        let name = request.name();
        let started = Instant::now();
        let result = match request {
            RpcRequest::Ping(message) => self.service.ping(message).await.map(RpcReply::Message),
            RpcRequest::PingWithCertificate(certificate) => self
                .service
                .ping_with_certificate(certificate)
                .await
                .map(RpcReply::Pong),
            RpcRequest::PingTo(request) => self.service.ping_to(request).await.map(RpcReply::Pong),
            RpcRequest::FindNode(request) => {
                self.service.find_node(request).await.map(RpcReply::Nodes)
            }
            RpcRequest::StoreItem(request) => self
                .service
                .store_item(request)
                .await
                .map(|()| RpcReply::Empty),
            RpcRequest::PostUrl(request) => self
                .service
                .post_url(request)
                .await
                .map(|()| RpcReply::Empty),
            RpcRequest::GetIndex(request) => self
                .service
                .get_index(request)
                .await
                .map(|()| RpcReply::Empty),
            RpcRequest::FindIndex(request) => self
                .service
                .find_index(request)
                .await
                .map(|()| RpcReply::Empty),
        };

        let elapsed = started.elapsed();
        match result {
            Ok(reply) => {
                debug!("{} succeeded in {:?}", name, elapsed);
                Ok(reply)
            }
            Err(e) => {
                debug!("{} failed in {:?}: {}", name, elapsed, e);
                Err(Status::from(e))
            }
        }
    }

    /// Accept connections until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!("RPC server listening on {}", local_addr);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("RPC server on {} shutting down", local_addr);
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let server = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, peer).await {
                                debug!("Connection from {} ended with error: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => error!("Accept error on {}: {}", local_addr, e),
                }
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
        debug!("Connection from {}", peer);
        loop {
            let request = match read_message::<_, RpcRequest>(&mut stream).await {
                Ok(Some(request)) => request,
                Ok(None) => return Ok(()),
                Err(e) => {
                    warn!("Malformed request from {}: {}", peer, e);
                    return Err(e);
                }
            };

            let response = self.handle_request(request).await;
            write_message(&mut stream, &response).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DhtError, StatusCode};
    use crate::operations::{
        FindIndexRequest, FindNodeRequest, NodeInfos, PingReply, PingToRequest,
        StoreItemRequest, StringMessage,
    };
    use crate::PONG;
    use async_trait::async_trait;
    use doogle_crypto::NodeCertificate;

    /// Answers pings; rejects everything else as a bad certificate
    struct PingOnly;

    #[async_trait]
    impl DoogleService for PingOnly {
        async fn ping(&self, _request: StringMessage) -> Result<StringMessage> {
            Ok(StringMessage::new(PONG))
        }

        async fn ping_with_certificate(&self, _certificate: NodeCertificate) -> Result<PingReply> {
            Err(DhtError::InvalidCertificate("rejected".to_string()))
        }

        async fn ping_to(&self, _request: PingToRequest) -> Result<PingReply> {
            Err(DhtError::Transport("unreachable".to_string()))
        }

        async fn find_node(&self, _request: FindNodeRequest) -> Result<NodeInfos> {
            Ok(NodeInfos::default())
        }

        async fn store_item(&self, _request: StoreItemRequest) -> Result<()> {
            Ok(())
        }

        async fn post_url(&self, _request: StringMessage) -> Result<()> {
            Ok(())
        }

        async fn get_index(&self, _request: StringMessage) -> Result<()> {
            Err(DhtError::Unimplemented("GetIndex"))
        }

        async fn find_index(&self, _request: FindIndexRequest) -> Result<()> {
            Err(DhtError::Unimplemented("FindIndex"))
        }
    }

    fn certificate() -> NodeCertificate {
        NodeCertificate {
            network_address: "127.0.0.1:1".to_string(),
            doogle_address: vec![1u8; 20],
            public_key: Vec::new(),
            nonce: Vec::new(),
            difficulty: 0,
        }
    }

    #[tokio::test]
    async fn test_dispatch() {
        let server = RpcServer::new(Arc::new(PingOnly));

        let reply = server
            .handle_request(RpcRequest::Ping(StringMessage::new("hi")))
            .await
            .unwrap();
        assert_eq!(reply, RpcReply::Message(StringMessage::new(PONG)));

        let status = server
            .handle_request(RpcRequest::PingWithCertificate(certificate()))
            .await
            .unwrap_err();
        assert_eq!(status.code, StatusCode::InvalidArgument);

        let status = server
            .handle_request(RpcRequest::PingTo(PingToRequest {
                network_address: "127.0.0.1:1".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code, StatusCode::Internal);

        let status = server
            .handle_request(RpcRequest::GetIndex(StringMessage::new("rust")))
            .await
            .unwrap_err();
        assert_eq!(status.code, StatusCode::Unimplemented);

        let reply = server
            .handle_request(RpcRequest::PostUrl(StringMessage::new("http://x")))
            .await
            .unwrap();
        assert_eq!(reply, RpcReply::Empty);
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let server = RpcServer::new(Arc::new(PingOnly));
        let handle = tokio::spawn(server.serve(listener, async {
            let _ = stop_rx.await;
        }));

        let transport = crate::rpc_transport::TcpTransport::default();
        let reply = transport.ping(&addr, "hello").await.unwrap();
        assert_eq!(reply.message, PONG);

        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_connection_serves_several_requests() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = RpcServer::new(Arc::new(PingOnly));
        tokio::spawn(server.serve(listener, std::future::pending()));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        for _ in 0..3 {
            write_message(&mut stream, &RpcRequest::Ping(StringMessage::new("again")))
                .await
                .unwrap();
            let response: Option<RpcResponse> = read_message(&mut stream).await.unwrap();
            assert!(matches!(response, Some(Ok(RpcReply::Message(_)))));
        }
    }
}
