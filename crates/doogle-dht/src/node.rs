//! The doogle node: identity, routing state, stores and every RPC handler

use async_trait::async_trait;
use doogle_crypto::{DoogleAddress, NodeCertificate, NodeKeypair};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::crawler::Crawler;
use crate::dht::{DoogleService, PeerTransport};
use crate::error::{DhtError, Result};
use crate::item_store::{Item, ItemStore};
use crate::iterative_lookup::IterativeLookup;
use crate::kbucket::BucketUpdate;
use crate::node_info::PeerContact;
use crate::operations::{
    FindIndexRequest, FindNodeRequest, NodeInfos, PingReply, PingToRequest, StoreItemRequest,
    StringMessage,
};
use crate::routing_table::RoutingTable;
use crate::storage::IndexStore;
use crate::{ALPHA, PONG};

/// A doogle node
///
/// All state is shared by reference between concurrent request handlers;
/// every store synchronizes internally.
pub struct Node {
    /// Our doogle address
    address: DoogleAddress,

    /// Certificate attached to every outbound authenticated call
    certificate: NodeCertificate,

    config: NodeConfig,

    routing_table: RoutingTable,

    /// Token address -> item addresses
    pub(crate) index: IndexStore,

    pub(crate) items: ItemStore,

    pub(crate) transport: Arc<dyn PeerTransport>,

    pub(crate) crawler: Arc<dyn Crawler>,
}

impl Node {
    /// Create a node with a fresh keypair
    ///
    /// Solves the address puzzle for `config.difficulty`. This is CPU-bound
    /// and may take a long time at high difficulty; call it from a blocking
    /// context.
    pub fn new(
        config: NodeConfig,
        transport: Arc<dyn PeerTransport>,
        crawler: Arc<dyn Crawler>,
    ) -> Result<Self> {
        Self::with_keypair(config, NodeKeypair::generate(), transport, crawler)
    }

    /// Create a node around an existing keypair
    ///
    /// Only the public half is kept, inside the certificate.
    pub fn with_keypair(
        config: NodeConfig,
        keypair: NodeKeypair,
        transport: Arc<dyn PeerTransport>,
        crawler: Arc<dyn Crawler>,
    ) -> Result<Self> {
        let certificate = NodeCertificate::generate(
            &config.network_address,
            &keypair.public_key_bytes(),
            config.difficulty,
        )?;
        let address = certificate.address()?;

        info!(
            "Created node {} at {} (difficulty {})",
            address.to_hex(),
            config.network_address,
            config.difficulty
        );

        Ok(Node {
            address,
            certificate,
            routing_table: RoutingTable::with_bucket_size(address, config.bucket_size),
            config,
            index: IndexStore::new(),
            items: ItemStore::new(),
            transport,
            crawler,
        })
    }

    /// Get our doogle address
    pub fn address(&self) -> &DoogleAddress {
        &self.address
    }

    pub fn certificate(&self) -> &NodeCertificate {
        &self.certificate
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    pub fn index(&self) -> &IndexStore {
        &self.index
    }

    pub fn items(&self) -> &ItemStore {
        &self.items
    }

    /// Check a certificate against our admission difficulty
    ///
    /// Pure: the routing table is not touched.
    pub fn verify_certificate(&self, certificate: &NodeCertificate) -> Result<DoogleAddress> {
        certificate.verify(self.config.difficulty).map_err(|e| {
            debug!(
                "Rejected certificate from {}: {}",
                certificate.network_address, e
            );
            DhtError::InvalidCertificate(e.to_string())
        })
    }

    /// Add or refresh a peer in the routing table
    ///
    /// A collision with our own address is logged and skipped.
    pub fn refresh_contact(
        &self,
        address: DoogleAddress,
        network_address: &str,
    ) -> Option<BucketUpdate> {
        match self
            .routing_table
            .update(PeerContact::new(address, network_address))
        {
            Ok(update) => {
                if let BucketUpdate::Evicted(ref evicted) = update {
                    debug!(
                        "Evicted {} ({}) for {}",
                        evicted.address, evicted.network_address, address
                    );
                }
                Some(update)
            }
            Err(e) => {
                warn!(
                    "Skipped routing update for {} ({}): {}",
                    address, network_address, e
                );
                None
            }
        }
    }

    /// Authenticate a sender and refresh its routing entry
    ///
    /// Fails without touching the routing table when the certificate does
    /// not verify. An address collision is not a verification failure.
    pub fn is_valid_sender(&self, certificate: &NodeCertificate) -> Result<DoogleAddress> {
        let address = self.verify_certificate(certificate)?;
        self.refresh_contact(address, &certificate.network_address);
        Ok(address)
    }

    /// Up to [`ALPHA`] contacts from the bucket `target` falls into
    pub fn closest_contacts(&self, target: &DoogleAddress) -> Result<Vec<PeerContact>> {
        self.routing_table.closest_in_bucket(target, ALPHA)
    }

    /// Local iterative FIND_NODE
    ///
    /// Each round reads our own table for the target, feeds contacts the
    /// previous round did not return back into the routing table and stops
    /// once a round brings nothing new. Returns the last round's contacts.
    pub fn lookup(&self, target: &DoogleAddress) -> Result<Vec<PeerContact>> {
        if *target == self.address {
            return Err(DhtError::AddressCollision);
        }

        let mut lookup = IterativeLookup::with_max_rounds(*target, self.config.max_lookup_iterations);
        while !lookup.is_complete() {
            let contacts = self.closest_contacts(target)?;
            for contact in &contacts {
                if !lookup.seen_last_round(&contact.network_address) {
                    self.refresh_contact(contact.address, &contact.network_address);
                }
            }
            lookup.observe_round(contacts);
        }

        let stats = lookup.stats();
        debug!(
            "Lookup for {} finished after {} rounds with {} contacts",
            target, stats.rounds, stats.returned
        );
        if !stats.converged {
            warn!("Lookup for {} hit the round ceiling", target);
        }

        Ok(lookup.into_closest())
    }
}

#[async_trait]
impl DoogleService for Node {
    async fn ping(&self, _request: StringMessage) -> Result<StringMessage> {
        Ok(StringMessage::new(PONG))
    }

    async fn ping_with_certificate(&self, certificate: NodeCertificate) -> Result<PingReply> {
        self.is_valid_sender(&certificate)?;
        Ok(PingReply {
            message: PONG.to_string(),
            certificate: Some(self.certificate.clone()),
        })
    }

    async fn ping_to(&self, request: PingToRequest) -> Result<PingReply> {
        let reply = self
            .transport
            .ping_with_certificate(&request.network_address, self.certificate.clone())
            .await
            .map_err(|e| {
                DhtError::Transport(format!(
                    "failed to ping {}: {}",
                    request.network_address, e
                ))
            })?;

        if let Some(certificate) = &reply.certificate {
            if let Err(e) = self.is_valid_sender(certificate) {
                warn!(
                    "Peer {} answered with an unusable certificate: {}",
                    request.network_address, e
                );
            }
        }

        Ok(reply)
    }

    async fn find_node(&self, request: FindNodeRequest) -> Result<NodeInfos> {
        self.is_valid_sender(&request.certificate)?;
        let target = DoogleAddress::from_slice(&request.doogle_address)
            .map_err(|e| DhtError::InvalidRequest(e.to_string()))?;

        let infos = self
            .closest_contacts(&target)?
            .iter()
            .map(PeerContact::to_wire)
            .collect();
        Ok(NodeInfos { infos })
    }

    async fn store_item(&self, request: StoreItemRequest) -> Result<()> {
        self.is_valid_sender(&request.certificate)?;
        let key = DoogleAddress::from_slice(&request.index)
            .map_err(|e| DhtError::InvalidRequest(e.to_string()))?;

        let item = Item::new(
            request.url,
            request.title,
            request.description,
            &request.edges,
        );
        let item_address = item.address;

        self.index.add(key, item_address);
        let created = self.items.upsert(item);

        debug!(
            "Stored item {} under {} (new: {})",
            item_address, key, created
        );
        Ok(())
    }

    async fn post_url(&self, request: StringMessage) -> Result<()> {
        let report = self.publish(&request.message).await?;
        info!(
            "Published {}: {} tokens, {} stores ok, {} failed, {} tokens skipped",
            request.message, report.tokens, report.stored, report.failed, report.skipped
        );
        Ok(())
    }

    async fn get_index(&self, _request: StringMessage) -> Result<()> {
        Err(DhtError::Unimplemented("GetIndex"))
    }

    async fn find_index(&self, _request: FindIndexRequest) -> Result<()> {
        Err(DhtError::Unimplemented("FindIndex"))
    }
}
