//! Archiver component - publishes completed packets for storage
//!
//! Each packet closed by EOP or EEP becomes one JSON document sent as a
//! two-frame message `[topic, json]`. Time-codes are not archived and
//! incomplete packets are only logged.
//!
//! A document larger than the transport buffer is dropped with an error
//! log; later packets are still published.

use chrono::{Local, TimeZone};
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ArchiveConfig;
use crate::reader::decoder::{DecodedItem, DecodedTrace, ReconstructedPacket};

/// Archive errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("ZMQ error: {0}")]
    Zmq(#[from] zmq::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message of {len} bytes exceeds transport buffer of {max} bytes")]
    BufferOverflow { len: usize, max: usize },
}

/// Transport for archive messages
pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ArchiveError>;
}

impl<P: Publisher + ?Sized> Publisher for &mut P {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ArchiveError> {
        (**self).publish(topic, payload)
    }
}

/// ZeroMQ PUB socket transport
pub struct ZmqPublisher {
    _context: zmq::Context,
    socket: zmq::Socket,
    endpoint: String,
}

impl ZmqPublisher {
    /// Bind a PUB socket (e.g., "tcp://*:5600", or "tcp://127.0.0.1:*" for
    /// an ephemeral port)
    pub fn bind(endpoint: &str) -> Result<Self, ArchiveError> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PUB)?;
        socket.bind(endpoint)?;
        let bound = socket
            .get_last_endpoint()?
            .unwrap_or_else(|_| endpoint.to_string());
        info!(endpoint = %bound, "Archive publisher bound");
        Ok(Self {
            _context: context,
            socket,
            endpoint: bound,
        })
    }

    /// Endpoint the socket is bound to, with any wildcard port resolved
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Publisher for ZmqPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ArchiveError> {
        self.socket
            .send_multipart([topic.as_bytes(), payload], 0)?;
        Ok(())
    }
}

/// JSON document for one archived packet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveMessage {
    pub uuid: String,
    pub capture_time: String,
    pub interface_id: String,
    pub test_id: String,
    pub test_version: String,
    pub asw_version: String,
    pub db_version: String,
    /// Packet bytes as lowercase hex
    pub raw_data: String,
}

/// Lowercase hex rendering of a byte string
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Outcome of archiving one trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub published: usize,
    /// Messages dropped for exceeding the transport buffer
    pub dropped: usize,
    /// Incomplete packets that were not archived
    pub skipped_incomplete: usize,
}

/// Turns decoded packets into archive messages
pub struct PacketArchiver<P: Publisher, Tz: TimeZone = Local> {
    publisher: P,
    config: ArchiveConfig,
    tz: Tz,
}

impl<P: Publisher> PacketArchiver<P, Local> {
    pub fn new(publisher: P, config: ArchiveConfig) -> Self {
        Self::with_timezone(publisher, config, Local)
    }
}

impl<P: Publisher, Tz: TimeZone> PacketArchiver<P, Tz>
where
    Tz::Offset: Display,
{
    pub fn with_timezone(publisher: P, config: ArchiveConfig, tz: Tz) -> Self {
        Self {
            publisher,
            config,
            tz,
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Build the archive document for a packet
    pub fn message_for(&self, packet: &ReconstructedPacket) -> ArchiveMessage {
        ArchiveMessage {
            uuid: Uuid::new_v4().to_string(),
            capture_time: packet.start_timestamp.format_in(&self.tz),
            interface_id: self.config.interface_id(packet.receiver).to_string(),
            test_id: self.config.test_id.clone(),
            test_version: self.config.test_version.clone(),
            asw_version: self.config.asw_version.clone(),
            db_version: self.config.db_version.clone(),
            raw_data: to_hex(&packet.bytes),
        }
    }

    /// Encode and publish one packet
    pub fn publish_packet(&mut self, packet: &ReconstructedPacket) -> Result<(), ArchiveError> {
        let payload = serde_json::to_vec(&self.message_for(packet))?;
        if payload.len() > self.config.max_message_bytes {
            return Err(ArchiveError::BufferOverflow {
                len: payload.len(),
                max: self.config.max_message_bytes,
            });
        }
        self.publisher.publish(&self.config.topic, &payload)?;
        debug!(receiver = %packet.receiver, bytes = packet.len(), "Packet archived");
        Ok(())
    }

    /// Publish every terminated packet of a decoded trace
    ///
    /// Oversized messages are dropped and counted; transport failures abort.
    pub fn archive(&mut self, decoded: &DecodedTrace) -> Result<ArchiveSummary, ArchiveError> {
        let mut summary = ArchiveSummary::default();
        for item in decoded.merged() {
            let DecodedItem::Packet(packet) = item else {
                continue;
            };
            if !packet.is_terminated() {
                warn!(
                    receiver = %packet.receiver,
                    bytes = packet.len(),
                    "Incomplete packet not archived"
                );
                summary.skipped_incomplete += 1;
                continue;
            }
            match self.publish_packet(packet) {
                Ok(()) => summary.published += 1,
                Err(ArchiveError::BufferOverflow { len, max }) => {
                    error!(len, max, receiver = %packet.receiver, "Archive message dropped: transport buffer overflow");
                    summary.dropped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            published = summary.published,
            dropped = summary.dropped,
            topic = %self.config.topic,
            "Archive complete"
        );
        Ok(summary)
    }
}
