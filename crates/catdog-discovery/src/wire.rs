//! Packet encoding.
//!
//! ```text
//! packet = version_tag || json(message)
//! ```
//!
//! The version tag makes packets of one protocol version unintelligible to
//! engines of the other.

use std::net::IpAddr;

use catdog_identity::NodeRecord;
use serde::{Deserialize, Serialize};

use crate::{Error, MAX_PACKET_SIZE, ProtocolVersion, Result};

/// Most records returned for a single FINDNODE request.
pub(crate) const MAX_FINDNODE_RESULTS: usize = 16;

/// Most distances accepted in a single FINDNODE request.
pub(crate) const MAX_FINDNODE_DISTANCES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Message {
    /// Liveness check. Carries the sender's record so the recipient can
    /// learn about it.
    Ping { req_id: u64, record: NodeRecord },

    Pong {
        req_id: u64,
        enr_seq: u64,
        to_ip: IpAddr,
        to_port: u16,
    },

    FindNode { req_id: u64, distances: Vec<u32> },

    /// One of `total` response packets to a FINDNODE request.
    Nodes {
        req_id: u64,
        total: u8,
        records: Vec<NodeRecord>,
    },

    RecordRequest { req_id: u64 },

    RecordResponse { req_id: u64, record: NodeRecord },
}

impl Message {
    pub(crate) fn req_id(&self) -> u64 {
        match self {
            Self::Ping { req_id, .. }
            | Self::Pong { req_id, .. }
            | Self::FindNode { req_id, .. }
            | Self::Nodes { req_id, .. }
            | Self::RecordRequest { req_id }
            | Self::RecordResponse { req_id, .. } => *req_id,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Ping { .. } => "PING",
            Self::Pong { .. } => "PONG",
            Self::FindNode { .. } => "FINDNODE",
            Self::Nodes { .. } => "NODES",
            Self::RecordRequest { .. } => "RECORDREQUEST",
            Self::RecordResponse { .. } => "RECORDRESPONSE",
        }
    }

    /// Encode for `version`, enforcing the packet size limit.
    pub(crate) fn encode(&self, version: ProtocolVersion) -> Result<Vec<u8>> {
        let tag = version.wire_tag();
        let body = serde_json::to_vec(self).map_err(|e| Error::Encode(e.to_string()))?;

        let len = tag.len() + body.len();
        if len > MAX_PACKET_SIZE {
            return Err(Error::PacketTooLarge(len));
        }

        let mut packet = Vec::with_capacity(len);
        packet.extend_from_slice(tag);
        packet.extend_from_slice(&body);
        Ok(packet)
    }

    /// Decode a packet received by a `version` engine.
    pub(crate) fn decode(packet: &[u8], version: ProtocolVersion) -> Result<Self> {
        if packet.len() > MAX_PACKET_SIZE {
            return Err(Error::PacketTooLarge(packet.len()));
        }

        let body = packet
            .strip_prefix(version.wire_tag())
            .ok_or(Error::VersionMismatch(version))?;
        serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Split `records` into NODES packets that each fit the size limit.
///
/// A record too large to fit a packet on its own is skipped.
pub(crate) fn pack_nodes(
    req_id: u64,
    records: Vec<NodeRecord>,
    version: ProtocolVersion,
) -> Vec<Vec<NodeRecord>> {
    let mut chunks: Vec<Vec<NodeRecord>> = Vec::new();
    let mut current: Vec<NodeRecord> = Vec::new();

    for record in records {
        current.push(record);
        if fits(req_id, &current, version) {
            continue;
        }

        let Some(record) = current.pop() else {
            continue;
        };
        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if fits(req_id, std::slice::from_ref(&record), version) {
            current.push(record);
        }
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn fits(req_id: u64, records: &[NodeRecord], version: ProtocolVersion) -> bool {
    Message::Nodes {
        req_id,
        total: u8::MAX,
        records: records.to_vec(),
    }
    .encode(version)
    .is_ok()
}
