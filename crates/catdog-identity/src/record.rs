//! Signed node records.
//!
//! A node record describes a participant: its identity key, where it can be
//! reached and any protocol-specific extension entries. Records carry a
//! sequence number that the owner bumps on every change, so peers can tell
//! whether their stored copy is stale.
//!
//! Textual form:
//! ```text
//! "enr:" || base64url_nopad(json(record))
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use k256::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::keys::{PUBLIC_KEY_SIZE, public_key_bytes};
use crate::scheme::{V4Scheme, ValidSchemes};
use crate::{Error, Result};

/// Prefix of the textual record form.
pub const ENR_PREFIX: &str = "enr:";

/// Size of a [`NodeId`] in bytes.
pub const NODE_ID_SIZE: usize = 32;

/// Identifier of a node, derived from its public key.
///
/// ```text
/// node_id = sha256(compressed_public_key)
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; NODE_ID_SIZE]);

impl NodeId {
    /// Derives the node id from a compressed SEC1 public key.
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        let mut id = [0u8; NODE_ID_SIZE];
        id.copy_from_slice(&digest);
        Self(id)
    }

    pub fn from_bytes(bytes: [u8; NODE_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NODE_ID_SIZE] {
        &self.0
    }

    /// First eight hex characters, for log lines.
    pub fn fmt_short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Logarithmic XOR distance between two ids.
    ///
    /// Returns 0 for identical ids and 256 when the first bit differs.
    pub fn log_distance(&self, other: &NodeId) -> u32 {
        let mut leading = 0u32;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            let x = a ^ b;
            if x == 0 {
                leading += 8;
            } else {
                leading += x.leading_zeros();
                break;
            }
        }
        (NODE_ID_SIZE as u32 * 8) - leading
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.fmt_short())
    }
}

/// A signed, versioned description of a network participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    seq: u64,

    /// Name of the identity scheme that signed this record.
    scheme: String,

    #[serde(with = "hex::serde")]
    public_key: Vec<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    ip: Option<IpAddr>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    udp: Option<u16>,

    #[serde(default, with = "hex_entries", skip_serializing_if = "BTreeMap::is_empty")]
    entries: BTreeMap<String, Vec<u8>>,

    #[serde(with = "hex::serde")]
    signature: Vec<u8>,
}

impl NodeRecord {
    /// Start building a record to be signed with the `v4` scheme.
    pub fn builder() -> RecordBuilder {
        RecordBuilder::new()
    }

    pub fn id(&self) -> NodeId {
        NodeId::from_public_key(&self.public_key)
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    pub fn udp(&self) -> Option<u16> {
        self.udp
    }

    /// UDP endpoint, if the record advertises both an IP and a port.
    pub fn udp_addr(&self) -> Option<SocketAddr> {
        match (self.ip, self.udp) {
            (Some(ip), Some(port)) => Some(SocketAddr::new(ip, port)),
            _ => None,
        }
    }

    pub fn entry(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Verify the record signature against the accepted identity schemes.
    pub fn verify(&self, schemes: &ValidSchemes) -> Result<()> {
        schemes.verify(self)
    }

    /// The byte string covered by the record signature.
    ///
    /// Layout (all integers big-endian):
    /// - seq: 8 bytes
    /// - scheme: 1-byte length + UTF-8
    /// - public key: 1-byte length + bytes
    /// - ip: tag (0 = none, 4, 6) + address bytes
    /// - udp: tag (0 = none, 1) + 2 bytes
    /// - entries: 2-byte count, then per entry 1-byte key length + key,
    ///   2-byte value length + value
    pub fn signing_message(&self) -> Vec<u8> {
        content_message(
            self.seq,
            &self.scheme,
            &self.public_key,
            self.ip,
            self.udp,
            &self.entries,
        )
    }

    /// Encode the record in its textual `enr:` form.
    pub fn to_text(&self) -> Result<String> {
        let json = serde_json::to_vec(self).map_err(|e| Error::Encode(e.to_string()))?;
        Ok(format!("{}{}", ENR_PREFIX, URL_SAFE_NO_PAD.encode(json)))
    }

    /// Parse a record from its textual `enr:` form.
    ///
    /// Only the structure is checked here; use [`NodeRecord::verify`] to
    /// check the signature.
    pub fn from_text(text: &str) -> Result<Self> {
        let encoded = text
            .trim()
            .strip_prefix(ENR_PREFIX)
            .ok_or_else(|| Error::Decode(format!("missing '{}' prefix", ENR_PREFIX)))?;
        let json = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| Error::Decode(e.to_string()))?;
        let record: Self =
            serde_json::from_slice(&json).map_err(|e| Error::Decode(e.to_string()))?;
        record.check_structure()?;
        Ok(record)
    }

    /// Field sizes the signing message can encode unambiguously.
    pub(crate) fn check_structure(&self) -> Result<()> {
        if self.public_key.len() != PUBLIC_KEY_SIZE {
            return Err(Error::InvalidRecord(format!(
                "public key must be {} bytes, got {}",
                PUBLIC_KEY_SIZE,
                self.public_key.len()
            )));
        }
        if self.scheme.is_empty() || self.scheme.len() > u8::MAX as usize {
            return Err(Error::InvalidRecord("invalid scheme name".into()));
        }
        if self
            .entries
            .iter()
            .any(|(k, v)| k.len() > u8::MAX as usize || v.len() > u16::MAX as usize)
        {
            return Err(Error::InvalidRecord("entry too large".into()));
        }
        Ok(())
    }
}

impl fmt::Display for NodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "<record {} seq={}>", self.id().fmt_short(), self.seq),
        }
    }
}

impl FromStr for NodeRecord {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_text(s)
    }
}

/// Builder for [`NodeRecord`].
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    seq: u64,
    ip: Option<IpAddr>,
    udp: Option<u16>,
    entries: BTreeMap<String, Vec<u8>>,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self {
            seq: 1,
            ip: None,
            udp: None,
            entries: BTreeMap::new(),
        }
    }

    pub fn seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    pub fn ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    pub fn udp(mut self, port: u16) -> Self {
        self.udp = Some(port);
        self
    }

    pub fn entry(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub(crate) fn entries(mut self, entries: BTreeMap<String, Vec<u8>>) -> Self {
        self.entries = entries;
        self
    }

    pub(crate) fn maybe_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.ip = ip;
        self
    }

    pub(crate) fn maybe_udp(mut self, port: Option<u16>) -> Self {
        self.udp = port;
        self
    }

    /// Sign the record content with `key` using the `v4` scheme.
    pub fn sign(self, key: &SigningKey) -> NodeRecord {
        let public_key = public_key_bytes(key).to_vec();
        let message = content_message(
            self.seq,
            V4Scheme::NAME,
            &public_key,
            self.ip,
            self.udp,
            &self.entries,
        );
        let signature = V4Scheme::sign(key, &message);

        NodeRecord {
            seq: self.seq,
            scheme: V4Scheme::NAME.to_string(),
            public_key,
            ip: self.ip,
            udp: self.udp,
            entries: self.entries,
            signature,
        }
    }
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn content_message(
    seq: u64,
    scheme: &str,
    public_key: &[u8],
    ip: Option<IpAddr>,
    udp: Option<u16>,
    entries: &BTreeMap<String, Vec<u8>>,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + public_key.len());

    buf.extend_from_slice(&seq.to_be_bytes());

    buf.push(scheme.len() as u8);
    buf.extend_from_slice(scheme.as_bytes());

    buf.push(public_key.len() as u8);
    buf.extend_from_slice(public_key);

    match ip {
        None => buf.push(0),
        Some(IpAddr::V4(v4)) => {
            buf.push(4);
            buf.extend_from_slice(&v4.octets());
        }
        Some(IpAddr::V6(v6)) => {
            buf.push(6);
            buf.extend_from_slice(&v6.octets());
        }
    }

    match udp {
        None => buf.push(0),
        Some(port) => {
            buf.push(1);
            buf.extend_from_slice(&port.to_be_bytes());
        }
    }

    buf.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    for (key, value) in entries {
        buf.push(key.len() as u8);
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
        buf.extend_from_slice(value);
    }

    buf
}

mod hex_entries {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer, ser::SerializeMap};

    pub fn serialize<S>(entries: &BTreeMap<String, Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, &hex::encode(value))?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, value)| {
                hex::decode(&value)
                    .map(|bytes| (key, bytes))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
